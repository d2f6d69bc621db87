use std::cmp::max;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::trace;
use crate::wrap_seq::WrapSeq;

/// The set of sequence numbers that are currently known to be missing, i.e. candidates for
///  retransmission requests.
///
/// Ranges are stored as half-open `[begin, end)`, keyed by `begin`. They never overlap and are
///  never adjacent - adjacent ranges are merged on insertion. This makes finding the range that
///  contains a given id a predecessor lookup plus a bounds check.
#[derive(Clone, Debug, Default)]
pub struct NackCoalescer {
    /// begin -> end (exclusive)
    ranges: BTreeMap<WrapSeq, WrapSeq>,
}

impl NackCoalescer {
    pub fn new() -> NackCoalescer {
        NackCoalescer::default()
    }

    /// Declare `[begin, end)` as missing, merging it with overlapping or adjacent ranges.
    ///  Re-declaring ids that are already missing has no effect.
    pub fn nack_range(&mut self, begin: WrapSeq, end: WrapSeq) {
        debug_assert!(begin <= end, "reversed NACK range {}..{}", begin, end);
        if begin >= end {
            return;
        }

        let mut new_begin = begin;
        let mut new_end = end;

        if let Some((&prev_begin, &prev_end)) = self.ranges.range(..=begin).next_back() {
            if prev_end >= begin {
                new_begin = prev_begin;
                new_end = max(new_end, prev_end);
                self.ranges.remove(&prev_begin);
            }
        }

        // a big range can swallow several existing ones
        while let Some((&next_begin, &next_end)) = self.ranges.range(new_begin..).next() {
            if next_begin > new_end {
                break;
            }
            new_end = max(new_end, next_end);
            self.ranges.remove(&next_begin);
        }

        trace!("NACK range {}..{} -> {}..{}", begin, end, new_begin, new_end);
        self.ranges.insert(new_begin, new_end);
    }

    /// Notification that `id` arrived. Returns `false` if it was not NACK'ed, which is an
    ///  ordinary race (e.g. a late arrival) rather than an error.
    pub fn cancel(&mut self, id: WrapSeq) -> bool {
        let (begin, end) = match self.ranges.range(..=id).next_back() {
            Some((&begin, &end)) if id < end => (begin, end),
            _ => return false,
        };

        self.ranges.remove(&begin);
        if begin < id {
            self.ranges.insert(begin, id);
        }
        let after = id.next();
        if after < end {
            self.ranges.insert(after, end);
        }
        true
    }

    /// Drop every NACK'ed id below `low`, typically because the sender announced that they can
    ///  not be repaired any more
    pub fn cancel_below(&mut self, low: WrapSeq) {
        while let Some((&begin, &end)) = self.ranges.first_key_value() {
            if begin >= low {
                break;
            }
            self.ranges.remove(&begin);
            if end > low {
                self.ranges.insert(low, end);
                break;
            }
        }
    }

    /// Drop every NACK'ed id in `[begin, end)`, returning `true` if anything was removed
    pub fn cancel_range(&mut self, begin: WrapSeq, end: WrapSeq) -> bool {
        if begin >= end {
            return false;
        }

        let mut changed = false;
        if let Some((&prev_begin, &prev_end)) = self.ranges.range(..begin).next_back() {
            if prev_end > begin {
                self.ranges.insert(prev_begin, begin);
                if prev_end > end {
                    self.ranges.insert(end, prev_end);
                }
                changed = true;
            }
        }

        while let Some((&next_begin, &next_end)) = self.ranges.range(begin..).next() {
            if next_begin >= end {
                break;
            }
            self.ranges.remove(&next_begin);
            changed = true;
            if next_end > end {
                self.ranges.insert(end, next_end);
                break;
            }
        }
        changed
    }

    pub fn cancel_all(&mut self) {
        self.ranges.clear();
    }

    pub fn contains(&self, id: WrapSeq) -> bool {
        matches!(self.ranges.range(..=id).next_back(), Some((_, &end)) if id < end)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// the number of (merged) ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// the currently missing ranges, ordered by their start
    pub fn ranges(&self) -> impl Iterator<Item = Range<WrapSeq>> + '_ {
        self.ranges.iter()
            .map(|(&begin, &end)| begin..end)
    }
}
