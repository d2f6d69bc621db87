use std::collections::BTreeSet;
use std::ops::Range;
use tracing::trace;
use crate::wrap_seq::WrapSeq;

/// Keeps track of which sequence numbers were received, in O(gaps) rather than O(messages)
///  memory.
///
/// The state is a low-water mark (everything at or below it is received and settled) plus a set
///  of individually received values beyond at least one gap. The state is kept *normalized*:
///  whenever the markers become contiguous with the low-water mark, they are collapsed into it.
///
/// All operations are total - there is nothing that can fail. See [WrapSeq] for the window
///  precondition that callers must ensure.
#[derive(Clone, Debug)]
pub struct GapTracker {
    low: WrapSeq,
    /// received values beyond the low-water mark. Invariant: all elements are > `low`, and the
    ///  first element (if any) is > `low.next()`
    beyond: BTreeSet<WrapSeq>,
}

impl GapTracker {
    pub fn new(low: WrapSeq) -> GapTracker {
        GapTracker {
            low,
            beyond: BTreeSet::new(),
        }
    }

    /// discard all information, starting over with a new low-water mark
    pub fn reset(&mut self, low: WrapSeq) {
        trace!("resetting gap tracker to low-water mark {}", low);
        self.low = low;
        self.beyond.clear();
    }

    pub fn seen(&self, value: WrapSeq) -> bool {
        value <= self.low || self.beyond.contains(&value)
    }

    /// Consider everything up to (and including) `value.previous()` as settled, discarding gap
    ///  information below that point. This never moves the low-water mark backwards.
    pub fn shift(&mut self, value: WrapSeq) {
        let new_low = value.previous();
        if new_low <= self.low {
            return;
        }

        trace!("shifting low-water mark from {} to {}", self.low, new_low);
        self.low = new_low;
        self.beyond = self.beyond.split_off(&new_low.next());
        self.normalize();
    }

    /// Record the arrival of `value`, returning `false` if it was seen before
    pub fn update(&mut self, value: WrapSeq) -> bool {
        if self.seen(value) {
            return false;
        }

        self.beyond.insert(value);
        self.normalize();
        true
    }

    /// Record the arrival of all values in the half-open range, returning `true` if anything
    ///  changed
    pub fn update_range(&mut self, range: Range<WrapSeq>) -> bool {
        if range.start == range.end {
            return false;
        }
        if range.end.previous() <= self.low {
            return false;
        }

        let mut changed = false;
        for value in range.start.to(range.end) {
            changed |= self.update(value);
        }
        changed
    }

    fn normalize(&mut self) {
        while let Some(&first) = self.beyond.first() {
            if first != self.low.next() {
                break;
            }
            self.low = first;
            self.beyond.pop_first();
        }
    }

    /// the low-water mark: all values at or below it are received
    pub fn low(&self) -> WrapSeq {
        self.low
    }

    /// the highest received value
    pub fn high(&self) -> WrapSeq {
        self.beyond.last()
            .copied()
            .unwrap_or(self.low)
    }

    /// the number of markers, including the low-water mark
    pub fn depth(&self) -> usize {
        self.beyond.len() + 1
    }

    /// true iff there is at least one gap between the low-water mark and the highest received
    ///  value
    pub fn is_disjoint(&self) -> bool {
        !self.beyond.is_empty()
    }

    /// the ranges of values between the low-water mark and the highest received value that have
    ///  not been received
    pub fn missing_ranges(&self) -> impl Iterator<Item = Range<WrapSeq>> + '_ {
        let mut prev = self.low;
        self.beyond.iter()
            .filter_map(move |&marker| {
                let gap_start = prev.next();
                prev = marker;
                if gap_start == marker {
                    None
                }
                else {
                    Some(gap_start..marker)
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    fn seq(raw: i16) -> WrapSeq {
        WrapSeq::from_raw(raw)
    }

    fn tracker(low: i16, received: &[i16]) -> GapTracker {
        let mut result = GapTracker::new(seq(low));
        for &r in received {
            result.update(seq(r));
        }
        result
    }

    fn raw_ranges(tracker: &GapTracker) -> Vec<(i16, i16)> {
        tracker.missing_ranges()
            .map(|r| (r.start.to_raw(), r.end.to_raw()))
            .collect()
    }

    #[test]
    fn test_new() {
        let tracker = GapTracker::new(seq(10));
        assert_eq!(tracker.low(), seq(10));
        assert_eq!(tracker.high(), seq(10));
        assert_eq!(tracker.depth(), 1);
        assert!(!tracker.is_disjoint());
        assert!(tracker.seen(seq(10)));
        assert!(tracker.seen(seq(3)));
        assert!(!tracker.seen(seq(11)));
    }

    #[rstest]
    #[case::contiguous(1, vec![2, 3, 4], 4, 4, 1)]
    #[case::single_gap(1, vec![6], 1, 6, 2)]
    #[case::gap_filled(1, vec![3, 4, 5, 6, 2], 6, 6, 1)]
    #[case::gap_partly_filled(1, vec![3, 5, 6, 2], 3, 6, 3)]
    #[case::below_low(5, vec![2, 3], 5, 5, 1)]
    #[case::wrap(i16::MAX-1, vec![i16::MAX, 0, 1], 1, 1, 1)]
    #[case::wrap_gap(i16::MAX-1, vec![0, 1], i16::MAX-1, 1, 3)]
    #[case::wrap_gap_filled(i16::MAX-1, vec![0, 1, i16::MAX], 1, 1, 1)]
    #[case::stem_to_loop(-2, vec![0, -1], 0, 0, 1)]
    fn test_update(#[case] low: i16, #[case] received: Vec<i16>, #[case] expected_low: i16, #[case] expected_high: i16, #[case] expected_depth: usize) {
        let tracker = tracker(low, &received);

        assert_eq!(tracker.low(), seq(expected_low));
        assert_eq!(tracker.high(), seq(expected_high));
        assert_eq!(tracker.depth(), expected_depth);
        assert_eq!(tracker.is_disjoint(), expected_depth > 1);
        for r in received {
            assert!(tracker.seen(seq(r)));
        }
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut tracker = GapTracker::new(seq(1));
        for v in [5, 2, 9, 3] {
            assert!(tracker.update(seq(v)));
            assert!(tracker.seen(seq(v)));
            assert!(!tracker.update(seq(v)));
            assert!(tracker.seen(seq(v)));
        }
    }

    #[test]
    fn test_seen_marker_vs_gap() {
        let tracker = tracker(1, &[3, 4, 5, 6]);
        assert!(tracker.seen(seq(1)));
        assert!(!tracker.seen(seq(2)));
        assert!(tracker.seen(seq(3)));
        assert!(tracker.seen(seq(6)));
        assert!(!tracker.seen(seq(7)));
    }

    #[test]
    fn test_reset() {
        let mut tracker = tracker(0, &[5, 10]);
        tracker.reset(seq(20));

        assert_eq!(tracker.low(), seq(20));
        assert_eq!(tracker.high(), seq(20));
        assert!(!tracker.is_disjoint());
        assert!(!tracker.seen(seq(21)));
    }

    #[rstest]
    #[case::below_low(5, vec![], 3, 5, 5, 1)]
    #[case::at_low(5, vec![], 6, 5, 5, 1)]
    #[case::no_markers(5, vec![], 10, 9, 9, 1)]
    #[case::drops_markers(1, vec![3, 5], 10, 9, 9, 1)]
    #[case::keeps_markers_above(1, vec![3, 12], 10, 9, 12, 2)]
    #[case::normalizes(1, vec![3, 10, 11], 10, 11, 11, 1)]
    #[case::normalizes_partially(1, vec![3, 10, 13], 10, 10, 13, 2)]
    #[case::wrap(i16::MAX-5, vec![i16::MAX-2, 2], 1, 0, 2, 2)]
    fn test_shift(#[case] low: i16, #[case] received: Vec<i16>, #[case] shift: i16, #[case] expected_low: i16, #[case] expected_high: i16, #[case] expected_depth: usize) {
        let mut tracker = tracker(low, &received);
        tracker.shift(seq(shift));

        assert_eq!(tracker.low(), seq(expected_low));
        assert_eq!(tracker.high(), seq(expected_high));
        assert_eq!(tracker.depth(), expected_depth);
    }

    #[test]
    fn test_shift_discards_history() {
        let mut tracker = GapTracker::new(seq(1));
        for v in [2, 4, 3, 2] {
            tracker.update(seq(v));
        }
        assert_eq!(tracker.low(), seq(4));

        tracker.shift(seq(10));
        assert!(tracker.seen(seq(4)));
        assert!(!tracker.is_disjoint());
        assert_eq!(tracker.low(), seq(9));
    }

    #[rstest]
    #[case::empty(1, vec![], 5, 5, false, 1, 1)]
    #[case::settled(10, vec![], 3, 8, false, 10, 10)]
    #[case::contiguous(1, vec![], 2, 6, true, 5, 5)]
    #[case::detached(1, vec![], 4, 6, true, 1, 5)]
    #[case::fills_gap(1, vec![6], 2, 6, true, 6, 6)]
    #[case::overlaps_low(5, vec![], 3, 8, true, 7, 7)]
    #[case::all_markers_seen(1, vec![4, 5], 4, 6, false, 1, 5)]
    fn test_update_range(#[case] low: i16, #[case] received: Vec<i16>, #[case] from: i16, #[case] to: i16, #[case] expected_changed: bool, #[case] expected_low: i16, #[case] expected_high: i16) {
        let mut tracker = tracker(low, &received);
        assert_eq!(tracker.update_range(seq(from)..seq(to)), expected_changed);
        assert_eq!(tracker.low(), seq(expected_low));
        assert_eq!(tracker.high(), seq(expected_high));
    }

    #[rstest]
    #[case::none(1, vec![2, 3], vec![])]
    #[case::single(1, vec![6], vec![(2, 6)])]
    #[case::two(1, vec![3, 4, 8], vec![(2, 3), (5, 8)])]
    #[case::wrap(i16::MAX-1, vec![1], vec![(i16::MAX, 1)])]
    fn test_missing_ranges(#[case] low: i16, #[case] received: Vec<i16>, #[case] expected: Vec<(i16, i16)>) {
        assert_eq!(raw_ranges(&tracker(low, &received)), expected);
    }

    /// updates in random order with duplicates, compared against a model that records every
    ///  value individually
    #[rstest]
    #[case::regular(0)]
    #[case::near_wrap(i16::MAX - 200)]
    #[case::stem(-150)]
    fn test_randomized_against_model(#[case] low: i16) {
        let mut rng = StdRng::seed_from_u64(low as u64);

        for _ in 0..200 {
            let low = seq(low);
            let num_values = rng.gen_range(1..300);
            let mut candidates: Vec<WrapSeq> = low.next().to(low).take(num_values).collect();
            candidates.shuffle(&mut rng);
            let num_received = rng.gen_range(0..=candidates.len());

            let mut tracker = GapTracker::new(low);
            let mut model = BTreeSet::new();
            for &v in &candidates[..num_received] {
                let duplicate = rng.gen_bool(0.2);
                assert!(tracker.update(v));
                if duplicate {
                    assert!(!tracker.update(v));
                }
                model.insert(v);
            }

            // all values from the initial low-water mark through high() are recorded iff there is
            //  no gap
            let high = tracker.high();
            let all_recorded = low.next().to(high.next()).all(|v| model.contains(&v));
            assert_eq!(tracker.is_disjoint(), !all_recorded);

            for v in low.next().to(low).take(num_values) {
                assert_eq!(tracker.seen(v), model.contains(&v));
            }

            let missing_in_tracker: usize = tracker.missing_ranges()
                .map(|r| r.start.to(r.end).count())
                .sum();
            let missing_in_model = low.next().to(high).filter(|v| !model.contains(v)).count();
            assert_eq!(missing_in_tracker, missing_in_model);
        }
    }
}
