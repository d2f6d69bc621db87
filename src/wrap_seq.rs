use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// A bounded 'lollipop' sequence number.
///
/// The raw value is an `i16`. Negative values form the *stem*: a sequence starts at
///  [WrapSeq::MIN] and counts up numerically until it reaches [WrapSeq::ZERO]. Non-negative values
///  form the *loop*: incrementing [WrapSeq::MAX] wraps to [WrapSeq::ZERO] (never back into the
///  stem), and values in the loop are ordered by their shortest circular distance.
///
/// NB: The ordering is only consistent if fewer than [WrapSeq::SEAM] values are in flight at
///      any given time, i.e. all values that are compared with each other (or stored together in
///      an ordered collection) lie within half the loop. This is a precondition that callers
///      must ensure (typically through a bounded receive window); it is *not* checked at
///      runtime. Violating it does not panic, it produces wrong ordering results.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct WrapSeq(i16);

impl Display for WrapSeq {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl WrapSeq {
    /// start of the stem: 'before the first message'
    pub const MIN: WrapSeq = WrapSeq(i16::MIN);
    pub const MAX: WrapSeq = WrapSeq(i16::MAX);
    /// the value that [WrapSeq::MAX] wraps to
    pub const ZERO: WrapSeq = WrapSeq(0);

    /// Half the size of the loop. Two loop values at most this far apart compare by their
    ///  numeric difference; values further apart are assumed to have wrapped.
    pub const SEAM: i16 = 1 << 14;

    pub fn initial() -> WrapSeq {
        Self::MIN
    }

    pub fn from_raw(value: i16) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> i16 {
        self.0
    }

    pub fn is_stem(&self) -> bool {
        self.0 < 0
    }

    pub fn next(&self) -> WrapSeq {
        if self.0 == i16::MAX {
            Self::ZERO
        }
        else {
            WrapSeq(self.0 + 1)
        }
    }

    /// The inverse of [WrapSeq::next] in the loop.
    ///
    /// [WrapSeq::ZERO] has two predecessors (`-1` from the stem and [WrapSeq::MAX] from the loop);
    ///  this returns [WrapSeq::MAX] which compares greater than every stem value and less than
    ///  [WrapSeq::ZERO], so it is a correct predecessor on either side of the seam.
    /// [WrapSeq::MIN] has no predecessor and is returned unchanged.
    pub fn previous(&self) -> WrapSeq {
        match self.0 {
            0 => Self::MAX,
            i16::MIN => Self::MIN,
            v => WrapSeq(v - 1),
        }
    }

    /// iterates the half-open run `[self, end)` by repeatedly calling [WrapSeq::next]
    pub fn to(&self, end: WrapSeq) -> WrapSeqIter {
        WrapSeqIter {
            next: *self,
            end,
        }
    }

    /// the number of [WrapSeq::next] steps from `self` to `other`, or `None` if `other` is
    ///  below `self`
    pub fn distance_to(&self, other: WrapSeq) -> Option<u16> {
        if other < *self {
            return None;
        }

        let raw = if self.is_stem() && !other.is_stem() {
            // crossing from the stem into the loop: -1 -> 0 is a single step
            (other.0 as i32) - (self.0 as i32)
        }
        else {
            ((other.0 as i32) - (self.0 as i32)).rem_euclid(1 << 15)
        };
        Some(raw as u16)
    }

    fn is_less_than(&self, other: &WrapSeq) -> bool {
        let (a, b) = (self.0, other.0);
        if a < 0 || b < 0 {
            return a < b;
        }

        // both are in the loop, so the differences below cannot overflow
        (a < b && b - a <= Self::SEAM) || (a > b && a - b > Self::SEAM)
    }
}

impl Ord for WrapSeq {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            Ordering::Equal
        }
        else if self.is_less_than(other) {
            Ordering::Less
        }
        else {
            Ordering::Greater
        }
    }
}

impl PartialOrd for WrapSeq {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct WrapSeqIter {
    next: WrapSeq,
    end: WrapSeq,
}

impl Iterator for WrapSeqIter {
    type Item = WrapSeq;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == self.end {
            return None;
        }
        let result = self.next;
        self.next = self.next.next();
        Some(result)
    }
}
