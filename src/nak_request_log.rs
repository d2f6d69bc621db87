use std::collections::VecDeque;
use std::time::{Duration, Instant};
use crate::wrap_seq::WrapSeq;

/// Remembers when NAK rounds were sent, together with the receiver's high-water mark at that
///  time. If the peer does not answer a round within the NAK timeout, everything up to that
///  high-water mark is given up on - this prevents NAK implosions when a peer becomes
///  unresponsive.
#[derive(Debug, Default)]
pub struct NakRequestLog {
    /// ordered by timestamp since rounds are recorded as they happen
    requests: VecDeque<(Instant, WrapSeq)>,
}

impl NakRequestLog {
    pub fn record(&mut self, now: Instant, high_water_mark: WrapSeq) {
        self.requests.push_back((now, high_water_mark));
    }

    /// Removes all rounds that are older than `timeout`, returning the most recent high-water
    ///  mark among them
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Option<WrapSeq> {
        let deadline = now.checked_sub(timeout)?;

        let mut result = None;
        while let Some(&(timestamp, high_water_mark)) = self.requests.front() {
            if timestamp > deadline {
                break;
            }
            self.requests.pop_front();
            result = Some(high_water_mark);
        }
        result
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty(vec![], 10, None, 0)]
    #[case::none_expired(vec![(8, 3), (9, 5)], 10, None, 2)]
    #[case::one_expired(vec![(2, 3), (9, 5)], 10, Some(3), 1)]
    #[case::exactly_at_deadline(vec![(5, 3), (9, 5)], 10, Some(3), 1)]
    #[case::all_expired(vec![(1, 3), (2, 5)], 10, Some(5), 0)]
    fn test_expire(#[case] recorded: Vec<(u64, i16)>, #[case] now: u64, #[case] expected: Option<i16>, #[case] expected_remaining: usize) {
        let start = Instant::now();
        let mut log = NakRequestLog::default();
        for (secs, high) in recorded {
            log.record(start + Duration::from_secs(secs), WrapSeq::from_raw(high));
        }

        let result = log.expire(start + Duration::from_secs(now), Duration::from_secs(5));
        assert_eq!(result, expected.map(WrapSeq::from_raw));
        assert_eq!(log.len(), expected_remaining);
    }

    #[test]
    fn test_clear() {
        let mut log = NakRequestLog::default();
        log.record(Instant::now(), WrapSeq::ZERO);
        log.clear();
        assert!(log.is_empty());
    }
}
