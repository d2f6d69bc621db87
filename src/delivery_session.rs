use std::cmp::max;
use std::ops::Range;
use std::time::Instant;
use tracing::{debug, trace, warn};
use crate::config::{AdvancePolicy, EffectiveSessionConfig, Reliability};
use crate::error::SessionError;
use crate::gap_tracker::GapTracker;
use crate::header::SequencedHeader;
use crate::nack_coalescer::NackCoalescer;
use crate::nak_request_log::NakRequestLog;
use crate::peer_id::PeerId;
use crate::wrap_seq::WrapSeq;

/// The classification of an inbound sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrivalOutcome {
    /// the next expected value
    InOrder,
    /// received before, or too late to be of interest - must not be delivered again
    Duplicate,
    /// The arrival is ahead of the expected value. `missing` is the range that was skipped; the
    ///  arrival itself is recorded and can be delivered.
    GapDetected { missing: Range<WrapSeq> },
    /// the arrival fills (part of) a previously detected gap
    Recovered,
}

/// Delivery discipline. Only reliable sessions track gaps for retransmission.
#[derive(Debug)]
pub enum Discipline {
    BestEffort,
    Reliable(NackCoalescer),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Closed,
}

#[derive(Debug)]
struct ActiveSession {
    tracker: GapTracker,
    discipline: Discipline,
    /// `None` until the first arrival (or a handshake) establishes a baseline
    last_received: Option<WrapSeq>,
    nak_requests: NakRequestLog,
}

#[derive(Debug)]
enum SessionInner {
    Uninitialized,
    Active(ActiveSession),
    Closed,
}

/// Per-peer receive-side sequencing state.
///
/// A session classifies every inbound sequence number (in the order packets came off the wire)
///  as in-order, duplicate, gap or recovery, keeping track of what is missing for reliable
///  sessions. It does no I/O and no synchronization: calls for a given session must be
///  serialized by the caller.
///
/// What happens to `last_received` when a gap is detected is a matter of [AdvancePolicy]:
///  `ForwardAlways` moves it to the latest arrival (best-effort semantics), `HoldContiguous`
///  keeps it at the last contiguously received value so retransmissions can fill the gap.
#[derive(Debug)]
pub struct DeliverySession {
    peer: PeerId,
    config: EffectiveSessionConfig,
    inner: SessionInner,
}

impl DeliverySession {
    pub fn new(peer: PeerId, config: EffectiveSessionConfig) -> DeliverySession {
        DeliverySession {
            peer,
            config,
            inner: SessionInner::Uninitialized,
        }
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if !matches!(self.inner, SessionInner::Uninitialized) {
            return Err(SessionError::AlreadyStarted);
        }

        let discipline = match self.config.reliability {
            Reliability::BestEffort => Discipline::BestEffort,
            Reliability::Reliable => Discipline::Reliable(NackCoalescer::new()),
        };

        debug!("starting {:?} session for peer {} with policy {:?}", self.config.reliability, self.peer, self.config.advance_policy);
        self.inner = SessionInner::Active(ActiveSession {
            tracker: GapTracker::new(self.config.baseline.unwrap_or_else(WrapSeq::initial)),
            discipline,
            last_received: self.config.baseline,
            nak_requests: NakRequestLog::default(),
        });
        Ok(())
    }

    /// Drops all sequencing state. Closing a closed session has no effect.
    pub fn close(&mut self) {
        if !matches!(self.inner, SessionInner::Closed) {
            debug!("closing session for peer {}", self.peer);
        }
        self.inner = SessionInner::Closed;
    }

    pub fn state(&self) -> SessionState {
        match self.inner {
            SessionInner::Uninitialized => SessionState::Uninitialized,
            SessionInner::Active(_) => SessionState::Active,
            SessionInner::Closed => SessionState::Closed,
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn policy(&self) -> AdvancePolicy {
        self.config.advance_policy
    }

    pub fn is_reliable(&self) -> bool {
        self.config.reliability == Reliability::Reliable
    }

    pub fn last_received(&self) -> Option<WrapSeq> {
        self.active().and_then(|a| a.last_received)
    }

    pub fn gap_tracker(&self) -> Option<&GapTracker> {
        self.active().map(|a| &a.tracker)
    }

    /// `None` for best-effort sessions and sessions that are not active
    pub fn nack_coalescer(&self) -> Option<&NackCoalescer> {
        match self.active().map(|a| &a.discipline) {
            Some(Discipline::Reliable(coalescer)) => Some(coalescer),
            _ => None,
        }
    }

    fn active(&self) -> Option<&ActiveSession> {
        match &self.inner {
            SessionInner::Active(active) => Some(active),
            _ => None,
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveSession, SessionError> {
        match &mut self.inner {
            SessionInner::Active(active) => Ok(active),
            _ => Err(SessionError::NotActive),
        }
    }

    /// Returns `None` for headers that do not take part in sequencing (control traffic)
    pub fn on_header(&mut self, header: &SequencedHeader) -> Result<Option<ArrivalOutcome>, SessionError> {
        if !header.counts_toward_sequencing() {
            self.active_mut()?;
            trace!("peer {}: {:?} #{} does not count toward sequencing", self.peer, header.message_id_kind, header.sequence);
            return Ok(None);
        }
        self.on_header_sequence(header.sequence)
            .map(Some)
    }

    pub fn on_header_sequence(&mut self, seq: WrapSeq) -> Result<ArrivalOutcome, SessionError> {
        let peer = self.peer;
        let policy = self.config.advance_policy;
        let active = self.active_mut()?;

        let last_received = match active.last_received {
            Some(last_received) => last_received,
            None => {
                debug!("peer {}: first arrival #{} establishes the baseline", peer, seq);
                active.tracker.reset(seq);
                active.last_received = Some(seq);
                return Ok(ArrivalOutcome::InOrder);
            }
        };

        if active.tracker.seen(seq) {
            trace!("peer {}: #{} is a duplicate", peer, seq);
            return Ok(ArrivalOutcome::Duplicate);
        }

        // everything up to the frontier is either received or known to be missing
        let frontier = max(last_received, active.tracker.high());
        let expected = frontier.next();

        let outcome = if seq == expected {
            trace!("peer {}: #{} in order", peer, seq);
            ArrivalOutcome::InOrder
        }
        else if seq > expected {
            debug!("peer {}: received #{}, missing #{}..#{}", peer, seq, expected, seq);
            match &mut active.discipline {
                Discipline::Reliable(coalescer) => coalescer.nack_range(expected, seq),
                Discipline::BestEffort => {
                    if policy == AdvancePolicy::ForwardAlways {
                        // reported and forgotten
                        active.tracker.shift(seq);
                    }
                }
            }
            ArrivalOutcome::GapDetected { missing: expected..seq }
        }
        else {
            // below the frontier but not seen: this fills a known gap
            match &mut active.discipline {
                Discipline::Reliable(coalescer) => {
                    if !coalescer.cancel(seq) {
                        trace!("peer {}: #{} fills a gap that was not NAK'ed", peer, seq);
                    }
                }
                Discipline::BestEffort => {
                    if policy == AdvancePolicy::ForwardAlways {
                        trace!("peer {}: #{} arrived behind #{} - dropping", peer, seq, last_received);
                        return Ok(ArrivalOutcome::Duplicate);
                    }
                }
            }
            trace!("peer {}: #{} recovered", peer, seq);
            ArrivalOutcome::Recovered
        };

        active.tracker.update(seq);
        active.last_received = Some(match policy {
            AdvancePolicy::ForwardAlways => max(last_received, seq),
            AdvancePolicy::HoldContiguous => active.tracker.low(),
        });
        Ok(outcome)
    }

    /// Establishes a new baseline (e.g. after a handshake with the peer), discarding all gap
    ///  information
    pub fn resync(&mut self, seq: WrapSeq) -> Result<(), SessionError> {
        let peer = self.peer;
        let active = self.active_mut()?;

        debug!("peer {}: re-syncing at #{}", peer, seq);
        active.tracker.reset(seq);
        if let Discipline::Reliable(coalescer) = &mut active.discipline {
            coalescer.cancel_all();
        }
        active.nak_requests.clear();
        active.last_received = Some(seq);
        Ok(())
    }

    /// The peer announced that it can not repair anything below `low`. Returns `true` if this
    ///  caused data to be given up on.
    pub fn on_nak_ack(&mut self, low: WrapSeq) -> Result<bool, SessionError> {
        let peer = self.peer;
        let policy = self.config.advance_policy;
        let active = self.active_mut()?;

        if active.last_received.is_none() || active.tracker.seen(low) {
            return Ok(false);
        }

        let previous_low = active.tracker.low();
        active.tracker.shift(low);
        if let Discipline::Reliable(coalescer) = &mut active.discipline {
            coalescer.cancel_below(low);
        }
        Self::advance_after_shift(active, policy);

        if active.tracker.low() == previous_low {
            return Ok(false);
        }
        warn!("peer {}: #{}..#{} can not be repaired - skipping", peer, previous_low.next(), low);
        Ok(true)
    }

    /// Collects the ranges to be requested in a NAK round, excluding ranges that other peers
    ///  requested in the current interval. This records the round for [Self::expire_naks].
    pub fn collect_naks(&mut self, now: Instant, suppressed: &[Range<WrapSeq>]) -> Result<Vec<Range<WrapSeq>>, SessionError> {
        let peer = self.peer;
        let max_ranges = self.config.max_ranges_per_nak;
        let active = self.active_mut()?;

        let coalescer = match &active.discipline {
            Discipline::Reliable(coalescer) => coalescer,
            Discipline::BestEffort => return Ok(Vec::new()),
        };
        if active.last_received.is_none() || coalescer.is_empty() {
            return Ok(Vec::new());
        }

        active.nak_requests.record(now, active.tracker.high());

        let mut missing = coalescer.clone();
        for range in suppressed {
            missing.cancel_range(range.start, range.end);
        }

        let result: Vec<_> = missing.ranges()
            .take(max_ranges)
            .collect();
        trace!("peer {}: NAK'ing {:?}", peer, result);
        Ok(result)
    }

    /// Gives up on data that was NAK'ed at least `nak_timeout` ago without being repaired,
    ///  re-establishing a baseline for detecting future gaps. Returns the new low-water mark if
    ///  data was skipped.
    pub fn expire_naks(&mut self, now: Instant) -> Result<Option<WrapSeq>, SessionError> {
        let peer = self.peer;
        let policy = self.config.advance_policy;
        let timeout = self.config.nak_timeout;
        let active = self.active_mut()?;

        let high = match active.nak_requests.expire(now, timeout) {
            Some(high) => high,
            None => return Ok(None),
        };
        if high <= active.tracker.low() {
            return Ok(None);
        }

        warn!("peer {}: timed out waiting for #{}..=#{} to be repaired - skipping", peer, active.tracker.low().next(), high);
        active.tracker.shift(high.next());
        if let Discipline::Reliable(coalescer) = &mut active.discipline {
            coalescer.cancel_below(high.next());
        }
        Self::advance_after_shift(active, policy);
        Ok(Some(active.tracker.low()))
    }

    fn advance_after_shift(active: &mut ActiveSession, policy: AdvancePolicy) {
        let low = active.tracker.low();
        active.last_received = active.last_received
            .map(|last_received| match policy {
                AdvancePolicy::ForwardAlways => max(last_received, low),
                AdvancePolicy::HoldContiguous => low,
            });
    }
}
