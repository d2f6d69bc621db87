use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use anyhow::{anyhow, bail};
#[cfg(test)] use mockall::automock;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};
use crate::config::SequencingConfig;
use crate::delivery_session::{ArrivalOutcome, DeliverySession, SessionState};
use crate::header::SequencedHeader;
use crate::peer_id::PeerId;
use crate::wrap_seq::WrapSeq;

/// Receives the classification of every sequenced arrival, e.g. to decide whether a sample is
///  delivered to the application or dropped
#[cfg_attr(test, automock)]
pub trait ArrivalConsumer: Send + Sync + 'static {
    fn on_arrival(&self, peer: PeerId, sequence: WrapSeq, outcome: &ArrivalOutcome);
}

/// The receive-side sequencing state for all remote peers, keyed explicitly by [PeerId].
pub struct SessionRegistry {
    config: Arc<SequencingConfig>,
    sessions: FxHashMap<PeerId, DeliverySession>,
    /// ranges that other receivers requested from a peer during the current NAK interval
    foreign_naks: FxHashMap<PeerId, Vec<Range<WrapSeq>>>,
    consumer: Arc<dyn ArrivalConsumer>,
}

impl SessionRegistry {
    pub fn new(config: Arc<SequencingConfig>, consumer: Arc<dyn ArrivalConsumer>) -> anyhow::Result<SessionRegistry> {
        config.validate()?;

        Ok(SessionRegistry {
            config,
            sessions: FxHashMap::default(),
            foreign_naks: FxHashMap::default(),
            consumer,
        })
    }

    pub fn config(&self) -> &SequencingConfig {
        &self.config
    }

    /// Creates and starts a session for a peer. A closed session for the same peer is replaced,
    ///  an active one is an error.
    pub fn start(&mut self, peer: PeerId) -> anyhow::Result<()> {
        if let Some(existing) = self.sessions.get(&peer) {
            if existing.state() != SessionState::Closed {
                bail!("session for peer {} is already started", peer);
            }
        }

        let mut session = DeliverySession::new(peer, self.config.get_effective_session_config(peer));
        session.start()?;
        self.sessions.insert(peer, session);
        Ok(())
    }

    /// Closes and removes a peer's session, returning `false` if there was none
    pub fn close(&mut self, peer: PeerId) -> bool {
        self.foreign_naks.remove(&peer);
        match self.sessions.remove(&peer) {
            Some(mut session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    pub fn on_header(&mut self, peer: PeerId, header: &SequencedHeader) -> anyhow::Result<Option<ArrivalOutcome>> {
        let session = match self.sessions.get_mut(&peer) {
            Some(session) => session,
            None => {
                warn!("received #{} from peer {} without a session - dropping", header.sequence, peer);
                bail!("no session for peer {}", peer);
            }
        };

        let outcome = session.on_header(header)?;
        if let Some(outcome) = &outcome {
            self.consumer.on_arrival(peer, header.sequence, outcome);
        }
        Ok(outcome)
    }

    /// Returns `true` if data was given up on
    pub fn on_nak_ack(&mut self, peer: PeerId, low: WrapSeq) -> anyhow::Result<bool> {
        Ok(self.session_mut(peer)?.on_nak_ack(low)?)
    }

    pub fn resync(&mut self, peer: PeerId, seq: WrapSeq) -> anyhow::Result<()> {
        self.foreign_naks.remove(&peer);
        Ok(self.session_mut(peer)?.resync(seq)?)
    }

    /// Notification that another receiver requested `ranges` from `peer`. They are not requested
    ///  again in the current NAK interval.
    pub fn on_foreign_nak(&mut self, peer: PeerId, ranges: &[Range<WrapSeq>]) {
        if !self.sessions.contains_key(&peer) {
            return;
        }
        self.foreign_naks.entry(peer)
            .or_default()
            .extend(ranges.iter().cloned());
    }

    /// Expires overdue NAK rounds and collects the ranges to request in this round, per peer.
    ///  Peers with nothing to request are omitted.
    pub fn poll_naks(&mut self, now: Instant) -> Vec<(PeerId, Vec<Range<WrapSeq>>)> {
        let mut foreign_naks = std::mem::take(&mut self.foreign_naks);

        let mut result = Vec::new();
        for (&peer, session) in self.sessions.iter_mut() {
            if session.state() != SessionState::Active || !session.is_reliable() {
                continue;
            }

            if let Ok(Some(low)) = session.expire_naks(now) {
                debug!("peer {}: NAK'ed data expired, continuing after #{}", peer, low);
            }

            let suppressed = foreign_naks.remove(&peer).unwrap_or_default();
            match session.collect_naks(now, &suppressed) {
                Ok(ranges) if !ranges.is_empty() => result.push((peer, ranges)),
                Ok(_) => {}
                Err(e) => warn!("peer {}: could not collect NAKs: {}", peer, e),
            }
        }
        result.sort_by_key(|(peer, _)| *peer);
        result
    }

    pub fn session(&self, peer: PeerId) -> Option<&DeliverySession> {
        self.sessions.get(&peer)
    }

    fn session_mut(&mut self, peer: PeerId) -> anyhow::Result<&mut DeliverySession> {
        self.sessions.get_mut(&peer)
            .ok_or_else(|| anyhow!("no session for peer {}", peer))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        let mut result: Vec<_> = self.sessions.keys().copied().collect();
        result.sort();
        result
    }
}
