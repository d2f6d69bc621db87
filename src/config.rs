use std::time::Duration;
use anyhow::bail;
use rand::Rng;
use rustc_hash::FxHashMap;
use crate::peer_id::PeerId;
use crate::wrap_seq::WrapSeq;

/// Whether gaps are only reported, or also tracked for retransmission
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Reliability {
    BestEffort,
    Reliable,
}

/// How a session's `last_received` marker moves when a gap is detected
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AdvancePolicy {
    /// Always move to the latest arrival, accepting permanent loss of the gap. This is
    ///  appropriate for live / volatile streams.
    ForwardAlways,
    /// Stay at the last contiguously received value, so that retransmissions can still fill
    ///  the gap.
    HoldContiguous,
}

impl AdvancePolicy {
    pub fn default_for(reliability: Reliability) -> AdvancePolicy {
        match reliability {
            Reliability::BestEffort => AdvancePolicy::ForwardAlways,
            Reliability::Reliable => AdvancePolicy::HoldContiguous,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SequencingConfig {
    /// This is the base interval for NAK rounds. It should be roughly twice the RTT between
    ///  nodes, giving NAK'ed packets a chance to arrive before they are requested again.
    ///
    /// The actual interval is randomized between one and two times this value to minimize
    ///  collisions between receivers NAK'ing the same data.
    pub nak_interval: Duration,

    pub default_session_config: SessionConfig,
    pub specific_session_configs: FxHashMap<PeerId, SessionConfig>,
}

impl Default for SequencingConfig {
    fn default() -> Self {
        SequencingConfig {
            nak_interval: Duration::from_millis(500),
            default_session_config: SessionConfig::default(),
            specific_session_configs: FxHashMap::default(),
        }
    }
}

impl SequencingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.nak_interval.is_zero() {
            bail!("NAK interval must not be zero");
        }

        self.default_session_config.validate()?;
        for (peer, config) in &self.specific_session_configs {
            if let Err(e) = config.validate() {
                bail!("invalid session config for peer {}: {}", peer, e);
            }
        }
        Ok(())
    }

    pub fn get_effective_session_config(&self, peer: PeerId) -> EffectiveSessionConfig {
        let raw = self.specific_session_configs.get(&peer)
            .unwrap_or(&self.default_session_config);
        EffectiveSessionConfig::from(raw)
    }

    pub fn next_nak_interval(&self) -> Duration {
        self.nak_interval.mul_f64(rand::thread_rng().gen_range(1.0..2.0))
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub reliability: Reliability,
    /// `None` means the default for the session's reliability, see [AdvancePolicy::default_for]
    pub advance_policy: Option<AdvancePolicy>,

    /// NAK'ed data that was not repaired within this time is given up on
    pub nak_timeout: Duration,
    /// upper bound for the number of ranges requested in a single NAK round - the assumption is
    ///  that if more is missing, it is better to ask for the rest after the first batch arrived
    pub max_ranges_per_nak: usize,

    /// If this is set, the session starts out expecting `baseline.next()`. Otherwise the first
    ///  arrival establishes the baseline.
    pub baseline: Option<WrapSeq>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            reliability: Reliability::Reliable,
            advance_policy: None,
            nak_timeout: Duration::from_secs(30),
            max_ranges_per_nak: 64,
            baseline: None,
        }
    }
}

impl SessionConfig {
    pub fn best_effort() -> SessionConfig {
        SessionConfig {
            reliability: Reliability::BestEffort,
            ..SessionConfig::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_ranges_per_nak == 0 {
            bail!("max ranges per NAK must be at least 1");
        }
        if self.nak_timeout.is_zero() {
            bail!("NAK timeout must not be zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EffectiveSessionConfig {
    pub reliability: Reliability,
    pub advance_policy: AdvancePolicy,
    pub nak_timeout: Duration,
    pub max_ranges_per_nak: usize,
    pub baseline: Option<WrapSeq>,
}

impl From<&SessionConfig> for EffectiveSessionConfig {
    fn from(raw: &SessionConfig) -> Self {
        EffectiveSessionConfig {
            reliability: raw.reliability,
            advance_policy: raw.advance_policy
                .unwrap_or_else(|| AdvancePolicy::default_for(raw.reliability)),
            nak_timeout: raw.nak_timeout,
            max_ranges_per_nak: raw.max_ranges_per_nak,
            baseline: raw.baseline,
        }
    }
}
