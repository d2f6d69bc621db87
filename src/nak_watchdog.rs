use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace};
use crate::config::SequencingConfig;
use crate::peer_id::PeerId;
use crate::session_registry::SessionRegistry;
use crate::wrap_seq::WrapSeq;

/// The sending side of NAK rounds: encoding and putting NAK packets on the wire
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NakTransmitter: Send + Sync + 'static {
    async fn send_naks(&self, peer: PeerId, ranges: Vec<Range<WrapSeq>>);
}

/// Periodically polls a [SessionRegistry] for missing data and hands the resulting NAK ranges to
///  a [NakTransmitter].
///
/// The delay between rounds is randomized (see [SequencingConfig::next_nak_interval]) so that
///  receivers missing the same data do not all NAK at the same time. The loop runs until the
///  watchdog is dropped.
pub struct NakWatchdog {
    handle: JoinHandle<()>,
}

impl Drop for NakWatchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl NakWatchdog {
    pub fn spawn(registry: Arc<RwLock<SessionRegistry>>, transmitter: Arc<dyn NakTransmitter>, config: Arc<SequencingConfig>) -> NakWatchdog {
        debug!("spawning NAK watchdog with base interval {:?}", config.nak_interval);
        NakWatchdog {
            handle: tokio::spawn(Self::do_loop(registry, transmitter, config)),
        }
    }

    /// this function never returns, it runs until it is aborted
    async fn do_loop(registry: Arc<RwLock<SessionRegistry>>, transmitter: Arc<dyn NakTransmitter>, config: Arc<SequencingConfig>) {
        loop {
            sleep(config.next_nak_interval()).await;

            let naks = registry.write().await
                .poll_naks(Instant::now());

            // the registry lock is released before sending
            for (peer, ranges) in naks {
                trace!("sending NAK to peer {}: {:?}", peer, ranges);
                transmitter.send_naks(peer, ranges).await;
            }
        }
    }
}
