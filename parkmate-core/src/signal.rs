use parkmate_shared::LotConfigChanged;
use tokio::sync::broadcast;
use tracing::debug;

const SIGNAL_CAPACITY: usize = 64;

/// Process-wide "lot configuration changed" signal
#[derive(Clone)]
pub struct ConfigSignal {
    tx: broadcast::Sender<LotConfigChanged>,
}

impl ConfigSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LotConfigChanged> {
        self.tx.subscribe()
    }

    /// Fire the signal. Returns how many listeners saw it.
    pub fn notify_changed(&self, lot_id: &str) -> usize {
        let receivers = self.tx.send(LotConfigChanged::now(lot_id)).unwrap_or(0);
        debug!("Config change for lot {} delivered to {} listeners", lot_id, receivers);
        receivers
    }
}

impl Default for ConfigSignal {
    fn default() -> Self {
        Self::new()
    }
}
