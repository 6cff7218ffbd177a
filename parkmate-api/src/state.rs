use parkmate_core::{Clock, ConfigSignal, KeyValueStore, SystemClock};
use parkmate_slots::{SimulatorPorts, SimulatorSettings, SlotSimulator};
use parkmate_store::{LotConfigRepository, SlotRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::dialog::{BroadcastSink, RequestConfirm, StreamEvent};

const STREAM_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub lots: LotConfigRepository,
    pub slots: SlotRepository,
    pub client_id: String,
    pub settings: SimulatorSettings,
    pub clock: Arc<dyn Clock>,
    pub stream_tx: broadcast::Sender<StreamEvent>,
    simulators: Arc<Mutex<HashMap<String, SlotSimulator>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        client_id: impl Into<String>,
        settings: SimulatorSettings,
    ) -> Self {
        let lots = LotConfigRepository::new(store.clone(), ConfigSignal::new())
            .with_default_count(settings.default_slot_count);
        let (stream_tx, _) = broadcast::channel(STREAM_CAPACITY);

        Self {
            lots,
            slots: SlotRepository::new(store),
            client_id: client_id.into(),
            settings,
            clock: Arc::new(SystemClock),
            stream_tx,
            simulators: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sink(&self) -> BroadcastSink {
        BroadcastSink::new(self.stream_tx.clone())
    }

    /// Simulator for `lot_id`, created and wired up on first use
    pub async fn simulator(&self, lot_id: &str) -> SlotSimulator {
        let mut simulators = self.simulators.lock().await;
        if let Some(sim) = simulators.get(lot_id) {
            return sim.clone();
        }

        let ports = SimulatorPorts {
            lots: self.lots.clone(),
            slots: self.slots.clone(),
            confirm: Arc::new(RequestConfirm),
            sink: Arc::new(self.sink()),
            clock: self.clock.clone(),
        };
        let sim = SlotSimulator::initialize(lot_id, self.client_id.clone(), ports, self.settings.clone())
            .await;
        sim.watch_config(self.lots.signal().subscribe());
        self.forward_events(&sim);

        info!("Opened lot {}", lot_id);
        simulators.insert(lot_id.to_string(), sim.clone());
        sim
    }

    fn forward_events(&self, sim: &SlotSimulator) {
        let mut rx = sim.subscribe();
        let tx = self.stream_tx.clone();
        let lot_id = sim.lot_id().to_string();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let _ = tx.send(StreamEvent::Slot(event));
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!("Event stream for lot {} skipped {} events", lot_id, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Cancel every simulator's timers
    pub async fn shutdown(&self) {
        let simulators = self.simulators.lock().await;
        for sim in simulators.values() {
            sim.shutdown().await;
        }
    }
}
