use parkmate_core::{ConfigSignal, CoreError, CoreResult, KeyValueStore};
use parkmate_shared::MAX_SLOT_COUNT;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_SLOT_COUNT: usize = 10;

pub fn lot_config_key(lot_id: &str) -> String {
    format!("lot_config_{}", lot_id)
}

/// Read/write access to per-lot slot count configuration
#[derive(Clone)]
pub struct LotConfigRepository {
    store: Arc<dyn KeyValueStore>,
    signal: ConfigSignal,
    default_count: usize,
}

impl LotConfigRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, signal: ConfigSignal) -> Self {
        Self {
            store,
            signal,
            default_count: DEFAULT_SLOT_COUNT,
        }
    }

    pub fn with_default_count(mut self, default_count: usize) -> Self {
        self.default_count = default_count.clamp(1, MAX_SLOT_COUNT);
        self
    }

    pub fn default_count(&self) -> usize {
        self.default_count
    }

    pub fn signal(&self) -> &ConfigSignal {
        &self.signal
    }

    /// Configured slot count for a lot.
    ///
    /// Never fails: a missing, unreadable or malformed record yields the
    /// default count.
    pub async fn slot_count(&self, lot_id: &str) -> usize {
        let raw = match self.store.get(&lot_config_key(lot_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.default_count,
            Err(e) => {
                warn!("Could not read config for lot {}: {}", lot_id, e);
                return self.default_count;
            }
        };

        match parse_slot_count(&raw) {
            Some(count) => count,
            None => {
                warn!("Malformed config for lot {}, using {} slots", lot_id, self.default_count);
                self.default_count
            }
        }
    }

    /// Persist a new slot count and fire the configuration-changed signal
    pub async fn save_slot_count(&self, lot_id: &str, total_slots: usize) -> CoreResult<()> {
        if total_slots == 0 {
            return Err(CoreError::ValidationError(
                "a lot needs at least one slot".to_string(),
            ));
        }
        if total_slots > MAX_SLOT_COUNT {
            return Err(CoreError::ValidationError(format!(
                "a lot can have at most {} slots",
                MAX_SLOT_COUNT
            )));
        }

        let record = json!({ "totalSlots": total_slots });
        self.store
            .set(&lot_config_key(lot_id), &record.to_string())
            .await?;
        info!("Lot {} configured with {} slots", lot_id, total_slots);

        self.signal.notify_changed(lot_id);
        Ok(())
    }
}

fn parse_slot_count(raw: &str) -> Option<usize> {
    let record: Value = serde_json::from_str(raw).ok()?;
    let count = match record.get("totalSlots")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    usize::try_from(count)
        .ok()
        .filter(|c| (1..=MAX_SLOT_COUNT).contains(c))
}
