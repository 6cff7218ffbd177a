use parkmate_core::{CoreResult, KeyValueStore};
use parkmate_shared::Slot;
use std::sync::Arc;
use tracing::warn;

pub fn slots_key(lot_id: &str) -> String {
    format!("parking_slots_{}", lot_id)
}

/// Persisted copy of a lot's whole slot array
#[derive(Clone)]
pub struct SlotRepository {
    store: Arc<dyn KeyValueStore>,
}

impl SlotRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the stored array. Anything unreadable counts as absent.
    pub async fn load(&self, lot_id: &str) -> Option<Vec<Slot>> {
        let raw = match self.store.get(&slots_key(lot_id)).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Could not read slots for lot {}: {}", lot_id, e);
                return None;
            }
        };

        match serde_json::from_str::<Vec<Slot>>(&raw) {
            Ok(slots) if is_well_formed(&slots) => Some(slots),
            Ok(_) => {
                warn!("Discarding inconsistent slot array for lot {}", lot_id);
                None
            }
            Err(e) => {
                warn!("Discarding unparseable slot array for lot {}: {}", lot_id, e);
                None
            }
        }
    }

    pub async fn save(&self, lot_id: &str, slots: &[Slot]) -> CoreResult<()> {
        let raw = serde_json::to_string(slots)?;
        self.store.set(&slots_key(lot_id), &raw).await
    }

    pub async fn clear(&self, lot_id: &str) -> CoreResult<()> {
        self.store.remove(&slots_key(lot_id)).await
    }
}

/// Ids must run 1..=N in order and every record must be self-consistent
fn is_well_formed(slots: &[Slot]) -> bool {
    slots
        .iter()
        .enumerate()
        .all(|(i, slot)| slot.id() as usize == i + 1 && slot.is_consistent())
}
