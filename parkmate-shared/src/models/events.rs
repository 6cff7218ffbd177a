use serde::{Deserialize, Serialize};

use super::slot::VehicleType;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    Expired,
    Manual,
}

/// Published by a slot simulator after every change to its slots
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SlotEvent {
    Booked {
        lot_id: String,
        slot_id: u32,
        booked_by: String,
        vehicle_type: VehicleType,
        booked_at: i64,
    },
    Released {
        lot_id: String,
        slot_id: u32,
        reason: ReleaseReason,
    },
    Reset {
        lot_id: String,
        slot_count: usize,
    },
    Reloaded {
        lot_id: String,
        slot_count: usize,
    },
}

impl SlotEvent {
    pub fn lot_id(&self) -> &str {
        match self {
            SlotEvent::Booked { lot_id, .. }
            | SlotEvent::Released { lot_id, .. }
            | SlotEvent::Reset { lot_id, .. }
            | SlotEvent::Reloaded { lot_id, .. } => lot_id,
        }
    }
}

/// Fired when a lot's slot count configuration was edited
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LotConfigChanged {
    pub lot_id: String,
    pub timestamp: i64,
}

impl LotConfigChanged {
    pub fn now(lot_id: impl Into<String>) -> Self {
        Self {
            lot_id: lot_id.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
