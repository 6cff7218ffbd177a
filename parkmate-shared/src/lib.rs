pub mod models;

pub use models::events::{LotConfigChanged, ReleaseReason, SlotEvent};
pub use models::slot::{PaymentMethod, Slot, SlotStatus, VehicleType, MAX_SLOT_COUNT};
