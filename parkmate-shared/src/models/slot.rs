use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest grid a lot may be configured with
pub const MAX_SLOT_COUNT: usize = 2_000;

/// Vehicle class recorded on a booked slot
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    #[default]
    Car,
    Bike,
    Truck,
    Ev,
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VehicleType::Car => "car",
            VehicleType::Bike => "bike",
            VehicleType::Truck => "truck",
            VehicleType::Ev => "ev",
        };
        f.write_str(label)
    }
}

/// Payment method shown in the booking prompt. No payment is taken.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Card,
    Upi,
    Cash,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::Cash => "cash",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
}

/// One bookable parking space within a lot.
///
/// A slot is booked iff `booked_at` is set; `booked_by` and `vehicle_type`
/// travel with it. The fields are private so that the three can only change
/// together through [`Slot::book`] and [`Slot::release`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    id: u32,
    #[serde(default)]
    booked_at: Option<i64>,
    #[serde(default)]
    booked_by: Option<String>,
    #[serde(default)]
    vehicle_type: Option<VehicleType>,
}

impl Slot {
    pub fn available(id: u32) -> Self {
        Self {
            id,
            booked_at: None,
            booked_by: None,
            vehicle_type: None,
        }
    }

    /// Build `count` available slots numbered from 1, capped at [`MAX_SLOT_COUNT`]
    pub fn fresh_lot(count: usize) -> Vec<Slot> {
        let last = u32::try_from(count.min(MAX_SLOT_COUNT)).unwrap_or(0);
        (1..=last).map(Slot::available).collect()
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn booked_at(&self) -> Option<i64> {
        self.booked_at
    }

    pub fn booked_by(&self) -> Option<&str> {
        self.booked_by.as_deref()
    }

    pub fn vehicle_type(&self) -> Option<VehicleType> {
        self.vehicle_type
    }

    pub fn status(&self) -> SlotStatus {
        if self.booked_at.is_some() {
            SlotStatus::Booked
        } else {
            SlotStatus::Available
        }
    }

    pub fn is_booked(&self) -> bool {
        self.booked_at.is_some()
    }

    pub fn book(&mut self, at_ms: i64, client_id: impl Into<String>, vehicle: VehicleType) {
        self.booked_at = Some(at_ms);
        self.booked_by = Some(client_id.into());
        self.vehicle_type = Some(vehicle);
    }

    pub fn release(&mut self) {
        self.booked_at = None;
        self.booked_by = None;
        self.vehicle_type = None;
    }

    /// Milliseconds left on the hold, or `None` when the slot is free.
    /// Zero or negative means the hold has run out.
    pub fn remaining_ms(&self, hold_ms: i64, now_ms: i64) -> Option<i64> {
        self.booked_at.map(|at| hold_ms - (now_ms - at))
    }

    /// Persisted records are only trusted when all three booking fields agree.
    pub fn is_consistent(&self) -> bool {
        let set = [
            self.booked_at.is_some(),
            self.booked_by.is_some(),
            self.vehicle_type.is_some(),
        ];
        set.iter().all(|s| *s) || set.iter().all(|s| !*s)
    }
}
