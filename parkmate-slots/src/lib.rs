pub mod scheduler;
pub mod simulator;

pub use scheduler::ExpiryScheduler;
pub use simulator::{
    BookingChoice, BookingOutcome, LotSnapshot, SimulatorPorts, SimulatorSettings, SlotSimulator,
    SlotView,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("No slot selected")]
    NoSelection,

    #[error("Slot {0} is already booked")]
    SlotUnavailable(u32),

    #[error("Slot not found: {0}")]
    NotFound(u32),
}

pub type SlotResult<T> = Result<T, SlotError>;
