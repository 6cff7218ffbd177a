pub mod clock;
pub mod dialog;
pub mod identity;
pub mod signal;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dialog::{ConfirmationPort, Level, Notice, NotificationSink};
pub use identity::ClientIdentityResolver;
pub use signal::ConfigSignal;
pub use storage::{InMemoryStore, KeyValueStore};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::ValidationError(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
