pub mod bridge;
pub mod message;
pub mod policy;
pub mod transport;

pub use bridge::{BridgeHandle, ConnectionStatus, NotificationBridge};
pub use message::{parse_message, Inbound};
pub use policy::{ExponentialBackoff, FixedDelay, ReconnectPolicy};
pub use transport::{PushChannel, PushTransport, WsTransport};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to open channel: {0}")]
    Connect(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Malformed message: {0}")]
    Malformed(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;
