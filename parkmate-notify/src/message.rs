use parkmate_core::{Level, Notice};
use serde::Deserialize;

use crate::{NotifyError, NotifyResult};

/// A decoded push message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Connection acknowledgement, shown to nobody
    Ack { connected: bool },
    Notice(Notice),
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    connected: Option<bool>,
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

pub fn parse_message(text: &str) -> NotifyResult<Inbound> {
    let raw: RawMessage =
        serde_json::from_str(text).map_err(|e| NotifyError::Malformed(e.to_string()))?;

    match (raw.connected, raw.kind, raw.message) {
        (Some(connected), None, None) => Ok(Inbound::Ack { connected }),
        (_, kind, Some(content)) => Ok(Inbound::Notice(Notice::new(
            level_for(kind.as_deref()),
            content,
        ))),
        (_, _, None) => Err(NotifyError::Malformed("message has no content".to_string())),
    }
}

/// Map a message kind onto an alert style; anything unknown is neutral
pub fn level_for(kind: Option<&str>) -> Level {
    match kind.map(|k| k.trim().to_ascii_lowercase()).as_deref() {
        Some("success") => Level::Success,
        Some("error") => Level::Error,
        Some("warning") | Some("warn") => Level::Warning,
        Some("info") => Level::Info,
        _ => Level::Neutral,
    }
}
