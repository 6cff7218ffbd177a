use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;

/// Alert style for a user-facing notice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
    Warning,
    Info,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }
}

/// Blocking yes/no prompt gating bookings and destructive actions
pub trait ConfirmationPort: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Receives leveled notices for display
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Answers every prompt the same way
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl ConfirmationPort for FixedAnswer {
    fn confirm(&self, prompt: &str) -> bool {
        info!("Confirmation requested ({}): answering {}", prompt, self.0);
        self.0
    }
}

/// Answers prompts from a queue and remembers what was asked.
/// Once the queue runs dry every prompt is declined.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, answer: bool) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(answer);
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl ConfirmationPort for ScriptedConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .unwrap_or(false)
    }
}

/// Sink that writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notice: Notice) {
        match notice.level {
            Level::Error => tracing::error!("{}", notice.message),
            Level::Warning => tracing::warn!("{}", notice.message),
            _ => info!("[{:?}] {}", notice.level, notice.message),
        }
    }
}

/// Keeps every notice it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().ok().and_then(|n| n.last().cloned())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_confirm_declines_when_exhausted() {
        let confirm = ScriptedConfirm::new([true]);
        assert!(confirm.confirm("first"));
        assert!(!confirm.confirm("second"));
        assert_eq!(confirm.prompts(), vec!["first", "second"]);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.notify(Notice::error("boom"));
        assert_eq!(sink.last(), Some(Notice::new(Level::Error, "boom")));
    }
}
