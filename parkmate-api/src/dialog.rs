use parkmate_core::{ConfirmationPort, Notice, NotificationSink};
use serde::Serialize;
use std::future::Future;
use tokio::sync::broadcast;

use parkmate_shared::SlotEvent;

tokio::task_local! {
    static ANSWER: bool;
}

/// Confirmation port answered by the `confirm` flag of the current request.
///
/// Outside [`RequestConfirm::answer`] every prompt is declined.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestConfirm;

impl RequestConfirm {
    pub async fn answer<F: Future>(answer: bool, fut: F) -> F::Output {
        ANSWER.scope(answer, fut).await
    }
}

impl ConfirmationPort for RequestConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let answer = ANSWER.try_with(|a| *a).unwrap_or(false);
        tracing::debug!("Prompt \"{}\" answered {}", prompt, answer);
        answer
    }
}

/// Everything pushed to `/v1/events/stream`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Slot(SlotEvent),
    Notice(Notice),
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Slot(_) => "slot",
            StreamEvent::Notice(_) => "notice",
        }
    }
}

/// Forwards notices to the event stream and the log
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<StreamEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<StreamEvent>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, notice: Notice) {
        tracing::info!("Notice [{:?}]: {}", notice.level, notice.message);
        let _ = self.tx.send(StreamEvent::Notice(notice));
    }
}
