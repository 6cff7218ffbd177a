use parkmate_core::NotificationSink;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::message::{parse_message, Inbound};
use crate::policy::ReconnectPolicy;
use crate::transport::{PushChannel, PushTransport};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Push notification client.
///
/// Keeps one channel per connected user open, turns typed messages into
/// notices, and reopens the channel after errors or closure according to
/// its [`ReconnectPolicy`].
#[derive(Clone)]
pub struct NotificationBridge {
    transport: Arc<dyn PushTransport>,
    sink: Arc<dyn NotificationSink>,
    policy: Arc<dyn ReconnectPolicy>,
}

impl NotificationBridge {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        sink: Arc<dyn NotificationSink>,
        policy: Arc<dyn ReconnectPolicy>,
    ) -> Self {
        Self {
            transport,
            sink,
            policy,
        }
    }

    /// Start the channel for `identity`. Without an identity nothing happens.
    pub fn connect(&self, identity: Option<&str>) -> Option<BridgeHandle> {
        let user_id = identity.map(str::trim).filter(|id| !id.is_empty())?.to_string();

        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = Worker {
            user_id,
            transport: self.transport.clone(),
            sink: self.sink.clone(),
            policy: self.policy.clone(),
            status: status_tx,
        };
        let task = tokio::spawn(worker.run(shutdown_rx));

        Some(BridgeHandle {
            status: status_rx,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// Owner of a running bridge. Dropping it tears the channel down.
pub struct BridgeHandle {
    status: watch::Receiver<ConnectionStatus>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Cancel any pending reconnect, close the channel and wait for the worker
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            debug!("Notification worker ended abnormally: {}", e);
        }
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

struct Worker {
    user_id: String,
    transport: Arc<dyn PushTransport>,
    sink: Arc<dyn NotificationSink>,
    policy: Arc<dyn ReconnectPolicy>,
    status: watch::Sender<ConnectionStatus>,
}

impl Worker {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut attempt: u32 = 0;

        loop {
            self.status.send_replace(ConnectionStatus::Connecting);
            let opened = tokio::select! {
                _ = &mut shutdown => break,
                opened = self.transport.open(&self.user_id) => opened,
            };

            match opened {
                Ok(mut channel) => {
                    attempt = 0;
                    self.status.send_replace(ConnectionStatus::Connected);
                    info!("Notification channel open for {}", self.user_id);

                    let stopped = tokio::select! {
                        _ = &mut shutdown => true,
                        _ = self.pump(channel.as_mut()) => false,
                    };
                    if stopped {
                        channel.close().await;
                        break;
                    }
                }
                Err(e) => warn!("Notification channel for {} failed to open: {}", self.user_id, e),
            }

            self.status.send_replace(ConnectionStatus::Disconnected);
            attempt = attempt.saturating_add(1);
            let Some(delay) = self.policy.delay(attempt) else {
                warn!("Giving up on notifications for {} after {} attempts", self.user_id, attempt);
                break;
            };
            debug!("Reconnecting notifications for {} in {:?}", self.user_id, delay);

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.status.send_replace(ConnectionStatus::Disconnected);
        info!("Notification bridge for {} stopped", self.user_id);
    }

    /// Read frames until the channel errors or closes
    async fn pump(&self, channel: &mut dyn PushChannel) {
        loop {
            match channel.next_text().await {
                Some(Ok(text)) => self.on_message(&text),
                Some(Err(e)) => {
                    warn!("Notification channel for {} errored: {}", self.user_id, e);
                    return;
                }
                None => {
                    info!("Notification channel for {} closed by server", self.user_id);
                    return;
                }
            }
        }
    }

    fn on_message(&self, text: &str) {
        match parse_message(text) {
            Ok(Inbound::Ack { connected }) => {
                debug!("Connection acknowledged for {} ({})", self.user_id, connected);
                if connected {
                    self.status.send_replace(ConnectionStatus::Connected);
                }
            }
            Ok(Inbound::Notice(notice)) => self.sink.notify(notice),
            Err(e) => warn!("Dropping push message: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{ExponentialBackoff, FixedDelay};
    use crate::{NotifyError, NotifyResult};
    use async_trait::async_trait;
    use parkmate_core::dialog::RecordingSink;
    use parkmate_core::{Level, Notice};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    /// Each `open` consumes one scripted session: a frame receiver, or a refusal
    #[derive(Default)]
    struct FakeTransport {
        sessions: Mutex<VecDeque<Option<mpsc::UnboundedReceiver<String>>>>,
        opens: AtomicUsize,
    }

    impl FakeTransport {
        fn accept(&self) -> mpsc::UnboundedSender<String> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.sessions.lock().unwrap().push_back(Some(rx));
            tx
        }

        fn refuse(&self) {
            self.sessions.lock().unwrap().push_back(None);
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PushTransport for FakeTransport {
        async fn open(&self, _user_id: &str) -> NotifyResult<Box<dyn PushChannel>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            match self.sessions.lock().unwrap().pop_front() {
                Some(Some(rx)) => Ok(Box::new(FakeChannel { rx })),
                _ => Err(NotifyError::Connect("refused".to_string())),
            }
        }
    }

    struct FakeChannel {
        rx: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl PushChannel for FakeChannel {
        async fn next_text(&mut self) -> Option<NotifyResult<String>> {
            self.rx.recv().await.map(Ok)
        }

        async fn close(&mut self) {
            self.rx.close();
        }
    }

    fn bridge(transport: Arc<FakeTransport>, sink: Arc<RecordingSink>) -> NotificationBridge {
        NotificationBridge::new(transport, sink, Arc::new(FixedDelay::default()))
    }

    async fn wait_for_status(handle: &BridgeHandle, wanted: ConnectionStatus) {
        let mut rx = handle.watch();
        rx.wait_for(|s| *s == wanted).await.unwrap();
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..100 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_is_silent_and_typed_message_is_raised() {
        let transport = Arc::new(FakeTransport::default());
        let sink = Arc::new(RecordingSink::new());
        let tx = transport.accept();

        let handle = bridge(transport, sink.clone()).connect(Some("user-1")).unwrap();
        wait_for_status(&handle, ConnectionStatus::Connected).await;

        tx.send(r#"{"connected": true}"#.to_string()).unwrap();
        tx.send("not json".to_string()).unwrap();
        tx.send(r#"{"type":"error","message":"X"}"#.to_string()).unwrap();
        tx.send(r#"{"type":"mystery","message":"Y"}"#.to_string()).unwrap();

        wait_until(|| sink.notices().len() == 2).await;
        assert_eq!(
            sink.notices(),
            vec![Notice::new(Level::Error, "X"), Notice::new(Level::Neutral, "Y")]
        );
        assert!(handle.is_connected());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_identity_is_a_no_op() {
        let transport = Arc::new(FakeTransport::default());
        let bridge = bridge(transport.clone(), Arc::new(RecordingSink::new()));

        assert!(bridge.connect(None).is_none());
        assert!(bridge.connect(Some("   ")).is_none());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_fixed_delay() {
        let transport = Arc::new(FakeTransport::default());
        let sink = Arc::new(RecordingSink::new());
        let first = transport.accept();
        transport.refuse();
        let second = transport.accept();

        let handle = bridge(transport.clone(), sink.clone()).connect(Some("owner-3")).unwrap();
        wait_for_status(&handle, ConnectionStatus::Connected).await;

        let dropped_at = Instant::now();
        drop(first);
        wait_for_status(&handle, ConnectionStatus::Disconnected).await;

        // refused once, then accepted: two waits of five seconds
        wait_for_status(&handle, ConnectionStatus::Connected).await;
        assert_eq!(transport.opens(), 3);
        assert!(dropped_at.elapsed() >= Duration::from_secs(10));
        assert!(dropped_at.elapsed() < Duration::from_secs(11));

        second
            .send(r#"{"type":"success","message":"Booking approved"}"#.to_string())
            .unwrap();
        wait_until(|| !sink.notices().is_empty()).await;
        assert_eq!(sink.last().unwrap().level, Level::Success);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_reconnect() {
        let transport = Arc::new(FakeTransport::default());
        transport.refuse();

        let handle = bridge(transport.clone(), Arc::new(RecordingSink::new()))
            .connect(Some("user-9"))
            .unwrap();
        wait_until(|| transport.opens() == 1).await;

        let mut status = handle.watch();
        handle.shutdown().await;
        assert_eq!(*status.borrow_and_update(), ConnectionStatus::Disconnected);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_closes_channel() {
        let transport = Arc::new(FakeTransport::default());
        let tx = transport.accept();

        let handle = bridge(transport.clone(), Arc::new(RecordingSink::new()))
            .connect(Some("user-2"))
            .unwrap();
        wait_for_status(&handle, ConnectionStatus::Connected).await;

        drop(handle);
        wait_until(|| tx.is_closed()).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_gives_up() {
        let transport = Arc::new(FakeTransport::default());
        let policy = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(4))
            .with_max_attempts(2);
        let bridge = NotificationBridge::new(
            transport.clone(),
            Arc::new(RecordingSink::new()),
            Arc::new(policy),
        );

        let handle = bridge.connect(Some("user-4")).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(transport.opens(), 3);
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    }
}
