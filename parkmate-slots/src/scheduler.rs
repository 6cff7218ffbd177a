use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

/// Deferred expiry tasks, at most one per slot id.
///
/// Once a timer elapses its callback is spawned as a separate task, so
/// cancelling timers from inside a callback never interrupts the callback.
#[derive(Debug, Default)]
pub struct ExpiryScheduler {
    tasks: HashMap<u32, AbortHandle>,
}

impl ExpiryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_expire` after `delay`, replacing any timer already held for the slot
    pub fn schedule<F>(&mut self, slot_id: u32, delay: Duration, on_expire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel(slot_id);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(on_expire);
        });
        debug!("Slot {} expires in {:?}", slot_id, delay);
        self.tasks.insert(slot_id, handle.abort_handle());
    }

    pub fn cancel(&mut self, slot_id: u32) -> bool {
        match self.tasks.remove(&slot_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer, returning how many were dropped
    pub fn cancel_all(&mut self) -> usize {
        let count = self.tasks.len();
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
        count
    }

    #[cfg(test)]
    fn is_scheduled(&self, slot_id: u32) -> bool {
        self.tasks
            .get(&slot_id)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Timers that have not fired yet
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
