use std::time::Duration;

/// Decides how long to wait before reconnect attempt `attempt` (1-based).
/// `None` means stop trying.
pub trait ReconnectPolicy: Send + Sync {
    fn delay(&self, attempt: u32) -> Option<Duration>;
}

/// Same delay every time, forever
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl ReconnectPolicy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Option<Duration> {
        Some(self.delay)
    }
}

/// Doubling delay capped at `max`, optionally giving up after `max_attempts`
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.initial.saturating_mul(1u32 << exponent);
        Some(delay.min(self.max))
    }
}
