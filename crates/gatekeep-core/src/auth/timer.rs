//! Recurring background task that drives token reconciliation.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Default period between reconciliation ticks.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Shortest period a timer runs at; shorter ones are raised to this.
pub const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(100);

/// Handle to one live repeating task.
///
/// Dropping the handle detaches the task; `cancel` stops it.
pub struct RefreshTimer {
    id: u64,
    handle: JoinHandle<()>,
}

impl RefreshTimer {
    /// Spawn a task calling `tick` every `period`, first after one period.
    /// The task ends when `tick` returns `ControlFlow::Break`.
    pub fn spawn<F, Fut>(id: u64, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let period = period.max(MIN_REFRESH_PERIOD);
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tick().await.is_break() {
                    debug!(timer = id, "Refresh timer stopped itself");
                    break;
                }
            }
        });

        debug!(timer = id, period_ms = period.as_millis() as u64, "Refresh timer started");
        Self { id, handle }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        debug!(timer = self.id, "Refresh timer cancelled");
        self.handle.abort();
    }
}
