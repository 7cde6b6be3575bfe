//! Time controller for tests driving durable timers

use std::time::Duration;
use tokio::time::Instant;

/// Control over tokio's clock.
///
/// Engine timers sleep on the tokio clock. With the clock paused, time only
/// moves through [`advance`](Self::advance), or automatically when every task
/// is idle. The clock must already be paused on a current-thread runtime,
/// e.g. `#[tokio::test(start_paused = true)]`.
///
/// ```ignore
/// let time = TimeController::new();
/// handle.signal("go", ()).await?;
/// time.advance(Duration::from_secs(60)).await;
/// ```
#[derive(Debug, Clone)]
pub struct TimeController {
    origin: Instant,
}

impl Default for TimeController {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeController {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Move the clock forward, then let woken tasks run.
    pub async fn advance(&self, duration: Duration) {
        tokio::time::advance(duration).await;
        settle().await;
    }

    /// Time since this controller was created, on the tokio clock
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Yield until spawned tasks woken by a clock change have had a chance to run
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
