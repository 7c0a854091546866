//! Delivery loop
//!
//! A recurring timer that asks the sink to drain one queued line per period.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Period between two drain ticks
pub const DEFAULT_DELIVERY_INTERVAL: Duration = Duration::from_millis(2100);

/// Result of one drain tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing queued, or no destination configured
    Idle,
    /// The head line was accepted by the endpoint
    Delivered,
    /// The head line failed and was appended back to the tail
    Requeued,
}

/// Handle to the single running timer task. Dropping it stops the timer.
#[derive(Debug)]
pub struct DeliveryTimer {
    handle: JoinHandle<()>,
    period: Duration,
}

impl DeliveryTimer {
    /// Spawn a timer calling `tick` once per `period`, starting one period from now.
    ///
    /// The loop ends as soon as `tick` returns `false`. Must run inside a Tokio runtime.
    pub fn arm<F>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !tick() {
                    debug!("Delivery timer owner is gone, stopping");
                    break;
                }
            }
        });
        Self { handle, period }
    }

    /// Stop the timer. Deliveries already in flight keep running.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for DeliveryTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
