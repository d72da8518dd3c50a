//! Periodic liveness events.
//!
//! Heartbeats are ordinary events: they go through `Broadcaster::publish`,
//! get a sequence id, and are kept in history like any message.

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use super::broadcaster::Broadcaster;
use super::message::Event;

/// Default heartbeat interval in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 2000;

/// Background task that publishes a heartbeat at a fixed interval.
pub struct Heartbeat {
    broadcaster: Broadcaster,
    period: Duration,
}

impl Heartbeat {
    /// Create a heartbeat with the default interval.
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self::with_interval(broadcaster, Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS))
    }

    /// Create a heartbeat with a custom interval.
    pub fn with_interval(broadcaster: Broadcaster, period: Duration) -> Self {
        Self {
            broadcaster,
            period: period.max(Duration::from_millis(1)),
        }
    }

    /// Get the configured interval.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run the heartbeat loop forever.
    pub async fn run(self) {
        info!(interval_ms = self.period.as_millis() as u64, "Heartbeat started");

        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately.
        timer.tick().await;

        loop {
            timer.tick().await;
            let id = self.broadcaster.publish(Event::heartbeat());
            debug!(event_id = id, "Heartbeat published");
        }
    }

    /// Spawn the heartbeat loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
