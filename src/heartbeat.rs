//! Heartbeat timer and the pending flags the station loop drains.
//!
//! Timer tasks and signal handlers never publish. They set a [`PendingFlag`];
//! the station loop takes it on its next pass and does the I/O itself.
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Single-bit event flag shared between one producer and the station loop.
#[derive(Debug, Clone, Default)]
pub struct PendingFlag(Arc<AtomicBool>);

impl PendingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Set `flag` every `period`, starting one period from now. Ticks missed
/// while the loop is busy collapse into one.
pub fn start_heartbeat(period: Duration, flag: PendingFlag) -> JoinHandle<()> {
    debug!("Heartbeat every {:?}", period);
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            trace!("Heartbeat tick");
            flag.set();
        }
    })
}
