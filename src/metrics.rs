//! Process-wide pipeline counters.
//!
//! Plain relaxed atomics; read through [`snapshot`] for periodic stats logs.
use std::sync::atomic::{AtomicU64, Ordering};

static FRAMES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static FRAMES_REJECTED: AtomicU64 = AtomicU64::new(0);
static PUBLISH_OK: AtomicU64 = AtomicU64::new(0);
static PUBLISH_FAILED: AtomicU64 = AtomicU64::new(0);
static CONNECT_ATTEMPTS: AtomicU64 = AtomicU64::new(0);
static CONNECT_FAILURES: AtomicU64 = AtomicU64::new(0);
static HEARTBEATS: AtomicU64 = AtomicU64::new(0);

pub fn inc_frames_received() {
    FRAMES_RECEIVED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_frames_rejected() {
    FRAMES_REJECTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_publish_ok() {
    PUBLISH_OK.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_publish_failed() {
    PUBLISH_FAILED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_connect_attempts() {
    CONNECT_ATTEMPTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_connect_failures() {
    CONNECT_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_heartbeats() {
    HEARTBEATS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub frames_received: u64,
    pub frames_rejected: u64,
    pub publish_ok: u64,
    pub publish_failed: u64,
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub heartbeats: u64,
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frames={} rejected={} published={} publish_failed={} connects={} connect_failed={} heartbeats={}",
            self.frames_received,
            self.frames_rejected,
            self.publish_ok,
            self.publish_failed,
            self.connect_attempts,
            self.connect_failures,
            self.heartbeats
        )
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        frames_received: FRAMES_RECEIVED.load(Ordering::Relaxed),
        frames_rejected: FRAMES_REJECTED.load(Ordering::Relaxed),
        publish_ok: PUBLISH_OK.load(Ordering::Relaxed),
        publish_failed: PUBLISH_FAILED.load(Ordering::Relaxed),
        connect_attempts: CONNECT_ATTEMPTS.load(Ordering::Relaxed),
        connect_failures: CONNECT_FAILURES.load(Ordering::Relaxed),
        heartbeats: HEARTBEATS.load(Ordering::Relaxed),
    }
}
