//! Minimal delivery/command counters.
use std::sync::atomic::{AtomicU64, Ordering};

static NOTICES_SENT: AtomicU64 = AtomicU64::new(0);
static NOTICES_FAILED: AtomicU64 = AtomicU64::new(0);
static NOTICE_RETRIES: AtomicU64 = AtomicU64::new(0);
static COMMANDS_RECEIVED: AtomicU64 = AtomicU64::new(0);
static RECONNECTS: AtomicU64 = AtomicU64::new(0);

pub fn inc_notices_sent() {
    NOTICES_SENT.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_notices_failed() {
    NOTICES_FAILED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_notice_retries() {
    NOTICE_RETRIES.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_commands_received() {
    COMMANDS_RECEIVED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_reconnects() {
    RECONNECTS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub notices_sent: u64,
    pub notices_failed: u64,
    pub notice_retries: u64,
    pub commands_received: u64,
    pub reconnects: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        notices_sent: NOTICES_SENT.load(Ordering::Relaxed),
        notices_failed: NOTICES_FAILED.load(Ordering::Relaxed),
        notice_retries: NOTICE_RETRIES.load(Ordering::Relaxed),
        commands_received: COMMANDS_RECEIVED.load(Ordering::Relaxed),
        reconnects: RECONNECTS.load(Ordering::Relaxed),
    }
}
