//! In-memory code cache and the shared cross-context state.
//!
//! The cache is an ordered mirror of the code store: insertion order equals
//! file order. All access goes through the single mutex in
//! [`SharedContext`]; every persisted mutation updates the store first and
//! then the cache inside the critical section, so no task can observe the
//! two disagreeing for longer than that window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::store::CodeRecord;

/// Ordered sequence of learned codes. Append-only in normal operation;
/// cleared as a whole on clear-all, never partially.
#[derive(Debug, Default)]
pub struct CodeCache {
    records: Vec<CodeRecord>,
}

impl CodeCache {
    pub fn new() -> Self {
        CodeCache::default()
    }

    /// Preload from records read out of the store, preserving order.
    pub fn preload(records: Vec<CodeRecord>) -> Self {
        CodeCache { records }
    }

    pub fn push(&mut self, record: CodeRecord) {
        self.records.push(record);
    }

    /// Linear scan, first match wins. Ids are unique so this is unambiguous.
    pub fn find(&self, id: u32) -> Option<CodeRecord> {
        self.records.iter().copied().find(|r| r.id == id)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CodeRecord] {
        &self.records
    }
}

/// State shared between the Control Loop and the Connectivity task.
///
/// Each boolean has exactly one writer context: the Connectivity task sets
/// `learning_requested` and `clear_all_requested` (the Control Loop clears
/// them after acting), and only the Connectivity task ever sets
/// `network_ready`. Relaxed ordering is enough for these single-word,
/// single-writer handshakes; the cache mutex provides the only real
/// exclusion.
#[derive(Debug, Default)]
pub struct SharedContext {
    pub cache: Mutex<CodeCache>,
    learning_requested: AtomicBool,
    clear_all_requested: AtomicBool,
    network_ready: AtomicBool,
}

impl SharedContext {
    pub fn new() -> Self {
        SharedContext::default()
    }

    pub fn request_learning(&self) {
        self.learning_requested.store(true, Ordering::Relaxed);
    }

    /// Consume the learning request, returning whether it was set.
    pub fn take_learning_request(&self) -> bool {
        self.learning_requested.swap(false, Ordering::Relaxed)
    }

    pub fn request_clear_all(&self) {
        self.clear_all_requested.store(true, Ordering::Relaxed);
    }

    pub fn take_clear_all_request(&self) -> bool {
        self.clear_all_requested.swap(false, Ordering::Relaxed)
    }

    pub fn mark_network_ready(&self) {
        self.network_ready.store(true, Ordering::Release);
    }

    pub fn network_ready(&self) -> bool {
        self.network_ready.load(Ordering::Acquire)
    }
}
