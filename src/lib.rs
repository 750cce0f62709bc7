//! # irdeck - Learn-and-Replay Universal IR Remote
//!
//! irdeck is a universal infrared remote-control appliance: it learns codes
//! from physical remotes, stores them in a line-record file, replays them on
//! command, and takes replay/management commands from a single chat peer
//! over a bot long poll.
//!
//! ## Architecture
//!
//! Two cooperative contexts with no shared control flow:
//!
//! ```text
//! ┌──────────────────┐  notices (cap 10)  ┌───────────────────┐
//! │   Control Loop   │ ─────────────────→ │ Connectivity Task │ → chat
//! │ button/IR/display│ ←───────────────── │ link + long poll  │ ← chat
//! │ cache + store    │  commands (cap 10) └───────────────────┘
//! └──────────────────┘        + single-writer request flags
//!          │
//!    mutex-guarded cache ↔ append-only code store
//! ```
//!
//! The Control Loop owns the user-facing state machine and the code
//! cache/store; the Connectivity task owns association, reconnection, and
//! delivery retry. They communicate only through the two bounded queues,
//! the request flags, and the cache mutex.
//!
//! ## Module Organization
//!
//! - [`control`] - Control Loop state machine (learn, replay, clear-all)
//! - [`net`] - Connectivity task, command grammar, chat transport
//! - [`store`] - persistent code store and record codec
//! - [`cache`] - in-memory code cache and shared cross-context state
//! - [`hal`] - collaborator traits, display panels, simulated devices
//! - [`config`] - TOML configuration
//! - [`metrics`] - delivery/command counters

pub mod cache;
pub mod config;
pub mod control;
pub mod hal;
pub mod metrics;
pub mod net;
pub mod store;

/// Capacity of the inbound numeric-command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 10;
/// Capacity of the outbound notice queue.
pub const NOTICE_QUEUE_DEPTH: usize = 10;
