//! Hardware collaborator boundary.
//!
//! The appliance core never talks to physical peripherals directly; it goes
//! through these traits. The display, button, and IR codec are external
//! collaborators — the contract here is their interface, not their wiring.
//! Host builds use the panels in [`display`] and the channel-fed devices in
//! [`sim`]; tests drive the same seams.

pub mod display;
pub mod sim;

use std::sync::{Arc, Mutex};

use crate::store::Protocol;

pub use display::{LcdPanel, OledPanel, PanelBackend};

/// Character display collaborator. Row indexing starts at 0.
pub trait Display: Send {
    /// Write `text` starting at `row`. When `clear_all` is set the whole
    /// panel is wiped first; otherwise rows above `row` are preserved and
    /// rows from `row` down are rewritten.
    fn info(&mut self, row: usize, text: &str, clear_all: bool);
    fn clear(&mut self);
    /// Render the idle menu.
    fn main_menu(&mut self);
    fn set_backlight(&mut self, on: bool);
}

/// Button gesture event, as reported by the debouncing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Idle,
    /// A completed click burst of the given count.
    Clicks(u8),
    /// A long hold.
    Hold,
}

/// Debounced button collaborator.
pub trait Button: Send {
    fn poll(&mut self) -> ButtonEvent;
}

/// A decoded infrared frame as produced by the receive codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrFrame {
    pub protocol: Protocol,
    pub address: u32,
    pub command: u32,
    /// Decoded bit width. Frames outside (0, 64] are rejected by the
    /// learning flow.
    pub bits: u16,
}

/// Infrared receive codec collaborator.
pub trait IrReceiver: Send {
    /// Re-arm the receiver for the next frame.
    fn resume(&mut self);
    /// Non-blocking: the most recent decoded frame, if any.
    fn decode(&mut self) -> Option<IrFrame>;
}

/// Infrared transmit codec collaborator.
///
/// Which protocols get dispatched is the Control Loop's decision; a
/// transmitter is only ever handed protocols it supports.
pub trait IrTransmitter: Send {
    fn transmit(&mut self, protocol: Protocol, address: u32, command: u32);
}

/// Shared handle to the one physical display.
///
/// Both the Control Loop and the Connectivity task post transient notices
/// to the same panel; the mutex makes that sharing explicit and safe.
pub struct Screen<D: Display> {
    inner: Arc<Mutex<D>>,
}

impl<D: Display> Clone for Screen<D> {
    fn clone(&self) -> Self {
        Screen {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Display> Screen<D> {
    pub fn new(display: D) -> Self {
        Screen {
            inner: Arc::new(Mutex::new(display)),
        }
    }

    pub fn info(&self, row: usize, text: &str, clear_all: bool) {
        if let Ok(mut d) = self.inner.lock() {
            d.info(row, text, clear_all);
        }
    }

    pub fn main_menu(&self) {
        if let Ok(mut d) = self.inner.lock() {
            d.main_menu();
        }
    }

    pub fn set_backlight(&self, on: bool) {
        if let Ok(mut d) = self.inner.lock() {
            d.set_backlight(on);
        }
    }

    /// Run a closure against the underlying display. Test hook for
    /// inspecting panel buffers.
    pub fn with<R>(&self, f: impl FnOnce(&mut D) -> R) -> Option<R> {
        self.inner.lock().ok().map(|mut d| f(&mut d))
    }
}
