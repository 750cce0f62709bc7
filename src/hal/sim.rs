//! Channel-fed collaborator stand-ins.
//!
//! The host build has no physical button or IR codec, so these devices take
//! events over unbounded channels. Tests drive the Control Loop through the
//! same handles.

use tokio::sync::mpsc;

use super::{Button, ButtonEvent, IrFrame, IrReceiver, IrTransmitter};
use crate::store::Protocol;

/// Button whose gestures are injected through a channel.
pub struct SimButton {
    rx: mpsc::UnboundedReceiver<ButtonEvent>,
}

impl SimButton {
    pub fn new() -> (mpsc::UnboundedSender<ButtonEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, SimButton { rx })
    }
}

impl Button for SimButton {
    fn poll(&mut self) -> ButtonEvent {
        self.rx.try_recv().unwrap_or(ButtonEvent::Idle)
    }
}

/// Receive codec fed with pre-decoded frames.
///
/// A frame injected while the receiver is not armed is dropped, matching a
/// real receiver that only yields after `resume`.
pub struct SimReceiver {
    rx: mpsc::UnboundedReceiver<IrFrame>,
    armed: bool,
}

impl SimReceiver {
    pub fn new() -> (mpsc::UnboundedSender<IrFrame>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, SimReceiver { rx, armed: false })
    }
}

impl IrReceiver for SimReceiver {
    fn resume(&mut self) {
        self.armed = true;
    }

    fn decode(&mut self) -> Option<IrFrame> {
        if !self.armed {
            // Drain stale frames so an old press cannot satisfy a later arm.
            while self.rx.try_recv().is_ok() {}
            return None;
        }
        match self.rx.try_recv() {
            Ok(frame) => {
                self.armed = false;
                Some(frame)
            }
            Err(_) => None,
        }
    }
}

/// Transmitter that records every dispatched signal and logs it.
#[derive(Default)]
pub struct SimTransmitter {
    sent: Vec<(Protocol, u32, u32)>,
}

impl SimTransmitter {
    pub fn new() -> Self {
        SimTransmitter::default()
    }

    pub fn sent(&self) -> &[(Protocol, u32, u32)] {
        &self.sent
    }
}

impl IrTransmitter for SimTransmitter {
    fn transmit(&mut self, protocol: Protocol, address: u32, command: u32) {
        log::info!(
            "IR transmit: protocol={} address=0x{:x} command=0x{:x}",
            protocol,
            address,
            command
        );
        self.sent.push((protocol, address, command));
    }
}
