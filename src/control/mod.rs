//! # Control Loop - User-Facing State Machine
//!
//! The primary context of the appliance. One cooperative loop polls, in a
//! fixed order every iteration: backlight timeout, button gestures, the
//! clear-all request, the learning state machine, and the inbound replay
//! queue. There is no suspension inside the loop other than the bounded
//! blocking send into the outbound notice queue — if the Connectivity task
//! stops draining, learning and replay stall on backpressure rather than
//! dropping a notice.
//!
//! Learning walks `Idle → LearnArmed → LearnWaiting → Idle`. A decoded frame
//! is accepted only when its bit width is in (0, 64]; acceptance allocates
//! the next id by rescanning the store, appends the store first, then the
//! cache under the mutex, then emits the confirmation notice.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};

use crate::cache::SharedContext;
use crate::hal::{Button, ButtonEvent, Display, IrFrame, IrReceiver, IrTransmitter, Screen};
use crate::store::{CodeRecord, CodeStore, Protocol};

/// Loop iteration pacing.
const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Learning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LearnState {
    Idle,
    /// Arm the receiver on the next pass.
    Armed,
    /// Receiver armed; waiting for a decoded frame.
    Waiting,
}

pub struct ControlLoop<D, B, R, T>
where
    D: Display,
    B: Button,
    R: IrReceiver,
    T: IrTransmitter,
{
    ctx: Arc<SharedContext>,
    store: CodeStore,
    screen: Screen<D>,
    button: B,
    receiver: R,
    transmitter: T,
    notices: mpsc::Sender<String>,
    commands: mpsc::Receiver<u32>,
    learn: LearnState,
    backlight_timeout: Duration,
    last_activity: Instant,
    backlight_on: bool,
}

impl<D, B, R, T> ControlLoop<D, B, R, T>
where
    D: Display,
    B: Button,
    R: IrReceiver,
    T: IrTransmitter,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: Arc<SharedContext>,
        store: CodeStore,
        screen: Screen<D>,
        button: B,
        receiver: R,
        transmitter: T,
        notices: mpsc::Sender<String>,
        commands: mpsc::Receiver<u32>,
        backlight_timeout: Duration,
    ) -> Self {
        ControlLoop {
            ctx,
            store,
            screen,
            button,
            receiver,
            transmitter,
            notices,
            commands,
            learn: LearnState::Idle,
            backlight_timeout,
            last_activity: Instant::now(),
            backlight_on: true,
        }
    }

    /// Run forever. The loop never exits on its own; even a closed notice
    /// queue is logged by [`Self::tick`]'s notify path and tolerated.
    pub async fn run(&mut self) -> Result<()> {
        self.screen.main_menu();
        self.last_activity = Instant::now();
        loop {
            self.tick().await?;
            sleep(TICK_INTERVAL).await;
        }
    }

    /// One cooperative iteration. Check ordering is part of the observed
    /// behavior: backlight, button, clear-all, learning, replay.
    pub async fn tick(&mut self) -> Result<()> {
        self.check_backlight();

        let event = self.button.poll();
        let mut clear_requested = false;
        match event {
            ButtonEvent::Idle => {}
            ButtonEvent::Hold => {
                clear_requested = true;
            }
            ButtonEvent::Clicks(2) => {
                self.touch_activity();
                if self.learn == LearnState::Idle {
                    self.enter_learning().await;
                }
            }
            ButtonEvent::Clicks(_) => {
                self.touch_activity();
                self.screen.info(0, "Other clicks not implemented.", true);
                self.screen.info(2, "Press BTN twice to add IR code.", false);
                self.screen.main_menu();
            }
        }

        if self.ctx.take_clear_all_request() {
            clear_requested = true;
        }
        if clear_requested {
            self.clear_all().await;
        }

        let learn_requested = self.ctx.take_learning_request();
        if self.learn == LearnState::Idle && learn_requested {
            self.enter_learning().await;
        }
        match self.learn {
            LearnState::Idle => {}
            LearnState::Armed => {
                self.receiver.resume();
                self.learn = LearnState::Waiting;
            }
            LearnState::Waiting => {
                if let Some(frame) = self.receiver.decode() {
                    self.handle_frame(frame).await;
                }
            }
        }

        if let Ok(id) = self.commands.try_recv() {
            if id > 0 {
                self.replay(id).await;
            }
        }

        Ok(())
    }

    /// Push an outbound notice. Blocks while the queue is full; a closed
    /// queue is logged and the notice dropped.
    async fn notify(&self, text: impl Into<String>) {
        let text = text.into();
        if self.notices.send(text).await.is_err() {
            error!("Failed to queue outbound notice: channel closed");
        }
    }

    async fn enter_learning(&mut self) {
        info!("Entering learning mode");
        self.notify("LEARNING MODE:\nPoint your remote and press a button...")
            .await;
        self.screen.info(0, "LEARNING MODE:", true);
        self.screen
            .info(1, "Point your remote and press a button...", false);
        self.learn = LearnState::Armed;
    }

    async fn handle_frame(&mut self, frame: IrFrame) {
        self.touch_activity();
        self.receiver.resume();
        self.learn = LearnState::Idle;

        if frame.bits == 0 || frame.bits > 64 {
            warn!("Rejected IR frame with bit width {}", frame.bits);
            self.notify("Invalid IR code length!").await;
            self.screen.info(1, "Invalid IR code length!", true);
            self.screen.main_menu();
            return;
        }

        self.notify("Code received!").await;
        self.screen.info(1, "Code received!", true);

        // Id comes from a fresh store scan, never the cache max.
        let id = self.store.next_id().await;
        let record = CodeRecord {
            id,
            protocol: frame.protocol,
            address: frame.address,
            command: frame.command,
        };

        if let Err(e) = self.store.append(&record).await {
            error!("Could not persist learned code: {}", e);
            self.notify("Error: Could not save IR code to storage").await;
            self.screen.info(1, "Error saving code to storage!", true);
            self.screen.main_menu();
            return;
        }

        // Store is updated; mirror into the cache before anyone else can
        // observe the two diverge.
        if let Ok(mut cache) = self.ctx.cache.lock() {
            cache.push(record);
        }

        let details = format!(
            "CODE DATA:\nID: {}\nProtocol: {}\nAddr: {:x}\nCmd: {:x}",
            record.id, record.protocol, record.address, record.command
        );
        info!(
            "Learned code id={} protocol={} address=0x{:x} command=0x{:x}",
            record.id, record.protocol, record.address, record.command
        );
        self.notify(details).await;
        self.screen.info(0, "CODE DATA:", true);
        self.screen.info(1, &format!("ID: {}", record.id), false);
        self.screen
            .info(2, &format!("Protocol: {}", record.protocol), false);
        self.screen.info(
            3,
            &format!("Addr:{:x}   Cmd:{:x}", record.address, record.command),
            false,
        );
        self.screen.main_menu();
    }

    /// Delete the whole code store and clear the cache. Idempotent: an
    /// absent store is reported, not treated as an error.
    async fn clear_all(&mut self) {
        self.touch_activity();
        self.screen.info(1, "Deleting saved IR codes...", true);
        self.notify("Deleting saved IR codes...").await;

        match self.store.remove().await {
            Ok(true) => {
                if let Ok(mut cache) = self.ctx.cache.lock() {
                    cache.clear();
                }
                info!("Code store removed, cache cleared");
                self.screen.info(2, "File deleted.", false);
                self.notify("IR codes file deleted. Cache cleared.").await;
            }
            Ok(false) => {
                self.screen.info(1, "File does not exist now.", true);
                self.notify("IR codes file does not exist now.").await;
            }
            Err(e) => {
                error!("Clear-all failed: {}", e);
                self.notify(format!("Error: could not delete codes: {}", e))
                    .await;
            }
        }
        self.screen.main_menu();
    }

    /// Replay a stored code by id.
    async fn replay(&mut self, id: u32) {
        self.touch_activity();
        debug!("Replay request for id {}", id);

        let found = match self.ctx.cache.lock() {
            Ok(cache) => cache.find(id),
            Err(_) => None,
        };

        let Some(record) = found else {
            self.notify(format!("Code ID {} not found.", id)).await;
            self.screen
                .info(1, &format!("Code ID {} not found.", id), true);
            self.screen.main_menu();
            return;
        };

        self.notify(format!(
            "Sending code ID: {}\nProtocol: {}\nAddr: {:x}\nCmd: {:x}",
            record.id, record.protocol, record.address, record.command
        ))
        .await;
        self.screen.info(0, "Sending code ID:", true);
        self.screen.info(1, &record.id.to_string(), false);
        self.screen
            .info(2, &format!("Protocol:{}", record.protocol), false);
        self.screen.info(
            3,
            &format!("Addr:{:x}   Cmd:{:x}", record.address, record.command),
            false,
        );

        // Single dispatch site: only these five protocols are transmitted.
        match record.protocol {
            Protocol::Nec
            | Protocol::Sony
            | Protocol::Samsung
            | Protocol::Rc5
            | Protocol::Rc6 => {
                self.transmitter
                    .transmit(record.protocol, record.address, record.command);
            }
            _ => {
                warn!(
                    "Replay of id {} skipped: unsupported protocol {}",
                    id, record.protocol
                );
                self.notify("Unsupported protocol").await;
                self.screen.info(1, "Unsupported protocol", true);
            }
        }
        self.screen.main_menu();
    }

    fn check_backlight(&mut self) {
        if self.backlight_timeout.is_zero() {
            return;
        }
        if self.backlight_on && self.last_activity.elapsed() > self.backlight_timeout {
            self.screen.set_backlight(false);
            self.backlight_on = false;
        }
    }

    /// Qualifying activity: wake the backlight and restart its timer.
    fn touch_activity(&mut self) {
        if !self.backlight_on {
            self.screen.set_backlight(true);
            self.backlight_on = true;
        }
        self.last_activity = Instant::now();
    }

    /// Test hook: the transmit collaborator, for asserting dispatches.
    #[doc(hidden)]
    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    /// Test hook: whether the loop is currently in a learning state.
    #[doc(hidden)]
    pub fn learning_active(&self) -> bool {
        self.learn != LearnState::Idle
    }
}
