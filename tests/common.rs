//! Test utilities & fixtures.
//! Builds a Control Loop or Connectivity task against a temp-dir code store
//! and channel-fed collaborators, so tests drive ticks by hand.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

use irdeck::cache::SharedContext;
use irdeck::config::{BotConfig, NetworkConfig};
use irdeck::control::ControlLoop;
use irdeck::hal::sim::{SimButton, SimReceiver, SimTransmitter};
use irdeck::hal::{ButtonEvent, IrFrame, LcdPanel, Screen};
use irdeck::net::{ChatTransport, ChatUpdate, ConnectivityTask, NetLink, Platform};
use irdeck::store::CodeStore;

/// Control Loop under test plus the handles that feed and observe it.
pub struct ControlFixture {
    pub ctx: Arc<SharedContext>,
    pub store: CodeStore,
    pub screen: Screen<LcdPanel>,
    pub buttons: mpsc::UnboundedSender<ButtonEvent>,
    pub frames: mpsc::UnboundedSender<IrFrame>,
    pub commands: mpsc::Sender<u32>,
    pub notices: mpsc::Receiver<String>,
    pub control: ControlLoop<LcdPanel, SimButton, SimReceiver, SimTransmitter>,
    _dir: tempfile::TempDir,
}

pub fn control_fixture() -> ControlFixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CodeStore::new(
        dir.path().to_str().unwrap(),
        "dataCodes.txt",
        "last_msg_id.txt",
    );
    let ctx = Arc::new(SharedContext::new());
    let screen = Screen::new(LcdPanel::new());
    let (buttons, button) = SimButton::new();
    let (frames, receiver) = SimReceiver::new();
    let (command_tx, command_rx) = mpsc::channel(irdeck::COMMAND_QUEUE_DEPTH);
    // Roomy notice queue: these tests assert content, not backpressure.
    let (notice_tx, notice_rx) = mpsc::channel(64);
    let control = ControlLoop::new(
        Arc::clone(&ctx),
        store.clone(),
        screen.clone(),
        button,
        receiver,
        SimTransmitter::new(),
        notice_tx,
        command_rx,
        Duration::from_secs(8),
    );
    ControlFixture {
        ctx,
        store,
        screen,
        buttons,
        frames,
        commands: command_tx,
        notices: notice_rx,
        control,
        _dir: dir,
    }
}

/// Pull every notice currently queued, without blocking.
pub fn drain_notices(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

/// Link whose state the test flips through a shared flag, including while
/// the task under test is mid-associate.
pub struct ScriptedLink {
    up: Arc<AtomicBool>,
}

impl NetLink for ScriptedLink {
    async fn begin(&mut self) {}

    async fn is_up(&mut self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    fn local_addr(&self) -> String {
        "192.168.1.50".to_string()
    }
}

/// Transport that records every delivery and serves scripted update bursts.
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<String>>>,
    pub bursts: VecDeque<Vec<ChatUpdate>>,
    /// Fail this many sends before succeeding again.
    pub fail_sends: u32,
}

impl RecordingTransport {
    pub fn new() -> (Arc<Mutex<Vec<String>>>, Self) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Arc::clone(&sent),
            RecordingTransport {
                sent,
                bursts: VecDeque::new(),
                fail_sends: 0,
            },
        )
    }
}

impl ChatTransport for RecordingTransport {
    async fn fetch_updates(&mut self, _offset: i64) -> Result<Vec<ChatUpdate>> {
        Ok(self.bursts.pop_front().unwrap_or_default())
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        if self.fail_sends > 0 {
            self.fail_sends -= 1;
            return Err(anyhow!("scripted send failure"));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Platform that records a restart instead of exiting the process.
pub struct RecordingPlatform {
    pub restarted: Arc<AtomicBool>,
}

impl RecordingPlatform {
    pub fn new() -> (Arc<AtomicBool>, Self) {
        let restarted = Arc::new(AtomicBool::new(false));
        (
            Arc::clone(&restarted),
            RecordingPlatform { restarted },
        )
    }
}

impl Platform for RecordingPlatform {
    fn memory_report(&self) -> String {
        "Resident memory: 12345 kB".to_string()
    }

    fn restart(&self) {
        self.restarted.store(true, Ordering::SeqCst);
    }
}

/// Connectivity task under test plus its observation handles.
pub struct NetFixture {
    pub ctx: Arc<SharedContext>,
    pub store: CodeStore,
    pub command_rx: mpsc::Receiver<u32>,
    pub notice_tx: mpsc::Sender<String>,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub restarted: Arc<AtomicBool>,
    pub link_up: Arc<AtomicBool>,
    pub task: ConnectivityTask<ScriptedLink, RecordingTransport, RecordingPlatform, LcdPanel>,
    _dir: tempfile::TempDir,
}

pub fn net_fixture(command_capacity: usize) -> NetFixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CodeStore::new(
        dir.path().to_str().unwrap(),
        "dataCodes.txt",
        "last_msg_id.txt",
    );
    let ctx = Arc::new(SharedContext::new());
    let (command_tx, command_rx) = mpsc::channel(command_capacity);
    let (notice_tx, notice_rx) = mpsc::channel(irdeck::NOTICE_QUEUE_DEPTH);
    let (sent, transport) = RecordingTransport::new();
    let (restarted, platform) = RecordingPlatform::new();
    let link_up = Arc::new(AtomicBool::new(true));
    let bot = BotConfig {
        token: "123:test".to_string(),
        chat_id: "42".to_string(),
        poll_interval_ms: 200,
    };
    let task = ConnectivityTask::new(
        Arc::clone(&ctx),
        store.clone(),
        Screen::new(LcdPanel::new()),
        ScriptedLink {
            up: Arc::clone(&link_up),
        },
        transport,
        platform,
        command_tx,
        notice_rx,
        NetworkConfig::default(),
        &bot,
    );
    NetFixture {
        ctx,
        store,
        command_rx,
        notice_tx,
        sent,
        restarted,
        link_up,
        task,
        _dir: dir,
    }
}
