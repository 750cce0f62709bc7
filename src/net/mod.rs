//! # Connectivity Task - Network and Chat-Bot Context
//!
//! The secondary context. Owns network association, the reconnection
//! policy, and the chat long-poll cycle; it never touches the code cache.
//! Everything it tells the Control Loop travels through the bounded command
//! queue or the single-writer request flags, so transport failures cannot
//! corrupt Control Loop state.
//!
//! Association policy: a fixed attempt budget, each attempt polling for
//! link-up with a fixed timeout, fixed backoff between attempts. Exhausting
//! the budget triggers the fail-fast restart — deliberately unrecoverable
//! locally.
//!
//! Each steady-state iteration: interval-gated link re-check, interval-gated
//! long-poll burst (drained until empty), at most one outbound notice
//! forwarded with bounded retry, then a short yield.

pub mod link;
pub mod telegram;

use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};

use crate::cache::SharedContext;
use crate::config::{BotConfig, NetworkConfig};
use crate::hal::{Display, Screen};
use crate::metrics;
use crate::store::CodeStore;

pub use link::HttpProbeLink;
pub use telegram::TelegramTransport;

/// Delivery attempts per outbound notice before it is dropped.
const SEND_ATTEMPTS: u32 = 3;
/// Backoff between delivery attempts.
const SEND_RETRY_DELAY: Duration = Duration::from_millis(250);
/// Bounded wait when enqueuing a replay command; a full queue past this is
/// reported back to the peer.
const COMMAND_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(1);
/// Poll cadence while waiting for an association attempt to come up.
const ASSOCIATE_POLL: Duration = Duration::from_millis(500);
/// Delay before a deliberate restart so the confirmation can flush.
const RESTART_FLUSH_DELAY: Duration = Duration::from_secs(1);
/// Per-iteration yield in the steady-state loop.
const YIELD_DELAY: Duration = Duration::from_millis(100);

/// Exit code signalling the supervisor to restart the appliance.
pub const RESTART_EXIT_CODE: i32 = 10;

/// Capability listing sent for `/help` and once at startup.
pub const HELP_TEXT: &str = "Available commands:\n\
    - Send a number to execute IR code\n\
    - /help - Show this help\n\
    - /learn - Start IR code learning mode\n\
    - /allclear - Delete all saved codes\n\
    - /status - Show system status\n\
    - /restart - Restart device\n\
    - /memory - Show free memory";

/// One update pulled from the chat transport. `text` is `None` when the
/// update carried no usable text or came from an unauthorized peer; its id
/// still advances the long-poll offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUpdate {
    pub update_id: i64,
    pub text: Option<String>,
}

/// Network association collaborator.
#[allow(async_fn_in_trait)]
pub trait NetLink: Send {
    /// Kick off (or re-kick) an association attempt.
    async fn begin(&mut self);
    async fn is_up(&mut self) -> bool;
    fn local_addr(&self) -> String;
}

/// Chat long-poll/delivery collaborator.
#[allow(async_fn_in_trait)]
pub trait ChatTransport: Send {
    /// Fetch updates with id >= `offset`. An empty vec ends a poll burst.
    async fn fetch_updates(&mut self, offset: i64) -> Result<Vec<ChatUpdate>>;
    async fn send(&mut self, text: &str) -> Result<()>;
}

/// Process-level effects: restart is an explicit supervisor-restart
/// request, not an error return.
pub trait Platform: Send {
    fn memory_report(&self) -> String;
    fn restart(&self);
}

/// Real platform: exits with [`RESTART_EXIT_CODE`] so the supervisor
/// relaunches the appliance.
pub struct ProcessPlatform;

impl Platform for ProcessPlatform {
    fn memory_report(&self) -> String {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    return format!("Resident memory: {}", rest.trim());
                }
            }
        }
        "Memory usage unavailable".to_string()
    }

    fn restart(&self) {
        info!("Restart requested; exiting for supervisor relaunch");
        std::process::exit(RESTART_EXIT_CODE);
    }
}

/// A parsed chat command. Keywords are case-insensitive; any positive
/// integer is a replay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    Replay(u32),
    Help,
    Status,
    Restart,
    Memory,
    Learn,
    ClearAll,
    Unknown,
}

impl ChatCommand {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if let Ok(id) = trimmed.parse::<u32>() {
            if id > 0 {
                return ChatCommand::Replay(id);
            }
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "/help" => ChatCommand::Help,
            "/status" => ChatCommand::Status,
            "/restart" => ChatCommand::Restart,
            "/memory" => ChatCommand::Memory,
            "/learn" => ChatCommand::Learn,
            "/allclear" => ChatCommand::ClearAll,
            _ => ChatCommand::Unknown,
        }
    }
}

pub struct ConnectivityTask<L, C, P, D>
where
    L: NetLink,
    C: ChatTransport,
    P: Platform,
    D: Display,
{
    ctx: Arc<SharedContext>,
    store: CodeStore,
    screen: Screen<D>,
    link: L,
    transport: C,
    platform: P,
    commands: mpsc::Sender<u32>,
    notices: mpsc::Receiver<String>,
    network: NetworkConfig,
    poll_interval: Duration,
    last_update_id: i64,
    link_up: bool,
    restart_pending: bool,
}

impl<L, C, P, D> ConnectivityTask<L, C, P, D>
where
    L: NetLink,
    C: ChatTransport,
    P: Platform,
    D: Display,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: Arc<SharedContext>,
        store: CodeStore,
        screen: Screen<D>,
        link: L,
        transport: C,
        platform: P,
        commands: mpsc::Sender<u32>,
        notices: mpsc::Receiver<String>,
        network: NetworkConfig,
        bot: &BotConfig,
    ) -> Self {
        ConnectivityTask {
            ctx,
            store,
            screen,
            link,
            transport,
            platform,
            commands,
            notices,
            network,
            poll_interval: Duration::from_millis(bot.poll_interval_ms),
            last_update_id: 0,
            link_up: false,
            restart_pending: false,
        }
    }

    /// Associate, signal readiness, then run the steady-state loop forever.
    /// Returns only when a (mock) platform recorded a restart instead of
    /// exiting the process.
    pub async fn run(&mut self) -> Result<()> {
        self.screen.info(1, "Connecting to network...", true);
        if !self.associate().await {
            self.screen.info(1, "Network connection failed!", true);
            self.screen.info(2, "Check credentials or signal", false);
            self.screen.info(3, "Restarting...", false);
            self.platform.restart();
            return Ok(());
        }
        self.link_up = true;
        info!("Network associated, address {}", self.link.local_addr());
        self.screen.info(1, "Network connected!", true);
        self.screen
            .info(2, &format!("IP:{}", self.link.local_addr()), false);

        // Resume the long poll where the previous run left off.
        self.last_update_id = self.store.load_last_update_id().await;
        self.deliver_with_retry(&format!(
            "IR Remote Control System\nVersion {}",
            env!("CARGO_PKG_VERSION")
        ))
        .await;
        self.deliver_with_retry(HELP_TEXT).await;

        // Gate the Control Loop's storage/cache initialization exactly once.
        self.ctx.mark_network_ready();

        let check_interval = Duration::from_secs(self.network.check_interval_secs.max(1));
        let mut last_check = Instant::now();
        let mut last_poll = Instant::now();

        loop {
            if self.restart_pending {
                return Ok(());
            }

            if last_check.elapsed() >= check_interval {
                last_check = Instant::now();
                if !self.check_link().await {
                    continue;
                }
            }

            if self.link_up {
                if last_poll.elapsed() >= self.poll_interval {
                    last_poll = Instant::now();
                    self.poll_updates().await;
                }

                // At most one notice per iteration, never blocking on empty.
                if let Ok(notice) = self.notices.try_recv() {
                    self.deliver_with_retry(&notice).await;
                }
            }

            sleep(YIELD_DELAY).await;
        }
    }

    /// Association with the configured attempt budget. Progress is painted
    /// to the display; exhaustion returns false and the caller restarts.
    pub async fn associate(&mut self) -> bool {
        let attempts = self.network.max_attempts.max(1);
        for attempt in 1..=attempts {
            self.screen.info(
                1,
                &format!("Network attempt {}/{}", attempt, attempts),
                true,
            );
            self.link.begin().await;

            let deadline = Instant::now() + Duration::from_secs(self.network.attempt_timeout_secs);
            let mut polls = 0u32;
            while Instant::now() < deadline {
                if self.link.is_up().await {
                    return true;
                }
                sleep(ASSOCIATE_POLL).await;
                polls += 1;
                if polls % 4 == 0 {
                    self.screen
                        .info(2, &".".repeat((polls / 4) as usize), false);
                }
            }

            if attempt != attempts {
                self.screen.info(
                    2,
                    &format!("Retrying in {} seconds...", self.network.retry_delay_secs),
                    false,
                );
                sleep(Duration::from_secs(self.network.retry_delay_secs)).await;
            }
        }
        false
    }

    /// Steady-state link re-check. On loss, shows a transient notice and
    /// re-runs the association policy; exhausted retries restart.
    pub async fn check_link(&mut self) -> bool {
        if self.link.is_up().await {
            self.link_up = true;
            return true;
        }

        warn!("Network link lost, reconnecting");
        metrics::inc_reconnects();
        self.link_up = false;
        self.screen.info(1, "Network disconnected!", true);
        self.screen.info(2, "Reconnecting...", false);

        if self.associate().await {
            self.link_up = true;
            self.deliver_with_retry(&format!(
                "Network reconnected. IP: {}",
                self.link.local_addr()
            ))
            .await;
            self.screen.info(1, "Network reconnected!", true);
            self.screen
                .info(2, &format!("IP: {}", self.link.local_addr()), false);
            self.screen.main_menu();
            true
        } else {
            self.screen.info(1, "Network connection failed!", true);
            self.screen.info(2, "Restarting device...", false);
            self.platform.restart();
            self.restart_pending = true;
            false
        }
    }

    /// Drain one long-poll burst: keep fetching until no more updates are
    /// pending.
    async fn poll_updates(&mut self) {
        loop {
            let updates = match self.transport.fetch_updates(self.last_update_id + 1).await {
                Ok(u) => u,
                Err(e) => {
                    debug!("getUpdates failed: {}", e);
                    return;
                }
            };
            if updates.is_empty() {
                return;
            }
            for update in updates {
                self.last_update_id = self.last_update_id.max(update.update_id);
                if let Some(text) = update.text {
                    self.handle_message(&text).await;
                }
                if self.restart_pending {
                    return;
                }
            }
        }
    }

    /// Route one inbound chat message through the command grammar.
    pub async fn handle_message(&mut self, text: &str) {
        metrics::inc_commands_received();
        match ChatCommand::parse(text) {
            ChatCommand::Replay(id) => {
                debug!("Enqueuing replay command {}", id);
                if self
                    .commands
                    .send_timeout(id, COMMAND_ENQUEUE_TIMEOUT)
                    .await
                    .is_err()
                {
                    warn!("Command queue full, dropping replay {}", id);
                    self.deliver_with_retry("Error: Command queue is full").await;
                }
            }
            ChatCommand::Help => {
                self.deliver_with_retry(HELP_TEXT).await;
            }
            ChatCommand::Status => {
                let status = format!(
                    "System status:\n- Network: {}\n- IP: {}",
                    if self.link_up {
                        "Connected"
                    } else {
                        "Disconnected"
                    },
                    self.link.local_addr()
                );
                self.deliver_with_retry(&status).await;
            }
            ChatCommand::Restart => {
                self.deliver_with_retry("Restarting device...").await;
                if let Err(e) = self.store.save_last_update_id(self.last_update_id).await {
                    warn!("Could not persist last update id: {}", e);
                }
                sleep(RESTART_FLUSH_DELAY).await;
                self.platform.restart();
                self.restart_pending = true;
            }
            ChatCommand::Memory => {
                let report = self.platform.memory_report();
                self.deliver_with_retry(&report).await;
            }
            ChatCommand::Learn => {
                self.ctx.request_learning();
            }
            ChatCommand::ClearAll => {
                // Ack now; the Control Loop performs the deletion.
                self.ctx.request_clear_all();
                self.deliver_with_retry(
                    "Command to delete all codes received. The file will be deleted shortly.",
                )
                .await;
            }
            ChatCommand::Unknown => {
                self.deliver_with_retry(
                    "Unknown command. Send a number to execute IR code or /help for help.",
                )
                .await;
            }
        }
    }

    /// Forward one notice to the chat transport with bounded retry.
    /// Exhaustion is logged and counted, never surfaced to the peer — the
    /// outbound channel is itself how user-visible errors travel.
    pub async fn deliver_with_retry(&mut self, text: &str) {
        for attempt in 1..=SEND_ATTEMPTS {
            match self.transport.send(text).await {
                Ok(()) => {
                    metrics::inc_notices_sent();
                    debug!("Delivered notice ({} bytes)", text.len());
                    return;
                }
                Err(e) => {
                    debug!("Delivery attempt {}/{} failed: {}", attempt, SEND_ATTEMPTS, e);
                    if attempt < SEND_ATTEMPTS {
                        metrics::inc_notice_retries();
                        sleep(SEND_RETRY_DELAY).await;
                    }
                }
            }
        }
        metrics::inc_notices_failed();
        error!(
            "Dropped notice after {} delivery attempts: {:?}",
            SEND_ATTEMPTS,
            text.lines().next().unwrap_or("")
        );
    }

    /// Test hook: current long-poll offset.
    #[doc(hidden)]
    pub fn last_update_id(&self) -> i64 {
        self.last_update_id
    }

    /// Test hook: whether a restart was requested on the platform.
    #[doc(hidden)]
    pub fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    /// Test hook: force the cached link state.
    #[doc(hidden)]
    pub fn set_link_up(&mut self, up: bool) {
        self.link_up = up;
    }

    /// Test hook: the chat transport, for scripting failures.
    #[doc(hidden)]
    pub fn transport_mut(&mut self) -> &mut C {
        &mut self.transport
    }
}
