//! Binary entrypoint for the irdeck CLI.
//!
//! Commands:
//! - `start` - run the appliance (control loop + connectivity task)
//! - `init` - create a starter `config.toml`
//! - `status` - print store location and learned-code count
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use irdeck::cache::{CodeCache, SharedContext};
use irdeck::config::Config;
use irdeck::control::ControlLoop;
use irdeck::hal::sim::{SimButton, SimReceiver, SimTransmitter};
use irdeck::hal::{LcdPanel, OledPanel, PanelBackend, Screen};
use irdeck::net::{ConnectivityTask, HttpProbeLink, ProcessPlatform, TelegramTransport};
use irdeck::store::CodeStore;
use irdeck::{COMMAND_QUEUE_DEPTH, NOTICE_QUEUE_DEPTH};

#[derive(Parser)]
#[command(name = "irdeck")]
#[command(about = "Learn-and-replay universal IR remote with a chat-bot control surface")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the appliance
    Start,
    /// Initialize a new configuration file
    Init,
    /// Show store location and learned-code count
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting irdeck v{}", env!("CARGO_PKG_VERSION"));
            start(config).await?;
        }
        Commands::Init => {
            info!("Initializing new configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            println!(
                "Wrote {}. Fill in [bot] token and chat_id before `irdeck start`.",
                cli.config
            );
        }
        Commands::Status => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            let store = CodeStore::new(
                &config.storage.data_dir,
                &config.storage.codes_file,
                &config.storage.last_update_file,
            );
            let records = store.load_all().await?;
            println!("Code store: {}", store.codes_path().display());
            println!("Learned codes: {}", records.len());
            println!("Last chat update id: {}", store.load_last_update_id().await);
        }
    }

    Ok(())
}

/// Bring up both contexts and run the Control Loop on this task.
///
/// Startup order matters: storage is mounted first (failure halts here
/// forever — a broken medium is not fixed by restarting), then the
/// Connectivity task is spawned, and cache preload waits until it reports
/// network readiness.
async fn start(config: Config) -> Result<()> {
    let panel = match config.display.backend.as_str() {
        "oled" => PanelBackend::Oled(OledPanel::new()),
        "lcd" => PanelBackend::Lcd(LcdPanel::new()),
        other => {
            warn!("Unknown display backend {:?}, using lcd", other);
            PanelBackend::Lcd(LcdPanel::new())
        }
    };
    let screen = Screen::new(panel);
    screen.info(1, "IR Remote Control System", true);
    screen.info(2, &format!("Version {}", env!("CARGO_PKG_VERSION")), false);

    let store = CodeStore::new(
        &config.storage.data_dir,
        &config.storage.codes_file,
        &config.storage.last_update_file,
    );
    screen.info(1, "Init storage...", true);
    if let Err(e) = store.mount().await {
        // Fatal-halt: display the failure and park. No restart, no retry.
        error!("Storage mount failed: {}", e);
        screen.info(1, "Storage failed!", true);
        screen.info(2, "Check the storage medium and its wiring.", false);
        std::future::pending::<()>().await;
    }
    screen.info(1, "Storage ready", true);

    let ctx = Arc::new(SharedContext::new());
    let (command_tx, command_rx) = mpsc::channel::<u32>(COMMAND_QUEUE_DEPTH);
    let (notice_tx, notice_rx) = mpsc::channel::<String>(NOTICE_QUEUE_DEPTH);

    let link = HttpProbeLink::new(&config.bot.token)?;
    let transport = TelegramTransport::new(&config.bot.token, &config.bot.chat_id)?;
    let mut connectivity = ConnectivityTask::new(
        Arc::clone(&ctx),
        store.clone(),
        screen.clone(),
        link,
        transport,
        ProcessPlatform,
        command_tx,
        notice_rx,
        config.network.clone(),
        &config.bot,
    );
    tokio::spawn(async move {
        if let Err(e) = connectivity.run().await {
            error!("Connectivity task failed: {}", e);
        }
    });

    // Readiness gate: cache preload races network bring-up otherwise.
    while !ctx.network_ready() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    screen.info(1, "Loading saved codes...", true);
    let records = store.load_all().await?;
    let count = records.len();
    if let Ok(mut cache) = ctx.cache.lock() {
        *cache = CodeCache::preload(records);
    }
    let loaded_notice = if store.exists().await {
        screen.info(1, &format!("Codes loaded {}", count), true);
        format!("Codes loaded {}", count)
    } else {
        screen.info(1, "No codes file found!", true);
        "No codes file found!".to_string()
    };
    let _ = notice_tx.send(loaded_notice).await;
    let _ = notice_tx.send("READY".to_string()).await;

    // Host build: no physical button or IR codec; the chat surface drives
    // everything. The sim handles stay inert.
    let (_button_tx, button) = SimButton::new();
    let (_frame_tx, receiver) = SimReceiver::new();
    let transmitter = SimTransmitter::new();

    let mut control = ControlLoop::new(
        ctx,
        store,
        screen,
        button,
        receiver,
        transmitter,
        notice_tx,
        command_rx,
        Duration::from_secs(config.display.backlight_timeout_secs),
    );
    control.run().await
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level.parse().unwrap_or(log::LevelFilter::Info))
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    if let Some(file) = log_file {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let sink = std::sync::Arc::new(std::sync::Mutex::new(f));
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = sink.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
