use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use kynetic_monitor::api;
use kynetic_monitor::command::Command;
use kynetic_monitor::config::{AppConfig, CONFIG_PATH};
use kynetic_monitor::monitor::{Monitor, MonitorOptions};
use kynetic_monitor::notifier::Notifier;
use kynetic_monitor::poller::{HttpSource, Poller};
use kynetic_monitor::presentation::{
    Bell, CommandNotifier, DesktopNotifier, JsonPresenter, Presenter, TerminalBell,
    TerminalPresenter,
};
use kynetic_monitor::settings::{JsonFileStore, KeyValueStore, MemoryStore, SettingsStore};
use kynetic_monitor::state::AppState;

#[derive(Parser)]
#[command(name = "kynetic", about = "Market signal list monitor with change alerts")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Results endpoint (overrides config and KYNETIC_API_URL)
    #[arg(long)]
    url: Option<String>,

    /// Poll interval in seconds (overrides config)
    #[arg(long)]
    interval: Option<u64>,

    /// Emit JSON lines instead of the text dashboard
    #[arg(long)]
    json: bool,

    /// Keep settings in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Do not read commands from stdin
    #[arg(long)]
    no_input: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load_or_default(&args.config)?;
    if let Some(url) = &args.url {
        config.endpoint.url = url.clone();
    }
    if let Some(secs) = args.interval {
        if secs == 0 {
            anyhow::bail!("--interval must be positive");
        }
        config.polling.poll_interval_secs = secs;
    }

    if args.ephemeral {
        info!("Settings kept in memory only");
        run(config, MemoryStore::default(), &args).await
    } else {
        let store = JsonFileStore::new(
            config
                .storage
                .settings_path
                .clone()
                .unwrap_or_else(JsonFileStore::default_path),
        );
        info!("Settings stored in {}", store.path().display());
        run(config, store, &args).await
    }
}

async fn run<K: KeyValueStore>(config: AppConfig, store: K, args: &Args) -> Result<()> {
    let store = SettingsStore::new(store);
    let settings = match store.load() {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to load settings: {e:#}, using defaults");
            Default::default()
        }
    };

    let endpoint = config.endpoint.parsed_url()?;
    let client = api::build_client(
        config.polling.request_timeout(),
        config.endpoint.skip_warning_header,
    )?;

    info!(
        "Starting monitor: endpoint={} direction={} notifications={} sound={}",
        endpoint.origin().ascii_serialization(),
        settings.direction,
        settings.notifications,
        settings.sound,
    );

    let bell: Box<dyn Bell> = Box::new(TerminalBell);
    let desktop: Box<dyn DesktopNotifier> =
        Box::new(CommandNotifier::new(config.desktop.command.clone()));
    let presenter: Box<dyn Presenter> = if args.json {
        Box::new(JsonPresenter)
    } else {
        Box::new(TerminalPresenter)
    };

    let monitor = Monitor::new(
        AppState::new(settings),
        Poller::new(HttpSource::new(client), endpoint),
        Notifier::new(bell, desktop),
        presenter,
        store,
        MonitorOptions {
            poll_interval: config.polling.poll_interval(),
            toast_refresh: config.polling.toast_refresh(),
        },
    );

    let (tx, rx) = mpsc::unbounded_channel();
    if args.no_input {
        drop(tx);
    } else {
        tokio::spawn(read_commands(tx));
    }

    monitor.run(rx).await
}

/// Forward parsed stdin lines to the monitor until EOF.
async fn read_commands(tx: mpsc::UnboundedSender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read stdin: {e}");
                break;
            }
        }
    }
}
