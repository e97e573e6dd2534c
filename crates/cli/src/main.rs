use anyhow::Context;
use clap::{Parser, Subcommand};
use folderbell_core::config::AppConfig;
use folderbell_store::{Store, UserOverview};
use folderbell_telegram::TelegramChannel;
use folderbell_watcher::{LogNotifier, Notifier, PassReport, Poller};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Folderbell - folder change notifications over Telegram", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bot and the polling loop (default)
    Run,
    /// Run a single polling pass and exit
    Scan {
        /// Log detected changes instead of sending them to Telegram
        #[arg(long)]
        log_only: bool,
    },
    /// Print every user with their subscriptions
    Users,
    /// Validate configuration, database and files root
    Check,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Error: Configuration missing or invalid: {}", e);
            eprintln!("   Set BOT_TOKEN in the environment or in ./.env.");
            std::process::exit(1);
        }
    };

    let _guard = init_logging(&config);
    folderbell_core::init();

    let result = match args.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Scan { log_only } => scan(config, log_only).await,
        Commands::Users => users(&config),
        Commands::Check => {
            check(&config);
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Fatal: {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

/// Logs go to `LOG_FILE` (append mode) when configured, stderr otherwise.
fn init_logging(config: &AppConfig) -> tracing_appender::non_blocking::WorkerGuard {
    let file = config.log_file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("⚠️ Cannot open log file {}: {}", path.display(), e))
            .ok()
    });

    let ansi = file.is_none();
    let (writer, guard) = match file {
        Some(file) => tracing_appender::non_blocking(file),
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(ansi)
        .init();
    guard
}

fn open_store(config: &AppConfig) -> anyhow::Result<Store> {
    let path = config.database_path();
    Store::open(&path).with_context(|| format!("cannot open database {}", path.display()))
}

fn ensure_files_root(config: &AppConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.files_root)
        .with_context(|| format!("cannot create files root {}", config.files_root.display()))
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    ensure_files_root(&config)?;
    let store = open_store(&config)?;

    let channel = TelegramChannel::new(config.clone(), store.clone());
    let poller = Poller::from_config(&config, store, Arc::new(channel.notifier()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_task = tokio::spawn(poller.run(shutdown_rx.clone()));

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl-C received, shutting down...");
            let _ = ctrl_c_tx.send(true);
        }
    });

    if let Err(e) = channel.start(shutdown_rx).await {
        error!("Telegram channel stopped with error: {:#}", e);
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = poller_task.await {
        error!("Polling task failed: {}", e);
    }

    info!("👋 Folderbell stopped.");
    Ok(())
}

async fn scan(config: AppConfig, log_only: bool) -> anyhow::Result<()> {
    ensure_files_root(&config)?;
    let store = open_store(&config)?;

    let notifier: Arc<dyn Notifier> = if log_only {
        Arc::new(LogNotifier)
    } else {
        Arc::new(TelegramChannel::new(config.clone(), store.clone()).notifier())
    };

    let mut poller = Poller::from_config(&config, store, notifier);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let report = poller.scan_pass(&shutdown_rx).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &PassReport) {
    println!("🔎 Scanned {} subscription(s)", report.scanned);
    println!("   changed:     {} ({} undelivered)", report.changed, report.undelivered);
    println!("   initialized: {}", report.initialized);
    println!("   unchanged:   {}", report.unchanged);
    println!("   missing:     {}", report.missing);
    println!("   vanished:    {}", report.vanished);
    println!("   failed:      {}", report.failed);
}

fn users(config: &AppConfig) -> anyhow::Result<()> {
    let users = open_store(config)?.users_overview()?;
    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }
    for user in &users {
        print_user(user);
    }
    Ok(())
}

fn print_user(user: &UserOverview) {
    let username = user
        .profile
        .username
        .as_deref()
        .map(|u| format!("@{u}"))
        .unwrap_or_else(|| "no username".to_string());
    println!("👤 {} (id {}, tg {})", username, user.id, user.profile.tg_id);
    if let Some(name) = user.profile.full_name() {
        println!("   name: {}", name);
    }
    if user.folders.is_empty() {
        println!("   no active subscriptions");
    }
    for (i, folder) in user.folders.iter().enumerate() {
        println!("   {}. {}", i + 1, folder);
    }
}

/// Prints one line per probe; never fails, the output is the diagnosis.
fn check(config: &AppConfig) {
    println!("🩺 Folderbell check");
    println!("✅ Configuration loaded (interval {}s, {} admin(s))", config.check_interval.as_secs(), config.admin_ids.len());

    if config.files_root.is_dir() {
        println!("✅ Files root: {}", config.files_root.display());
    } else {
        println!("❌ Files root missing: {} (created on `run`)", config.files_root.display());
    }

    match open_store(config).and_then(|store| Ok(store.all_subscriptions()?)) {
        Ok(subs) => println!("✅ Database: {} ({} subscription(s))", config.database_path().display(), subs.len()),
        Err(e) => println!("❌ Database: {:#}", e),
    }

    if config.admin_ids.is_empty() {
        println!("⚠️ No ADMIN_IDS configured; admin commands are disabled.");
    }
}
