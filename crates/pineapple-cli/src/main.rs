//! Pineapple CLI — Yuzu Early Access updater.
//!
//! Checks the release index for the newest build, downloads it with a
//! progress bar, unpacks it, and launches it.

mod setup;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Select, theme::ColorfulTheme};
use tracing_subscriber::EnvFilter;

use pineapple_core::error::UpdaterError;
use pineapple_core::event::human_size;
use pineapple_hub::UpdateController;

// ─── CLI Definition ────────────────────────────────────────

/// Pineapple — keep Yuzu Early Access up to date 🍍
#[derive(Parser)]
#[command(name = "pineapple", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "PINEAPPLE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// 🔄 Check for a new build and download it
    Update,

    /// 🚀 Extract the downloaded build and launch it
    Launch,

    /// ⚡ Update, then launch
    Run,

    /// 📦 List downloaded archives
    Archives,

    /// 📊 Show directories, source, and state
    Status,

    /// ⚙️  Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// 🐛 Tail the diagnostic log
    Logs {
        /// Number of tail lines to show initially
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a default config file
    Init,
}

// ─── Main ──────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to a file so the progress bar owns the terminal
    let log_dir = setup::data_dir().join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "pineapple.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pineapple_core=debug,pineapple_hub=debug")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config_override = cli.config.as_deref();

    match cli.command {
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => setup::run_config_show(config_override)?,
            ConfigAction::Path => println!("{}", setup::config_path(config_override).display()),
            ConfigAction::Init => setup::run_config_init(config_override)?,
        },

        Some(Commands::Logs { lines }) => run_logs(lines).await?,

        Some(Commands::Update) => {
            let controller = build_controller(config_override)?;
            ui::print_banner();
            run_update(&controller).await;
        }

        Some(Commands::Launch) => {
            let controller = build_controller(config_override)?;
            ui::print_banner();
            run_launch(&controller).await;
        }

        Some(Commands::Run) => {
            let controller = build_controller(config_override)?;
            ui::print_banner();
            run_update(&controller).await;
            run_launch(&controller).await;
        }

        Some(Commands::Archives) => {
            let controller = build_controller(config_override)?;
            run_archives(&controller)?;
        }

        Some(Commands::Status) => {
            let controller = build_controller(config_override)?;
            run_status(&controller, config_override)?;
        }

        // ─── Default: check once, then the interactive menu ───
        None => {
            let controller = build_controller(config_override)?;
            run_menu(&controller, config_override).await?;
        }
    }

    Ok(())
}

/// Build the controller and cancel its work on Ctrl+C.
fn build_controller(config_override: Option<&Path>) -> anyhow::Result<Arc<UpdateController>> {
    let config = setup::load_config(config_override)?;
    let controller = Arc::new(UpdateController::new(&config)?);

    // First Ctrl+C cancels in-flight work, a second one exits.
    let on_interrupt = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Interrupted, cancelling in-flight work");
        on_interrupt.shutdown();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted twice, exiting");
            std::process::exit(130);
        }
    });

    Ok(controller)
}

// ─── Update & Launch ───────────────────────────────────────

async fn run_update(controller: &UpdateController) {
    let observer = Arc::new(ui::TerminalObserver::new());
    match controller.check_for_update(observer).await {
        Ok(outcome) => {
            tracing::info!(
                "Update finished: {} ({} bytes, reused: {})",
                outcome.release.display_name,
                outcome.report.bytes,
                outcome.report.reused
            );
        }
        Err(e) => ui::print_failure(&e.user_message()),
    }
    println!();
}

async fn run_launch(controller: &UpdateController) {
    let observer = Arc::new(ui::TerminalObserver::new());
    match controller.request_launch(observer).await {
        Ok(exe) => ui::print_success(&format!("✅ Started {}", exe.display())),
        Err(e @ UpdaterError::DownloadInProgress) => {
            ui::print_notice(&e.user_message())
        }
        Err(e) => ui::print_failure(&e.user_message()),
    }
    println!();
}

// ─── Archives & Status ─────────────────────────────────────

fn run_archives(controller: &UpdateController) -> anyhow::Result<()> {
    let archives = controller.archive_store().list()?;
    ui::print_archives(&archives);
    Ok(())
}

fn run_status(controller: &UpdateController, config_override: Option<&Path>) -> anyhow::Result<()> {
    let config = setup::load_config(config_override)?;
    let archives = controller.archive_store().list()?;
    let total: u64 = archives.iter().map(|a| a.size).sum();

    let lines = vec![
        format!("{} {}", "Source   ".dimmed(), ui::SOURCE_URL.cyan()),
        format!("{} {}", "Index    ".dimmed(), config.source.index_url),
        format!(
            "{} {}",
            "Archives ".dimmed(),
            controller.archive_store().dir().display()
        ),
        format!("{} {}", "Data     ".dimmed(), controller.data_dir().display()),
        format!(
            "{} {} ({})",
            "Stored   ".dimmed(),
            archives.len().to_string().green(),
            human_size(total)
        ),
        format!(
            "{} {:?}",
            "Selection".dimmed(),
            config.paths.archive_selection
        ),
        format!("{} {}", "State    ".dimmed(), controller.phase()),
    ];

    println!();
    ui::print_card("Status", &lines, 72);
    println!();
    Ok(())
}

// ─── Interactive Menu ──────────────────────────────────────

/// Whether the menu keeps running after an action.
#[derive(Debug, PartialEq, Eq)]
enum MenuFlow {
    Continue,
    Exit,
}

async fn run_menu(controller: &UpdateController, config_override: Option<&Path>) -> anyhow::Result<()> {
    let theme = ColorfulTheme::default();
    ui::print_banner();

    // The app checks for updates once on start
    run_update(controller).await;

    while !controller.is_shut_down() {
        let options = [
            "1. 🔄 Recheck for updates",
            "2. 🚀 Launch Yuzu",
            "3. 📦 List archives",
            "4. 📊 Status",
            "5. ❌ Exit",
        ];

        let choice = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(&options)
            .default(1)
            .interact_opt()?;

        if menu_action(controller, choice, config_override).await? == MenuFlow::Exit {
            break;
        }
    }

    if controller.is_shut_down() {
        ui::print_notice("Interrupted, closing Pineapple.");
    }
    Ok(())
}

async fn menu_action(
    controller: &UpdateController,
    choice: Option<usize>,
    config_override: Option<&Path>,
) -> anyhow::Result<MenuFlow> {
    match choice {
        Some(0) => run_update(controller).await,
        Some(1) => run_launch(controller).await,
        Some(2) => run_archives(controller)?,
        Some(3) => run_status(controller, config_override)?,
        _ => return Ok(MenuFlow::Exit),
    }

    // A cancelled controller refuses all further work.
    if controller.is_shut_down() {
        return Ok(MenuFlow::Exit);
    }
    Ok(MenuFlow::Continue)
}

// ─── Logs ──────────────────────────────────────────────────

const LOG_POLL: std::time::Duration = std::time::Duration::from_millis(200);

/// Today's file written by the daily appender.
fn todays_log(log_dir: &Path) -> PathBuf {
    log_dir.join(format!(
        "pineapple.log.{}",
        chrono::Local::now().format("%Y-%m-%d")
    ))
}

/// Print the last `backlog` lines of today's log, then follow it.
async fn run_logs(backlog: usize) -> anyhow::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

    let log_file = todays_log(&setup::data_dir().join("logs"));
    if !log_file.exists() {
        ui::print_notice(&format!("No log written today yet ({})", log_file.display()));
        return Ok(());
    }

    println!("{}", format!("👀 Following {}", log_file.display()).cyan());
    println!("{}", "Ctrl+C to stop.".dimmed());
    println!();

    let content = tokio::fs::read_to_string(&log_file).await?;
    for line in last_lines(&content, backlog) {
        println!("{}", paint_log_line(line));
    }

    // Resume right after what was just printed.
    let mut reader = BufReader::new(tokio::fs::File::open(&log_file).await?);
    reader
        .seek(std::io::SeekFrom::Start(content.len() as u64))
        .await?;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            tokio::time::sleep(LOG_POLL).await;
            continue;
        }
        let line = line.trim_end();
        if !line.is_empty() {
            println!("{}", paint_log_line(line));
        }
    }
}

fn last_lines(content: &str, count: usize) -> impl Iterator<Item = &str> {
    let lines: Vec<&str> = content.lines().collect();
    let skip = lines.len().saturating_sub(count);
    lines.into_iter().skip(skip)
}

/// Color a `tracing` fmt line by its level column.
fn paint_log_line(line: &str) -> String {
    match line.split_whitespace().nth(1) {
        Some("ERROR") => line.red().to_string(),
        Some("WARN") => line.yellow().to_string(),
        Some("INFO") => line.green().to_string(),
        Some("DEBUG") => line.blue().to_string(),
        _ => line.dimmed().to_string(),
    }
}
