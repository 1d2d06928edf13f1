//! Pineapple CLI — Terminal UI Components
//!
//! All visual rendering lives here: banner, cards, the download progress
//! bar, and the observer that turns update events into terminal output.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use pineapple_core::event::{UpdateEvent, UpdateObserver, human_size};
use pineapple_hub::archive::ArchiveFile;

pub const SOURCE_URL: &str = "https://github.com/pineappleEA/pineapple-src";

// ─── Box Drawing Helpers ─────────────────────────────────────

/// Full-width card with a title line.
///
/// ```text
/// ╭── Title ──────────────────────╮
/// │  line1                        │
/// ╰───────────────────────────────╯
/// ```
pub fn print_card(title: &str, lines: &[String], width: usize) {
    let inner = width - 2;

    let t = format!(" {} ", title);
    let dashes = inner.saturating_sub(t.chars().count() + 2);
    println!("{}", format!("╭─ {}{}╮", t, "─".repeat(dashes)).cyan());

    for line in lines {
        let padding = inner.saturating_sub(strip_ansi_len(line) + 2);
        println!("{}  {}{}{}", "│".cyan(), line, " ".repeat(padding), "│".cyan());
    }

    println!("{}", format!("╰{}╯", "─".repeat(inner)).cyan());
}

// ─── Banner ──────────────────────────────────────────────────

pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");

    println!();
    println!("{}", "  ╔════════════════════════════════════════════╗".cyan());
    println!(
        "{}",
        format!("  ║  🍍 Yuzu Early Access Updater v{:<11} ║", version)
            .cyan()
            .bold()
    );
    println!(
        "{}",
        format!("  ║  {:<42}║", format!("Source from {}", SOURCE_URL.trim_start_matches("https://")))
            .cyan()
            .dimmed()
    );
    println!("{}", "  ╚════════════════════════════════════════════╝".cyan());
    println!();
}

// ─── Messages ────────────────────────────────────────────────

pub fn print_success(msg: &str) {
    println!("  {}", msg.green().bold());
}

pub fn print_failure(msg: &str) {
    println!("  {} {}", "✖".red().bold(), msg.red());
}

pub fn print_notice(msg: &str) {
    println!("  {} {}", "⏳".yellow(), msg.yellow());
}

// ─── Archives ────────────────────────────────────────────────

pub fn print_archives(archives: &[ArchiveFile]) {
    if archives.is_empty() {
        println!("  {}", "No archives downloaded yet.".dimmed());
        return;
    }

    println!("\n{}", "  📦 Downloaded archives ─────────────────────".cyan());
    for archive in archives {
        println!(
            "     {} {:<36} {:>10}  {}",
            "•".dimmed(),
            archive.file_name().cyan(),
            human_size(archive.size),
            archive
                .modified_local()
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .dimmed()
        );
    }
    println!();
}

// ─── Progress Observer ───────────────────────────────────────

/// Renders update events: status lines above, a byte progress bar below.
pub struct TerminalObserver {
    bar: ProgressBar,
}

impl TerminalObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "  {bar:40.green/white} {msg:>8} {bytes}/{total_bytes}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("██░"),
        );
        Self { bar }
    }

    fn status(&self, line: String) {
        self.bar.suspend(|| println!("  {}", line));
    }
}

impl Drop for TerminalObserver {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl Default for TerminalObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateObserver for TerminalObserver {
    fn on_event(&self, event: UpdateEvent) {
        match &event {
            UpdateEvent::Progress(sample) => {
                if sample.bytes_total > 0 {
                    self.bar.set_length(sample.bytes_total);
                }
                self.bar.set_position(sample.bytes_done);
                self.bar.set_message(sample.percent_label());
            }
            UpdateEvent::Downloaded { .. } => {
                self.bar.finish_and_clear();
                if let Some(line) = event.format_status() {
                    self.status(line.green().bold().to_string());
                }
            }
            _ => {
                if let Some(line) = event.format_status() {
                    self.status(line);
                }
            }
        }
    }
}

// ─── Utility ─────────────────────────────────────────────────

/// Approximate visible character width ignoring ANSI sequences.
fn strip_ansi_len(s: &str) -> usize {
    let mut count = 0;
    let mut in_escape = false;
    for ch in s.chars() {
        if ch == '\x1b' {
            in_escape = true;
        } else if in_escape {
            if ch == 'm' {
                in_escape = false;
            }
        } else {
            count += 1;
        }
    }
    count
}
