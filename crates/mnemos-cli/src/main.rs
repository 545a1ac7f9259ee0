//! `mnemos` – interactive shell over the semantic memory store.
//!
//! This binary is the composition root for the store.  It:
//!
//! 1. Initialises logging (see [`telemetry`]).
//! 2. Loads `~/.mnemos/config.toml`, writing defaults on first run, then
//!    applies `MNEMOS_*` environment overrides.
//! 3. Opens the SQLite snapshot database and restores the stored memories.
//! 4. Drops the user into an interactive REPL (`/add`, `/search`,
//!    `/context`, `/list`, `/stats`, `/clear`, `/help`).

mod config;
mod repl;
mod telemetry;

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use mnemos_memory::{InMemoryBackend, SemanticMemory, SqliteBackend, StorageBackend};
use tracing::{error, info, warn};

fn main() {
    let _guard = telemetry::init_tracing("mnemos");

    print_banner();

    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_setup(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            std::process::exit(1);
        }
    };

    let db_path = cfg.resolved_database_path(&config::config_dir());
    let backend = open_backend(&db_path);
    let memory = runtime.block_on(SemanticMemory::open(backend, cfg.memory_config()));

    let count = runtime.block_on(memory.len());
    println!(
        "  {} memories restored (capacity {}).",
        count.to_string().bold(),
        cfg.capacity
    );
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(&runtime, &memory, &cfg);
}

/// Open the SQLite snapshot database, falling back to a process-local
/// backend (nothing survives a restart) when it cannot be opened.
fn open_backend(path: &Path) -> Arc<dyn StorageBackend> {
    if let Some(parent) = path.parent()
        && let Err(e) = config::ensure_private_dir(parent)
    {
        warn!(error = %e, "could not prepare database directory");
    }
    match SqliteBackend::open(path) {
        Ok(backend) => {
            info!(path = %path.display(), "snapshot database opened");
            Arc::new(backend)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "snapshot database unavailable; memories will not persist");
            println!(
                "  {} {}",
                "Warning:".yellow(),
                "database unavailable, running without persistence.".dimmed()
            );
            Arc::new(InMemoryBackend::new())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-run setup
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_setup() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║         mnemos First-Run Setup       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up mnemos.\n");

    let mut cfg = config::Config::default();

    let capacity = prompt_line(
        &format!("  Maximum memories to keep [{}]: ", cfg.capacity),
        &cfg.capacity.to_string(),
    );
    match capacity.parse::<usize>() {
        Ok(n) if n > 0 => cfg.capacity = n,
        _ => println!(
            "  {} '{}' is not a valid capacity, keeping {}",
            "Warning:".yellow(),
            capacity,
            cfg.capacity
        ),
    }

    let source = prompt_line(
        &format!("  Default source label [{}]: ", cfg.default_source),
        &cfg.default_source,
    );
    cfg.default_source = source;

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____ ___  ____  ___  ____ ___  ____  _____"#.bold().cyan());
    println!("{}", r#"  / __ `__ \/ __ \/ _ \/ __ `__ \/ __ \/ ___/"#.bold().cyan());
    println!("{}", r#" / / / / / / / / /  __/ / / / / / /_/ (__  ) "#.bold().cyan());
    println!("{}", r#"/_/ /_/ /_/_/ /_/\___/_/ /_/ /_/\____/____/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "mnemos".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Semantic memory store");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
