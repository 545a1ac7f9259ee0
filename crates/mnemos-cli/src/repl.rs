//! REPL – Read-Eval-Print Loop for the mnemos interactive shell.
//!
//! Supported slash-commands:
//!   /add [--type T] [--source S] [--importance N] [--tags a,b] <text>
//!   /search [--type T] [--source S] [--limit N] [--threshold F] <text>
//!   /context [--source S] <text>
//!   /list         – every stored memory, oldest first
//!   /stats        – counts by type and source
//!   /clear        – forget everything (asks for confirmation)
//!   /help         – show this list
//!   /quit | /exit – leave the shell
//!
//! Options come first; the text starts at the first word that is not an
//! option (or after a bare `--`) and is kept exactly as typed.
//!
//! A line without a leading slash is treated as `/context <line>`.

use std::collections::HashMap;

use colored::Colorize;
use mnemos_memory::SemanticMemory;
use mnemos_types::{
    MAX_IMPORTANCE, MIN_IMPORTANCE, MemoryEntry, MemoryQuery, MemoryType, MetadataPatch,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::runtime::Runtime;

use crate::config::Config;

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Add {
        content: String,
        metadata: MetadataPatch,
    },
    Search(MemoryQuery),
    Context {
        text: String,
        source: Option<String>,
    },
    List,
    Stats,
    Clear,
    Quit,
}

/// Entry point for the interactive REPL.  Returns when the user quits or
/// input ends.
pub fn run(runtime: &Runtime, memory: &SemanticMemory, cfg: &Config) {
    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start line editor".red(), e);
            return;
        }
    };
    let prompt = format!("{} ", "mnemos>".bold().cyan());

    loop {
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        let command = match parse_command(&line, cfg) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(msg) => {
                println!("{} {}", "Error:".red(), msg);
                continue;
            }
        };

        match command {
            Command::Help => cmd_help(),
            Command::Add { content, metadata } => {
                let id = runtime.block_on(memory.add_memory(content, metadata));
                match runtime.block_on(memory.get_entry(&id)) {
                    Some(_) => println!("{} {}", "✓ Remembered as".green(), id.to_string().dimmed()),
                    None => println!(
                        "{}",
                        "Memory is full of more important entries; the new entry was not kept."
                            .yellow()
                    ),
                }
            }
            Command::Search(query) => {
                let results = runtime.block_on(memory.search_memory(&query));
                if results.is_empty() {
                    println!("{}", "No matches.".dimmed());
                }
                for (rank, r) in results.iter().enumerate() {
                    println!(
                        "  {:>2}. {:>5.1}%  {}",
                        rank + 1,
                        r.similarity * 100.0,
                        describe(&r.entry)
                    );
                }
            }
            Command::Context { text, source } => {
                let ctx = runtime.block_on(memory.get_relevant_context(&text, source.as_deref()));
                println!("{ctx}");
            }
            Command::List => {
                let entries = runtime.block_on(memory.list_entries());
                if entries.is_empty() {
                    println!("{}", "Memory is empty.".dimmed());
                }
                for e in &entries {
                    println!("  {}", describe(e));
                }
            }
            Command::Stats => cmd_stats(runtime, memory),
            Command::Clear => {
                let answer = editor
                    .readline("  Forget every memory? [y/N]: ")
                    .unwrap_or_default();
                if answer.trim().eq_ignore_ascii_case("y") {
                    runtime.block_on(memory.clear_memory());
                    println!("{}", "✓ Memory cleared.".green());
                } else {
                    println!("{}", "Cancelled.".dimmed());
                }
            }
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                break;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse one input line.  Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str, cfg: &Config) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Context {
            text: line.to_string(),
            source: None,
        }));
    }

    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let command = match name {
        "/help" => Command::Help,
        "/list" => Command::List,
        "/stats" => Command::Stats,
        "/clear" => Command::Clear,
        "/quit" | "/exit" => Command::Quit,
        "/add" => {
            let (flags, content) = split_flags(rest, &["type", "source", "importance", "tags"])?;
            let mut metadata = MetadataPatch::new().with_source(
                flags
                    .get("source")
                    .cloned()
                    .unwrap_or_else(|| cfg.default_source.clone()),
            );
            if let Some(t) = flags.get("type") {
                metadata = metadata.with_type(parse_type(t)?);
            }
            if let Some(i) = flags.get("importance") {
                metadata = metadata.with_importance(parse_importance(i)?);
            }
            if let Some(tags) = flags.get("tags") {
                metadata = metadata.with_tags(
                    tags.split(',').map(str::trim).filter(|t| !t.is_empty()),
                );
            }
            Command::Add { content, metadata }
        }
        "/search" => {
            let (flags, text) = split_flags(rest, &["type", "source", "limit", "threshold"])?;
            let mut query = MemoryQuery::new(text)
                .with_limit(cfg.search_limit)
                .with_threshold(cfg.search_threshold);
            if let Some(t) = flags.get("type") {
                query = query.with_type(parse_type(t)?);
            }
            if let Some(s) = flags.get("source") {
                query = query.with_source(s.clone());
            }
            if let Some(l) = flags.get("limit") {
                query = query.with_limit(
                    l.parse()
                        .map_err(|_| format!("'{l}' is not a valid limit"))?,
                );
            }
            if let Some(t) = flags.get("threshold") {
                query = query.with_threshold(
                    t.parse()
                        .map_err(|_| format!("'{t}' is not a valid threshold"))?,
                );
            }
            Command::Search(query)
        }
        "/context" => {
            let (mut flags, text) = split_flags(rest, &["source"])?;
            Command::Context {
                text,
                source: flags.remove("source"),
            }
        }
        other => {
            return Err(format!(
                "Unknown command '{other}'. Type /help for available commands."
            ));
        }
    };
    Ok(Some(command))
}

/// Split leading `--name value` pairs off `args`.  Option parsing stops at
/// the first word that does not start with `--`, or after a bare `--`; the
/// rest of the line is returned verbatim and must not be empty.
fn split_flags(args: &str, allowed: &[&str]) -> Result<(HashMap<String, String>, String), String> {
    let mut flags = HashMap::new();
    let mut rest = args.trim_start();
    loop {
        let (token, after) = next_word(rest);
        if token == "--" {
            rest = after.trim_start();
            break;
        }
        let Some(name) = token.strip_prefix("--") else {
            break;
        };
        if !allowed.contains(&name) {
            return Err(format!("unknown option --{name}"));
        }
        let (value, after) = next_word(after.trim_start());
        if value.is_empty() {
            return Err(format!("--{name} expects a value"));
        }
        flags.insert(name.to_string(), value.to_string());
        rest = after.trim_start();
    }
    if rest.is_empty() {
        return Err("missing text".to_string());
    }
    Ok((flags, rest.to_string()))
}

fn next_word(s: &str) -> (&str, &str) {
    s.split_once(char::is_whitespace).unwrap_or((s, ""))
}

fn parse_importance(raw: &str) -> Result<u8, String> {
    raw.parse::<u8>()
        .ok()
        .filter(|i| (MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(i))
        .ok_or_else(|| {
            format!("'{raw}' is not a valid importance ({MIN_IMPORTANCE}-{MAX_IMPORTANCE})")
        })
}

fn parse_type(raw: &str) -> Result<MemoryType, String> {
    raw.parse::<MemoryType>().map_err(|e| e.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Output helpers
// ─────────────────────────────────────────────────────────────────────────────

fn describe(entry: &MemoryEntry) -> String {
    let meta = &entry.metadata;
    let tags = if meta.tags.is_empty() {
        String::new()
    } else {
        format!(" #{}", meta.tags.join(" #"))
    };
    format!(
        "{} {} {}{}",
        format!("[{}]", meta.memory_type).yellow(),
        entry.content,
        format!(
            "({} · importance {} · {})",
            meta.source,
            meta.importance,
            meta.timestamp.format("%Y-%m-%d %H:%M")
        )
        .dimmed(),
        tags.cyan()
    )
}

fn cmd_help() {
    println!();
    println!("{}", "mnemos Commands".bold().underline());
    println!("  {}      – remember text", "/add [--type T] [--source S] [--importance N] [--tags a,b] <text>".bold().cyan());
    println!("  {}   – ranked matches", "/search [--type T] [--source S] [--limit N] [--threshold F] <text>".bold().cyan());
    println!("  {}  – context blob for a query", "/context [--source S] <text>".bold().cyan());
    println!("  {}         – every stored memory", "/list".bold().cyan());
    println!("  {}        – counts by type and source", "/stats".bold().cyan());
    println!("  {}        – forget everything", "/clear".bold().cyan());
    println!("  {}  – exit", "/quit  /exit".bold().cyan());
    println!("  Types: conversation, knowledge, context, user_preference");
    println!();
}

fn cmd_stats(runtime: &Runtime, memory: &SemanticMemory) {
    let stats = runtime.block_on(memory.get_stats());
    println!("{}", "Memory Statistics".bold().underline());
    println!("  Total entries : {}", stats.total_entries.to_string().yellow());
    if !stats.by_type.is_empty() {
        println!("  By type:");
        for (t, n) in &stats.by_type {
            println!("    {:<16} {}", t.to_string(), n);
        }
    }
    if !stats.by_source.is_empty() {
        println!("  By source:");
        for (s, n) in &stats.by_source {
            println!("    {:<16} {}", s, n);
        }
    }
}
