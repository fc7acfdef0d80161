///! Output formatting for CLI
///!
///! Tables for people, JSON/YAML for scripts. Status lines go through the
///! `print_*` helpers so every command reports the same way.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Unknown names fall back to a table
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "yaml" | "yml" => OutputFormat::Yaml,
            _ => OutputFormat::Table,
        }
    }
}

/// Print rows in the requested format. Tables use the display row type,
/// JSON/YAML serialize the full records.
pub fn print_output<R, T>(rows: Vec<R>, records: &T, format: OutputFormat) -> anyhow::Result<()>
where
    R: Tabled,
    T: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => print_table(rows),
        OutputFormat::Json => print_json(records)?,
        OutputFormat::Yaml => print_yaml(records)?,
    }
    Ok(())
}

/// Print a single item; tables have no single-row form so JSON is used
pub fn print_single<T: Serialize>(data: &T, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table | OutputFormat::Json => print_json(data)?,
        OutputFormat::Yaml => print_yaml(data)?,
    }
    Ok(())
}

pub fn print_table<T: Tabled>(data: Vec<T>) {
    if data.is_empty() {
        println!("{}", "No results found".yellow());
        return;
    }

    let table = Table::new(data);
    println!("{}", table);
}

pub fn print_json<T: Serialize + ?Sized>(data: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{}", json);
    Ok(())
}

pub fn print_yaml<T: Serialize + ?Sized>(data: &T) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(data)?;
    print!("{}", yaml);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

pub fn print_created(resource_type: &str, name: &str, id: u64) {
    println!(
        "{} {} '{}' created (ID: {})",
        "✓".green().bold(),
        resource_type.green(),
        name.green().bold(),
        id.to_string().dimmed()
    );
}

pub fn print_deleted(resource_type: &str, id: u64) {
    println!(
        "{} {} '{}' deleted",
        "✓".green().bold(),
        resource_type.green(),
        id.to_string().green().bold()
    );
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Like `print_info` but on stderr, for commands whose stdout is consumed by the shell
pub fn print_hint(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Format a timestamp as relative time (e.g., "5m ago", "2h ago")
pub fn format_relative_time(timestamp: DateTime<Utc>) -> String {
    relative_to(timestamp, Utc::now())
}

fn relative_to(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - timestamp).num_seconds();

    if diff < 0 {
        let ahead = -diff;
        if ahead < 60 {
            format!("in {}s", ahead)
        } else if ahead < 3600 {
            format!("in {}m", ahead / 60)
        } else if ahead < 86400 {
            format!("in {}h", ahead / 3600)
        } else {
            format!("in {}d", ahead / 86400)
        }
    } else if diff < 60 {
        format!("{}s ago", diff)
    } else if diff < 3600 {
        format!("{}m ago", diff / 60)
    } else if diff < 86400 {
        format!("{}h ago", diff / 3600)
    } else {
        format!("{}d ago", diff / 86400)
    }
}

pub fn format_optional_time(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(format_relative_time)
        .unwrap_or_else(|| "-".to_string())
}

/// Truncate to `max_len` characters with an ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return s.chars().take(max_len).collect();
    }
    let head: String = s.chars().take(max_len - 3).collect();
    format!("{}...", head)
}
