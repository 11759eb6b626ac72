//! Exports command implementation.

use anyhow::Result;
use std::path::Path;
use time::format_description;

use essaychat::config;
use essaychat::export::{self, ledger};

use crate::ExportsAction;

pub fn run(action: Option<ExportsAction>) -> Result<()> {
    match action {
        None | Some(ExportsAction::List) => list_exports(),
        Some(ExportsAction::Show { path }) => show_log(&path),
    }
}

/// List all published chat logs in plain text
fn list_exports() -> Result<()> {
    let records = ledger::load_records(&config::ledger_path()?)?;

    if records.is_empty() {
        println!("No exports found.");
        return Ok(());
    }

    let format = format_description::parse("[year]-[month]-[day] [hour]:[minute]")?;

    for record in records {
        let exported = record.exported_at.format(&format).unwrap_or_default();
        println!(
            "{} {} ({} rows) - {}",
            exported, record.email, record.rows, record.public_url
        );
    }

    Ok(())
}

/// Print a chat log the way the chat shows it
fn show_log(path: &Path) -> Result<()> {
    let rows = export::read_csv(path)?;
    for row in rows {
        let gap = row
            .response_time
            .map(|secs| format!(" (+{secs}s)"))
            .unwrap_or_default();
        println!(
            "[{} {}] {}{}: {}",
            row.date,
            row.time,
            row.role.display_name(),
            gap,
            row.content
        );
    }
    Ok(())
}
