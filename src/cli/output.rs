//! Output formatting helpers for CLI commands

use crate::bulk::BulkOutcome;
use crate::paging::Page;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::{json, Value};

/// First present, non-null field among `keys`, rendered for a table cell.
fn cell_text(row: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .find(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "-".to_string())
}

fn colored_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "active" | "enabled" | "online" => status.green().to_string(),
        "disabled" | "expired" | "offline" => status.red().to_string(),
        "limited" | "on_hold" => status.yellow().to_string(),
        _ => status.to_string(),
    }
}

/// Format one page of users as a table with a navigation footer
pub fn format_users_table(page: &Page<Value>) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Username", "Status", "Created"]);

    for row in &page.items {
        table.add_row(vec![
            Cell::new(cell_text(row, &["id"])),
            Cell::new(cell_text(row, &["username", "name", "email"])),
            Cell::new(colored_status(&cell_text(row, &["status"]))),
            Cell::new(cell_text(row, &["created_at", "created"])),
        ]);
    }

    format!(
        "{}\nPage {} of {} ({} users)",
        table,
        page.page,
        page.total_pages.max(1),
        page.total
    )
}

/// Format one page of users as JSON
pub fn format_users_json(page: &Page<Value>) -> String {
    serde_json::to_string_pretty(page).unwrap_or_else(|_| json!({"items": []}).to_string())
}

/// Summarize an accepted bulk action
pub fn format_bulk_outcome(outcome: &BulkOutcome) -> String {
    let mut out = format!(
        "{} {} applied to {} user(s): {}",
        "✓".green(),
        outcome.action,
        outcome.ids.len(),
        outcome.ids.join(", ")
    );
    if let Some(ref e) = outcome.refresh_error {
        out.push_str(&format!("\n{} listing refresh failed: {}", "!".yellow(), e));
    }
    out
}
