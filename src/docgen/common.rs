//! Common utilities for document generation.
//!
//! Shared helpers for date display formatting and filename slugs.

use chrono::{Local, NaiveDate};

/// Reformat an ISO `YYYY-MM-DD` date for display as `DD/MM/YYYY`.
///
/// An empty or unparseable input renders as an empty string so a missing
/// optional date never aborts a fill.
pub fn format_display_date(iso: &str) -> String {
    let trimmed = iso.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => date.format("%d/%m/%Y").to_string(),
        Err(_) => String::new(),
    }
}

/// Current date in display format.
pub fn today_display_date() -> String {
    Local::now().date_naive().format("%d/%m/%Y").to_string()
}

/// Short, stable identifier fragment used in filenames and letterheads.
pub fn short_ref(id: uuid::Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Sanitize a string for use in filenames.
pub fn slugify(name: &str, fallback: &str) -> String {
    let mut result = String::new();
    let mut last_dash = false;

    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                result.push(lower);
            }
            last_dash = false;
        } else if ch.is_whitespace() || ch == '-' || ch == '_' || ch == '\'' {
            if !last_dash && !result.is_empty() {
                result.push('-');
                last_dash = true;
            }
        }
    }

    let trimmed = result.trim_matches('-');
    if trimmed.is_empty() {
        return fallback.to_string();
    }

    trimmed.to_string()
}
