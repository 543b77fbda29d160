//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use base64::Engine as _;
use chrono::NaiveDate;

/// Longest text Telegram accepts in a single message
pub const MESSAGE_LIMIT: usize = 4096;

/// Check that a value is a real calendar date written as `YYYY-MM-DD`
pub fn is_ymd_format(value: &str) -> bool {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        // Reject forms chrono tolerates but the canonical format does not, like `2024-1-5`
        Ok(date) => date.format("%Y-%m-%d").to_string() == value,
        Err(_) => false,
    }
}

/// Whether a text fits into one Telegram message
pub fn fits_message(text: &str) -> bool {
    text.chars().count() <= MESSAGE_LIMIT
}

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render rows as a left-aligned plain text table
pub fn text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_row(headers.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in rows {
        lines.push(format_row(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

/// Encode bytes as a `data:` URI
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Guess a MIME type from a Telegram file path
pub fn mime_from_path(path: &str) -> &'static str {
    let extension = path
        .rsplit('.')
        .next()
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
