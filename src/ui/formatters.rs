use colored::{ColoredString, Colorize};
use humansize::{format_size, BINARY};

/// Byte count in binary units (KiB, MiB, ...).
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

pub fn format_rate(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

pub fn format_percent(value: f64) -> String {
    format!("{:5.1}%", value)
}

/// Color a value by load: red at 85% and above, yellow at 70%.
pub fn load_color(text: String, percent: f64) -> ColoredString {
    if percent >= 85.0 {
        text.red()
    } else if percent >= 70.0 {
        text.yellow()
    } else {
        text.green()
    }
}

/// `[████░░░░]` style usage bar.
pub fn usage_bar(percent: f64, width: usize) -> String {
    let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 0.0 };
    let filled = ((percent / 100.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(empty));
    format!("[{}]", load_color(bar, percent))
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}
