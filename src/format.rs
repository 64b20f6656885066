//! Human-readable size formatting for display.
//!
//! Raw byte counts are the wire contract; these strings only ever reach the
//! user. Units are binary (1024 base) and capped at GB.

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count as `"<value> <unit>"` with at most two decimals.
///
/// Trailing zeros are dropped, so `1024` is `"1 KB"` and `1536` is `"1.5 KB"`.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exp = 0usize;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && exp < UNITS.len() - 1 {
        scaled /= 1024.0;
        exp += 1;
    }

    format!("{} {}", trim_decimals(scaled), UNITS[exp])
}

/// Round to two decimals and strip trailing zeros (`2.50` → `2.5`, `3.00` → `3`).
fn trim_decimals(value: f64) -> String {
    let s = format!("{value:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}
