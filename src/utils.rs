//! Small helpers for text cleanup, log previews and retry timing.

use once_cell::sync::Lazy;
use rand::{Rng, rng};
use regex::Regex;
use std::time::Duration;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Longest delay [`backoff_delay`] will ever return, before jitter.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Trim a scraped string and collapse internal whitespace runs to one space.
///
/// ```ignore
/// assert_eq!(clean_text("  Guvernul \n\t a aprobat "), "Guvernul a aprobat");
/// ```
pub fn clean_text(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (backing off to a char boundary) with
/// `"…(+N bytes)"` appended.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Exponential backoff for retry `attempt` (1-based) with 0-250ms of jitter.
///
/// ```text
/// delay = min(base * 2^(attempt-1), MAX_BACKOFF) + random_jitter(0..250ms)
/// ```
pub fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    let delay = base.saturating_mul(1 << shift).min(MAX_BACKOFF);
    let jitter_ms: u64 = rng().random_range(0..=250);
    delay + Duration::from_millis(jitter_ms)
}
