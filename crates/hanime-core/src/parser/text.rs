//! Text and number helpers shared by the page parsers
//!
//! Everything here is lenient: text that cannot be understood yields `None`
//! rather than an error.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d,.]*)\s*(萬|万|億|亿|[kKmM][a-zA-Z]*)?").expect("count regex")
});
static DOT_GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:\.\d{3})+$").expect("dot grouped regex"));
static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}):(\d{2})(?::(\d{2}))?").expect("clock regex")
});
static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.\d+)?S)?)?$")
        .expect("iso duration regex")
});
static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})").expect("date regex")
});

/// Collapses runs of whitespace (including NBSP) into single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a view/result count
///
/// Handles thousand separators (`12,345`, `12.345`), decimal values with
/// CJK or Latin multipliers (`9.7萬`, `9.7万`, `1.2k`, `3M`) and trailing
/// words (`97000次`, `1,234 views`).
pub fn parse_count(text: &str) -> Option<u64> {
    let caps = COUNT.captures(text)?;
    let number = caps.get(1)?.as_str().trim_end_matches(['.', ',']);
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("萬") | Some("万") => 10_000.0,
        Some("億") | Some("亿") => 100_000_000.0,
        Some("k") | Some("K") => 1_000.0,
        Some("m") | Some("M") => 1_000_000.0,
        // "min", "mb", ... are not multipliers
        _ => 1.0,
    };

    let normalized = if multiplier == 1.0 && DOT_GROUPED.is_match(number) {
        number.replace('.', "")
    } else {
        number.replace(',', "")
    };

    // Plain integers stay exact beyond f64's 53-bit mantissa
    if multiplier == 1.0 && !normalized.contains('.') {
        return normalized.parse().ok();
    }

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * multiplier).round() as u64)
}

/// Parses a clock-style duration (`mm:ss` or `h:mm:ss`) into seconds
pub fn parse_duration(text: &str) -> Option<u32> {
    let caps = CLOCK.captures(text)?;
    let first: u32 = caps.get(1)?.as_str().parse().ok()?;
    let second: u32 = caps.get(2)?.as_str().parse().ok()?;

    match caps.get(3) {
        Some(third) => {
            let third: u32 = third.as_str().parse().ok()?;
            if second >= 60 || third >= 60 {
                return None;
            }
            Some(first * 3600 + second * 60 + third)
        }
        None => {
            if second >= 60 {
                return None;
            }
            Some(first * 60 + second)
        }
    }
}

/// True when the whole text is a clock-style duration
pub fn is_duration(text: &str) -> bool {
    let text = text.trim();
    CLOCK
        .find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
        && parse_duration(text).is_some()
}

/// Parses an ISO-8601 duration such as `PT1H2M3S` into seconds
pub fn parse_iso_duration(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.len() < 2 {
        return None;
    }
    let caps = ISO_DURATION.captures(text)?;
    let part = |i: usize| -> Option<u32> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
    };

    let days = part(1)?;
    let hours = part(2)?;
    let minutes = part(3)?;
    let seconds = part(4)?;
    if (1..=4).all(|i| caps.get(i).is_none()) {
        return None;
    }
    let total = u64::from(days) * 86_400
        + u64::from(hours) * 3600
        + u64::from(minutes) * 60
        + u64::from(seconds);
    u32::try_from(total).ok()
}

/// Finds the first `YYYY-MM-DD` style date (also `/` or `.` separated)
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let caps = DATE.captures(text)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let day = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
