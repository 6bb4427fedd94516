//! Tolerant parsing of rates scraped from upstream pages

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a rate such as `"4,9752"`, `"4.9752 RON"` or `"€ 1.234,50"`
///
/// Currency symbols and other non-numeric characters are stripped; either
/// `,` or `.` is accepted as the decimal separator (the rightmost one wins
/// when both appear). Returns `None` unless the value is strictly positive.
pub fn parse_rate(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = normalize_separators(&cleaned);
    let value = Decimal::from_str(&normalized).ok()?;

    if value > Decimal::ZERO {
        Some(value.normalize())
    } else {
        None
    }
}

fn normalize_separators(s: &str) -> String {
    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');

    let decimal_sep = match (last_comma, last_dot) {
        (Some(c), Some(d)) => Some(if c > d { ',' } else { '.' }),
        (Some(_), None) if s.matches(',').count() == 1 => Some(','),
        (None, Some(_)) if s.matches('.').count() == 1 => Some('.'),
        _ => None,
    };

    let mut out = String::with_capacity(s.len());
    let decimal_pos = decimal_sep.and_then(|sep| s.rfind(sep));
    for (i, c) in s.char_indices() {
        match c {
            ',' | '.' if Some(i) == decimal_pos => out.push('.'),
            ',' | '.' => {}
            other => out.push(other),
        }
    }
    out
}
