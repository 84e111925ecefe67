//! Text ↔ number codec for editable cells.
//!
//! Cell values are kept as sanitized strings so that partially typed input
//! (`"12."`) survives re-rendering. Every function here is total: malformed
//! input is clamped or coerced, never rejected.

/// Decimal separator accepted in editable values.
pub const DECIMAL_SEPARATOR: char = '.';
/// Grouping separator used by [`format`] and ignored on input.
pub const GROUP_SEPARATOR: char = ',';

/// Strips `raw` down to digits and at most one decimal separator.
///
/// Fractional digits beyond `max_decimals` are truncated. Empty input stays
/// empty so fields can render blank.
///
/// # Examples
///
/// ```rust
/// use engine::numeric::sanitize;
///
/// assert_eq!(sanitize("1,234.567", 2), "1234.56");
/// assert_eq!(sanitize("12.", 2), "12.");
/// assert_eq!(sanitize("abc", 2), "");
/// assert_eq!(sanitize("7.5", 0), "7");
/// ```
pub fn sanitize(raw: &str, max_decimals: usize) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut seen_separator = false;
    let mut fraction_digits = 0usize;

    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            if seen_separator {
                if fraction_digits >= max_decimals {
                    continue;
                }
                fraction_digits += 1;
            }
            out.push(ch);
        } else if ch == DECIMAL_SEPARATOR && !seen_separator {
            seen_separator = true;
            if max_decimals == 0 {
                continue;
            }
            if out.is_empty() {
                out.push('0');
            }
            out.push(ch);
        }
    }

    out
}

/// Like [`sanitize`] but keeps a leading minus sign.
///
/// Used for amounts that come from the planning service and for edits of a
/// cell that already holds one; operators cannot introduce a sign.
pub fn sanitize_signed(raw: &str, max_decimals: usize) -> String {
    match raw.trim_start().strip_prefix('-') {
        Some(rest) => {
            let magnitude = sanitize(rest, max_decimals);
            if magnitude.is_empty() {
                magnitude
            } else {
                format!("-{magnitude}")
            }
        }
        None => sanitize(raw, max_decimals),
    }
}

/// Parses a cell value; anything unparsable or non-finite is `0`.
pub fn to_number(value: &str) -> f64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != GROUP_SEPARATOR).collect();
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Whether the value carries data (including an explicit zero).
pub fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Whether the value is present and numerically non-zero.
pub fn is_significant(value: &str) -> bool {
    is_present(value) && to_number(value) != 0.0
}

/// Formats `value` with grouping and at most `max_fraction_digits` digits.
///
/// Trailing fractional zeros are trimmed. Display only; editable fields keep
/// their raw string.
///
/// ```rust
/// use engine::numeric::format;
///
/// assert_eq!(format(1234567.891, 2), "1,234,567.89");
/// assert_eq!(format(41.25, 2), "41.25");
/// assert_eq!(format(10.0, 2), "10");
/// ```
pub fn format(value: f64, max_fraction_digits: usize) -> String {
    render(value, max_fraction_digits, true)
}

/// Like [`format`] but always prints exactly `fraction_digits` digits.
pub fn format_fixed(value: f64, fraction_digits: usize) -> String {
    render(value, fraction_digits, false)
}

fn render(value: f64, digits: usize, trim: bool) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let digits = digits.min(9);
    let pow = 10u128.pow(digits as u32);
    let scaled = (value.abs() * pow as f64).round();
    if scaled >= u128::MAX as f64 {
        return format!("{value:.digits$}");
    }
    let scaled = scaled as u128;
    let int_part = scaled / pow;
    let frac_part = scaled % pow;

    let mut out = String::new();
    if value < 0.0 && scaled != 0 {
        out.push('-');
    }
    out.push_str(&group_digits(int_part));

    if digits > 0 {
        let mut frac = format!("{frac_part:0digits$}");
        if trim {
            while frac.ends_with('0') {
                frac.pop();
            }
        }
        if !frac.is_empty() {
            out.push(DECIMAL_SEPARATOR);
            out.push_str(&frac);
        }
    }
    out
}

fn group_digits(n: u128) -> String {
    let raw = n.to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (idx, ch) in raw.chars().enumerate() {
        if idx > 0 && (raw.len() - idx) % 3 == 0 {
            out.push(GROUP_SEPARATOR);
        }
        out.push(ch);
    }
    out
}
