//! Culture-sensitive formatting of property values.
//!
//! Numeric format strings follow the standard single-letter convention with an optional
//! precision: `F2` (fixed), `N0` (grouped), `D5` (zero padded), `X`/`x` (hex) and `P1` (percent).
//! Date-time format strings are `strftime` patterns. Unrecognised formats, precisions above
//! [`MAX_PRECISION`] and invalid `strftime` patterns fall back to the default rendering.

use std::fmt::{Debug, Write};

use chrono::{DateTime, FixedOffset};

/// Default date-time rendering: ISO-8601 with fractional seconds and offset.
const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// Largest precision accepted in a numeric format string.
pub const MAX_PRECISION: usize = u16::MAX as usize;

/// Formats scalar values when rendering messages and string columns.
///
/// Every method has a default implementation parameterised by [`FormatProvider::decimal_separator`]
/// and [`FormatProvider::group_separator`], so a provider typically only overrides those.
pub trait FormatProvider: Debug + Send + Sync {
    fn decimal_separator(&self) -> char {
        '.'
    }

    fn group_separator(&self) -> char {
        ','
    }

    fn format_signed(&self, value: i64, format: Option<&str>) -> String {
        format_integer(
            value.is_negative(),
            value.unsigned_abs(),
            format,
            self.decimal_separator(),
            self.group_separator(),
        )
    }

    fn format_unsigned(&self, value: u64, format: Option<&str>) -> String {
        format_integer(
            false,
            value,
            format,
            self.decimal_separator(),
            self.group_separator(),
        )
    }

    fn format_float(&self, value: f64, format: Option<&str>) -> String {
        format_float(
            value,
            format,
            self.decimal_separator(),
            self.group_separator(),
        )
    }

    fn format_datetime(&self, value: &DateTime<FixedOffset>, format: Option<&str>) -> String {
        format
            .filter(|f| f.contains('%'))
            .and_then(|pattern| format_datetime_pattern(value, pattern))
            .unwrap_or_else(|| value.format(DEFAULT_DATETIME_FORMAT).to_string())
    }
}

/// Culture-independent formatting: `.` decimal separator, `,` group separator.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvariantFormatProvider;

impl FormatProvider for InvariantFormatProvider {}

/// Formatting with caller-chosen separators, e.g. `CultureFormatProvider::new(',', '.')` for
/// most continental European locales.
#[derive(Debug, Clone)]
pub struct CultureFormatProvider {
    decimal_separator: char,
    group_separator: char,
    datetime_format: Option<String>,
}

impl CultureFormatProvider {
    pub fn new(decimal_separator: char, group_separator: char) -> Self {
        Self {
            decimal_separator,
            group_separator,
            datetime_format: None,
        }
    }

    /// Sets the `strftime` pattern used when a date-time is rendered without an explicit format.
    pub fn with_datetime_format(mut self, pattern: impl Into<String>) -> Self {
        self.datetime_format = Some(pattern.into());
        self
    }
}

impl FormatProvider for CultureFormatProvider {
    fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    fn group_separator(&self) -> char {
        self.group_separator
    }

    fn format_datetime(&self, value: &DateTime<FixedOffset>, format: Option<&str>) -> String {
        format
            .filter(|f| f.contains('%'))
            .and_then(|pattern| format_datetime_pattern(value, pattern))
            .or_else(|| {
                self.datetime_format
                    .as_deref()
                    .and_then(|pattern| format_datetime_pattern(value, pattern))
            })
            .unwrap_or_else(|| value.format(DEFAULT_DATETIME_FORMAT).to_string())
    }
}

/// Renders `value` with a `strftime` pattern, or `None` when chrono rejects the pattern.
fn format_datetime_pattern(value: &DateTime<FixedOffset>, pattern: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", value.format(pattern)).ok()?;
    Some(out)
}

/// Splits `N2` into `('N', Some(2))`. Returns `None` for anything that is not a standard
/// numeric format or the precision exceeds [`MAX_PRECISION`].
fn parse_numeric_format(format: &str) -> Option<(char, Option<usize>)> {
    let mut chars = format.chars();
    let specifier = chars.next()?;
    if !specifier.is_ascii_alphabetic() {
        return None;
    }

    let rest = chars.as_str();
    if rest.is_empty() {
        return Some((specifier, None));
    }

    rest.parse::<usize>()
        .ok()
        .filter(|precision| *precision <= MAX_PRECISION)
        .map(|precision| (specifier, Some(precision)))
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(digit);
    }
    grouped
}

fn format_fixed(
    value: f64,
    decimals: usize,
    grouped: bool,
    decimal_separator: char,
    group_separator: char,
) -> String {
    let rendered = format!("{:.*}", decimals, value.abs());
    let (integer_part, fraction_part) = match rendered.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (rendered.as_str(), None),
    };

    let mut out = String::with_capacity(rendered.len() + 4);
    if value.is_sign_negative() && rendered.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        out.push('-');
    }

    if grouped {
        out.push_str(&group_digits(integer_part, group_separator));
    } else {
        out.push_str(integer_part);
    }

    if let Some(fraction) = fraction_part {
        out.push(decimal_separator);
        out.push_str(fraction);
    }

    out
}

fn format_integer(
    negative: bool,
    magnitude: u64,
    format: Option<&str>,
    decimal_separator: char,
    group_separator: char,
) -> String {
    let sign = if negative { "-" } else { "" };

    let Some((specifier, precision)) = format.and_then(parse_numeric_format) else {
        return format!("{sign}{magnitude}");
    };

    match specifier {
        'D' | 'd' => {
            let width = precision.unwrap_or(0);
            format!("{sign}{magnitude:0width$}")
        }
        'X' => format!("{magnitude:0width$X}", width = precision.unwrap_or(0)),
        'x' => format!("{magnitude:0width$x}", width = precision.unwrap_or(0)),
        'N' | 'n' | 'F' | 'f' | 'P' | 'p' => {
            let value = if negative {
                -(magnitude as f64)
            } else {
                magnitude as f64
            };
            format_float(
                value,
                format,
                decimal_separator,
                group_separator,
            )
        }
        _ => format!("{sign}{magnitude}"),
    }
}

fn format_float(
    value: f64,
    format: Option<&str>,
    decimal_separator: char,
    group_separator: char,
) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }

    match format.and_then(parse_numeric_format) {
        Some(('F' | 'f', precision)) => format_fixed(
            value,
            precision.unwrap_or(2),
            false,
            decimal_separator,
            group_separator,
        ),
        Some(('N' | 'n', precision)) => format_fixed(
            value,
            precision.unwrap_or(2),
            true,
            decimal_separator,
            group_separator,
        ),
        Some(('P' | 'p', precision)) => {
            let percent = format_fixed(
                value * 100.0,
                precision.unwrap_or(2),
                true,
                decimal_separator,
                group_separator,
            );
            format!("{percent} %")
        }
        _ => {
            let rendered = value.to_string();
            if decimal_separator == '.' {
                rendered
            } else {
                rendered.replace('.', &decimal_separator.to_string())
            }
        }
    }
}
