use chrono::{DateTime, FixedOffset};
use tracing::warn;
use uuid::Uuid;

use crate::bail;
use crate::columns::ColumnValue;
use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;

// ── RowBinaryWithDefaults encoding ───────────────────────────────────────────
//
// Rows are written as raw bytes through `Client::insert_formatted_with` instead of the
// typed `Row` / `Inserter` API, since the column set is only known at runtime.
//
// Every column starts with a flag byte: 1 tells the server to use the column default and
// nothing else follows, 0 means a value follows. `Nullable(T)` values then carry their
// own null byte.

/// On-the-wire representation of a ClickHouse column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WireType {
    /// `String`, and `JSON` sent as text.
    String,
    FixedString(usize),
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Days since Unix epoch as UInt16.
    Date,
    /// Days since Unix epoch as Int32.
    Date32,
    /// Seconds since Unix epoch as UInt32.
    DateTime,
    /// Ticks of `10^-precision` seconds since Unix epoch as Int64.
    DateTime64(u32),
    Uuid,
    Nullable(Box<WireType>),
}

fn unwrap_type<'a>(column_type: &'a str, wrapper: &str) -> Option<&'a str> {
    column_type
        .strip_prefix(wrapper)?
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

/// Clauses that may follow the data type in a column definition.
const DEFINITION_CLAUSES: &[&str] = &[
    "DEFAULT",
    "MATERIALIZED",
    "EPHEMERAL",
    "ALIAS",
    "CODEC",
    "TTL",
    "COMMENT",
];

/// Returns the data type of a column definition, e.g. `String` for `String DEFAULT 'none'`.
fn definition_data_type(definition: &str) -> &str {
    let mut depth = 0usize;
    let mut in_quote = false;

    for (index, ch) in definition.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 && !in_quote => {
                let keyword = definition[index..]
                    .trim_start()
                    .split(|c: char| !c.is_ascii_alphabetic())
                    .next()
                    .unwrap_or_default();
                if DEFINITION_CLAUSES
                    .iter()
                    .any(|clause| clause.eq_ignore_ascii_case(keyword))
                {
                    return definition[..index].trim();
                }
            }
            _ => {}
        }
    }

    definition.trim()
}

/// Parses a declared ClickHouse type. `LowCardinality` is transparent and trailing
/// column-definition clauses (`DEFAULT ...`, `CODEC(...)`) are ignored.
pub(crate) fn parse_wire_type(column_type: &str) -> SinkResult<WireType> {
    let column_type = definition_data_type(column_type);

    if let Some(inner) = unwrap_type(column_type, "LowCardinality") {
        return parse_wire_type(inner);
    }

    if let Some(inner) = unwrap_type(column_type, "Nullable") {
        let inner = parse_wire_type(inner)?;
        if matches!(inner, WireType::Nullable(_)) {
            bail!(
                ErrorKind::UnsupportedValueInDestination,
                "Nested Nullable types are not supported",
                column_type.to_string()
            );
        }
        return Ok(WireType::Nullable(Box::new(inner)));
    }

    if let Some(length) = unwrap_type(column_type, "FixedString") {
        let length = length.parse::<usize>().map_err(|_| {
            sink_error!(
                ErrorKind::UnsupportedValueInDestination,
                "Invalid FixedString length",
                column_type.to_string()
            )
        })?;
        return Ok(WireType::FixedString(length));
    }

    if let Some(arguments) = unwrap_type(column_type, "DateTime64") {
        let precision = arguments
            .split(',')
            .next()
            .and_then(|precision| precision.trim().parse::<u32>().ok())
            .filter(|precision| *precision <= 9)
            .ok_or_else(|| {
                sink_error!(
                    ErrorKind::UnsupportedValueInDestination,
                    "Invalid DateTime64 precision",
                    column_type.to_string()
                )
            })?;
        return Ok(WireType::DateTime64(precision));
    }

    if unwrap_type(column_type, "DateTime").is_some() {
        return Ok(WireType::DateTime);
    }

    if unwrap_type(column_type, "JSON").is_some() || unwrap_type(column_type, "Object").is_some()
    {
        return Ok(WireType::String);
    }

    let wire_type = match column_type {
        "String" | "JSON" => WireType::String,
        "Bool" | "Boolean" => WireType::Bool,
        "Int8" => WireType::Int8,
        "Int16" => WireType::Int16,
        "Int32" => WireType::Int32,
        "Int64" => WireType::Int64,
        "UInt8" => WireType::UInt8,
        "UInt16" => WireType::UInt16,
        "UInt32" => WireType::UInt32,
        "UInt64" => WireType::UInt64,
        "Float32" => WireType::Float32,
        "Float64" => WireType::Float64,
        "Date" => WireType::Date,
        "Date32" => WireType::Date32,
        "DateTime" => WireType::DateTime,
        "DateTime64" => WireType::DateTime64(3),
        "UUID" => WireType::Uuid,
        other => bail!(
            ErrorKind::UnsupportedValueInDestination,
            "Unsupported ClickHouse column type",
            format!("`{other}` cannot be written by this sink")
        ),
    };

    Ok(wire_type)
}

/// A column of an insert, with its resolved wire type.
#[derive(Debug, Clone)]
pub(crate) struct EncodedColumn {
    pub(crate) name: String,
    pub(crate) wire_type: WireType,
}

/// Encodes a variable-length integer (LEB128) used by ClickHouse for string lengths.
pub(crate) fn rb_varint(mut v: usize, buf: &mut Vec<u8>) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn conversion_error(value: &ColumnValue, wire_type: &WireType) -> crate::error::SinkError {
    sink_error!(
        ErrorKind::ConversionError,
        "Value cannot be converted to the column type",
        format!("{value:?} is not representable as {wire_type:?}")
    )
}

fn as_integer(value: &ColumnValue) -> Option<i128> {
    match value {
        ColumnValue::Bool(v) => Some(i128::from(*v)),
        ColumnValue::UInt8(v) => Some(i128::from(*v)),
        ColumnValue::Int64(v) => Some(i128::from(*v)),
        ColumnValue::UInt64(v) => Some(i128::from(*v)),
        ColumnValue::Float64(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e36 => {
            Some(*v as i128)
        }
        ColumnValue::String(v) => v.trim().parse().ok(),
        _ => None,
    }
}

fn as_float(value: &ColumnValue) -> Option<f64> {
    match value {
        ColumnValue::UInt8(v) => Some(f64::from(*v)),
        ColumnValue::Int64(v) => Some(*v as f64),
        ColumnValue::UInt64(v) => Some(*v as f64),
        ColumnValue::Float64(v) => Some(*v),
        ColumnValue::String(v) => v.trim().parse().ok(),
        _ => None,
    }
}

fn as_datetime(value: &ColumnValue) -> Option<DateTime<FixedOffset>> {
    match value {
        ColumnValue::DateTime(v) => Some(*v),
        ColumnValue::String(v) => DateTime::parse_from_rfc3339(v.trim()).ok(),
        _ => None,
    }
}

fn as_text(value: &ColumnValue) -> Option<String> {
    match value {
        ColumnValue::String(v) => Some(v.clone()),
        ColumnValue::Bool(v) => Some(v.to_string()),
        ColumnValue::UInt8(v) => Some(v.to_string()),
        ColumnValue::Int64(v) => Some(v.to_string()),
        ColumnValue::UInt64(v) => Some(v.to_string()),
        ColumnValue::Float64(v) => Some(v.to_string()),
        ColumnValue::DateTime(v) => Some(v.to_rfc3339()),
        ColumnValue::Uuid(v) => Some(v.hyphenated().to_string()),
        ColumnValue::Default | ColumnValue::Null => None,
    }
}

const SECONDS_PER_DAY: i64 = 86_400;

fn days_since_epoch(value: &DateTime<FixedOffset>) -> i64 {
    value.timestamp().div_euclid(SECONDS_PER_DAY)
}

fn datetime64_ticks(value: &DateTime<FixedOffset>, precision: u32) -> Option<i64> {
    let scale = 10i64.checked_pow(precision)?;
    let fraction = i64::from(value.timestamp_subsec_nanos()) / 10i64.pow(9 - precision);
    value.timestamp().checked_mul(scale)?.checked_add(fraction)
}

/// Encodes a present value for a non-nullable wire type. Nothing is written on failure.
pub(crate) fn rb_encode_value(
    value: &ColumnValue,
    wire_type: &WireType,
    buf: &mut Vec<u8>,
) -> SinkResult<()> {
    macro_rules! integer {
        ($ty:ty) => {{
            let v = as_integer(value)
                .and_then(|v| <$ty>::try_from(v).ok())
                .ok_or_else(|| conversion_error(value, wire_type))?;
            buf.extend_from_slice(&v.to_le_bytes());
        }};
    }

    match wire_type {
        WireType::String => {
            let text = as_text(value).ok_or_else(|| conversion_error(value, wire_type))?;
            rb_varint(text.len(), buf);
            buf.extend_from_slice(text.as_bytes());
        }
        WireType::FixedString(length) => {
            let text = as_text(value)
                .filter(|text| text.len() <= *length)
                .ok_or_else(|| conversion_error(value, wire_type))?;
            buf.extend_from_slice(text.as_bytes());
            buf.resize(buf.len() + (length - text.len()), 0);
        }
        WireType::Bool => {
            let v = match value {
                ColumnValue::Bool(v) => *v,
                ColumnValue::String(v) => v
                    .trim()
                    .parse::<bool>()
                    .map_err(|_| conversion_error(value, wire_type))?,
                other => match as_integer(other) {
                    Some(0) => false,
                    Some(1) => true,
                    _ => return Err(conversion_error(value, wire_type)),
                },
            };
            buf.push(u8::from(v));
        }
        WireType::Int8 => integer!(i8),
        WireType::Int16 => integer!(i16),
        WireType::Int32 => integer!(i32),
        WireType::Int64 => integer!(i64),
        WireType::UInt8 => integer!(u8),
        WireType::UInt16 => integer!(u16),
        WireType::UInt32 => integer!(u32),
        WireType::UInt64 => integer!(u64),
        WireType::Float32 => {
            let v = as_float(value).ok_or_else(|| conversion_error(value, wire_type))?;
            buf.extend_from_slice(&(v as f32).to_le_bytes());
        }
        WireType::Float64 => {
            let v = as_float(value).ok_or_else(|| conversion_error(value, wire_type))?;
            buf.extend_from_slice(&v.to_le_bytes());
        }
        WireType::Date => {
            let days = as_datetime(value)
                .and_then(|v| u16::try_from(days_since_epoch(&v)).ok())
                .ok_or_else(|| conversion_error(value, wire_type))?;
            buf.extend_from_slice(&days.to_le_bytes());
        }
        WireType::Date32 => {
            let days = as_datetime(value)
                .and_then(|v| i32::try_from(days_since_epoch(&v)).ok())
                .ok_or_else(|| conversion_error(value, wire_type))?;
            buf.extend_from_slice(&days.to_le_bytes());
        }
        WireType::DateTime => {
            let seconds = as_datetime(value)
                .and_then(|v| u32::try_from(v.timestamp()).ok())
                .ok_or_else(|| conversion_error(value, wire_type))?;
            buf.extend_from_slice(&seconds.to_le_bytes());
        }
        WireType::DateTime64(precision) => {
            let ticks = as_datetime(value)
                .and_then(|v| datetime64_ticks(&v, *precision))
                .ok_or_else(|| conversion_error(value, wire_type))?;
            buf.extend_from_slice(&ticks.to_le_bytes());
        }
        WireType::Uuid => {
            let uuid = match value {
                ColumnValue::Uuid(v) => *v,
                ColumnValue::String(v) => {
                    Uuid::parse_str(v.trim()).map_err(|_| conversion_error(value, wire_type))?
                }
                _ => return Err(conversion_error(value, wire_type)),
            };
            // Two little-endian u64 halves, high half first.
            let (high, low) = uuid.as_u64_pair();
            buf.extend_from_slice(&high.to_le_bytes());
            buf.extend_from_slice(&low.to_le_bytes());
        }
        WireType::Nullable(_) => {
            bail!(
                ErrorKind::InvalidState,
                "Nullable wrapper must be handled by the caller"
            );
        }
    }

    Ok(())
}

/// Encodes one cell, including the leading default flag.
///
/// `Default`, and `Null` for a non-nullable column, ask the server for the column default.
/// On conversion failure nothing is written and the error is returned.
pub(crate) fn rb_encode_cell(
    value: &ColumnValue,
    wire_type: &WireType,
    buf: &mut Vec<u8>,
) -> SinkResult<()> {
    match (value, wire_type) {
        (ColumnValue::Default, _) => buf.push(1),
        (ColumnValue::Null, WireType::Nullable(_)) => buf.extend_from_slice(&[0, 1]),
        (ColumnValue::Null, _) => buf.push(1),
        (value, wire_type) => {
            let mark = buf.len();
            let inner = match wire_type {
                WireType::Nullable(inner) => {
                    buf.extend_from_slice(&[0, 0]);
                    inner.as_ref()
                }
                other => {
                    buf.push(0);
                    other
                }
            };

            if let Err(err) = rb_encode_value(value, inner, buf) {
                buf.truncate(mark);
                return Err(err);
            }
        }
    }

    Ok(())
}

/// Encodes a complete row. Values that cannot be converted fall back to the column default.
pub(crate) fn rb_encode_row(
    row: &[ColumnValue],
    columns: &[EncodedColumn],
    buf: &mut Vec<u8>,
) -> SinkResult<()> {
    if row.len() != columns.len() {
        bail!(
            ErrorKind::InvalidData,
            "Row length does not match column count",
            format!("row has {} values, table has {} columns", row.len(), columns.len())
        );
    }

    for (value, column) in row.iter().zip(columns) {
        if let Err(err) = rb_encode_cell(value, &column.wire_type, buf) {
            warn!(column = %column.name, error = %err, "value not convertible to column type, writing column default");
            buf.push(1);
        }
    }

    Ok(())
}
