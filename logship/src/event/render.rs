use std::fmt::Write;

use crate::event::{LogEventPropertyValue, ScalarValue};
use crate::format::FormatProvider;

/// Largest padding width `format!` accepts.
const MAX_ALIGNMENT: usize = u16::MAX as usize;

/// A parsed `{Name,alignment:format}` placeholder.
struct PropertyToken<'a> {
    name: &'a str,
    alignment: Option<isize>,
    format: Option<&'a str>,
}

impl<'a> PropertyToken<'a> {
    /// Parses the text between the braces. Returns `None` when it is not a valid placeholder.
    fn parse(content: &'a str) -> Option<Self> {
        let content = content
            .strip_prefix('@')
            .or_else(|| content.strip_prefix('$'))
            .unwrap_or(content);

        let (head, format) = match content.split_once(':') {
            Some((head, format)) if !format.is_empty() => (head, Some(format)),
            Some(_) => return None,
            None => (content, None),
        };

        let (name, alignment) = match head.split_once(',') {
            Some((name, alignment)) => {
                let alignment = alignment.trim().parse::<isize>().ok()?;
                if alignment.unsigned_abs() > MAX_ALIGNMENT {
                    return None;
                }
                (name, Some(alignment))
            }
            None => (head, None),
        };

        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_');
        if !valid_name {
            return None;
        }

        Some(Self {
            name,
            alignment,
            format,
        })
    }
}

/// Renders `template`, substituting each placeholder with the matching property.
///
/// `{{` and `}}` render as literal braces. A placeholder without a matching property, or one
/// that does not parse, is copied through unchanged.
pub fn render_message_template(
    template: &str,
    properties: &[(String, LogEventPropertyValue)],
    format_provider: &dyn FormatProvider,
) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(index) = rest.find(['{', '}']) {
        out.push_str(&rest[..index]);
        let tail = &rest[index..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        let Some(close) = tail[1..].find('}') else {
            out.push_str(tail);
            return out;
        };

        let content = &tail[1..=close];
        if content.contains('{') {
            out.push('{');
            rest = &tail[1..];
            continue;
        }

        let raw = &tail[..close + 2];
        rest = &tail[close + 2..];

        let rendered = PropertyToken::parse(content).and_then(|token| {
            properties
                .iter()
                .find(|(name, _)| name == token.name)
                .map(|(_, value)| {
                    let value = render_property_value(value, token.format, format_provider);
                    align(value, token.alignment)
                })
        });

        match rendered {
            Some(value) => out.push_str(&value),
            None => out.push_str(raw),
        }
    }

    out.push_str(rest);
    out
}

fn align(value: String, alignment: Option<isize>) -> String {
    let Some(alignment) = alignment else {
        return value;
    };

    let width = alignment.unsigned_abs();
    if alignment >= 0 {
        format!("{value:>width$}")
    } else {
        format!("{value:<width$}")
    }
}

/// Renders a property value the way it appears inside a rendered message.
///
/// Numbers and booleans are bare, strings are double-quoted unless `format` is `l`, and
/// `null` is written as `null`.
pub fn render_property_value(
    value: &LogEventPropertyValue,
    format: Option<&str>,
    format_provider: &dyn FormatProvider,
) -> String {
    let mut out = String::new();
    write_property_value(&mut out, value, format, format_provider);
    out
}

fn write_property_value(
    out: &mut String,
    value: &LogEventPropertyValue,
    format: Option<&str>,
    format_provider: &dyn FormatProvider,
) {
    match value {
        LogEventPropertyValue::Scalar(scalar) => {
            write_scalar(out, scalar, format, format_provider)
        }
        LogEventPropertyValue::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_property_value(out, item, None, format_provider);
            }
            out.push(']');
        }
        LogEventPropertyValue::Structure {
            type_tag,
            properties,
        } => {
            if let Some(type_tag) = type_tag {
                out.push_str(type_tag);
                out.push(' ');
            }
            out.push_str("{ ");
            for (i, (name, value)) in properties.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push_str(": ");
                write_property_value(out, value, None, format_provider);
            }
            out.push_str(" }");
        }
        LogEventPropertyValue::Dictionary(entries) => {
            out.push('[');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push('(');
                write_scalar(out, key, None, format_provider);
                out.push_str(": ");
                write_property_value(out, value, None, format_provider);
                out.push(')');
            }
            out.push(']');
        }
    }
}

fn write_scalar(
    out: &mut String,
    scalar: &ScalarValue,
    format: Option<&str>,
    format_provider: &dyn FormatProvider,
) {
    match scalar {
        ScalarValue::Null => out.push_str("null"),
        ScalarValue::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
        ScalarValue::Int(value) => out.push_str(&format_provider.format_signed(*value, format)),
        ScalarValue::UInt(value) => {
            out.push_str(&format_provider.format_unsigned(*value, format))
        }
        ScalarValue::Float(value) => out.push_str(&format_provider.format_float(*value, format)),
        ScalarValue::String(value) if format == Some("l") => out.push_str(value),
        ScalarValue::String(value) => {
            out.push('"');
            out.push_str(&value.replace('"', "\\\""));
            out.push('"');
        }
        ScalarValue::DateTime(value) => {
            out.push_str(&format_provider.format_datetime(value, format))
        }
        ScalarValue::Uuid(value) => {
            let _ = write!(out, "{}", value.hyphenated());
        }
    }
}
