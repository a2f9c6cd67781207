use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::{Map, Number, Value};

use crate::event::{LogEvent, LogEventPropertyValue, ScalarValue};

/// Key under which a structure's type tag is written.
const TYPE_TAG_KEY: &str = "_typeTag";

fn datetime_to_json(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn float_to_json(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None if value.is_nan() => Value::String("NaN".to_string()),
        None if value.is_sign_positive() => Value::String("Infinity".to_string()),
        None => Value::String("-Infinity".to_string()),
    }
}

fn scalar_to_json(scalar: &ScalarValue) -> Value {
    match scalar {
        ScalarValue::Null => Value::Null,
        ScalarValue::Bool(value) => Value::Bool(*value),
        ScalarValue::Int(value) => Value::from(*value),
        ScalarValue::UInt(value) => Value::from(*value),
        ScalarValue::Float(value) => float_to_json(*value),
        ScalarValue::String(value) => Value::String(value.clone()),
        ScalarValue::DateTime(value) => Value::String(datetime_to_json(value)),
        ScalarValue::Uuid(value) => Value::String(value.hyphenated().to_string()),
    }
}

/// Dictionary keys are always JSON strings.
fn scalar_to_json_key(scalar: &ScalarValue) -> String {
    match scalar_to_json(scalar) {
        Value::String(value) => value,
        other => other.to_string(),
    }
}

/// Converts a property value to JSON.
///
/// Structures become objects (with `_typeTag` when tagged), sequences become arrays and
/// dictionaries become objects keyed by the stringified key. Non-finite floats are written
/// as the strings `NaN`, `Infinity` and `-Infinity`.
pub fn property_value_to_json(value: &LogEventPropertyValue) -> Value {
    match value {
        LogEventPropertyValue::Scalar(scalar) => scalar_to_json(scalar),
        LogEventPropertyValue::Sequence(items) => {
            Value::Array(items.iter().map(property_value_to_json).collect())
        }
        LogEventPropertyValue::Structure {
            type_tag,
            properties,
        } => {
            let mut object = Map::with_capacity(properties.len() + 1);
            if let Some(type_tag) = type_tag {
                object.insert(TYPE_TAG_KEY.to_string(), Value::String(type_tag.clone()));
            }
            for (name, value) in properties {
                object.insert(name.clone(), property_value_to_json(value));
            }
            Value::Object(object)
        }
        LogEventPropertyValue::Dictionary(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (scalar_to_json_key(key), property_value_to_json(value)))
                .collect(),
        ),
    }
}

/// Converts a property list to one JSON object. Keys keep the property order and explicit
/// nulls are written as `null`.
pub fn properties_to_json(properties: &[(String, LogEventPropertyValue)]) -> Value {
    Value::Object(
        properties
            .iter()
            .map(|(name, value)| (name.clone(), property_value_to_json(value)))
            .collect(),
    )
}

/// Converts a whole event to JSON: `Timestamp`, `Level`, `MessageTemplate`, then `Exception`
/// and `Properties` when present. The rendered message is not included.
pub fn full_event_to_json(event: &LogEvent) -> Value {
    let mut object = Map::with_capacity(5);
    object.insert(
        "Timestamp".to_string(),
        Value::String(datetime_to_json(&event.timestamp)),
    );
    object.insert(
        "Level".to_string(),
        Value::String(event.level.as_str().to_string()),
    );
    object.insert(
        "MessageTemplate".to_string(),
        Value::String(event.message_template.clone()),
    );

    if let Some(exception) = &event.exception {
        object.insert(
            "Exception".to_string(),
            Value::String(exception.to_string()),
        );
    }

    if !event.properties().is_empty() {
        object.insert(
            "Properties".to_string(),
            properties_to_json(event.properties()),
        );
    }

    Value::Object(object)
}
