use chrono::{DateTime, FixedOffset, TimeZone};

use crate::event::{LogEvent, LogLevel};

/// `2024-01-15T12:30:45.123+02:00`, the timestamp of every fixture event.
pub fn fixed_timestamp() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(2 * 3600)
        .and_then(|offset| {
            offset
                .with_ymd_and_hms(2024, 1, 15, 12, 30, 45)
                .single()
                .map(|ts| ts + chrono::Duration::milliseconds(123))
        })
        .expect("fixed timestamp is valid")
}

/// Creates an event at [`fixed_timestamp`] without properties.
pub fn test_event(level: LogLevel, message_template: &str) -> LogEvent {
    LogEvent::new(fixed_timestamp(), level, message_template)
}

/// Creates an `Information` event logged for an HTTP request.
pub fn request_event(request_id: &str, elapsed_ms: i64) -> LogEvent {
    test_event(
        LogLevel::Information,
        "Handled {RequestId} in {Elapsed} ms",
    )
    .with_property("RequestId", request_id)
    .with_property("Elapsed", elapsed_ms)
}

/// Creates `count` numbered events, `Message {Index}` with `Index` set to the position.
pub fn numbered_events(count: usize) -> Vec<LogEvent> {
    (0..count)
        .map(|index| {
            test_event(LogLevel::Information, "Message {Index}").with_property("Index", index as i64)
        })
        .collect()
}
