// SPDX-License-Identifier: Apache-2.0

//! Conversion from reassembled log text to OTLP LogRecords.

use std::path::Path;

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::logs::v1::LogRecord;

use crate::receivers::file::parser::Stream;

// Attribute key constants to avoid per-line allocations
pub const ATTR_LOG_FILE_NAME: &str = "log.file.name";
pub const ATTR_LOG_FILE_PATH: &str = "log.file.path";
pub const ATTR_LOG_IOSTREAM: &str = "log.iostream";
pub const ATTR_SOURCE: &str = "source";

/// Gap between the timestamps of consecutive records read together
pub const LOG_TIME_STEP_NANOS: u64 = 1_000;

fn string_attribute(key: &str, value: impl Into<String>) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.into())),
        }),
    }
}

/// Attributes shared by every record of one tailed file
pub fn file_attributes(path: &Path, source: &str) -> Vec<KeyValue> {
    let mut attributes = Vec::with_capacity(3);
    attributes.push(string_attribute(ATTR_SOURCE, source));
    attributes.push(string_attribute(
        ATTR_LOG_FILE_PATH,
        path.display().to_string(),
    ));
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        attributes.push(string_attribute(ATTR_LOG_FILE_NAME, name));
    }
    attributes
}

/// Build one LogRecord. The body is the text, lossily decoded as UTF-8.
pub fn build_log_record(
    text: &[u8],
    stream: Stream,
    file_attributes: &[KeyValue],
    now: u64,
) -> LogRecord {
    let mut attributes = Vec::with_capacity(file_attributes.len() + 1);
    attributes.extend_from_slice(file_attributes);
    attributes.push(string_attribute(ATTR_LOG_IOSTREAM, stream.as_str()));

    LogRecord {
        time_unix_nano: now,
        observed_time_unix_nano: now,
        body: Some(AnyValue {
            value: Some(any_value::Value::StringValue(
                String::from_utf8_lossy(text).into_owned(),
            )),
        }),
        attributes,
        ..Default::default()
    }
}

/// Space out the timestamps of records read in one chunk so that sorting by
/// time keeps read order. The last record ends one step before `now`.
pub fn spread_log_times(records: &mut [LogRecord], now: u64) {
    let len = records.len() as u64;
    for (i, record) in records.iter_mut().enumerate() {
        let back = (len - i as u64) * LOG_TIME_STEP_NANOS;
        record.time_unix_nano = now.saturating_sub(back);
    }
}

pub fn now_unix_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Body of a record built by [`build_log_record`]
pub fn record_body(record: &LogRecord) -> Option<&str> {
    match record.body.as_ref()?.value.as_ref()? {
        any_value::Value::StringValue(s) => Some(s.as_str()),
        _ => None,
    }
}

/// String attribute value of a record
pub fn record_attribute<'a>(record: &'a LogRecord, key: &str) -> Option<&'a str> {
    record
        .attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| match kv.value.as_ref()?.value.as_ref()? {
            any_value::Value::StringValue(s) => Some(s.as_str()),
            _ => None,
        })
}
