use chrono::DateTime;
use serde_json::{Map, Value};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec};

use logsaw_types::{Level, LocationInfo, LogEvent};

use crate::error::ReceiverError;

/// Longest accepted line, in bytes
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

const LOGGER_FIELDS: [&str; 4] = ["logger_name", "logger", "target", "name"];
const LEVEL_FIELDS: [&str; 6] = ["level", "lvl", "severity", "log.level", "loglevel", "log_level"];
const MESSAGE_FIELDS: [&str; 3] = ["message", "msg", "text"];
const TIMESTAMP_FIELDS: [&str; 4] = ["timestamp", "time", "ts", "@timestamp"];
const THREAD_FIELDS: [&str; 2] = ["thread_name", "thread"];
const THROWABLE_FIELDS: [&str; 4] = ["throwable", "exception", "stack_trace", "error"];

/// Decode one line of newline-delimited JSON.
///
/// Blank lines yield `Ok(None)`. Besides the native field names, common
/// aliases (`msg`, `lvl`, `target`, `time`, ...) are accepted; numeric levels
/// follow the bunyan/pino scale. Unrecognised top-level fields become
/// properties.
pub fn decode_line(line: &str) -> Result<Option<LogEvent>, ReceiverError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| ReceiverError::Decode(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(ReceiverError::Decode(format!(
            "expected a JSON object, got: {}",
            trimmed
        )));
    };

    let logger = take_first(&mut fields, &LOGGER_FIELDS)
        .map(|v| text(&v))
        .unwrap_or_default();
    let level = take_first(&mut fields, &LEVEL_FIELDS)
        .map(|v| parse_level(&v))
        .transpose()?
        .unwrap_or_default();
    let message = take_first(&mut fields, &MESSAGE_FIELDS)
        .map(|v| text(&v))
        .unwrap_or_default();

    let mut event = LogEvent::new(logger, level, message);

    if let Some(ts) = take_first(&mut fields, &TIMESTAMP_FIELDS) {
        event.timestamp = parse_timestamp(&ts)?;
    }
    if let Some(thread) = take_first(&mut fields, &THREAD_FIELDS) {
        event.thread_name = text(&thread);
    }
    if let Some(ndc) = fields.remove("ndc").filter(|v| !v.is_null()) {
        event.ndc = Some(text(&ndc));
    }
    if let Some(throwable) = take_first(&mut fields, &THROWABLE_FIELDS) {
        event.throwable = parse_throwable(throwable);
    }
    if let Some(location) = fields.remove("location").filter(|v| !v.is_null()) {
        event.location = Some(
            serde_json::from_value::<LocationInfo>(location)
                .map_err(|e| ReceiverError::Decode(format!("location: {}", e)))?,
        );
    }

    for key in ["properties", "mdc"] {
        if let Some(Value::Object(properties)) = fields.remove(key) {
            for (name, value) in properties {
                event.properties.insert(name, text(&value));
            }
        }
    }
    for (name, value) in fields {
        if !value.is_null() {
            event.properties.insert(name, text(&value));
        }
    }

    Ok(Some(event))
}

/// Encode an event as a single JSON line, without the trailing newline
pub fn encode_event(event: &LogEvent) -> Result<String, ReceiverError> {
    Ok(serde_json::to_string(event)?)
}

fn take_first(fields: &mut Map<String, Value>, names: &[&str]) -> Option<Value> {
    names
        .iter()
        .find_map(|name| fields.remove(*name).filter(|v| !v.is_null()))
}

/// Strings verbatim, everything else as compact JSON
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_level(value: &Value) -> Result<Level, ReceiverError> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|e| ReceiverError::Decode(format!("level: {}", e))),
        Value::Number(n) => match n.as_u64() {
            Some(0..=10) => Ok(Level::Trace),
            Some(11..=20) => Ok(Level::Debug),
            Some(21..=30) => Ok(Level::Info),
            Some(31..=40) => Ok(Level::Warn),
            Some(41..=50) => Ok(Level::Error),
            Some(_) => Ok(Level::Fatal),
            None => Err(ReceiverError::Decode(format!("level: {}", n))),
        },
        other => Err(ReceiverError::Decode(format!("level: {}", other))),
    }
}

/// Epoch milliseconds or an RFC 3339 string
fn parse_timestamp(value: &Value) -> Result<i64, ReceiverError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| ReceiverError::Decode(format!("timestamp: {}", n))),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .map_err(|e| ReceiverError::Decode(format!("timestamp '{}': {}", s, e))),
        other => Err(ReceiverError::Decode(format!("timestamp: {}", other))),
    }
}

/// A list of frames, or one block of text split into lines
fn parse_throwable(value: Value) -> Option<Vec<String>> {
    let frames: Vec<String> = match value {
        Value::Array(items) => items.iter().map(text).collect(),
        Value::String(s) => s.lines().map(str::to_string).collect(),
        Value::Null => return None,
        other => vec![other.to_string()],
    };
    (!frames.is_empty()).then_some(frames)
}

/// Framing for newline-delimited JSON events over a byte stream
#[derive(Debug)]
pub struct JsonLinesCodec {
    lines: LinesCodec,
}

impl JsonLinesCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }
}

impl Default for JsonLinesCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonLinesCodec {
    type Item = LogEvent;
    type Error = ReceiverError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LogEvent>, ReceiverError> {
        while let Some(line) = self.lines.decode(src)? {
            if let Some(event) = decode_line(&line)? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<LogEvent>, ReceiverError> {
        while let Some(line) = self.lines.decode_eof(src)? {
            if let Some(event) = decode_line(&line)? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

impl Encoder<&LogEvent> for JsonLinesCodec {
    type Error = ReceiverError;

    fn encode(&mut self, event: &LogEvent, dst: &mut BytesMut) -> Result<(), ReceiverError> {
        let line = encode_event(event)?;
        self.lines.encode(line, dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_native_event() {
        let event = LogEvent::new("org.app", Level::Warn, "disk low")
            .with_timestamp(1_700_000_000_000)
            .with_thread("main")
            .with_throwable(["java.io.IOException", "at a.B"])
            .with_location(LocationInfo::new("a.B", "run", "B.java", "42"))
            .with_property("user", "alice");

        let decoded = decode_line(&encode_event(&event).unwrap()).unwrap().unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_decode_aliases_and_extra_fields() {
        let line = r#"{"lvl":"error","msg":"boom","target":"svc.db","time":"2024-01-15T10:30:00Z","pid":42,"mdc":{"req":"r1"}}"#;
        let event = decode_line(line).unwrap().unwrap();

        assert_eq!(event.level, Level::Error);
        assert_eq!(event.message, "boom");
        assert_eq!(event.logger_name, "svc.db");
        assert_eq!(event.timestamp, 1_705_314_600_000);
        assert_eq!(event.property("pid"), Some("42"));
        assert_eq!(event.property("req"), Some("r1"));
    }

    #[test]
    fn test_numeric_levels() {
        let event = decode_line(r#"{"level":50,"msg":"x"}"#).unwrap().unwrap();
        assert_eq!(event.level, Level::Error);
        let event = decode_line(r#"{"level":30,"msg":"x"}"#).unwrap().unwrap();
        assert_eq!(event.level, Level::Info);
    }

    #[test]
    fn test_throwable_text_is_split_into_frames() {
        let event = decode_line(r#"{"msg":"x","exception":"Err\n  at a\n  at b"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.throwable.map(|f| f.len()), Some(3));
    }

    #[test]
    fn test_blank_and_malformed_lines() {
        assert!(decode_line("   ").unwrap().is_none());
        assert!(matches!(decode_line("not json"), Err(ReceiverError::Decode(_))));
        assert!(matches!(decode_line("[1,2]"), Err(ReceiverError::Decode(_))));
        assert!(matches!(
            decode_line(r#"{"level":"loud"}"#),
            Err(ReceiverError::Decode(_))
        ));
    }

    #[test]
    fn test_codec_frames_lines() {
        let mut codec = JsonLinesCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(&LogEvent::new("a", Level::Info, "one"), &mut buf)
            .unwrap();
        buf.extend_from_slice(b"\n");
        codec
            .encode(&LogEvent::new("b", Level::Info, "two"), &mut buf)
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.message, "one");
        assert_eq!(second.message, "two");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
