use std::collections::BTreeMap;
use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use logsaw_types::{Level, LocationInfo, LogEvent};

use crate::sink::EventSink;

/// Targets with this prefix belong to logsaw itself and are never captured
const INTERNAL_TARGET_PREFIX: &str = "logsaw";

/// Tracing layer that stores the host process's own events in the container.
///
/// The event target becomes the logger name, the `message` field the message
/// and every other field a property.
pub struct SinkLayer {
    sink: EventSink,
}

impl SinkLayer {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(INTERNAL_TARGET_PREFIX) {
            return;
        }

        let mut fields = FieldVisitor::default();
        event.record(&mut fields);

        let thread = std::thread::current();
        let mut log_event = LogEvent::new(metadata.target(), level_of(metadata.level()), fields.message)
            .with_thread(thread.name().unwrap_or("unnamed"));
        log_event.properties = fields.properties;

        if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
            log_event.location = Some(LocationInfo::new(
                metadata.module_path().unwrap_or_default(),
                metadata.name(),
                file,
                line.to_string(),
            ));
        }

        self.sink.publish(log_event);
    }
}

fn level_of(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warn,
        tracing::Level::INFO => Level::Info,
        tracing::Level::DEBUG => Level::Debug,
        _ => Level::Trace,
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    properties: BTreeMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.properties
                .insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.properties
                .insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}
