//! Log sinks.
//!
//! # Responsibilities
//! - Accept records from request loggers
//! - Turn them into structured `tracing` events on the `request_log` target
//!
//! # Design Decisions
//! - Sinks are shared by every in-flight request, so `LogSink: Send + Sync`
//! - Formatting and writing belong to `tracing-subscriber`: a sink either owns
//!   a `fmt` dispatcher (stdout, stderr, any `MakeWriter`) or forwards to the
//!   process subscriber
//! - Well-known keys become event fields of their own; other keys are
//!   collected into a JSON object under `extra`

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tracing::field::{debug, display};
use tracing::Dispatch;
use tracing_subscriber::fmt::{time::ChronoUtc, MakeWriter};

use crate::config::{LogFormat, LogOutput, RequestLogConfig};
use crate::logger::record::{LogRecord, Value};

/// Timestamp layout of owned dispatchers (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S%.9f";

/// Target of every request log event.
pub const TARGET: &str = "request_log";

/// Destination for log records.
pub trait LogSink: Send + Sync {
    fn log(&self, record: &LogRecord<'_>);
}

/// Emits records as `INFO` events on the [`TARGET`] target.
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    dispatch: Option<Dispatch>,
}

impl TracingSink {
    /// Forward to whatever subscriber is current when a record is logged.
    pub fn ambient() -> Self {
        Self { dispatch: None }
    }

    /// Own a subscriber writing to standard output.
    pub fn stdout(format: LogFormat, timestamps: bool) -> Self {
        Self::with_writer(io::stdout, format, timestamps)
    }

    /// Own a subscriber writing to standard error.
    pub fn stderr(format: LogFormat, timestamps: bool) -> Self {
        Self::with_writer(io::stderr, format, timestamps)
    }

    /// Own a `fmt` subscriber writing to `make_writer`.
    ///
    /// Text lines carry the event fields only, prefixed with the UTC
    /// timestamp when enabled. JSON lines are flattened objects with a
    /// `timestamp` key.
    pub fn with_writer<W>(make_writer: W, format: LogFormat, timestamps: bool) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let builder = tracing_subscriber::fmt()
            .with_writer(make_writer)
            .with_ansi(false)
            .with_level(false)
            .with_target(false);
        let timer = || ChronoUtc::new(TIMESTAMP_FORMAT.to_string());

        let dispatch = match (format, timestamps) {
            (LogFormat::Logfmt, true) => Dispatch::new(builder.with_timer(timer()).finish()),
            (LogFormat::Logfmt, false) => Dispatch::new(builder.without_time().finish()),
            (LogFormat::Json, true) => Dispatch::new(
                builder
                    .json()
                    .flatten_event(true)
                    .with_timer(timer())
                    .finish(),
            ),
            (LogFormat::Json, false) => {
                Dispatch::new(builder.json().flatten_event(true).without_time().finish())
            }
        };
        Self::from_dispatch(dispatch)
    }

    /// Own an arbitrary dispatcher.
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }
}

impl LogSink for TracingSink {
    fn log(&self, record: &LogRecord<'_>) {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || emit(record)),
            None => emit(record),
        }
    }
}

/// Drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl LogSink for Discard {
    fn log(&self, _record: &LogRecord<'_>) {}
}

/// Build the sink described by the configuration.
pub fn sink_from_config(config: &RequestLogConfig) -> Arc<dyn LogSink> {
    match config.output {
        LogOutput::Stdout => Arc::new(TracingSink::stdout(config.format, config.timestamps)),
        LogOutput::Stderr => Arc::new(TracingSink::stderr(config.format, config.timestamps)),
        LogOutput::Tracing => Arc::new(TracingSink::ambient()),
        LogOutput::Discard => Arc::new(Discard),
    }
}

/// Record fields sorted into event slots. Later keys overwrite earlier ones.
#[derive(Default)]
struct EventFields<'a> {
    evt: Option<&'a str>,
    rid: Option<&'a str>,
    method: Option<&'a str>,
    uri: Option<&'a str>,
    ip: Option<&'a str>,
    status: Option<u64>,
    size: Option<u64>,
    duration: Option<Duration>,
    error: Option<bool>,
    msg: Option<&'a str>,
    extra: serde_json::Map<String, serde_json::Value>,
}

impl<'a> EventFields<'a> {
    fn from_record(record: &LogRecord<'a>) -> Self {
        let mut fields = Self::default();
        for (key, value) in record.iter() {
            match (*key, value) {
                ("evt", Value::Str(_)) => fields.evt = value.as_str(),
                ("rid", Value::Str(_)) => fields.rid = value.as_str(),
                ("method", Value::Str(_)) => fields.method = value.as_str(),
                ("uri", Value::Str(_)) => fields.uri = value.as_str(),
                ("ip", Value::Str(_)) => fields.ip = value.as_str(),
                ("msg", Value::Str(_)) => fields.msg = value.as_str(),
                ("status", v) if v.as_u64().is_some() => fields.status = v.as_u64(),
                ("size", v) if v.as_u64().is_some() => fields.size = v.as_u64(),
                ("duration", Value::Duration(d)) => fields.duration = Some(*d),
                ("error", Value::Bool(b)) => fields.error = Some(*b),
                (key, value) => match serde_json::to_value(value) {
                    Ok(json) => {
                        fields.extra.insert(key.to_string(), json);
                    }
                    Err(e) => tracing::debug!(key, error = %e, "Dropping unencodable log field"),
                },
            }
        }
        fields
    }
}

fn emit(record: &LogRecord<'_>) {
    let fields = EventFields::from_record(record);
    let extra = (!fields.extra.is_empty()).then(|| serde_json::Value::Object(fields.extra));

    tracing::info!(
        target: TARGET,
        rid = fields.rid.map(display),
        method = fields.method.map(display),
        uri = fields.uri.map(display),
        ip = fields.ip.map(display),
        status = fields.status,
        size = fields.size,
        duration = fields.duration.map(debug),
        error = fields.error,
        msg = fields.msg.map(display),
        extra = extra.as_ref().map(display),
        evt = fields.evt.map(display)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Field;
    use std::fmt;
    use std::sync::Mutex;
    use tracing::field::{Field as TracingField, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// In-memory writer shared between the test and the subscriber.
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Layer recording the fields each event actually carries.
    #[derive(Clone, Default)]
    struct Recorded(Arc<Mutex<Vec<Vec<(String, String)>>>>);

    struct Visitor(Vec<(String, String)>);

    impl Visit for Visitor {
        fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S: Subscriber> Layer<S> for Recorded {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = Visitor(Vec::new());
            event.record(&mut visitor);
            self.0.lock().unwrap().push(visitor.0);
        }
    }

    fn end_record() -> ([Field; 1], [Field; 4]) {
        (
            [("rid", Value::from("abc123"))],
            [
                ("status", Value::from(404u16)),
                ("size", Value::from(9u64)),
                ("duration", Value::from(Duration::from_micros(1520))),
                ("evt", Value::from("request.end")),
            ],
        )
    }

    #[test]
    fn test_subscriber_sees_structured_fields() {
        let recorded = Recorded::default();
        let sink = TracingSink::from_dispatch(Dispatch::new(
            tracing_subscriber::registry().with(recorded.clone()),
        ));

        let (context, fields) = end_record();
        sink.log(&LogRecord::new(&context, &fields));

        let events = recorded.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        let names: Vec<&str> = events[0].iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["rid", "status", "size", "duration", "evt"]);
        assert!(events[0].contains(&("rid".to_string(), "abc123".to_string())));
        assert!(events[0].contains(&("status".to_string(), "404".to_string())));
        assert!(events[0].contains(&("duration".to_string(), "1.52ms".to_string())));
    }

    #[test]
    fn test_ambient_sink_uses_current_subscriber() {
        let recorded = Recorded::default();
        let subscriber = tracing_subscriber::registry().with(recorded.clone());

        tracing::subscriber::with_default(subscriber, || {
            TracingSink::ambient().log(&LogRecord::new(
                &[("rid", Value::from("r1"))],
                &[("evt", Value::from("request.start")), ("n", Value::from(3u64))],
            ));
        });

        let events = recorded.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains(&("evt".to_string(), "request.start".to_string())));
        assert!(events[0].contains(&("extra".to_string(), r#"{"n":3}"#.to_string())));
    }

    #[test]
    fn test_text_line_without_timestamp() {
        let buffer = Buffer::default();
        let sink = TracingSink::with_writer(buffer.clone(), LogFormat::Logfmt, false);

        let (context, fields) = end_record();
        sink.log(&LogRecord::new(&context, &fields));

        assert_eq!(
            buffer.contents().trim(),
            "rid=abc123 status=404 size=9 duration=1.52ms evt=request.end"
        );
    }

    #[test]
    fn test_text_line_with_timestamp() {
        let buffer = Buffer::default();
        let sink = TracingSink::with_writer(buffer.clone(), LogFormat::Logfmt, true);

        let (context, fields) = end_record();
        sink.log(&LogRecord::new(&context, &fields));

        let out = buffer.contents();
        let (ts, rest) = out.trim().split_once(' ').unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).is_ok());
        assert!(rest.ends_with("evt=request.end"));
    }

    #[test]
    fn test_json_lines() {
        let buffer = Buffer::default();
        let sink = TracingSink::with_writer(buffer.clone(), LogFormat::Json, true);

        let (context, fields) = end_record();
        sink.log(&LogRecord::new(&context, &fields));
        sink.log(&LogRecord::new(&context, &[("msg", Value::from("hello world"))]));

        let out = buffer.contents();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[0]["rid"], "abc123");
        assert_eq!(lines[0]["status"], 404);
        assert_eq!(lines[0]["size"], 9);
        assert_eq!(lines[0]["evt"], "request.end");
        assert_eq!(lines[1]["msg"], "hello world");
        assert!(lines[1].get("status").is_none());
    }

    #[test]
    fn test_sinks_own_separate_dispatchers() {
        let first = Buffer::default();
        let second = Buffer::default();
        let a = TracingSink::with_writer(first.clone(), LogFormat::Logfmt, false);
        let b = TracingSink::with_writer(second.clone(), LogFormat::Logfmt, false);

        a.log(&LogRecord::new(&[("rid", Value::from("a"))], &[]));
        b.log(&LogRecord::new(&[("rid", Value::from("b"))], &[]));

        assert_eq!(first.contents().trim(), "rid=a");
        assert_eq!(second.contents().trim(), "rid=b");
    }
}
