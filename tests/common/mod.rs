//! Shared utilities for integration and load testing.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use request_log::http::ClientIp;
use request_log::logger::{Field, LogRecord, LogSink, Value};
use tower_http::request_id::RequestId;

/// Sink keeping every record in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Vec<Field>>>,
}

impl LogSink for MemorySink {
    fn log(&self, record: &LogRecord<'_>) {
        self.records.lock().unwrap().push(record.to_vec());
    }
}

#[allow(dead_code)]
impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<Vec<Field>> {
        self.records.lock().unwrap().clone()
    }

    /// Records whose `evt` field equals `evt`.
    pub fn events(&self, evt: &str) -> Vec<Vec<Field>> {
        self.records()
            .into_iter()
            .filter(|r| str_field(r, "evt") == Some(evt))
            .collect()
    }

    /// Poll until `count` records with `evt` exist or `timeout` passes.
    pub async fn wait_for(&self, evt: &str, count: usize, timeout: Duration) -> Vec<Vec<Field>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let found = self.events(evt);
            if found.len() >= count || tokio::time::Instant::now() >= deadline {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[allow(dead_code)]
pub fn field<'a>(record: &'a [Field], key: &str) -> Option<&'a Value> {
    record.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
}

#[allow(dead_code)]
pub fn str_field<'a>(record: &'a [Field], key: &str) -> Option<&'a str> {
    field(record, key).and_then(Value::as_str)
}

#[allow(dead_code)]
pub fn u64_field(record: &[Field], key: &str) -> Option<u64> {
    field(record, key).and_then(Value::as_u64)
}

/// Build a request as it looks after request-id and real-IP resolution.
#[allow(dead_code)]
pub fn enriched_request(method: &str, uri: &str, rid: &str, ip: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    request
        .extensions_mut()
        .insert(RequestId::new(HeaderValue::from_str(rid).unwrap()));
    request
        .extensions_mut()
        .insert(ClientIp(ip.parse::<IpAddr>().unwrap()));
    request
}

/// Loopback address with an OS-assigned port.
#[allow(dead_code)]
pub fn any_local_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}
