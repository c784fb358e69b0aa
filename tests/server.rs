//! End-to-end tests against a running server.

use std::time::Duration;

use request_log::config::ServerConfig;
use request_log::{HttpServer, RequestLogLayer};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

mod common;

use common::{any_local_addr, str_field, u64_field, MemorySink};
use std::sync::Arc;

struct RunningServer {
    url: String,
    stop: oneshot::Sender<()>,
}

async fn start_server(config: ServerConfig, sink: Arc<MemorySink>) -> RunningServer {
    let listener = TcpListener::bind(any_local_addr()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::with_layer(config, RequestLogLayer::new(Some(sink)));

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = server
            .run(listener, async {
                let _ = stopped.await;
            })
            .await;
    });

    RunningServer {
        url: format!("http://{}", addr),
        stop,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_echo_request_is_logged_end_to_end() {
    let sink = MemorySink::new();
    let server = start_server(ServerConfig::default(), sink.clone()).await;

    let res = client()
        .get(format!("{}/hello/world?q=1", server.url))
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(res.status(), 200);
    let rid = res
        .headers()
        .get("x-request-id")
        .expect("request id propagated")
        .to_str()
        .unwrap()
        .to_owned();
    assert_eq!(res.text().await.unwrap(), "/hello/world\n");

    let ends = sink.wait_for("request.end", 1, Duration::from_secs(5)).await;
    assert_eq!(ends.len(), 1);
    assert_eq!(u64_field(&ends[0], "status"), Some(200));
    assert_eq!(u64_field(&ends[0], "size"), Some(13));

    let records = sink.records();
    let evts: Vec<&str> = records.iter().map(|r| str_field(r, "evt").unwrap()).collect();
    assert_eq!(evts, ["request.start", "handler.start", "handler.end", "request.end"]);
    assert!(records.iter().all(|r| str_field(r, "rid") == Some(rid.as_str())));

    let start = &records[0];
    assert_eq!(str_field(start, "uri"), Some("/hello/world?q=1"));
    assert_eq!(str_field(start, "ip"), Some("127.0.0.1"));

    let _ = server.stop.send(());
}

#[tokio::test]
async fn test_upstream_request_id_and_forwarded_ip() {
    let sink = MemorySink::new();
    let mut config = ServerConfig::default();
    config.request_log.trust_request_id = true;
    config.request_log.trust_forwarded_for = true;
    let server = start_server(config, sink.clone()).await;

    let res = client()
        .get(format!("{}/foo", server.url))
        .header("x-request-id", "abc123")
        .header("x-forwarded-for", "10.0.0.5")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc123");
    res.text().await.unwrap();

    let ends = sink.wait_for("request.end", 1, Duration::from_secs(5)).await;
    assert_eq!(str_field(&ends[0], "rid"), Some("abc123"));

    let start = &sink.events("request.start")[0];
    assert_eq!(str_field(start, "method"), Some("GET"));
    assert_eq!(str_field(start, "uri"), Some("/foo"));
    assert_eq!(str_field(start, "ip"), Some("10.0.0.5"));
    assert_eq!(str_field(start, "rid"), Some("abc123"));

    let _ = server.stop.send(());
}

#[tokio::test]
async fn test_forwarded_for_ignored_by_default() {
    let sink = MemorySink::new();
    let server = start_server(ServerConfig::default(), sink.clone()).await;

    client()
        .get(format!("{}/", server.url))
        .header("x-forwarded-for", "10.0.0.5")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    sink.wait_for("request.end", 1, Duration::from_secs(5)).await;
    let start = &sink.events("request.start")[0];
    assert_eq!(str_field(start, "ip"), Some("127.0.0.1"));

    let _ = server.stop.send(());
}

#[tokio::test]
async fn test_client_request_id_replaced_by_default() {
    let sink = MemorySink::new();
    let server = start_server(ServerConfig::default(), sink.clone()).await;

    let res = client()
        .get(format!("{}/foo", server.url))
        .header("x-request-id", "abc123")
        .send()
        .await
        .unwrap();
    let rid = res.headers()["x-request-id"].to_str().unwrap().to_owned();
    assert_ne!(rid, "abc123");
    assert!(!rid.is_empty());
    res.text().await.unwrap();

    let ends = sink.wait_for("request.end", 1, Duration::from_secs(5)).await;
    assert_eq!(str_field(&ends[0], "rid"), Some(rid.as_str()));

    let _ = server.stop.send(());
}

#[tokio::test]
async fn test_disabled_request_log_installs_no_layer() {
    let sink = MemorySink::new();
    let mut config = ServerConfig::default();
    config.request_log.enabled = false;
    let server = start_server(config, sink.clone()).await;

    let res = client()
        .get(format!("{}/quiet", server.url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "/quiet\n");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.records().is_empty());

    let _ = server.stop.send(());
}
