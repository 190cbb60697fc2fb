//! Test utilities for integration tests in the daemon crate.

#![allow(dead_code)]

use daemon::{bootstrap_with_listener, BootstrapHandle};
use hyper::{Body, Client, Method, Request, StatusCode};
use schema::DaemonConfig;
use std::net::TcpListener;
use std::time::Duration;

/// Run the given future with a timeout, failing the test if it elapses.
pub async fn run_with_timeout<F, T>(duration: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .expect("test timed out")
}

/// Start a daemon on an ephemeral localhost port
pub async fn start_daemon(kill_grace_ms: u64) -> BootstrapHandle {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let config = DaemonConfig {
        port: listener.local_addr().unwrap().port(),
        kill_grace_ms,
        ..DaemonConfig::default()
    };
    bootstrap_with_listener(config, listener)
        .await
        .expect("bootstrap daemon")
}

/// Send a request and decode the JSON reply
pub async fn request(
    handle: &BootstrapHandle,
    method: Method,
    path: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let uri = format!("http://{}{}", handle.local_addr(), path);
    let body = match body {
        Some(json) => Body::from(serde_json::to_vec(&json).unwrap()),
        None => Body::empty(),
    };
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = Client::new().request(req).await.expect("daemon reachable");
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON reply")
    };
    (status, json)
}

/// A pid that existed once and has been reaped
pub fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}
