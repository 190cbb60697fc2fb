//! HTTP API tests against a running daemon with real subprocesses

mod common;

use common::{dead_pid, request, run_with_timeout, start_daemon};
use hyper::{Method, StatusCode};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;

const TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::test]
async fn stop_with_wrong_owner_fails() {
    run_with_timeout(TIMEOUT, async {
        let handle = start_daemon(200).await;
        let owner = std::process::id();

        let (status, reply) = request(
            &handle,
            Method::POST,
            "/spawn",
            Some(json!({"command": "sleep", "args": ["30"], "env": {}, "pid": owner})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["code"], "success");
        let subproc_pid = reply["subproc_pid"].as_u64().expect("subproc_pid");

        let (_, reply) = request(
            &handle,
            Method::POST,
            "/stop",
            Some(json!({"subproc_pid": subproc_pid, "pid": owner + 1})),
        )
        .await;
        assert_eq!(reply, json!({"code": "failure"}));

        let (_, listing) = request(&handle, Method::GET, "/", None).await;
        assert_eq!(listing[owner.to_string()], json!([subproc_pid]));

        handle.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn spawn_under_live_owner_is_listed_and_stoppable() {
    run_with_timeout(TIMEOUT, async {
        let handle = start_daemon(200).await;
        let owner = std::process::id();

        let (_, reply) = request(
            &handle,
            Method::POST,
            "/spawn",
            Some(json!({"command": "sleep", "args": ["30"], "env": {}, "pid": owner})),
        )
        .await;
        assert_eq!(reply["code"], "success");
        let subproc_pid = reply["subproc_pid"].as_u64().unwrap();

        // Survives several sweeps because the owner is this test process
        sleep(Duration::from_millis(350)).await;
        let (_, listing) = request(&handle, Method::GET, "/", None).await;
        assert_eq!(listing[owner.to_string()], json!([subproc_pid]));

        let stop = json!({"subproc_pid": subproc_pid, "pid": owner});
        let (_, first) = request(&handle, Method::POST, "/stop", Some(stop.clone())).await;
        assert_eq!(first, json!({"code": "success"}));
        let (_, second) = request(&handle, Method::POST, "/stop", Some(stop)).await;
        assert_eq!(second, json!({"code": "failure"}));

        let (_, listing) = request(&handle, Method::GET, "/", None).await;
        assert_eq!(listing, json!({}));

        handle.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn children_of_dead_owner_are_reaped() {
    run_with_timeout(TIMEOUT, async {
        let handle = start_daemon(200).await;
        let owner = dead_pid();

        let (_, reply) = request(
            &handle,
            Method::POST,
            "/spawn",
            Some(json!({"command": "sleep", "args": ["30"], "pid": owner})),
        )
        .await;
        assert_eq!(reply["code"], "success");

        // Sweep period is capped at 100ms
        sleep(Duration::from_millis(400)).await;
        let (_, listing) = request(&handle, Method::GET, "/", None).await;
        assert!(listing.get(owner.to_string()).is_none());
        assert!(handle.supervisor().registry().is_empty().await);

        handle.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn spawn_failure_reports_failure() {
    run_with_timeout(TIMEOUT, async {
        let handle = start_daemon(200).await;

        let (status, reply) = request(
            &handle,
            Method::POST,
            "/spawn",
            Some(json!({
                "command": "/nonexistent/leash-test-binary",
                "args": [],
                "env": {},
                "pid": std::process::id()
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, json!({"code": "failure"}));

        let (_, listing) = request(&handle, Method::GET, "/", None).await;
        assert_eq!(listing, json!({}));

        handle.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    run_with_timeout(TIMEOUT, async {
        let handle = start_daemon(200).await;

        let (status, reply) = request(
            &handle,
            Method::POST,
            "/stop",
            Some(json!({"pid": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["code"], "failure");

        let (status, _) = request(&handle, Method::GET, "/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = request(&handle, Method::DELETE, "/stop", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        handle.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn shutdown_signals_every_subprocess() {
    run_with_timeout(TIMEOUT, async {
        let handle = start_daemon(5_000).await;
        let owner = std::process::id();

        for _ in 0..3 {
            let (_, reply) = request(
                &handle,
                Method::POST,
                "/spawn",
                Some(json!({"command": "sleep", "args": ["30"], "pid": owner})),
            )
            .await;
            assert_eq!(reply["code"], "success");
        }

        let report = handle.shutdown().await;
        assert_eq!(report.signalled, 3);
    })
    .await;
}
