//! HTTP routes
//!
//! | Method | Path     | Body                              | Reply                           |
//! |--------|----------|-----------------------------------|---------------------------------|
//! | GET    | `/`      |                                   | owner id → subprocess ids       |
//! | POST   | `/spawn` | `{command, args, env, pid}`       | `{code, subproc_pid}`           |
//! | POST   | `/stop`  | `{subproc_pid, pid}`              | `{code}`                        |
//!
//! Spawn failures answer `200 {"code":"failure"}` with the reason in the log
//! only. Bodies that do not decode answer `400`, unknown paths `404`, and a
//! wrong method on a known path `405`, all with `{"code":"failure"}`.

use hyper::body::HttpBody;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use leash_core::process::CommandSpec;
use leash_core::Supervisor;
use schema::{SpawnRequest, SpawnResponse, StopRequest, StopResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Largest request body accepted
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Dispatch one request against the supervisor
pub async fn route(supervisor: Supervisor, req: Request<Body>) -> Response<Body> {
    debug!("{} {}", req.method(), req.uri().path());

    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => index(&supervisor).await,
        (&Method::POST, "/spawn") => match read_json::<SpawnRequest>(req).await {
            Ok(request) => spawn(&supervisor, request).await,
            Err(response) => response,
        },
        (&Method::POST, "/stop") => match read_json::<StopRequest>(req).await {
            Ok(request) => stop(&supervisor, request).await,
            Err(response) => response,
        },
        (_, "/") => method_not_allowed("GET"),
        (_, "/spawn" | "/stop") => method_not_allowed("POST"),
        (method, path) => {
            debug!("No route for {} {}", method, path);
            json_response(StatusCode::NOT_FOUND, &StopResponse::failure())
        }
    }
}

async fn index(supervisor: &Supervisor) -> Response<Body> {
    json_response(StatusCode::OK, &supervisor.listing().await)
}

async fn spawn(supervisor: &Supervisor, request: SpawnRequest) -> Response<Body> {
    let owner_id = request.pid;
    let spec = CommandSpec::from(request);

    match supervisor.spawn(owner_id, &spec).await {
        Ok(subprocess_id) => json_response(StatusCode::OK, &SpawnResponse::success(subprocess_id)),
        Err(e) => {
            error!(
                "Could not spawn '{}' for process {}: {} ({})",
                spec.display_line(),
                owner_id,
                e,
                e.code()
            );
            json_response(StatusCode::OK, &SpawnResponse::failure())
        }
    }
}

async fn stop(supervisor: &Supervisor, request: StopRequest) -> Response<Body> {
    let found = supervisor.stop(request.pid, request.subproc_pid).await;
    json_response(StatusCode::OK, &StopResponse::from_found(found))
}

/// Decode a JSON body, or produce the error response to send instead
///
/// The body is read chunk by chunk and abandoned as soon as it grows past
/// [`MAX_BODY_SIZE`], so an oversized request is never buffered in full.
async fn read_json<T: DeserializeOwned>(req: Request<Body>) -> Result<T, Response<Body>> {
    let path = req.uri().path().to_string();
    let mut body = req.into_body();

    let too_large = |size: u64| {
        warn!(
            "Body of {} is at least {} bytes, above the {} byte limit",
            path, size, MAX_BODY_SIZE
        );
        json_response(StatusCode::PAYLOAD_TOO_LARGE, &StopResponse::failure())
    };

    // Content-Length, when present, bounds the body from below
    let declared = body.size_hint().lower();
    if declared > MAX_BODY_SIZE as u64 {
        return Err(too_large(declared));
    }

    let mut bytes = Vec::with_capacity(declared as usize);
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| {
            warn!("Failed to read body of {}: {}", path, e);
            json_response(StatusCode::BAD_REQUEST, &StopResponse::failure())
        })?;
        if bytes.len() + chunk.len() > MAX_BODY_SIZE {
            return Err(too_large((bytes.len() + chunk.len()) as u64));
        }
        bytes.extend_from_slice(&chunk);
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        warn!("Malformed body for {}: {}", path, e);
        json_response(StatusCode::BAD_REQUEST, &StopResponse::failure())
    })
}

fn method_not_allowed(allow: &'static str) -> Response<Body> {
    let mut response = json_response(StatusCode::METHOD_NOT_ALLOWED, &StopResponse::failure());
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("Failed to encode response: {}", e);
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leash_core::supervisor::{MockOwnerLiveness, MockProcessAdapter};
    use leash_core::{spawn_supervisor, SupervisorConfig};
    use schema::{Listing, ResponseCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn supervisor() -> Supervisor {
        let (event_tx, _) = broadcast::channel(64);
        spawn_supervisor(SupervisorConfig {
            process_adapter: Arc::new(MockProcessAdapter::new()),
            owner_liveness: Arc::new(MockOwnerLiveness::new()),
            event_tx,
            kill_grace: Duration::from_millis(50),
        })
    }

    fn post(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_spawn_then_list_then_stop() {
        let sup = supervisor();

        let response = route(
            sup.clone(),
            post("/spawn", r#"{"command":"sleep","args":["30"],"env":{},"pid":1234}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let spawned: SpawnResponse =
            serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(spawned.code, ResponseCode::Success);
        let subproc_pid = spawned.subproc_pid.unwrap();

        let index = Request::get("/").body(Body::empty()).unwrap();
        let listing: Listing = serde_json::from_value(body_json(route(sup.clone(), index).await).await).unwrap();
        assert_eq!(listing.get(&1234), Some(&vec![subproc_pid]));

        let body = format!(r#"{{"subproc_pid":{},"pid":1234}}"#, subproc_pid);
        let first = body_json(route(sup.clone(), post("/stop", &body)).await).await;
        assert_eq!(first["code"], "success");
        let second = body_json(route(sup.clone(), post("/stop", &body)).await).await;
        assert_eq!(second["code"], "failure");
    }

    #[tokio::test]
    async fn test_index_keys_are_strings() {
        let sup = supervisor();
        sup.spawn(77, &CommandSpec::new("sleep")).await.unwrap();

        let index = Request::get("/").body(Body::empty()).unwrap();
        let json = body_json(route(sup, index).await).await;
        assert!(json.get("77").is_some_and(serde_json::Value::is_array));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = route(supervisor(), post("/spawn", "{not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "failure");

        let response = route(supervisor(), post("/stop", r#"{"pid":1}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_route_and_wrong_method() {
        let response = route(supervisor(), Request::get("/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = route(supervisor(), Request::get("/spawn").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "POST");

        let response = route(supervisor(), post("/", "{}")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_oversized_stream_is_abandoned_early() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (mut sender, body) = Body::channel();
        let sent = Arc::new(AtomicUsize::new(0));
        let counter = sent.clone();
        let feeder = tokio::spawn(async move {
            let chunk = hyper::body::Bytes::from(vec![b'x'; 64 * 1024]);
            for _ in 0..200 {
                if sender.send_data(chunk.clone()).await.is_err() {
                    break;
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let req = Request::builder()
            .method(Method::POST)
            .uri("/spawn")
            .body(body)
            .unwrap();
        let response = route(supervisor(), req).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        feeder.await.unwrap();
        // The cap is one chunk; a couple more may sit in the channel
        assert!(sent.load(Ordering::SeqCst) <= 4, "read {} chunks", sent.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_declared_length_over_cap_is_rejected_before_reading() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/stop")
            .header(hyper::header::CONTENT_LENGTH, (MAX_BODY_SIZE + 1).to_string())
            .body(Body::from(vec![b' '; MAX_BODY_SIZE + 1]))
            .unwrap();
        let response = route(supervisor(), req).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let padding = "x".repeat(MAX_BODY_SIZE + 1);
        let body = format!(r#"{{"command":"{}","pid":1}}"#, padding);
        let response = route(supervisor(), post("/spawn", &body)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
