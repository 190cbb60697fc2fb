//! Client library for the leash daemon HTTP API

pub mod error;

pub use error::{CliError, Result};

use hyper::body::Buf;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client as HttpClient, Method, Request, StatusCode};
use schema::{
    ClientConfig, Listing, OwnerId, ResponseCode, SpawnRequest, SpawnResponse, StopRequest,
    StopResponse, SubprocessId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Client for the daemon's HTTP API
#[derive(Debug, Clone)]
pub struct Client {
    config: ClientConfig,
    http: HttpClient<HttpConnector>,
}

impl Client {
    /// Create a client for the daemon described by `config`
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    /// Owner id → subprocess ids currently managed
    pub async fn list(&self) -> Result<Listing> {
        self.send::<(), Listing>(Method::GET, "/", None).await
    }

    /// Spawn `command` with `args` and exactly `env` on behalf of `owner`
    pub async fn spawn(
        &self,
        owner: OwnerId,
        command: impl Into<String>,
        args: Vec<String>,
        env: HashMap<String, String>,
    ) -> Result<SubprocessId> {
        let request = SpawnRequest {
            command: command.into(),
            args,
            env,
            pid: owner,
        };
        let reply: SpawnResponse = self.send(Method::POST, "/spawn", Some(&request)).await?;
        match (reply.code, reply.subproc_pid) {
            (ResponseCode::Success, Some(pid)) => Ok(pid),
            (ResponseCode::Success, None) => Err(CliError::DaemonError(
                "spawn succeeded without a subprocess pid".to_string(),
            )),
            (ResponseCode::Failure, _) => Err(CliError::CommandFailed(format!(
                "daemon could not spawn '{}' (see daemon log)",
                request.command
            ))),
        }
    }

    /// Ask the daemon to terminate `subprocess` owned by `owner`.
    ///
    /// Returns `false` when the daemon does not manage that pair.
    pub async fn stop(&self, owner: OwnerId, subprocess: SubprocessId) -> Result<bool> {
        let request = StopRequest {
            subproc_pid: subprocess,
            pid: owner,
        };
        let reply: StopResponse = self.send(Method::POST, "/stop", Some(&request)).await?;
        Ok(reply.code == ResponseCode::Success)
    }

    async fn send<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R> {
        let uri = format!("{}{}", self.config.base_url(), path);
        debug!("{} {}", method, uri);

        let body = match body {
            Some(value) => Body::from(serde_json::to_vec(value)?),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(&uri)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(|e| CliError::InvalidArgument(format!("{uri}: {e}")))?;

        let limit = Duration::from_secs(self.config.timeout_seconds);
        let response = match timeout(limit, self.http.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(CliError::ConnectionFailed(format!("{uri}: {e}"))),
            Err(_) => return Err(CliError::Timeout(limit)),
        };

        let status = response.status();
        let bytes = hyper::body::aggregate(response.into_body())
            .await
            .map_err(|e| CliError::ConnectionFailed(format!("{uri}: {e}")))?;

        if status != StatusCode::OK {
            return Err(CliError::DaemonError(format!("{uri} answered {status}")));
        }
        Ok(serde_json::from_reader(bytes.reader())?)
    }
}

/// Parse a `KEY=VALUE` environment assignment
pub fn parse_env_pair(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::InvalidArgument(format!(
            "expected KEY=VALUE, got '{pair}'"
        ))),
    }
}
