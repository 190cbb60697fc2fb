//! HTTP request and response bodies for the supervisor API
//!
//! The daemon exposes three routes:
//!
//! - `GET /` returns a [`Listing`] of owner id to subprocess ids
//! - `POST /spawn` takes a [`SpawnRequest`] and answers a [`SpawnResponse`]
//! - `POST /stop` takes a [`StopRequest`] and answers a [`StopResponse`]
//!
//! Field names are snake_case on the wire (`subproc_pid`), unlike the
//! camelCase configuration types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Identifier of an owner process (its OS pid)
pub type OwnerId = u32;

/// OS pid of a spawned subprocess
pub type SubprocessId = u32;

/// Index page body: owner id -> subprocess ids in spawn order.
///
/// Serialized as a JSON object whose keys are the decimal owner ids.
pub type Listing = BTreeMap<OwnerId, Vec<SubprocessId>>;

/// Request to spawn a subprocess on behalf of an owner
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Executable to run, resolved against `PATH` when not absolute
    pub command: String,
    /// Literal argument list, never interpreted by a shell
    #[serde(default)]
    pub args: Vec<String>,
    /// Complete environment of the child
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Pid of the owning process
    pub pid: OwnerId,
}

/// Request to stop a subprocess previously spawned for an owner
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StopRequest {
    /// Pid of the subprocess to stop
    pub subproc_pid: SubprocessId,
    /// Pid of the owner the subprocess was spawned for
    pub pid: OwnerId,
}

/// Outcome code carried by every mutating response
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseCode {
    /// The operation was carried out
    Success,
    /// The operation failed; details are only in the daemon log
    Failure,
}

impl From<bool> for ResponseCode {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Response to [`SpawnRequest`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SpawnResponse {
    /// Outcome
    pub code: ResponseCode,
    /// Pid of the new subprocess, present on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subproc_pid: Option<SubprocessId>,
}

impl SpawnResponse {
    /// Successful spawn of `subproc_pid`
    pub fn success(subproc_pid: SubprocessId) -> Self {
        Self {
            code: ResponseCode::Success,
            subproc_pid: Some(subproc_pid),
        }
    }

    /// Failed spawn
    pub fn failure() -> Self {
        Self {
            code: ResponseCode::Failure,
            subproc_pid: None,
        }
    }
}

/// Response to [`StopRequest`], and the generic failure body
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StopResponse {
    /// Outcome
    pub code: ResponseCode,
}

impl StopResponse {
    /// Response for a stop that found (`true`) or missed (`false`) its target
    pub fn from_found(found: bool) -> Self {
        Self { code: found.into() }
    }

    /// Generic failure body
    pub fn failure() -> Self {
        Self {
            code: ResponseCode::Failure,
        }
    }
}
