//! Process management for the supervisor
//!
//! This module holds the platform-independent command description and the
//! platform-specific implementations for spawning children and signalling
//! them.
//!
//! ## Platform Support
//!
//! - **Unix**: children are spawned in their own process group so the whole
//!   tree they create can be signalled at once; owner liveness is checked with
//!   `kill(pid, 0)`.

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::*;

use std::collections::HashMap;

/// Description of a process to spawn
///
/// Arguments are passed to the executable as a literal list and never joined
/// into a shell string. The child receives exactly `env` as its environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable to run
    pub command: String,
    /// Argument list
    pub args: Vec<String>,
    /// Complete child environment
    pub env: HashMap<String, String>,
}

impl CommandSpec {
    /// Create a spec with no arguments and an empty environment
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set one environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Command line for log messages, quoting arguments that contain spaces
    pub fn display_line(&self) -> String {
        std::iter::once(&self.command)
            .chain(self.args.iter())
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("'{}'", part.replace('\'', r"'\''"))
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<schema::SpawnRequest> for CommandSpec {
    fn from(req: schema::SpawnRequest) -> Self {
        Self {
            command: req.command,
            args: req.args,
            env: req.env,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_line_quotes_whitespace() {
        let spec = CommandSpec::new("python").arg("-c").arg("print('a b')").arg("");
        assert_eq!(spec.display_line(), r#"python -c 'print('\''a b'\'')' ''"#);
    }

    #[test]
    fn test_from_spawn_request() {
        let req = schema::SpawnRequest {
            command: "sleep".to_string(),
            args: vec!["5".to_string()],
            env: [("A".to_string(), "1".to_string())].into_iter().collect(),
            pid: 1000,
        };
        let spec = CommandSpec::from(req);
        assert_eq!(spec, CommandSpec::new("sleep").arg("5").env("A", "1"));
    }
}
