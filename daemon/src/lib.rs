//! Daemon library for the leash supervisor
//!
//! Serves the supervisor over HTTP/1.1 and owns the process-wide startup
//! and shutdown sequence (see [`bootstrap`]).

pub mod api;
pub mod bootstrap;
pub mod error;


pub use bootstrap::{bootstrap, bootstrap_with_listener, BootstrapHandle};
pub use error::{DaemonError, Result};

use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use leash_core::Supervisor;
use schema::DaemonConfig;
use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use tracing::info;

/// The HTTP front end of the supervisor
#[derive(Debug, Clone)]
pub struct Daemon {
    config: DaemonConfig,
    supervisor: Supervisor,
}

impl Daemon {
    /// Create a daemon serving `supervisor`
    #[must_use]
    pub fn new(config: DaemonConfig, supervisor: Supervisor) -> Self {
        Self { config, supervisor }
    }

    /// The supervisor requests are dispatched to
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Bind the configured host and port
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound.
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .map_err(|e| DaemonError::ServerError(format!("Failed to bind to {addr}: {e}")))?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    /// Serve requests on `listener` until `shutdown` resolves
    ///
    /// In-flight requests are allowed to finish after `shutdown` fires.
    ///
    /// # Errors
    /// Returns an error if the listener cannot be adopted by the server or
    /// the server fails while running.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr: SocketAddr = listener.local_addr()?;
        let supervisor = self.supervisor;

        let make_svc = make_service_fn(move |_conn| {
            let supervisor = supervisor.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let supervisor = supervisor.clone();
                    async move { Ok::<_, Infallible>(api::route(supervisor, req).await) }
                }))
            }
        });

        info!("Daemon listening on http://{}", local_addr);
        Server::from_tcp(listener)?
            .serve(make_svc)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Daemon stopped listening on {}", local_addr);
        Ok(())
    }
}
