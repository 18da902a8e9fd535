//! `GatehouseServer` builder and accept loop.
//!
//! This is the network entry point. It ties the layers together:
//! WebSocket transport → protocol codec → [`AuthService`] dispatch.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_protocol::{Codec, JsonCodec};
use gatehouse_session::SessionStore;
use gatehouse_store::Persistence;
use tokio::net::TcpListener;

use crate::handler::handle_connection;
use crate::log::EventLog;
use crate::password::PasswordHasher;
use crate::{AuthService, GatehouseError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so every task can hold it. The service itself is
/// stateless apart from its stores, which do their own locking.
pub(crate) struct ServerState<P, S, H, L, C> {
    pub(crate) service: AuthService<P, S, H, L>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a gateway.
///
/// # Example
///
/// ```rust,ignore
/// use gatehouse::prelude::*;
///
/// let service = AuthService::new(store, MemorySessionStore::default());
/// let server = GatehouseServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(service)
///     .await?;
/// server.run().await
/// ```
pub struct GatehouseServerBuilder {
    bind_addr: String,
    idle_timeout: Duration,
}

impl GatehouseServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr.clone(),
            idle_timeout: config.idle_timeout,
        }
    }

    /// Sets the address to bind to. Port 0 picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a connection may stay silent before it is closed.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener and wraps `service` for sharing.
    ///
    /// Frames are JSON ([`JsonCodec`]).
    pub async fn build<P, S, H, L>(
        self,
        service: AuthService<P, S, H, L>,
    ) -> Result<GatehouseServer<P, S, H, L, JsonCodec>, GatehouseError>
    where
        P: Persistence,
        S: SessionStore,
        H: PasswordHasher,
        L: EventLog,
    {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "gateway listening");

        let state = Arc::new(ServerState {
            service,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(GatehouseServer { listener, state })
    }
}

impl Default for GatehouseServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound gateway.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GatehouseServer<P, S, H, L, C> {
    listener: TcpListener,
    state: Arc<ServerState<P, S, H, L, C>>,
}

impl GatehouseServer<(), (), (), (), ()> {
    /// Creates a new builder.
    pub fn builder() -> GatehouseServerBuilder {
        GatehouseServerBuilder::new()
    }
}

impl<P, S, H, L, C> GatehouseServer<P, S, H, L, C>
where
    P: Persistence,
    S: SessionStore,
    H: PasswordHasher,
    L: EventLog,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), GatehouseError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Connections already accepted keep running in their own tasks
    /// until their client disconnects or goes idle.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), GatehouseError> {
        tracing::info!("gateway running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("gateway shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, state).await {
                                tracing::debug!(
                                    %peer,
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
