//! Server infrastructure.
//!
//! One TCP listener, one independent task group per accepted connection.
//! Process-wide state — the configuration, the credential tables, and the
//! simulated online count — lives in a single [`ServerState`] built at
//! startup and shared with every handler. A connection failing, or even
//! panicking, never takes the listener with it.

mod config;
mod simulator;
mod subs;

pub use config::{Config, PasswordEntry};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};

use crate::auth::Authenticator;
use crate::error::{Error, Result};
use crate::protocol::front;

/// Process-wide shared state.
pub struct ServerState {
    pub config: Config,
    pub auth: Authenticator,
    /// Simulated online count; written by the simulator, read by status
    /// responders.
    pub online: Mutex<i32>,
}

impl ServerState {
    pub fn new(config: Config) -> Result<Self> {
        if config.online_max < config.online_min {
            return Err(Error::config("online_max is below online_min"));
        }
        let auth = Authenticator::from_entries(config.credentials())?;
        let online = Mutex::new((config.online_min + config.online_max) / 2);
        Ok(Self {
            config,
            auth,
            online,
        })
    }
}

/// The Minewire server.
pub struct Server {
    state: Arc<ServerState>,
}

impl Server {
    /// Validate configuration and build the credential tables.
    ///
    /// Fails — and the process should exit non-zero — on duplicate derived
    /// identifiers or nicknames.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            state: Arc::new(ServerState::new(config)?),
        })
    }

    /// Bind the listener and serve forever.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.state.config.listen_port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(
            "Minewire server started (version: {}, protocol: {}, addr: {})",
            self.state.config.version_name,
            self.state.config.protocol_id,
            addr
        );

        tokio::spawn(simulator::run(Arc::clone(&self.state)));
        if let Some(port) = self.state.config.subs_listen_port.clone() {
            tokio::spawn(subs::run(Arc::clone(&self.state), port));
        }

        loop {
            let (socket, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("accept error: {e}");
                    continue;
                }
            };
            if let Err(e) = prepare_socket(&socket) {
                tracing::debug!("socket options for {peer_addr}: {e}");
            }

            let state = Arc::clone(&self.state);
            let worker = tokio::spawn(front::drive_connection(socket, state));
            tokio::spawn(async move {
                match worker.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!("connection from {peer_addr} ended: {e}"),
                    Err(e) if e.is_panic() => {
                        // The socket died with the task; the listener did not.
                        tracing::error!("connection task for {peer_addr} panicked");
                    }
                    Err(_) => {}
                }
            });
        }
    }
}

/// Keepalive probing plus no-delay for the tunnel's small writes.
fn prepare_socket(socket: &TcpStream) -> std::io::Result<()> {
    socket.set_nodelay(true)?;
    socket2::SockRef::from(socket).set_keepalive(true)?;
    Ok(())
}
