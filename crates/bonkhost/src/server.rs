//! Server assembly and accept loop.

use std::sync::Arc;

use bonkhost_room::{spawn_room, RoomHandle, ServerConfig};
use bonkhost_transport::{load_tls_config, Incoming, Listener};
use tokio::sync::oneshot;

use crate::handler::{handle_connection, handle_metadata};
use crate::ServerError;

/// A running bonkhost server: one listener, one room.
pub struct Server {
    listener: Listener,
    room: RoomHandle,
    shutdown: oneshot::Receiver<()>,
}

impl Server {
    /// Starts on `0.0.0.0:<configured port>`.
    pub async fn start(cfg: ServerConfig) -> Result<Self, ServerError> {
        let addr = format!("0.0.0.0:{}", cfg.port);
        Self::start_on(cfg, &addr).await
    }

    /// Starts on an explicit address (tests bind `127.0.0.1:0`).
    ///
    /// Fatal here: unusable TLS material when `useHttps` is set, a bad
    /// `disallowRegex` or `timeStampFormat`, an unreadable ban list, or
    /// a port that will not bind.
    pub async fn start_on(cfg: ServerConfig, addr: &str) -> Result<Self, ServerError> {
        cfg.check_tls_material()?;
        let tls = match (cfg.use_https, &cfg.tls_cert, &cfg.tls_key) {
            (true, Some(cert), Some(key)) => Some(load_tls_config(cert, key)?),
            _ => None,
        };

        let (room, shutdown) = spawn_room(Arc::new(cfg))?;
        let listener = Listener::bind(addr, tls).await?;

        Ok(Self {
            listener,
            room,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle for the admin console (and tests).
    pub fn room(&self) -> RoomHandle {
        self.room.clone()
    }

    /// Accepts connections until the room finishes a scheduled close.
    pub async fn run(mut self) -> Result<(), ServerError> {
        tracing::info!("bonkhost server running");

        loop {
            tokio::select! {
                _ = &mut self.shutdown => {
                    tracing::info!("room closed, stopping accept loop");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(Incoming::Socket(conn)) => {
                        let room = self.room.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, room).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Ok(Incoming::Http(request)) => {
                        let room = self.room.clone();
                        tokio::spawn(handle_metadata(request, room));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                }
            }
        }
    }
}
