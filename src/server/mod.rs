// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! TCP connection server
//!
//! The acceptor hands every connection to its own task in a [`JoinSet`]. Each
//! task owns its stream exclusively and shares the already initialized sensor
//! session through a [`SharedSession`]. Finished tasks are reaped by the accept
//! loop as they complete; their outcome is logged and dropped.

pub mod dispatcher;
pub mod interface;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time;

use crate::error::SetupError;
use crate::ina219::{Ready, SensorSession};

pub use dispatcher::{serve_connection, ConnectionEnd, DispatchOptions};
pub use interface::resolve_listen_address;

/// Sensor session shared by every connection. Locked for one command at a time.
pub type SharedSession = Arc<Mutex<SensorSession<Ready>>>;

/// How often the accept loop checks the running flag.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pause after a failed accept, so that a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Listening socket plus what every connection needs
pub struct ConnectionServer {
    listener: TcpListener,
    session: SharedSession,
    options: DispatchOptions,
}

impl ConnectionServer {
    /// Bind the listening socket with `SO_REUSEADDR` and the given backlog.
    pub fn bind(
        address: SocketAddr,
        backlog: u32,
        session: SharedSession,
        options: DispatchOptions,
    ) -> Result<Self, SetupError> {
        let listen_error = |source: std::io::Error| SetupError::Listen {
            address: address.to_string(),
            source,
        };

        let socket = match address {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(listen_error)?;
        socket.set_reuseaddr(true).map_err(listen_error)?;
        socket.bind(address).map_err(listen_error)?;
        let listener = socket.listen(backlog).map_err(listen_error)?;

        Ok(Self {
            listener,
            session,
            options,
        })
    }

    /// Address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `running` is cleared, then abort the workers.
    pub async fn run(self, running: Arc<AtomicBool>) -> Result<()> {
        let mut workers: JoinSet<(SocketAddr, Result<ConnectionEnd>)> = JoinSet::new();
        let mut poll = time::interval(SHUTDOWN_POLL_INTERVAL);

        while running.load(Ordering::SeqCst) {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("Client {} connected", peer);
                        let session = Arc::clone(&self.session);
                        let options = self.options;
                        workers.spawn(async move {
                            let end = handle_client(stream, session, options).await;
                            (peer, end)
                        });
                    }
                    Err(err) => {
                        warn!("Failed to accept connection: {}", err);
                        time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                Some(finished) = workers.join_next(), if !workers.is_empty() => {
                    log_worker_exit(finished);
                }
                _ = poll.tick() => {}
            }
        }

        info!(
            "Command server stopping, closing {} open connection(s)",
            workers.len()
        );
        workers.shutdown().await;
        Ok(())
    }
}

async fn handle_client(
    stream: TcpStream,
    session: SharedSession,
    options: DispatchOptions,
) -> Result<ConnectionEnd> {
    let (reader, writer) = stream.into_split();
    serve_connection(BufReader::new(reader), writer, session, options).await
}

fn log_worker_exit(
    finished: Result<(SocketAddr, Result<ConnectionEnd>), tokio::task::JoinError>,
) {
    match finished {
        Ok((peer, Ok(ConnectionEnd::Exit))) => info!("Client {} exited", peer),
        Ok((peer, Ok(ConnectionEnd::Closed))) => info!("Client {} disconnected", peer),
        Ok((peer, Ok(ConnectionEnd::TransportFailure))) => {
            warn!("Client {} closed after a sensor error", peer)
        }
        Ok((peer, Err(err))) => warn!("Client {} connection error: {:#}", peer, err),
        Err(err) if err.is_cancelled() => debug!("Connection task cancelled"),
        Err(err) => error!("Connection task panicked: {}", err),
    }
}
