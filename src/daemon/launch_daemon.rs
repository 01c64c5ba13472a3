// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management Module
//!
//! Brings the server up in a fixed order and keeps its background tasks:
//!
//! 1. resolve the listening address (interface name or IP)
//! 2. open the I2C bus
//! 3. program the configuration and calibration registers
//! 4. bind the listening socket and start accepting clients
//!
//! Any failure up to step 4 aborts the launch with a
//! [`SetupError`](crate::error::SetupError); since the socket is bound last,
//! a sensor that cannot be programmed never leaves a listener behind.
//!
//! ## Usage
//!
//! ```no_run
//! use ina219_server::{config::Config, daemon::launch_daemon::Daemon};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = Config::from_file("ina219.yaml")?;
//!
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     // Later, trigger a graceful shutdown
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

use anyhow::Result;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::Config;
use crate::drivers::{self, RegisterBus};
use crate::ina219::SensorSession;
use crate::server::{resolve_listen_address, ConnectionServer, DispatchOptions};

/// Background task manager of the telemetry server
///
/// * `tasks` - handles of the running tasks, awaited by [`Daemon::join`]
/// * `running` - flag shared with every task to coordinate shutdown
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance with no task and the running flag set.
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            local_addr: None,
        }
    }

    /// Open the sensor selected by the configuration and start serving.
    ///
    /// # Errors
    ///
    /// Fails with a [`SetupError`](crate::error::SetupError) in the error
    /// chain when the calibration is invalid, the interface cannot be
    /// resolved, the bus cannot be opened, a control register write fails,
    /// or the socket cannot be bound.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        // checked before touching the hardware
        config.sensor.calibration()?;
        let address = resolve_listen_address(&config.server.address, config.server.port)?;

        info!(
            "Opening INA219 at 0x{:02x} on {} ({:?} bus)",
            config.sensor.address, config.sensor.device, config.sensor.bus_type
        );
        let bus = drivers::open_bus(&config.sensor)?;

        self.start(config, address, bus).await
    }

    /// Start serving with an already opened bus.
    ///
    /// Used by [`Daemon::launch`] and by tests that supply their own driver.
    pub async fn launch_with_bus(
        &mut self,
        config: &Config,
        bus: Box<dyn RegisterBus>,
    ) -> Result<()> {
        let address = resolve_listen_address(&config.server.address, config.server.port)?;
        self.start(config, address, bus).await
    }

    async fn start(
        &mut self,
        config: &Config,
        address: SocketAddr,
        bus: Box<dyn RegisterBus>,
    ) -> Result<()> {
        let calibration = config.sensor.calibration()?;
        let session = SensorSession::new(bus, calibration)
            .initialize(config.sensor.verify_setup)
            .await?;

        self.start_command_server(config, address, Arc::new(Mutex::new(session)))
    }

    /// Bind the listening socket and spawn the accept loop
    fn start_command_server(
        &mut self,
        config: &Config,
        address: SocketAddr,
        session: crate::server::SharedSession,
    ) -> Result<()> {
        let options = DispatchOptions {
            output_format: config.server.output_format,
            greeting: config.server.greeting,
        };
        let server =
            ConnectionServer::bind(address, config.server.backlog, session, options)?;
        let local_addr = server.local_addr()?;
        info!("Command server listening on {}", local_addr);
        self.local_addr = Some(local_addr);

        let running = self.running.clone();
        let task = tokio::spawn(async move { server.run(running).await });

        self.tasks.push(task);
        Ok(())
    }

    /// Address the command server is bound to, once launched.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Whether the daemon has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal every task to stop. Call [`Daemon::join`] to wait for them.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for all tasks to complete
    ///
    /// Task panics and task errors are logged, not returned.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => log::error!("Task failed: {:#}", e),
                Ok(Err(e)) => log::error!("Task panicked: {}", e),
                Err(_) => warn!("Task did not complete within timeout period, may be hung"),
            }
        }
        Ok(())
    }
}
