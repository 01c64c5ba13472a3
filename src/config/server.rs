// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Command server configuration

use serde::{Deserialize, Serialize};

use crate::protocol::OutputFormat;

/// Port the command server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 2500;

/// Settings of the TCP command server.
///
/// # Example
///
/// ```
/// use ina219_server::config::ServerConfig;
///
/// let server = ServerConfig {
///     address: "eth0".to_string(),
///     port: 2500,
///     ..ServerConfig::default()
/// };
/// assert!(!server.greeting);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network interface name or IP address to bind to.
    ///
    /// An interface name such as `eth0` is resolved to its IPv4 address at
    /// startup. `0.0.0.0` listens on every interface.
    pub address: String,

    /// TCP port of the command server.
    pub port: u16,

    /// Length of the pending connection queue.
    pub backlog: u32,

    /// How replies are rendered.
    pub output_format: OutputFormat,

    /// Send an INFO line listing the commands to every new client.
    pub greeting: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            backlog: 10,
            output_format: OutputFormat::Json,
            greeting: false,
        }
    }
}
