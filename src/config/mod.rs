// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the INA219 telemetry server
//!
//! The configuration is backed by an optional YAML file validated against an
//! embedded JSON schema, then against [`utils::validate_specific_rules`].
//! Command line arguments override file values through [`Config::apply_args`].
//!
//! ## Configuration Structure
//!
//! - `server`: listening address, port, backlog and reply format
//! - `sensor`: bus driver, I2C device and slave address, calibration
//!
//! ## Usage
//!
//! ```no_run
//! use ina219_server::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("ina219.yaml")).unwrap();
//!
//! // Command line overrides
//! config.apply_args(
//!     Some("eth0".to_string()),       // Interface or address
//!     Some("/dev/i2c-1".to_string()), // I2C device
//!     Some(2500),                     // Port
//!     false,                          // Simulated sensor
//!     None,                           // Slave address
//! );
//!
//! println!("Server port: {}", config.server.port);
//! ```

pub mod sensor;
pub mod server;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use sensor::{BusType, SensorConfig};
pub use server::ServerConfig;
pub use utils::{is_valid_ip_address, output_config_schema};

/// Embedded JSON schema of the configuration file.
pub(crate) const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration structure.
///
/// Both sections fall back to their defaults when omitted, so an empty file
/// is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Settings of the TCP command server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Settings of the INA219 and the bus it sits on.
    #[serde(default)]
    pub sensor: SensorConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default values. A file failing the
    /// schema or the additional rules leaves a `<name>.sample.yaml` next to
    /// it and returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // an empty document is an empty mapping
        let json_value = match serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })? {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            value => value,
        };

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_json::from_value(json_value) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// # Parameters
    ///
    /// * `address` - Network interface name or IP address to listen on
    /// * `device` - I2C bus device path
    /// * `port` - TCP port of the command server
    /// * `mock` - If true, use the simulated sensor instead of the I2C bus
    /// * `i2c_address` - Slave address of the sensor
    pub fn apply_args(
        &mut self,
        address: Option<String>,
        device: Option<String>,
        port: Option<u16>,
        mock: bool,
        i2c_address: Option<u16>,
    ) {
        if let Some(address) = address {
            debug!("Overriding address from command line: {}", address);
            self.server.address = address;
        }

        if let Some(device) = device {
            debug!("Overriding I2C device from command line: {}", device);
            self.sensor.device = device;
        }

        if let Some(port) = port {
            debug!("Overriding port from command line: {}", port);
            self.server.port = port;
        }

        if mock {
            debug!("Using the simulated sensor from command line");
            self.sensor.bus_type = BusType::Mock;
        }

        if let Some(i2c_address) = i2c_address {
            debug!(
                "Overriding I2C slave address from command line: 0x{:02x}",
                i2c_address
            );
            self.sensor.address = i2c_address;
        }
    }
}
