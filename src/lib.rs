// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! INA219 telemetry server
//!
//! Reads bus voltage and load current from an INA219 power monitor on an I2C
//! bus and serves them to TCP clients through a line-oriented command
//! protocol (`voltage`, `current`, `log`, `exit`).
//!
//! - [`ina219`]: register codec, unit conversion and the sensor session
//! - [`drivers`]: I2C register transports (Linux `/dev/i2c-*` and simulated)
//! - [`protocol`]: client commands and reply rendering
//! - [`server`]: the per-connection command loop and the accept loop
//! - [`daemon`]: startup order and background task lifetime
//! - [`config`]: YAML configuration with schema validation

pub mod config;
pub mod daemon;
pub mod drivers;
pub mod error;
pub mod ina219;
pub mod protocol;
pub mod server;

pub use error::{SetupError, TransportError};
