// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error taxonomy
//!
//! - [`TransportError`]: a register exchange with the sensor failed. Fatal to
//!   the connection that triggered it, never to the server.
//! - [`SetupError`]: the server could not reach a serving state. Fatal to the
//!   process, which exits with [`SetupError::exit_code`].
//!
//! Unrecognized client commands are not errors at this level; they are
//! answered with a warning reply and the connection carries on.

use thiserror::Error;

use crate::ina219::Register;

/// A register read or write failed at the hardware layer.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("read {register} register: {reason}")]
    Read { register: Register, reason: String },

    #[error("write {register} register: {reason}")]
    Write { register: Register, reason: String },
}

impl TransportError {
    /// Register involved in the failed exchange.
    pub fn register(&self) -> Register {
        match self {
            TransportError::Read { register, .. } | TransportError::Write { register, .. } => {
                *register
            }
        }
    }
}

/// Failures that prevent the server from starting.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Failed to open I2C device {device}: {reason}")]
    DeviceOpen { device: String, reason: String },

    #[error("Invalid calibration 0x{register:04x} for a {shunt_ohms} ohm shunt: {reason}")]
    InvalidCalibration {
        register: u16,
        shunt_ohms: f64,
        reason: String,
    },

    #[error("Failed to configure the sensor: {0}")]
    Configure(#[source] TransportError),

    #[error("Failed to calibrate the sensor: {0}")]
    Calibrate(#[source] TransportError),

    #[error("Failed to resolve network interface '{interface}': {reason}")]
    Interface { interface: String, reason: String },

    #[error("Failed to listen on {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

impl SetupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupError::Config { .. } => 2,
            SetupError::DeviceOpen { .. } => 3,
            SetupError::InvalidCalibration { .. } => 4,
            SetupError::Configure(_) => 5,
            SetupError::Calibrate(_) => 6,
            SetupError::Interface { .. } => 7,
            SetupError::Listen { .. } => 8,
        }
    }
}

/// Process exit code for an error returned by the startup path.
///
/// A [`SetupError`] anywhere in the chain selects its own code; any other
/// failure exits with 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<SetupError>())
        .map(SetupError::exit_code)
        .unwrap_or(1)
}
