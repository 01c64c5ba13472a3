// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! I2C drivers for the INA219
//!
//! This module provides the register transport used by the sensor session:
//! - Native: `/dev/i2c-*` character devices on Linux boards
//! - Mock: an emulated INA219 register file for development and tests

pub mod mock;
#[cfg(target_os = "linux")]
pub mod native;

use anyhow::Result;
use log::info;

use crate::config::{BusType, SensorConfig};
use crate::error::SetupError;
use crate::ina219::Register;

pub use mock::{MockI2CDriver, SimulatedLoad};
#[cfg(target_os = "linux")]
pub use native::NativeI2CDriver;

/// Register transport for hardware abstraction
///
/// Words travel in wire order: the first byte of the array is the first byte
/// clocked on the bus (the most significant byte for the INA219).
#[async_trait::async_trait]
pub trait RegisterBus: Send {
    /// Read one register word
    async fn read_register(&mut self, register: Register) -> Result<[u8; 2]>;

    /// Write one register word
    async fn write_register(&mut self, register: Register, bytes: [u8; 2]) -> Result<()>;
}

/// Create the bus driver selected by the configuration
pub fn open_bus(config: &SensorConfig) -> Result<Box<dyn RegisterBus>, SetupError> {
    match config.bus_type {
        BusType::Native => open_native(config),
        BusType::Mock => {
            info!("Using simulated INA219, no hardware access");
            Ok(Box::new(MockI2CDriver::simulated(SimulatedLoad::default())))
        }
    }
}

#[cfg(target_os = "linux")]
fn open_native(config: &SensorConfig) -> Result<Box<dyn RegisterBus>, SetupError> {
    let driver = NativeI2CDriver::new(&config.device, config.address).map_err(|err| {
        SetupError::DeviceOpen {
            device: config.device.clone(),
            reason: format!("{err:#}"),
        }
    })?;
    Ok(Box::new(driver))
}

#[cfg(not(target_os = "linux"))]
fn open_native(config: &SensorConfig) -> Result<Box<dyn RegisterBus>, SetupError> {
    Err(SetupError::DeviceOpen {
        device: config.device.clone(),
        reason: "native I2C access is only available on Linux".to_string(),
    })
}
