// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Native I2C driver for Raspberry Pi class boards
//!
//! Talks to the sensor through a `/dev/i2c-*` character device using SMBus
//! word transfers. SMBus words are little-endian (first byte on the wire is
//! the low byte) while the INA219 sends its MSB first, so the word is split
//! back into wire order here and reassembled by the register codec.

use anyhow::{Context, Result};
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use log::debug;

use super::RegisterBus;
use crate::ina219::Register;

/// Native I2C driver bound to one slave address
pub struct NativeI2CDriver {
    device_path: String,
    device: LinuxI2CDevice,
}

impl NativeI2CDriver {
    /// Open the bus device and select the sensor's slave address
    pub fn new(device_path: &str, slave_address: u16) -> Result<Self> {
        let device = LinuxI2CDevice::new(device_path, slave_address).with_context(|| {
            format!(
                "Failed to open {} for slave address 0x{:02x}",
                device_path, slave_address
            )
        })?;
        debug!(
            "Opened {} for slave address 0x{:02x}",
            device_path, slave_address
        );

        Ok(Self {
            device_path: device_path.to_string(),
            device,
        })
    }
}

#[async_trait::async_trait]
impl RegisterBus for NativeI2CDriver {
    async fn read_register(&mut self, register: Register) -> Result<[u8; 2]> {
        let word = self
            .device
            .smbus_read_word_data(register.pointer())
            .with_context(|| format!("SMBus read from {}", self.device_path))?;
        Ok(word.to_le_bytes())
    }

    async fn write_register(&mut self, register: Register, bytes: [u8; 2]) -> Result<()> {
        self.device
            .smbus_write_word_data(register.pointer(), u16::from_le_bytes(bytes))
            .with_context(|| format!("SMBus write to {}", self.device_path))
    }
}
