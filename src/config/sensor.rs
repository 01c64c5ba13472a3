// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! INA219 sensor configuration
//!
//! Selects the bus driver and holds the values programmed into the chip at
//! startup. The configuration register itself is fixed; only the calibration
//! and the shunt resistor it refers to can be changed.

use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::ina219::conversion::{DEFAULT_CALIBRATION, DEFAULT_SHUNT_OHMS};
use crate::ina219::{Calibration, DEFAULT_SLAVE_ADDRESS};

/// Which bus driver talks to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    /// Linux `/dev/i2c-*` character device
    #[default]
    Native,
    /// Simulated sensor, no hardware needed
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub bus_type: BusType,

    /// I2C bus device, e.g. `/dev/i2c-1` on a Raspberry Pi.
    pub device: String,

    /// 7-bit slave address. `0x40` with A0 and A1 grounded.
    pub address: u16,

    /// Calibration register value.
    pub calibration: u16,

    /// Shunt resistor fitted on the board, in ohms.
    pub shunt_resistance_ohms: f64,

    /// Read the control registers back after programming them.
    pub verify_setup: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            bus_type: BusType::Native,
            device: "/dev/i2c-1".to_string(),
            address: DEFAULT_SLAVE_ADDRESS,
            calibration: DEFAULT_CALIBRATION,
            shunt_resistance_ohms: DEFAULT_SHUNT_OHMS,
            verify_setup: false,
        }
    }
}

impl SensorConfig {
    /// Validated calibration for this sensor.
    pub fn calibration(&self) -> Result<Calibration, SetupError> {
        Calibration::new(self.calibration, self.shunt_resistance_ohms)
    }
}
