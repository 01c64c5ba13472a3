// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! INA219 power monitor support
//!
//! This module contains everything needed to talk to a Texas Instruments INA219
//! current/power monitor through a [`RegisterBus`](crate::drivers::RegisterBus):
//!
//! - [`codec`]: big-endian register words and two's-complement helpers
//! - [`conversion`]: raw register counts to volts, amps and watts
//! - [`configuration`]: the bit layout of the configuration register
//! - [`session`]: the one-time setup sequence and the measurement queries
//!
//! ## Register Map
//!
//! | Pointer | Register | Access |
//! |---------|----------|--------|
//! | 0x00 | Configuration | R/W |
//! | 0x01 | Shunt voltage | R |
//! | 0x02 | Bus voltage | R |
//! | 0x03 | Power | R |
//! | 0x04 | Current | R |
//! | 0x05 | Calibration | R/W |

pub mod codec;
pub mod configuration;
pub mod conversion;
pub mod session;

use std::fmt;

pub use configuration::ConfigurationRegister;
pub use conversion::Calibration;
pub use session::{
    CurrentReading, Measurement, PowerReading, Ready, SensorSession, Uninitialized,
};

/// Default 7-bit slave address of an INA219 with A0 and A1 tied to ground.
pub const DEFAULT_SLAVE_ADDRESS: u16 = 0x40;

/// Register pointers of the INA219.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    Configuration = 0x00,
    ShuntVoltage = 0x01,
    BusVoltage = 0x02,
    Power = 0x03,
    Current = 0x04,
    Calibration = 0x05,
}

impl Register {
    /// Pointer byte sent on the bus to select this register.
    pub fn pointer(self) -> u8 {
        self as u8
    }

    /// Every register, in pointer order.
    pub fn all() -> [Register; 6] {
        [
            Register::Configuration,
            Register::ShuntVoltage,
            Register::BusVoltage,
            Register::Power,
            Register::Current,
            Register::Calibration,
        ]
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::Configuration => "configuration",
            Register::ShuntVoltage => "shunt-voltage",
            Register::BusVoltage => "bus-voltage",
            Register::Power => "power",
            Register::Current => "current",
            Register::Calibration => "calibration",
        };
        f.write_str(name)
    }
}

impl TryFrom<u8> for Register {
    type Error = u8;

    fn try_from(pointer: u8) -> Result<Self, Self::Error> {
        Register::all()
            .into_iter()
            .find(|register| register.pointer() == pointer)
            .ok_or(pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_round_trips_through_try_from() {
        for register in Register::all() {
            assert_eq!(Register::try_from(register.pointer()), Ok(register));
        }
        assert_eq!(Register::try_from(0x06), Err(0x06));
    }

    #[test]
    fn display_names_are_used_in_error_messages() {
        assert_eq!(Register::ShuntVoltage.to_string(), "shunt-voltage");
        assert_eq!(Register::BusVoltage.to_string(), "bus-voltage");
    }
}
