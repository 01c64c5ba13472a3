// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Measurement conversion engine
//!
//! Pure functions mapping raw register counts to physical units. The fixed
//! scale factors of the chip are named constants below; the current and power
//! scale factors depend on the calibration register and the shunt resistor and
//! are carried by [`Calibration`], which validates the pair once at startup.
//!
//! ## Scale factors
//!
//! | Quantity | LSB | Notes |
//! |----------|-----|-------|
//! | Shunt voltage | 10 µV | magnitude of the two's-complement value |
//! | Bus voltage | 4 mV | after dropping the 3 status bits |
//! | Current | 0.04096 / (CAL × R<sub>shunt</sub>) A | signed |
//! | Power | 20 × current LSB W | |

use super::codec::{is_negative, twos_complement_magnitude};
use crate::error::SetupError;

/// Shunt voltage LSB, in millivolts.
pub const SHUNT_VOLTAGE_LSB_MV: f64 = 0.01;

/// Bus voltage LSB, in volts, once the status bits are shifted out.
pub const BUS_VOLTAGE_LSB_V: f64 = 0.004;

/// Number of status bits below the bus voltage value.
pub const BUS_VOLTAGE_SHIFT: u32 = 3;

/// Conversion-ready (CNVR) flag of the bus voltage register.
pub const CONVERSION_READY: u16 = 0x0001;

/// Fixed term of the calibration equation `CAL = trunc(0.04096 / (I_lsb × R_shunt))`.
pub const CALIBRATION_SCALE: f64 = 0.04096;

/// Calibration register value written at startup unless configured otherwise.
pub const DEFAULT_CALIBRATION: u16 = 0x1400;

/// Shunt resistor fitted on common INA219 breakout boards, in ohms.
pub const DEFAULT_SHUNT_OHMS: f64 = 0.1;

/// Ratio between the power LSB and the current LSB.
pub const POWER_LSB_FACTOR: f64 = 20.0;

/// Calibration register value together with the scale factors it implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    register: u16,
    shunt_ohms: f64,
    current_lsb_amps: f64,
}

impl Calibration {
    /// Validate a calibration register value against the shunt resistor and
    /// derive the current LSB from it.
    pub fn new(register: u16, shunt_ohms: f64) -> Result<Self, SetupError> {
        let invalid = |reason: &str| SetupError::InvalidCalibration {
            register,
            shunt_ohms,
            reason: reason.to_string(),
        };

        if !shunt_ohms.is_finite() || shunt_ohms <= 0.0 {
            return Err(invalid("shunt resistance must be a positive number"));
        }
        if register == 0 {
            return Err(invalid("a zero calibration disables current and power readings"));
        }
        // FS0 is not implemented by the chip and always reads back as zero
        if register & 0x0001 != 0 {
            return Err(invalid("bit 0 of the calibration register is reserved"));
        }

        let current_lsb_amps = CALIBRATION_SCALE / (f64::from(register) * shunt_ohms);

        Ok(Self {
            register,
            shunt_ohms,
            current_lsb_amps,
        })
    }

    /// Raw value to write in the calibration register.
    pub fn register(&self) -> u16 {
        self.register
    }

    /// Shunt resistance this calibration was computed for, in ohms.
    pub fn shunt_ohms(&self) -> f64 {
        self.shunt_ohms
    }

    /// Current represented by one count of the current register, in amps.
    pub fn current_lsb_amps(&self) -> f64 {
        self.current_lsb_amps
    }

    /// Power represented by one count of the power register, in watts.
    pub fn power_lsb_watts(&self) -> f64 {
        self.current_lsb_amps * POWER_LSB_FACTOR
    }

    /// Largest current magnitude the current register can represent, in amps.
    pub fn max_current_amps(&self) -> f64 {
        f64::from(i16::MAX) * self.current_lsb_amps
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            register: DEFAULT_CALIBRATION,
            shunt_ohms: DEFAULT_SHUNT_OHMS,
            current_lsb_amps: CALIBRATION_SCALE
                / (f64::from(DEFAULT_CALIBRATION) * DEFAULT_SHUNT_OHMS),
        }
    }
}

/// Shunt voltage in millivolts.
///
/// Negative readings are converted through their two's-complement magnitude,
/// so the result is always non-negative.
pub fn shunt_voltage_millivolts(raw: u16) -> f64 {
    let counts = if is_negative(raw) {
        twos_complement_magnitude(raw)
    } else {
        raw
    };
    f64::from(counts) * SHUNT_VOLTAGE_LSB_MV
}

/// Bus voltage in volts, or `None` when no conversion completed this cycle.
pub fn bus_voltage_volts(raw: u16) -> Option<f64> {
    if raw & CONVERSION_READY == 0 {
        return None;
    }
    Some(f64::from(raw >> BUS_VOLTAGE_SHIFT) * BUS_VOLTAGE_LSB_V)
}

/// Current in amps. Negative values mean reverse current flow.
pub fn current_amps(raw: u16, calibration: &Calibration) -> f64 {
    f64::from(raw as i16) * calibration.current_lsb_amps()
}

/// Power in watts.
pub fn power_watts(raw: u16, calibration: &Calibration) -> f64 {
    f64::from(raw) * calibration.power_lsb_watts()
}

/// Load voltage reported to clients: bus voltage plus the shunt drop.
pub fn total_voltage(bus_volts: Option<f64>, shunt_millivolts: f64) -> Option<f64> {
    bus_volts.map(|bus| bus + shunt_millivolts / 1000.0)
}
