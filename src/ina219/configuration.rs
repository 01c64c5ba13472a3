// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration register layout
//!
//! ```text
//!  15  14  13   12 11   10 .. 7   6 .. 3   2 .. 0
//! RST  -  BRNG   PG      BADC      SADC     MODE
//! ```
//!
//! The server programs the register once at startup with
//! [`ConfigurationRegister::default`]: 16 V bus range, PGA /8 (±320 mV),
//! 128-sample averaging on both ADCs and continuous shunt + bus conversion,
//! which encodes to `0x1FFF`.

use std::fmt;

/// Bus voltage full-scale range (BRNG).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusVoltageRange {
    Volts16 = 0,
    Volts32 = 1,
}

/// Programmable gain amplifier setting (PG) and the shunt range it gives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgaGain {
    /// ±40 mV
    Div1 = 0b00,
    /// ±80 mV
    Div2 = 0b01,
    /// ±160 mV
    Div4 = 0b10,
    /// ±320 mV
    Div8 = 0b11,
}

impl PgaGain {
    /// Full-scale shunt voltage of this gain, in millivolts.
    pub fn shunt_range_millivolts(self) -> f64 {
        match self {
            PgaGain::Div1 => 40.0,
            PgaGain::Div2 => 80.0,
            PgaGain::Div4 => 160.0,
            PgaGain::Div8 => 320.0,
        }
    }
}

/// ADC resolution or averaging (BADC / SADC fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcSetting {
    Bits9 = 0b0000,
    Bits10 = 0b0001,
    Bits11 = 0b0010,
    Bits12 = 0b0011,
    Samples2 = 0b1001,
    Samples4 = 0b1010,
    Samples8 = 0b1011,
    Samples16 = 0b1100,
    Samples32 = 0b1101,
    Samples64 = 0b1110,
    Samples128 = 0b1111,
}

impl AdcSetting {
    fn from_field(field: u16) -> Self {
        match field & 0b1111 {
            // bit 3 is ignored by the 9 to 12-bit modes
            0b0000 | 0b0100 => AdcSetting::Bits9,
            0b0001 | 0b0101 => AdcSetting::Bits10,
            0b0010 | 0b0110 => AdcSetting::Bits11,
            0b0011 | 0b0111 | 0b1000 => AdcSetting::Bits12,
            0b1001 => AdcSetting::Samples2,
            0b1010 => AdcSetting::Samples4,
            0b1011 => AdcSetting::Samples8,
            0b1100 => AdcSetting::Samples16,
            0b1101 => AdcSetting::Samples32,
            0b1110 => AdcSetting::Samples64,
            _ => AdcSetting::Samples128,
        }
    }
}

/// Operating mode (MODE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    PowerDown = 0b000,
    ShuntTriggered = 0b001,
    BusTriggered = 0b010,
    ShuntAndBusTriggered = 0b011,
    AdcOff = 0b100,
    ShuntContinuous = 0b101,
    BusContinuous = 0b110,
    ShuntAndBusContinuous = 0b111,
}

/// Decoded contents of the configuration register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationRegister {
    pub bus_range: BusVoltageRange,
    pub gain: PgaGain,
    pub bus_adc: AdcSetting,
    pub shunt_adc: AdcSetting,
    pub mode: OperatingMode,
}

impl Default for ConfigurationRegister {
    fn default() -> Self {
        Self {
            bus_range: BusVoltageRange::Volts16,
            gain: PgaGain::Div8,
            bus_adc: AdcSetting::Samples128,
            shunt_adc: AdcSetting::Samples128,
            mode: OperatingMode::ShuntAndBusContinuous,
        }
    }
}

impl ConfigurationRegister {
    /// Encode the fields into the register value.
    pub fn bits(&self) -> u16 {
        ((self.bus_range as u16) << 13)
            | ((self.gain as u16) << 11)
            | ((self.bus_adc as u16) << 7)
            | ((self.shunt_adc as u16) << 3)
            | self.mode as u16
    }

    /// Decode a register value read back from the chip.
    pub fn from_bits(bits: u16) -> Self {
        let bus_range = if bits & (1 << 13) != 0 {
            BusVoltageRange::Volts32
        } else {
            BusVoltageRange::Volts16
        };
        let gain = match (bits >> 11) & 0b11 {
            0b00 => PgaGain::Div1,
            0b01 => PgaGain::Div2,
            0b10 => PgaGain::Div4,
            _ => PgaGain::Div8,
        };
        let mode = match bits & 0b111 {
            0b000 => OperatingMode::PowerDown,
            0b001 => OperatingMode::ShuntTriggered,
            0b010 => OperatingMode::BusTriggered,
            0b011 => OperatingMode::ShuntAndBusTriggered,
            0b100 => OperatingMode::AdcOff,
            0b101 => OperatingMode::ShuntContinuous,
            0b110 => OperatingMode::BusContinuous,
            _ => OperatingMode::ShuntAndBusContinuous,
        };

        Self {
            bus_range,
            gain,
            bus_adc: AdcSetting::from_field(bits >> 7),
            shunt_adc: AdcSetting::from_field(bits >> 3),
            mode,
        }
    }
}

impl fmt::Display for ConfigurationRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04x} (range {:?}, gain {:?}, bus ADC {:?}, shunt ADC {:?}, mode {:?})",
            self.bits(),
            self.bus_range,
            self.gain,
            self.bus_adc,
            self.shunt_adc,
            self.mode
        )
    }
}
