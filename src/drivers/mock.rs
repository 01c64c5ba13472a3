// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Mock I2C driver emulating an INA219
//!
//! The driver keeps an INA219 register file in memory. It can run in two ways:
//! - **Simulated**: the measurement registers are computed on every read from a
//!   [`SimulatedLoad`] (bus voltage, load current, shunt resistor) using the
//!   calibration value the host wrote, with a little noise on the current.
//! - **Scripted**: no load is attached and reads return whatever raw values
//!   were stored with [`MockI2CDriver::set_register`].
//!
//! Clones share the same register file, so a test can keep a handle on the
//! driver after boxing it into a session to inject failures or inspect the
//! writes the host performed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use log::{debug, trace};
use rand::Rng;

use super::RegisterBus;
use crate::ina219::codec::{decode_word, encode_word};
use crate::ina219::conversion::{
    BUS_VOLTAGE_LSB_V, BUS_VOLTAGE_SHIFT, CALIBRATION_SCALE, CONVERSION_READY, POWER_LSB_FACTOR,
    SHUNT_VOLTAGE_LSB_MV,
};
use crate::ina219::Register;

/// Configuration register value after power-on or reset.
const POWER_ON_CONFIGURATION: u16 = 0x399F;

/// Electrical conditions seen by the simulated sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedLoad {
    /// Voltage on the IN- pin, in volts
    pub bus_volts: f64,
    /// Current flowing through the shunt, in amps (negative for reverse flow)
    pub current_amps: f64,
    /// Shunt resistor fitted on the simulated board, in ohms
    pub shunt_ohms: f64,
    /// Peak amplitude of the random noise added to the current, in amps
    pub noise_amps: f64,
}

impl Default for SimulatedLoad {
    /// A 5 V LED panel drawing 750 mA through a 0.1 Ω shunt
    fn default() -> Self {
        Self {
            bus_volts: 5.0,
            current_amps: 0.75,
            shunt_ohms: 0.1,
            noise_amps: 0.005,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    registers: HashMap<Register, u16>,
    load: Option<SimulatedLoad>,
    failing_reads: HashSet<Register>,
    failing_writes: HashSet<Register>,
    writes: Vec<(Register, u16)>,
    reads: Vec<Register>,
}

impl MockState {
    fn measurement(&self, register: Register, load: &SimulatedLoad) -> u16 {
        let noise = if load.noise_amps > 0.0 {
            rand::rng().random_range(-load.noise_amps..=load.noise_amps)
        } else {
            0.0
        };
        let current = load.current_amps + noise;
        let calibration = self.registers.get(&Register::Calibration).copied().unwrap_or(0);
        // the chip leaves current and power at zero until calibrated
        let current_lsb = if calibration == 0 {
            None
        } else {
            Some(CALIBRATION_SCALE / (f64::from(calibration) * load.shunt_ohms))
        };

        match register {
            Register::ShuntVoltage => {
                let millivolts = current * load.shunt_ohms * 1000.0;
                to_signed_counts(millivolts / SHUNT_VOLTAGE_LSB_MV)
            }
            Register::BusVoltage => {
                let counts = (load.bus_volts / BUS_VOLTAGE_LSB_V).round().clamp(0.0, 8191.0) as u16;
                (counts << BUS_VOLTAGE_SHIFT) | CONVERSION_READY
            }
            Register::Current => current_lsb
                .map(|lsb| to_signed_counts(current / lsb))
                .unwrap_or(0),
            Register::Power => current_lsb
                .map(|lsb| {
                    let watts = (current * load.bus_volts).abs();
                    (watts / (lsb * POWER_LSB_FACTOR)).round().min(f64::from(u16::MAX)) as u16
                })
                .unwrap_or(0),
            Register::Configuration | Register::Calibration => {
                self.registers.get(&register).copied().unwrap_or(0)
            }
        }
    }
}

fn to_signed_counts(value: f64) -> u16 {
    value
        .round()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16 as u16
}

/// In-memory INA219 register file
#[derive(Debug, Clone)]
pub struct MockI2CDriver {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockI2CDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockI2CDriver {
    /// Create a scripted driver holding the power-on register values
    pub fn new() -> Self {
        let mut registers = HashMap::new();
        for register in Register::all() {
            registers.insert(register, 0);
        }
        registers.insert(Register::Configuration, POWER_ON_CONFIGURATION);

        Self {
            state: Arc::new(Mutex::new(MockState {
                registers,
                ..MockState::default()
            })),
        }
    }

    /// Create a driver whose measurement registers follow a simulated load
    pub fn simulated(load: SimulatedLoad) -> Self {
        let driver = Self::new();
        driver.set_load(Some(load));
        debug!(
            "Simulated INA219: {:.3} V bus, {:.3} A load, {} ohm shunt",
            load.bus_volts, load.current_amps, load.shunt_ohms
        );
        driver
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // a panicking test thread must not wedge every other handle
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach or detach the simulated load
    pub fn set_load(&self, load: Option<SimulatedLoad>) {
        self.state().load = load;
    }

    /// Store a raw register value, returned as-is by later reads while no
    /// load is attached
    pub fn set_register(&self, register: Register, value: u16) {
        self.state().registers.insert(register, value);
    }

    /// Current raw value of a register
    pub fn register(&self, register: Register) -> u16 {
        self.state().registers.get(&register).copied().unwrap_or(0)
    }

    /// Make every subsequent read of `register` fail
    pub fn fail_reads_of(&self, register: Register) {
        self.state().failing_reads.insert(register);
    }

    /// Make every subsequent write of `register` fail
    pub fn fail_writes_of(&self, register: Register) {
        self.state().failing_writes.insert(register);
    }

    /// Remove every injected failure
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_reads.clear();
        state.failing_writes.clear();
    }

    /// Writes performed so far, in order
    pub fn writes(&self) -> Vec<(Register, u16)> {
        self.state().writes.clone()
    }

    /// Registers read so far, in order
    pub fn reads(&self) -> Vec<Register> {
        self.state().reads.clone()
    }
}

#[async_trait::async_trait]
impl RegisterBus for MockI2CDriver {
    async fn read_register(&mut self, register: Register) -> Result<[u8; 2]> {
        // give other tasks a chance to run between register exchanges
        tokio::task::yield_now().await;

        let mut state = self.state();
        state.reads.push(register);
        if state.failing_reads.contains(&register) {
            return Err(anyhow!("simulated I/O error reading pointer 0x{:02x}", register.pointer()));
        }

        let value = match state.load {
            Some(load) => state.measurement(register, &load),
            None => state.registers.get(&register).copied().unwrap_or(0),
        };
        trace!("mock read {} = 0x{:04x}", register, value);
        Ok(encode_word(value))
    }

    async fn write_register(&mut self, register: Register, bytes: [u8; 2]) -> Result<()> {
        tokio::task::yield_now().await;

        let value = decode_word(bytes);
        let mut state = self.state();
        if state.failing_writes.contains(&register) {
            return Err(anyhow!("simulated I/O error writing pointer 0x{:02x}", register.pointer()));
        }

        state.writes.push((register, value));
        match register {
            Register::Configuration | Register::Calibration => {
                // FS0 of the calibration register is not implemented and reads as zero
                let stored = if register == Register::Calibration {
                    value & !0x0001
                } else {
                    value
                };
                state.registers.insert(register, stored);
            }
            _ => debug!("mock write to read-only {} register ignored", register),
        }
        trace!("mock write {} = 0x{:04x}", register, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ina219::conversion::{
        bus_voltage_volts, current_amps, power_watts, shunt_voltage_millivolts,
    };
    use crate::ina219::Calibration;
    use approx::assert_relative_eq;

    fn quiet_load() -> SimulatedLoad {
        SimulatedLoad {
            noise_amps: 0.0,
            ..SimulatedLoad::default()
        }
    }

    #[tokio::test]
    async fn scripted_reads_return_stored_values() {
        let mut driver = MockI2CDriver::new();
        driver.set_register(Register::ShuntVoltage, 0xF060);

        let bytes = driver.read_register(Register::ShuntVoltage).await.unwrap();
        assert_eq!(bytes, [0xF0, 0x60]);
        let bytes = driver.read_register(Register::Configuration).await.unwrap();
        assert_eq!(decode_word(bytes), POWER_ON_CONFIGURATION);
        assert_eq!(
            driver.reads(),
            vec![Register::ShuntVoltage, Register::Configuration]
        );
    }

    #[tokio::test]
    async fn writes_are_recorded_and_shared_between_clones() {
        let observer = MockI2CDriver::new();
        let mut driver = observer.clone();

        driver
            .write_register(Register::Calibration, encode_word(0x1400))
            .await
            .unwrap();

        assert_eq!(observer.writes(), vec![(Register::Calibration, 0x1400)]);
        assert_eq!(observer.register(Register::Calibration), 0x1400);
    }

    #[tokio::test]
    async fn injected_failures() {
        let mut driver = MockI2CDriver::new();
        driver.fail_reads_of(Register::BusVoltage);
        driver.fail_writes_of(Register::Configuration);

        assert!(driver.read_register(Register::BusVoltage).await.is_err());
        assert!(driver.read_register(Register::ShuntVoltage).await.is_ok());
        assert!(driver
            .write_register(Register::Configuration, [0x1F, 0xFF])
            .await
            .is_err());
        assert!(driver.writes().is_empty());

        driver.clear_failures();
        assert!(driver.read_register(Register::BusVoltage).await.is_ok());
    }

    #[tokio::test]
    async fn simulated_load_produces_consistent_registers() {
        let mut driver = MockI2CDriver::simulated(quiet_load());
        let calibration = Calibration::default();
        driver
            .write_register(Register::Calibration, encode_word(calibration.register()))
            .await
            .unwrap();

        let shunt = decode_word(driver.read_register(Register::ShuntVoltage).await.unwrap());
        let bus = decode_word(driver.read_register(Register::BusVoltage).await.unwrap());
        let current = decode_word(driver.read_register(Register::Current).await.unwrap());
        let power = decode_word(driver.read_register(Register::Power).await.unwrap());

        // 0.75 A through 0.1 ohm
        assert_relative_eq!(shunt_voltage_millivolts(shunt), 75.0, epsilon = 1e-9);
        assert_relative_eq!(bus_voltage_volts(bus).unwrap(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(current_amps(current, &calibration), 0.75, epsilon = 1e-4);
        assert_relative_eq!(power_watts(power, &calibration), 3.75, epsilon = 1e-3);
    }

    #[tokio::test]
    async fn simulated_current_is_zero_until_calibrated() {
        let mut driver = MockI2CDriver::simulated(quiet_load());
        let current = driver.read_register(Register::Current).await.unwrap();
        assert_eq!(decode_word(current), 0);
    }
}
