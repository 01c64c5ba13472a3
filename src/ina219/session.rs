// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor session
//!
//! A [`SensorSession`] owns the register bus of one INA219. It starts in the
//! [`Uninitialized`] state, where the only available operation is
//! [`SensorSession::initialize`]: that call programs the configuration and
//! calibration registers and yields a session in the [`Ready`] state. The
//! measurement queries only exist on `SensorSession<Ready>`, so the control
//! registers are always written exactly once and before any query.
//!
//! The three registers of a snapshot are independent round-trips on the bus.
//! The chip may update its results between them; callers that need a
//! consistent view across clients serialize whole snapshots with a lock.

use std::marker::PhantomData;

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use super::codec::{decode_word, encode_word};
use super::configuration::ConfigurationRegister;
use super::conversion::{self, Calibration};
use super::Register;
use crate::drivers::RegisterBus;
use crate::error::{SetupError, TransportError};

/// Control registers have not been written yet.
#[derive(Debug)]
pub struct Uninitialized;

/// Control registers are programmed; measurements can be queried.
#[derive(Debug)]
pub struct Ready;

/// One set of readings taken by [`SensorSession::snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Shunt voltage magnitude, in millivolts
    pub shunt_millivolts: f64,
    /// Bus voltage, absent when the conversion-ready flag was clear
    pub bus_volts: Option<f64>,
    /// Signed load current, in amps
    pub current_amps: f64,
    pub timestamp: DateTime<Local>,
}

impl Measurement {
    /// Load voltage: bus voltage plus the drop across the shunt.
    pub fn voltage(&self) -> Option<f64> {
        conversion::total_voltage(self.bus_volts, self.shunt_millivolts)
    }

    /// Power delivered to the load, from the bus voltage and the current.
    pub fn power_watts(&self) -> Option<f64> {
        self.bus_volts.map(|bus| bus * self.current_amps)
    }
}

/// Result of a current-only query.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentReading {
    pub current_amps: f64,
    pub timestamp: DateTime<Local>,
}

/// Result of a power register query.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerReading {
    /// Power computed by the chip, in watts
    pub power_watts: f64,
    pub timestamp: DateTime<Local>,
}

/// Handle on one INA219, parameterized by its setup state.
pub struct SensorSession<S> {
    bus: Box<dyn RegisterBus>,
    configuration: ConfigurationRegister,
    calibration: Calibration,
    _state: PhantomData<S>,
}

impl<S> SensorSession<S> {
    /// Calibration applied to current conversions.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Configuration register value written at initialization.
    pub fn configuration(&self) -> ConfigurationRegister {
        self.configuration
    }

    async fn read(&mut self, register: Register) -> Result<u16, TransportError> {
        let bytes = self
            .bus
            .read_register(register)
            .await
            .map_err(|err| TransportError::Read {
                register,
                reason: format!("{err:#}"),
            })?;
        Ok(decode_word(bytes))
    }

    async fn write(&mut self, register: Register, value: u16) -> Result<(), TransportError> {
        self.bus
            .write_register(register, encode_word(value))
            .await
            .map_err(|err| TransportError::Write {
                register,
                reason: format!("{err:#}"),
            })
    }
}

impl SensorSession<Uninitialized> {
    /// Wrap an open bus. Nothing is sent to the chip until [`initialize`](Self::initialize).
    pub fn new(bus: Box<dyn RegisterBus>, calibration: Calibration) -> Self {
        Self {
            bus,
            configuration: ConfigurationRegister::default(),
            calibration,
            _state: PhantomData,
        }
    }

    /// Program the configuration register, then the calibration register.
    ///
    /// A failed write is fatal: the chip is left in an unknown state and no
    /// repair is attempted. With `verify_setup`, the registers are read before
    /// and after the writes and any mismatch is logged.
    pub async fn initialize(mut self, verify_setup: bool) -> Result<SensorSession<Ready>, SetupError> {
        if verify_setup {
            self.log_control_registers("Initial").await;
        }

        let configuration = self.configuration.bits();
        debug!("Writing configuration register: {}", self.configuration);
        self.write(Register::Configuration, configuration)
            .await
            .map_err(SetupError::Configure)?;

        let calibration = self.calibration.register();
        debug!(
            "Writing calibration register: 0x{:04x} (current LSB {:.3e} A)",
            calibration,
            self.calibration.current_lsb_amps()
        );
        self.write(Register::Calibration, calibration)
            .await
            .map_err(SetupError::Calibrate)?;

        if verify_setup {
            self.verify_control_registers(configuration, calibration).await;
        }

        info!(
            "INA219 ready: configuration 0x{:04x}, calibration 0x{:04x}, max current {:.2} A",
            configuration,
            calibration,
            self.calibration.max_current_amps()
        );

        Ok(SensorSession {
            bus: self.bus,
            configuration: self.configuration,
            calibration: self.calibration,
            _state: PhantomData,
        })
    }

    async fn log_control_registers(&mut self, label: &str) {
        match self.read(Register::Configuration).await {
            Ok(value) => debug!(
                "{} configuration register: {}",
                label,
                ConfigurationRegister::from_bits(value)
            ),
            Err(err) => warn!("Cannot read configuration register: {}", err),
        }
        match self.read(Register::Calibration).await {
            Ok(value) => debug!("{} calibration register: 0x{:04x}", label, value),
            Err(err) => warn!("Cannot read calibration register: {}", err),
        }
    }

    async fn verify_control_registers(&mut self, configuration: u16, calibration: u16) {
        for (register, expected) in [
            (Register::Configuration, configuration),
            (Register::Calibration, calibration),
        ] {
            match self.read(register).await {
                Ok(value) if value == expected => {
                    debug!("Read back {} register: 0x{:04x}", register, value)
                }
                Ok(value) => warn!(
                    "{} register reads back 0x{:04x}, expected 0x{:04x}",
                    register, value, expected
                ),
                Err(err) => warn!("Cannot read back {} register: {}", register, err),
            }
        }
    }
}

impl SensorSession<Ready> {
    /// Read shunt voltage, bus voltage and current, in that order.
    ///
    /// The first failing read aborts the snapshot.
    pub async fn snapshot(&mut self) -> Result<Measurement, TransportError> {
        let shunt = self.read(Register::ShuntVoltage).await?;
        let bus = self.read(Register::BusVoltage).await?;
        let current = self.read(Register::Current).await?;

        let bus_volts = conversion::bus_voltage_volts(bus);
        if bus_volts.is_none() {
            debug!("Bus voltage register 0x{:04x} has no conversion ready", bus);
        }

        Ok(Measurement {
            shunt_millivolts: conversion::shunt_voltage_millivolts(shunt),
            bus_volts,
            current_amps: conversion::current_amps(current, &self.calibration),
            timestamp: Local::now(),
        })
    }

    /// Read the current register only.
    pub async fn read_current(&mut self) -> Result<CurrentReading, TransportError> {
        let current = self.read(Register::Current).await?;
        Ok(CurrentReading {
            current_amps: conversion::current_amps(current, &self.calibration),
            timestamp: Local::now(),
        })
    }

    /// Read the power register, which the chip derives from its own bus
    /// voltage and current results.
    pub async fn read_power(&mut self) -> Result<PowerReading, TransportError> {
        let power = self.read(Register::Power).await?;
        Ok(PowerReading {
            power_watts: conversion::power_watts(power, &self.calibration),
            timestamp: Local::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::MockI2CDriver;
    use approx::assert_relative_eq;

    async fn ready_session(driver: &MockI2CDriver) -> SensorSession<Ready> {
        SensorSession::new(Box::new(driver.clone()), Calibration::default())
            .initialize(false)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn initialize_writes_configuration_then_calibration() {
        let driver = MockI2CDriver::new();
        let session = ready_session(&driver).await;

        assert_eq!(
            driver.writes(),
            vec![
                (Register::Configuration, 0x1FFF),
                (Register::Calibration, 0x1400)
            ]
        );
        assert_eq!(session.calibration().register(), 0x1400);
    }

    #[tokio::test]
    async fn verify_setup_reads_back_without_extra_writes() {
        let driver = MockI2CDriver::new();
        SensorSession::new(Box::new(driver.clone()), Calibration::default())
            .initialize(true)
            .await
            .unwrap();

        assert_eq!(driver.writes().len(), 2);
        assert_eq!(driver.register(Register::Configuration), 0x1FFF);
        assert!(driver.reads().contains(&Register::Calibration));
    }

    #[tokio::test]
    async fn failed_configuration_write_aborts_setup() {
        let driver = MockI2CDriver::new();
        driver.fail_writes_of(Register::Configuration);

        let result = SensorSession::new(Box::new(driver.clone()), Calibration::default())
            .initialize(false)
            .await;

        assert!(matches!(result, Err(SetupError::Configure(_))));
        // no calibration is attempted on a half-configured chip
        assert!(driver.writes().is_empty());
    }

    #[tokio::test]
    async fn failed_calibration_write_aborts_setup() {
        let driver = MockI2CDriver::new();
        driver.fail_writes_of(Register::Calibration);

        let result = SensorSession::new(Box::new(driver.clone()), Calibration::default())
            .initialize(false)
            .await;

        assert!(matches!(result, Err(SetupError::Calibrate(_))));
    }

    #[tokio::test]
    async fn snapshot_reads_in_order_and_converts() {
        let driver = MockI2CDriver::new();
        let mut session = ready_session(&driver).await;
        driver.set_register(Register::ShuntVoltage, 4000);
        driver.set_register(Register::BusVoltage, (3000 << 3) | 0x0001);
        driver.set_register(Register::Current, 5000);

        let measurement = session.snapshot().await.unwrap();

        assert_eq!(
            driver.reads(),
            vec![
                Register::ShuntVoltage,
                Register::BusVoltage,
                Register::Current
            ]
        );
        assert_relative_eq!(measurement.shunt_millivolts, 40.0, epsilon = 1e-9);
        assert_relative_eq!(measurement.voltage().unwrap(), 12.04, epsilon = 1e-9);
        assert_relative_eq!(measurement.current_amps, 0.4, epsilon = 1e-9);
        assert_relative_eq!(measurement.power_watts().unwrap(), 4.8, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn snapshot_reports_absent_bus_voltage() {
        let driver = MockI2CDriver::new();
        let mut session = ready_session(&driver).await;
        driver.set_register(Register::BusVoltage, 3000 << 3);

        let measurement = session.snapshot().await.unwrap();
        assert_eq!(measurement.bus_volts, None);
        assert_eq!(measurement.voltage(), None);
        assert_eq!(measurement.power_watts(), None);
    }

    #[tokio::test]
    async fn failed_read_aborts_snapshot() {
        let driver = MockI2CDriver::new();
        let mut session = ready_session(&driver).await;
        driver.fail_reads_of(Register::BusVoltage);

        let err = session.snapshot().await.unwrap_err();
        assert_eq!(err.register(), Register::BusVoltage);
        // the current register is never reached
        assert!(!driver.reads().contains(&Register::Current));
    }

    #[tokio::test]
    async fn current_only_read_keeps_sign() {
        let driver = MockI2CDriver::new();
        let mut session = ready_session(&driver).await;
        driver.set_register(Register::Current, (-1250i16) as u16);

        let reading = session.read_current().await.unwrap();
        assert_relative_eq!(reading.current_amps, -0.1, epsilon = 1e-9);
        assert_eq!(driver.reads(), vec![Register::Current]);
    }

    #[tokio::test]
    async fn power_register_uses_power_lsb() {
        let driver = MockI2CDriver::new();
        let mut session = ready_session(&driver).await;
        driver.set_register(Register::Power, 3000);

        let reading = session.read_power().await.unwrap();
        // power LSB is 20 x 80 uA, 1.6 mW per count
        assert_relative_eq!(reading.power_watts, 4.8, epsilon = 1e-9);
        assert_eq!(driver.reads(), vec![Register::Power]);
    }
}
