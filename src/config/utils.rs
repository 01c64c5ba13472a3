// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! Validation rules the JSON schema cannot express, and schema output.

use anyhow::{Context, Result};
use log::debug;

use super::{BusType, Config, CONFIG_SCHEMA};

/// Longest network interface name accepted by Linux (IFNAMSIZ - 1).
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Output the embedded JSON schema to the console.
///
/// Called when the `--show-config-schema` flag is provided on the command line.
///
/// ```bash
/// ./ina219_server --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Accepts IPv4 and IPv6 literals and the special value `localhost`.
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost")
}

/// Check if a string can be a network interface name
pub fn is_valid_interface_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_INTERFACE_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@'))
}

/// Validates the configuration against rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Port**: must not be 0 (the schema already bounds the range)
/// - **Listen address**: an IP address or a well-formed interface name
/// - **Calibration**: the calibration register must make sense for the shunt
///   resistor, see [`Calibration::new`](crate::ina219::Calibration::new)
/// - **Device**: the native bus needs a device path
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.server.port == 0 {
        anyhow::bail!("Invalid port number: {}", config.server.port);
    }

    if config.server.backlog == 0 {
        anyhow::bail!("The listen backlog must be at least 1");
    }

    let address = &config.server.address;
    if !is_valid_ip_address(address) && !is_valid_interface_name(address) {
        anyhow::bail!(
            "'{}' is neither an IP address nor a network interface name",
            address
        );
    }

    config
        .sensor
        .calibration()
        .context("Invalid sensor calibration")?;

    if config.sensor.bus_type == BusType::Native && config.sensor.device.trim().is_empty() {
        anyhow::bail!("The native I2C bus needs a device path");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_passes() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn address_forms() {
        assert!(is_valid_ip_address("192.168.1.20"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("eth0"));

        assert!(is_valid_interface_name("eth0"));
        assert!(is_valid_interface_name("wlan0"));
        assert!(is_valid_interface_name("enp3s0f1"));
        assert!(!is_valid_interface_name(""));
        assert!(!is_valid_interface_name("has space"));
        assert!(!is_valid_interface_name("a-very-long-interface-name"));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.server.address = "not an address".to_string();
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.sensor.shunt_resistance_ohms = 0.0;
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.sensor.device = String::new();
        assert!(validate_specific_rules(&config).is_err());
        config.sensor.bus_type = BusType::Mock;
        assert!(validate_specific_rules(&config).is_ok());
    }
}
