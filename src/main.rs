// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the INA219 telemetry server
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser};
use log::info;
use tokio::signal;

use ina219_server::config::{self, Config};
use ina219_server::daemon::Daemon;
use ina219_server::error::{self, SetupError};

/// INA219 voltage/current telemetry server
///
/// Clients connect over TCP and send `voltage`, `current`, `log` or `exit`,
/// one command per line.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None, disable_help_flag = true)]
pub struct Args {
    /// Network interface (e.g. eth0) or IP address to listen on
    #[arg(
        value_name = "NETWORK_INTERFACE",
        required_unless_present_any = ["help", "show_config_schema", "validate_config"]
    )]
    interface: Option<String>,

    /// I2C bus device the INA219 is attached to (e.g. /dev/i2c-1)
    #[arg(
        value_name = "I2C_DEVICE",
        required_unless_present_any = ["help", "show_config_schema", "validate_config"]
    )]
    device: Option<String>,

    /// Configuration file (YAML), created with defaults if missing
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validate a configuration file and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Print the JSON schema of the configuration file and exit
    #[arg(long)]
    show_config_schema: bool,

    /// TCP port of the command server
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Use a simulated INA219 instead of the I2C bus
    #[arg(long)]
    mock: bool,

    /// I2C slave address of the sensor (e.g. 0x40)
    #[arg(long, value_parser = parse_i2c_address)]
    i2c_address: Option<u16>,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Print usage
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    help: bool,
}

/// Parse a 7-bit I2C address written in hexadecimal (`0x40`) or decimal.
fn parse_i2c_address(value: &str) -> Result<u16, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse::<u16>(),
    }
    .map_err(|err| format!("invalid I2C address '{}': {}", value, err))?;

    if !(0x03..=0x77).contains(&parsed) {
        return Err(format!(
            "I2C address 0x{:02x} is outside the 7-bit range 0x03..=0x77",
            parsed
        ));
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.help {
        // usage requests are treated as an invocation error
        eprintln!("{}", Args::command().render_help());
        return ExitCode::FAILURE;
    }

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = error::exit_code(&err);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(args: Args) -> Result<()> {
    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(SetupError::Config {
                reason: format!(
                    "Configuration file does not exist: {}",
                    validate_path.display()
                ),
            }
            .into());
        }

        Config::from_file(&validate_path).map_err(|err| SetupError::Config {
            reason: format!("Configuration validation failed: {:#}", err),
        })?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).map_err(|err| SetupError::Config {
            reason: format!("{:#}", err),
        })?,
        None => Config::default(),
    };

    config.apply_args(
        args.interface,
        args.device,
        args.port,
        args.mock,
        args.i2c_address,
    );

    info!("Starting INA219 telemetry server");
    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal, terminating daemon");
        }
        Err(err) => {
            eprintln!("Error waiting for shutdown signal: {}", err);
        }
    }
    daemon.shutdown();
    daemon.join().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i2c_address_forms() {
        assert_eq!(parse_i2c_address("0x40"), Ok(0x40));
        assert_eq!(parse_i2c_address("0X4f"), Ok(0x4F));
        assert_eq!(parse_i2c_address("65"), Ok(65));
        assert!(parse_i2c_address("0x80").is_err());
        assert!(parse_i2c_address("forty").is_err());
    }

    #[test]
    fn positionals_are_required() {
        assert!(Args::try_parse_from(["ina219_server"]).is_err());
        assert!(Args::try_parse_from(["ina219_server", "eth0"]).is_err());

        let args = Args::try_parse_from(["ina219_server", "eth0", "/dev/i2c-1", "-p", "2600"])
            .unwrap();
        assert_eq!(args.interface.as_deref(), Some("eth0"));
        assert_eq!(args.device.as_deref(), Some("/dev/i2c-1"));
        assert_eq!(args.port, Some(2600));
    }

    #[test]
    fn help_and_schema_do_not_need_positionals() {
        assert!(Args::try_parse_from(["ina219_server", "--help"]).unwrap().help);
        assert!(
            Args::try_parse_from(["ina219_server", "--show-config-schema"])
                .unwrap()
                .show_config_schema
        );
    }

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }
}
