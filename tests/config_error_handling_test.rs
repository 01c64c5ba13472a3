// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use ina219_server::config::Config;
use std::fs;
use std::path::Path;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// Loading `contents` must fail and leave a loadable default sample file.
fn assert_rejected_with_sample(contents: &str) -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Config loading should have failed");

    let sample_path = config_path.with_extension("sample.yaml");
    assert!(
        Path::new(&sample_path).exists(),
        "Sample config file was not created"
    );
    let sample_config = Config::from_file(&sample_path)?;
    assert_eq!(sample_config, Config::default());

    Ok(())
}

#[test]
fn test_schema_type_mismatch_creates_sample_file() -> Result<()> {
    setup();
    assert_rejected_with_sample(
        r#"
server:
  port: "not-an-integer"
  greeting: "yes"
"#,
    )
}

#[test]
fn test_unknown_field_creates_sample_file() -> Result<()> {
    setup();
    assert_rejected_with_sample(
        r#"
server:
  port: 2500
  hmac_secret: "leftover"
"#,
    )
}

#[test]
fn test_reserved_calibration_bit_creates_sample_file() -> Result<()> {
    setup();
    assert_rejected_with_sample(
        r#"
sensor:
  calibration: 5121
"#,
    )
}

#[test]
fn test_specific_rule_failure_creates_sample_file() -> Result<()> {
    setup();
    // valid for the schema, but neither an IP address nor an interface name
    assert_rejected_with_sample(
        r#"
server:
  address: "not an interface"
"#,
    )
}

#[test]
fn test_invalid_yaml_is_an_error() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "server: [unclosed")?;

    let err = Config::from_file(&config_path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse YAML"));
    Ok(())
}
