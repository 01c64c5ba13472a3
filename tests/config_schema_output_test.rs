// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use ina219_server::config::{self, Config};

#[test]
fn test_config_schema_output() -> Result<()> {
    // output goes to stdout; only check that it succeeds
    config::output_config_schema()?;
    Ok(())
}

#[test]
fn test_default_config_matches_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(include_str!("../resources/config.schema.json"))?;
    let validator = jsonschema::draft202012::options().build(&schema)?;

    let instance = serde_json::to_value(Config::default())?;
    assert!(validator.is_valid(&instance));
    Ok(())
}
