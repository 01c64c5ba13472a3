// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Line protocol spoken with telemetry clients
//!
//! Clients send one command per line. Answers are produced from a [`Reply`];
//! in the default JSON format each one is a single line:
//!
//! | Client sends | Reply |
//! |---|---|
//! | `voltage` | `{ "timestamp":"17/10/25 14:03:12", "voltage":5.07 }` |
//! | `current` | `{ "timestamp":"17/10/25 14:03:12", "current":0.75 }` |
//! | `log` | `{ "log": { "timestamp":"...", "voltage":5.07, "current":0.75 } }` |
//! | `exit` | the connection is closed |
//! | anything else | `{ "WARN":"Unrecognized command! ..." }` |

pub mod reply;

use log::debug;

pub use reply::{OutputFormat, Reply, TIMESTAMP_FORMAT};

/// Commands understood by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Combined bus + shunt voltage
    Voltage,
    /// Load current
    Current,
    /// Voltage and current in one record
    Log,
    /// Close the connection
    Exit,
    /// Anything else, kept verbatim for logging
    Unknown(String),
}

impl Command {
    /// Keywords of every valid command, in the order they are advertised.
    pub const KEYWORDS: [&'static str; 4] = ["voltage", "current", "log", "exit"];
}

/// Parse one line received from a client.
///
/// Only the trailing line terminator is removed; the keyword must otherwise
/// match exactly.
pub fn parse_command(line: &str) -> Command {
    let text = line.trim_end_matches(['\r', '\n']);

    let command = match text {
        "voltage" => Command::Voltage,
        "current" => Command::Current,
        "log" => Command::Log,
        "exit" => Command::Exit,
        other => Command::Unknown(other.to_string()),
    };
    debug!("Parsed command {:?}", command);
    command
}
