// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Replies sent to clients
//!
//! Everything written to a client comes from [`Reply::render`]. Numbers are
//! printed with two decimals; a voltage that could not be measured because the
//! sensor had no conversion ready is rendered as `null` in JSON.
//!
//! JSON replies are always one line. Text replies report the shunt and bus
//! voltages on separate lines.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::Command;
use crate::error::TransportError;
use crate::ina219::conversion::total_voltage;
use crate::ina219::{CurrentReading, Measurement};

/// strftime pattern of reply timestamps (`dd/mm/yy HH:MM:SS`).
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%y %H:%M:%S";

/// Presentation of replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human readable sentences
    Text,
}

/// A single reply line
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Voltage {
        timestamp: DateTime<Local>,
        shunt_millivolts: f64,
        bus_volts: Option<f64>,
    },
    Current {
        timestamp: DateTime<Local>,
        amps: f64,
    },
    Log {
        timestamp: DateTime<Local>,
        shunt_millivolts: f64,
        bus_volts: Option<f64>,
        amps: f64,
    },
    Info(String),
    Warn(String),
    Error(String),
}

impl Reply {
    pub fn voltage(measurement: &Measurement) -> Self {
        Reply::Voltage {
            timestamp: measurement.timestamp,
            shunt_millivolts: measurement.shunt_millivolts,
            bus_volts: measurement.bus_volts,
        }
    }

    pub fn current(reading: &CurrentReading) -> Self {
        Reply::Current {
            timestamp: reading.timestamp,
            amps: reading.current_amps,
        }
    }

    pub fn log(measurement: &Measurement) -> Self {
        Reply::Log {
            timestamp: measurement.timestamp,
            shunt_millivolts: measurement.shunt_millivolts,
            bus_volts: measurement.bus_volts,
            amps: measurement.current_amps,
        }
    }

    /// Answer to an unrecognized command.
    pub fn unrecognized() -> Self {
        Reply::Warn(format!(
            "Unrecognized command! Valid commands are: {}",
            quoted_keywords()
        ))
    }

    /// Optional line sent when a client connects.
    pub fn greeting() -> Self {
        Reply::Info(format!("Enter {}", quoted_keywords()))
    }

    pub fn transport_error(err: &TransportError) -> Self {
        Reply::Error(err.to_string())
    }

    /// Whether the connection must be closed once this reply is sent.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Render the reply without the terminating newline.
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => self.to_json(),
            OutputFormat::Text => self.to_text(),
        }
    }

    fn to_json(&self) -> String {
        match self {
            Reply::Voltage {
                timestamp,
                shunt_millivolts,
                bus_volts,
            } => format!(
                "{{ \"timestamp\":{}, \"voltage\":{} }}",
                json_string(&format_timestamp(timestamp)),
                json_number(total_voltage(*bus_volts, *shunt_millivolts))
            ),
            Reply::Current { timestamp, amps } => format!(
                "{{ \"timestamp\":{}, \"current\":{} }}",
                json_string(&format_timestamp(timestamp)),
                json_number(Some(*amps))
            ),
            Reply::Log {
                timestamp,
                shunt_millivolts,
                bus_volts,
                amps,
            } => format!(
                "{{ \"log\": {{ \"timestamp\":{}, \"voltage\":{}, \"current\":{} }} }}",
                json_string(&format_timestamp(timestamp)),
                json_number(total_voltage(*bus_volts, *shunt_millivolts)),
                json_number(Some(*amps))
            ),
            Reply::Info(message) => format!("{{ \"INFO\":{} }}", json_string(message)),
            Reply::Warn(message) => format!("{{ \"WARN\":{} }}", json_string(message)),
            Reply::Error(message) => format!("{{ \"ERROR\":{} }}", json_string(message)),
        }
    }

    fn to_text(&self) -> String {
        let mut text = String::new();
        match self {
            Reply::Voltage {
                shunt_millivolts,
                bus_volts,
                ..
            } => write_voltages(&mut text, *shunt_millivolts, *bus_volts),
            Reply::Current { amps, .. } => write_current(&mut text, *amps),
            Reply::Log {
                shunt_millivolts,
                bus_volts,
                amps,
                ..
            } => {
                write_voltages(&mut text, *shunt_millivolts, *bus_volts);
                text.push('\n');
                write_current(&mut text, *amps);
            }
            Reply::Info(message) => text.push_str(message),
            Reply::Warn(message) => {
                let _ = write!(text, "WARN: {}", message);
            }
            Reply::Error(message) => {
                let _ = write!(text, "ERROR: {}", message);
            }
        }
        text
    }
}

fn write_voltages(text: &mut String, shunt_millivolts: f64, bus_volts: Option<f64>) {
    let _ = writeln!(
        text,
        "The actual value of shunt voltage: {:.2} mV",
        shunt_millivolts
    );
    let _ = match bus_volts {
        Some(volts) => write!(text, "The actual value of bus voltage: {:.2}", volts),
        None => write!(text, "The actual value of bus voltage: not available"),
    };
}

fn write_current(text: &mut String, amps: f64) {
    let _ = write!(text, "The actual value of current: {:.2} A", amps);
}

fn quoted_keywords() -> String {
    Command::KEYWORDS
        .iter()
        .map(|keyword| format!("'{}'", keyword))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

fn json_string(text: &str) -> String {
    // serializing a str cannot fail
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn json_number(value: Option<f64>) -> String {
    match value {
        Some(value) if value.is_finite() => format!("{:.2}", value),
        _ => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::ina219::Register;

    fn at_noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 7, 12, 5, 9).unwrap()
    }

    fn measurement(bus_volts: Option<f64>) -> Measurement {
        Measurement {
            shunt_millivolts: 40.0,
            bus_volts,
            current_amps: 0.4,
            timestamp: at_noon(),
        }
    }

    #[test]
    fn voltage_reply_json() {
        let reply = Reply::voltage(&measurement(Some(12.0)));
        assert_eq!(
            reply.render(OutputFormat::Json),
            r#"{ "timestamp":"07/03/25 12:05:09", "voltage":12.04 }"#
        );
    }

    #[test]
    fn absent_voltage_is_null() {
        let reply = Reply::voltage(&measurement(None));
        assert_eq!(
            reply.render(OutputFormat::Json),
            r#"{ "timestamp":"07/03/25 12:05:09", "voltage":null }"#
        );
        assert!(reply
            .render(OutputFormat::Text)
            .ends_with("The actual value of bus voltage: not available"));
    }

    #[test]
    fn current_reply_json() {
        let reply = Reply::current(&CurrentReading {
            current_amps: -0.1,
            timestamp: at_noon(),
        });
        assert_eq!(
            reply.render(OutputFormat::Json),
            r#"{ "timestamp":"07/03/25 12:05:09", "current":-0.10 }"#
        );
    }

    #[test]
    fn log_reply_json_is_valid() {
        let line = Reply::log(&measurement(Some(12.0))).render(OutputFormat::Json);
        assert_eq!(
            line,
            r#"{ "log": { "timestamp":"07/03/25 12:05:09", "voltage":12.04, "current":0.40 } }"#
        );
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["log"]["current"], 0.4);
    }

    #[test]
    fn warning_lists_valid_commands() {
        assert_eq!(
            Reply::unrecognized().render(OutputFormat::Json),
            r#"{ "WARN":"Unrecognized command! Valid commands are: 'voltage', 'current', 'log', 'exit'" }"#
        );
        assert_eq!(
            Reply::greeting().render(OutputFormat::Json),
            r#"{ "INFO":"Enter 'voltage', 'current', 'log', 'exit'" }"#
        );
    }

    #[test]
    fn error_reply_is_fatal_and_escaped() {
        let err = TransportError::Read {
            register: Register::ShuntVoltage,
            reason: "device said \"no\"".to_string(),
        };
        let reply = Reply::transport_error(&err);
        assert!(reply.is_fatal());
        assert!(!Reply::unrecognized().is_fatal());

        let line = reply.render(OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value["ERROR"],
            "read shunt-voltage register: device said \"no\""
        );
    }

    #[test]
    fn text_rendering() {
        assert_eq!(
            Reply::voltage(&measurement(Some(12.0))).render(OutputFormat::Text),
            "The actual value of shunt voltage: 40.00 mV\n\
             The actual value of bus voltage: 12.00"
        );
        assert_eq!(
            Reply::log(&measurement(Some(12.0))).render(OutputFormat::Text),
            "The actual value of shunt voltage: 40.00 mV\n\
             The actual value of bus voltage: 12.00\n\
             The actual value of current: 0.40 A"
        );
        assert_eq!(
            Reply::current(&CurrentReading {
                current_amps: 0.4,
                timestamp: at_noon(),
            })
            .render(OutputFormat::Text),
            "The actual value of current: 0.40 A"
        );
        assert_eq!(
            Reply::Error("boom".to_string()).render(OutputFormat::Text),
            "ERROR: boom"
        );
    }
}
