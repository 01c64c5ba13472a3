// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Command dispatcher
//!
//! Runs the command loop of one client: read a line, parse it, query the
//! sensor, write one reply. The sensor lock is held for the duration of one
//! command only, never while talking to the client.
//!
//! Lines are read at most [`MAX_LINE_LEN`] bytes at a time. A longer line is
//! answered as an unrecognized command and skipped up to its newline.

use anyhow::{Context, Result};
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::SharedSession;
use crate::protocol::{parse_command, Command, OutputFormat, Reply};

/// Longest command line accepted from a client, newline included.
pub const MAX_LINE_LEN: usize = 1024;

/// Per-connection behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    pub output_format: OutputFormat,
    /// Send the command list when the client connects
    pub greeting: bool,
}

/// How a command loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// The client sent `exit`
    Exit,
    /// The client closed its side of the stream
    Closed,
    /// A sensor read failed; the error was reported before closing
    TransportFailure,
}

/// Serve one client until it exits, disconnects or hits a sensor error.
///
/// Socket errors are returned; sensor errors are reported to the client and
/// end the loop with [`ConnectionEnd::TransportFailure`].
pub async fn serve_connection<R, W>(
    mut reader: R,
    mut writer: W,
    session: SharedSession,
    options: DispatchOptions,
) -> Result<ConnectionEnd>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if options.greeting {
        send(&mut writer, &Reply::greeting(), options.output_format).await?;
    }

    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        let read = (&mut reader)
            .take(MAX_LINE_LEN as u64)
            .read_until(b'\n', &mut buffer)
            .await
            .context("Failed to read from client")?;
        if read == 0 {
            return Ok(ConnectionEnd::Closed);
        }

        let reply = if read == MAX_LINE_LEN && buffer.last() != Some(&b'\n') {
            warn!("Discarding a command line longer than {} bytes", MAX_LINE_LEN);
            discard_line(&mut reader).await?;
            Reply::unrecognized()
        } else {
            let line = String::from_utf8_lossy(&buffer);
            match parse_command(&line) {
                Command::Exit => {
                    let _ = writer.shutdown().await;
                    return Ok(ConnectionEnd::Exit);
                }
                Command::Unknown(text) => {
                    debug!("Unrecognized command '{}'", text.escape_debug());
                    Reply::unrecognized()
                }
                command => execute(&command, &session).await,
            }
        };

        send(&mut writer, &reply, options.output_format).await?;
        if reply.is_fatal() {
            let _ = writer.shutdown().await;
            return Ok(ConnectionEnd::TransportFailure);
        }
    }
}

/// Skip input up to and including the next newline, or to end of stream.
async fn discard_line<R>(reader: &mut R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader
            .fill_buf()
            .await
            .context("Failed to read from client")?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&byte| byte == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let skipped = available.len();
                reader.consume(skipped);
            }
        }
    }
}

/// Run a sensor command under the session lock.
async fn execute(command: &Command, session: &SharedSession) -> Reply {
    let mut sensor = session.lock().await;
    let result = match command {
        Command::Voltage => sensor.snapshot().await.map(|m| Reply::voltage(&m)),
        Command::Current => sensor.read_current().await.map(|r| Reply::current(&r)),
        Command::Log => sensor.snapshot().await.map(|m| Reply::log(&m)),
        Command::Exit | Command::Unknown(_) => return Reply::unrecognized(),
    };

    result.unwrap_or_else(|err| {
        warn!("Sensor query {:?} failed: {}", command, err);
        Reply::transport_error(&err)
    })
}

async fn send<W>(writer: &mut W, reply: &Reply, format: OutputFormat) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = reply.render(format);
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .context("Failed to write reply")?;
    writer.flush().await.context("Failed to flush reply")?;
    Ok(())
}
