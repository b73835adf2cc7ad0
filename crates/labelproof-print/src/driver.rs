// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP transport to the label printer (JetDirect-style, port 9100).
//
// The printer speaks no protocol beyond "accept bytes": open a socket, dump
// ZPL text, close.  There is no acknowledgment from the device, so success
// is defined as the socket accepting the full payload.  The caller inserts a
// settle delay after a payload send to let the physical print complete.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use labelproof_core::error::{LabelproofError, Result};

/// ZPL initialization block sent before each payload: normal field
/// orientation, label geometry, print-once mode, home position, UTF-8.
pub const RESET_COMMAND: &str = "^XA
^FWN
^LL1218
^PW812
^PON
^LH0,0
^LT0
^CI28
^XZ
";

/// Open a connection to the printer and write `payload`, with a bounded
/// connect wait.
///
/// Connection establishment failures (refused, unreachable, timed out) map
/// to `Connect`; failures after the socket is up map to `Write`.
pub async fn send_bytes(addr: &str, payload: &[u8], connect_timeout: Duration) -> Result<()> {
    debug!(addr = %addr, bytes = payload.len(), "connecting to printer");

    let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            LabelproofError::Connect(format!(
                "{addr}: connect timed out after {}ms",
                connect_timeout.as_millis()
            ))
        })?
        .map_err(|e| LabelproofError::Connect(format!("{addr}: {e}")))?;

    stream
        .write_all(payload)
        .await
        .map_err(|e| LabelproofError::Write(format!("{addr}: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| LabelproofError::Write(format!("{addr}: flush: {e}")))?;
    stream
        .shutdown()
        .await
        .map_err(|e| LabelproofError::Write(format!("{addr}: shutdown: {e}")))?;

    info!(addr = %addr, bytes = payload.len(), "payload accepted by printer socket");
    Ok(())
}

/// Send the fixed initialization block, putting the printer into a known
/// state before the job's own markup.
pub async fn reset_printer(addr: &str, connect_timeout: Duration) -> Result<()> {
    send_bytes(addr, RESET_COMMAND.as_bytes(), connect_timeout).await
}

/// Send the job's ZPL markup.  Callers skip this entirely for empty payloads.
pub async fn send_zpl(addr: &str, zpl: &str, connect_timeout: Duration) -> Result<()> {
    send_bytes(addr, zpl.as_bytes(), connect_timeout).await
}
