// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Constructed once at startup (defaults, optionally overlaid from a JSON
// file, then CLI flags) and passed into each component.  Nothing reads
// configuration from ambient global state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// `host:port` of the label printer's raw socket.
    pub printer_address: String,
    /// TCP connect timeout towards the printer, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Settle time after a payload send, before the verification photo, in
    /// seconds.  Lets the physical print finish.
    pub print_settle_secs: u64,
    /// Capacity of the bounded job queue between intake and the worker.
    pub queue_capacity: usize,
    /// How long intake waits to hand a job to the worker before force-failing
    /// it, in seconds.
    pub enqueue_timeout_secs: u64,
    /// Address the HTTP listener binds to.
    pub bind_address: String,
    /// Port the HTTP listener binds to.
    pub listen_port: u16,
    /// Path of the embedded job database.
    pub database_path: String,
    /// Command line invoked to capture the verification photo; must write PNG
    /// bytes to stdout.
    pub capture_command: Vec<String>,
    /// Target width of the derived thumbnail, in pixels.
    pub thumbnail_width: u32,
    /// Whether to announce the REST service via mDNS.
    pub advertise: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            printer_address: "192.168.1.1:9100".into(),
            connect_timeout_ms: 1_000,
            print_settle_secs: 5,
            queue_capacity: 20,
            enqueue_timeout_secs: 5,
            bind_address: "127.0.0.1".into(),
            listen_port: 5491,
            database_path: "jobs.db".into(),
            capture_command: vec![
                "raspistill".into(),
                "-t".into(),
                "3000".into(),
                "-e".into(),
                "png".into(),
                "-o".into(),
                "-".into(),
            ],
            thumbnail_width: 800,
            advertise: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn print_settle(&self) -> Duration {
        Duration::from_secs(self.print_settle_secs)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_secs(self.enqueue_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.queue_capacity, 20);
        assert_eq!(config.enqueue_timeout(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout(), Duration::from_millis(1_000));
        assert_eq!(config.thumbnail_width, 800);
    }

    #[test]
    fn json_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.printer_address, config.printer_address);
        assert_eq!(back.capture_command, config.capture_command);
    }
}
