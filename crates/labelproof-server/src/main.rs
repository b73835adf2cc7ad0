// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelproof — ZPL label print-and-verify service.
//
// Entry point: parses flags, initialises logging and configuration, and
// hands off to the HTTP application.

mod app;

use clap::Parser;

use labelproof_core::config::AppConfig;

/// ZPL label print-and-verify service.
#[derive(Debug, Parser)]
#[command(name = "labelproof", version, about)]
struct Cli {
    /// Port for the HTTP listener.
    #[arg(long)]
    listen_port: Option<u16>,

    /// Address of the label printer's raw socket (host:port).
    #[arg(long)]
    printer_address: Option<String>,

    /// Path to a JSON config file.
    #[arg(long)]
    config_file: Option<std::path::PathBuf>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config_file {
        Some(path) => AppConfig::load(path).map_err(std::io::Error::other)?,
        None => AppConfig::default(),
    };
    if let Some(port) = cli.listen_port {
        config.listen_port = port;
    }
    if let Some(address) = cli.printer_address {
        config.printer_address = address;
    }

    tracing::info!(
        printer = %config.printer_address,
        port = config.listen_port,
        "Labelproof starting"
    );

    app::start(config).await
}
