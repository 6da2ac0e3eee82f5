// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! minion-sonic CLI.
//!
//! Connects to a webstrate session and drives a local Sonic Pi engine with
//! the code pushed through it.

#![allow(clippy::print_stdout, reason = "CLI tool needs to output to stdout")]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use minion_sonic::bridge::{Bridge, Dispatch};
use minion_sonic::cli::{self, ColorConfig};
use minion_sonic::config::Config;
use minion_sonic::control::JobId;

/// Command-line arguments for minion-sonic.
#[derive(Parser, Debug)]
#[command(name = "minion-sonic")]
#[command(about = "A minion to drive the Sonic Pi app")]
#[command(version)]
struct Args {
    /// Id of the webstrate you want me to connect to.
    #[arg(short, long)]
    webstrate: Option<String>,

    /// Path to configuration file.
    /// Defaults are read from ~/.minion-sonicpi.yaml and the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the webstrates server (ws:// or wss://).
    #[arg(long)]
    server_url: Option<String>,

    /// Sonic Pi control address (host:port).
    #[arg(long)]
    control_addr: Option<String>,

    /// Job id used for every run and stop message.
    #[arg(long)]
    job_id: Option<i32>,

    /// Reconnect attempts after the connection drops (0 exits on first drop).
    #[arg(long)]
    reconnect: Option<u32>,

    /// Disable colored output.
    #[arg(long)]
    nocolor: bool,
}

/// Entry point for the minion-sonic binary.
///
/// # Errors
///
/// Returns an error if configuration fails or the bridge stops on an error.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("minion_sonic=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(args.config.clone())?;
    for path in &config.loaded_from {
        info!("Using config file: {}", path.display());
    }

    // CLI flags win over every config source
    if let Some(webstrate) = args.webstrate {
        config.webstrate = webstrate;
    }
    if let Some(server_url) = args.server_url {
        config.server_url = server_url;
    }
    if let Some(control_addr) = args.control_addr {
        config.control_addr = control_addr;
    }
    if let Some(job_id) = args.job_id {
        config.job_id = JobId(job_id);
    }
    if let Some(reconnect) = args.reconnect {
        config.reconnect_attempts = reconnect;
    }

    let Some(bridge_config) = config.bridge_config() else {
        Args::command().print_help()?;
        println!();
        return Ok(());
    };

    // Only one TLS backend is compiled in; an Err here means it is already set.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let colors = ColorConfig::new(args.nocolor);
    let bridge = Bridge::new(bridge_config)
        .await
        .context("Failed to start bridge")?
        .on_dispatch(Box::new(move |dispatch: &Dispatch| {
            println!("{}", cli::format_dispatch(dispatch, &colors));
        }));

    let cancel = bridge.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            cancel.cancel();
        }
    });

    if let Err(e) = bridge.run().await {
        error!("{e}");
        return Err(e.into());
    }
    Ok(())
}
