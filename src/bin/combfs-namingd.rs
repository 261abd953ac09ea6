// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Entry point for the combfs naming daemon.
// Author: Lukas Bower

//! Naming daemon: binds the well-known service and registration ports and
//! serves the namespace until killed.

use anyhow::Context;
use clap::Parser;
use log::info;

use combfs::NamingNode;
use net_constants::{NAMING_REGISTRATION_PORT, NAMING_SERVICE_PORT};

/// Command-line flags for the naming daemon.
#[derive(Debug, Parser)]
#[command(name = "combfs-namingd", about = "combfs naming node")]
struct Args {
    /// Verbosity level (`error`, `warn`, `info`, `debug`, `trace`)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    let _node = NamingNode::start().context("naming node failed to start")?;
    info!(
        "serving on ports {NAMING_SERVICE_PORT} (service) and {NAMING_REGISTRATION_PORT} (registration)"
    );
    loop {
        std::thread::park();
    }
}
