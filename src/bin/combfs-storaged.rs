// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Entry point for the combfs storage daemon.
// Author: Lukas Bower

//! Storage daemon: serves one local directory, registers with the naming
//! node, and runs until killed.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use combfs::StorageNode;
use net_constants::NAMING_REGISTRATION_PORT;

/// Command-line flags for a combfs storage process.
#[derive(Debug, Parser)]
#[command(name = "combfs-storaged", about = "combfs storage node")]
struct Args {
    /// Directory whose contents this node serves.
    #[arg(long)]
    root: PathBuf,
    /// Externally visible hostname advertised to the naming node.
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,
    /// Host of the naming node's registration interface.
    #[arg(long, default_value = "127.0.0.1")]
    naming_host: String,
    /// Verbosity level (`error`, `warn`, `info`, `debug`, `trace`)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    let registration: SocketAddr = (args.naming_host.as_str(), NAMING_REGISTRATION_PORT)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve naming host {}", args.naming_host))?
        .next()
        .with_context(|| format!("naming host {} has no address", args.naming_host))?;
    let node = StorageNode::start(&args.root, &args.hostname, registration)
        .context("storage node failed to start")?;
    info!("serving {} as {}", args.root.display(), args.hostname);
    let _keep = node;
    loop {
        std::thread::park();
    }
}
