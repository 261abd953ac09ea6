// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Storage node serving file bytes and namespace commands.
// Author: Lukas Bower

//! The storage node.
//!
//! A storage node wraps one local directory and exposes it over two
//! listeners: the data plane (`size`/`read`/`write`) for clients and the
//! control plane (`create`/`delete`) for the naming node. On startup it
//! registers its pre-existing files with the naming node, deletes whatever
//! the naming node rejects as already registered elsewhere, and prunes the
//! directories that cleanup left empty.

mod tree;

use std::net::SocketAddr;
use std::path::{Path as StdPath, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use combfs_rpc::{Dispatch, InterfaceDef, Listener};
use combfs_wire::{CallFrame, FaultKind, RemoteFault, Value};

use crate::error::FsError;
use crate::ifaces::{
    advertised_addr, args, CommandProxy, RegistrationProxy, StorageProxy, COMMAND, STORAGE,
};
use tree::LocalTree;

/// A running storage node.
pub struct StorageNode {
    tree: Arc<LocalTree>,
    data: Listener,
    command: Listener,
    storage_proxy: StorageProxy,
    command_proxy: CommandProxy,
}

impl StorageNode {
    /// Start serving `root` and register with the naming node reachable at
    /// `registration`. `hostname` is the externally visible name baked into
    /// the proxies handed to the naming node, for hosts whose system-chosen
    /// addresses are not routable from the outside.
    pub fn start(
        root: impl Into<PathBuf>,
        hostname: &str,
        registration: SocketAddr,
    ) -> Result<Self, FsError> {
        let tree = Arc::new(LocalTree::open(root.into())?);

        let data = Listener::new(Arc::new(DataDispatch(Arc::clone(&tree))), None);
        let command = Listener::new(Arc::new(CommandDispatch(Arc::clone(&tree))), None);
        let data_addr = data.start().map_err(FsError::from)?;
        let command_addr = match command.start() {
            Ok(addr) => addr,
            Err(err) => {
                data.stop();
                return Err(err.into());
            }
        };

        let advertised = advertised_addr(hostname, data_addr.port())
            .and_then(|data_at| {
                advertised_addr(hostname, command_addr.port())
                    .map(|command_at| (data_at, command_at))
            });
        let (data_at, command_at) = match advertised {
            Ok(pair) => pair,
            Err(err) => {
                data.stop();
                command.stop();
                return Err(err);
            }
        };
        let node = Self {
            storage_proxy: StorageProxy::new(data_at),
            command_proxy: CommandProxy::new(command_at),
            tree,
            data,
            command,
        };

        if let Err(err) = node.register(registration) {
            node.stop();
            return Err(err);
        }
        info!(
            "storage node up over {}: data {}, command {}",
            node.tree.root().display(),
            node.storage_proxy.target().addr,
            node.command_proxy.target().addr,
        );
        Ok(node)
    }

    /// Announce this node's files; the naming node answers with the paths it
    /// already had, which are then removed locally along with any directory
    /// the removal leaves empty.
    fn register(&self, registration: SocketAddr) -> Result<(), FsError> {
        let files = self.tree.scan()?;
        let naming = RegistrationProxy::new(registration);
        let duplicates = naming.register(&self.storage_proxy, &self.command_proxy, &files)?;
        if !duplicates.is_empty() {
            info!(
                "naming node rejected {} duplicate path(s); removing local copies",
                duplicates.len()
            );
        }
        for path in &duplicates {
            if !self.tree.delete(path) {
                warn!("duplicate {path} could not be removed locally");
            }
        }
        self.tree.prune_empty_directories();
        Ok(())
    }

    /// Stop both listeners. In-flight handlers run to completion; the node
    /// cannot be restarted.
    pub fn stop(&self) {
        self.data.stop();
        self.command.stop();
        info!("storage node over {} stopped", self.tree.root().display());
    }

    /// The served root directory.
    #[must_use]
    pub fn root(&self) -> &StdPath {
        self.tree.root()
    }

    /// Data-plane proxy as advertised to the naming node.
    #[must_use]
    pub fn storage_proxy(&self) -> StorageProxy {
        self.storage_proxy
    }

    /// Control-plane proxy as advertised to the naming node.
    #[must_use]
    pub fn command_proxy(&self) -> CommandProxy {
        self.command_proxy
    }

    /// Bound address of the data listener.
    #[must_use]
    pub fn data_addr(&self) -> Option<SocketAddr> {
        self.data.local_addr()
    }

    /// Bound address of the command listener.
    #[must_use]
    pub fn command_addr(&self) -> Option<SocketAddr> {
        self.command.local_addr()
    }
}

struct DataDispatch(Arc<LocalTree>);

impl Dispatch for DataDispatch {
    fn interface(&self) -> &'static InterfaceDef {
        &STORAGE
    }

    fn dispatch(&self, call: &CallFrame) -> Result<Value, RemoteFault> {
        match call.method.as_str() {
            "size" => {
                let path = args::path(&call.args, 0)?;
                Ok(Value::U64(self.0.size(path)?))
            }
            "read" => {
                let path = args::path(&call.args, 0)?;
                let offset = args::u64(&call.args, 1)?;
                let length = args::u64(&call.args, 2)?;
                Ok(Value::Bytes(self.0.read(path, offset, length)?))
            }
            "write" => {
                let path = args::path(&call.args, 0)?;
                let offset = args::u64(&call.args, 1)?;
                let data = args::bytes(&call.args, 2)?;
                self.0.write(path, offset, data)?;
                Ok(Value::Null)
            }
            other => Err(RemoteFault::new(
                FaultKind::Rpc,
                format!("storage interface has no method {other}"),
            )),
        }
    }
}

struct CommandDispatch(Arc<LocalTree>);

impl Dispatch for CommandDispatch {
    fn interface(&self) -> &'static InterfaceDef {
        &COMMAND
    }

    fn dispatch(&self, call: &CallFrame) -> Result<Value, RemoteFault> {
        match call.method.as_str() {
            "create" => {
                let path = args::path(&call.args, 0)?;
                Ok(Value::Bool(self.0.create(path)))
            }
            "delete" => {
                let path = args::path(&call.args, 0)?;
                Ok(Value::Bool(self.0.delete(path)))
            }
            other => Err(RemoteFault::new(
                FaultKind::Rpc,
                format!("command interface has no method {other}"),
            )),
        }
    }
}
