// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Naming node serving the client and registration interfaces.
// Author: Lukas Bower

//! The naming node.
//!
//! A single process holds the directory tree and maps every file to the
//! storage nodes hosting it. Clients reach it over the service interface,
//! storage nodes over the registration interface; both listeners forward
//! into one shared core guarded by a single namespace mutex, so every
//! mutation is atomic with respect to every observer.

mod namespace;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};
use rand::Rng;

use combfs_rpc::{Dispatch, InterfaceDef, Listener};
use combfs_wire::{CallFrame, FaultKind, Path, ProxyRef, RemoteFault, Value};
use net_constants::{NAMING_REGISTRATION_PORT, NAMING_SERVICE_PORT};

use crate::error::FsError;
use crate::ifaces::{args, CommandProxy, REGISTRATION, SERVICE};
use namespace::Namespace;

/// The naming node: namespace state plus its two listeners.
pub struct NamingNode {
    core: Arc<NamingCore>,
    service: Listener,
    registration: Listener,
}

impl NamingNode {
    /// Start on the well-known loopback ports.
    pub fn start() -> Result<Self, FsError> {
        let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Self::start_on(
            SocketAddr::new(loopback, NAMING_SERVICE_PORT),
            SocketAddr::new(loopback, NAMING_REGISTRATION_PORT),
        )
    }

    /// Start on explicit addresses (port 0 lets the system choose, which
    /// keeps multi-node tests off the well-known ports).
    pub fn start_on(
        service_addr: SocketAddr,
        registration_addr: SocketAddr,
    ) -> Result<Self, FsError> {
        let core = Arc::new(NamingCore {
            namespace: Mutex::new(Namespace::new()),
        });
        let service = Listener::new(
            Arc::new(ServiceDispatch(Arc::clone(&core))),
            Some(service_addr),
        );
        let registration = Listener::new(
            Arc::new(RegistrationDispatch(Arc::clone(&core))),
            Some(registration_addr),
        );
        let bound_service = service.start().map_err(FsError::from)?;
        let bound_registration = match registration.start() {
            Ok(addr) => addr,
            Err(err) => {
                service.stop();
                return Err(err.into());
            }
        };
        info!(
            "naming node up: service {bound_service}, registration {bound_registration}"
        );
        Ok(Self {
            core,
            service,
            registration,
        })
    }

    /// Bound address of the client service interface.
    #[must_use]
    pub fn service_addr(&self) -> Option<SocketAddr> {
        self.service.local_addr()
    }

    /// Bound address of the storage registration interface.
    #[must_use]
    pub fn registration_addr(&self) -> Option<SocketAddr> {
        self.registration.local_addr()
    }

    /// Stop both listeners. In-flight handlers run to completion; the node
    /// cannot be restarted.
    pub fn stop(&self) {
        self.service.stop();
        self.registration.stop();
        info!("naming node stopped");
    }
}

struct NamingCore {
    namespace: Mutex<Namespace>,
}

impl NamingCore {
    fn lock(&self) -> MutexGuard<'_, Namespace> {
        self.namespace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        let ns = self.lock();
        if ns.is_directory(path) {
            Ok(true)
        } else if ns.is_file(path) {
            Ok(false)
        } else {
            Err(FsError::NotFound(format!("{path} is not known")))
        }
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>, FsError> {
        let ns = self.lock();
        if !ns.is_directory(dir) {
            return Err(FsError::NotFound(format!("{dir} is not a directory")));
        }
        Ok(ns.children(dir))
    }

    fn create_file(&self, path: &Path) -> Result<bool, FsError> {
        let mut ns = self.lock();
        if path.is_root() || ns.contains(path) {
            return Ok(false);
        }
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        if !ns.is_directory(&parent) {
            return Err(FsError::NotFound(format!(
                "parent directory {parent} does not exist"
            )));
        }
        let count = ns.storage_count();
        if count == 0 {
            return Err(FsError::State(
                "no storage node is registered".to_owned(),
            ));
        }
        // Pick one (and only one) host for the new file, uniformly.
        let index = rand::rng().random_range(0..count);
        let (storage, command) = ns
            .nth_storage(index)
            .ok_or_else(|| FsError::State("storage registry changed mid-pick".to_owned()))?;
        let created = CommandProxy::from_ref(command)?.create(path)?;
        if created {
            ns.insert_file(path.clone(), storage);
            info!("created {path} on {storage}");
        }
        Ok(created)
    }

    fn create_directory(&self, path: &Path) -> Result<bool, FsError> {
        let mut ns = self.lock();
        if path.is_root() || ns.contains(path) {
            return Ok(false);
        }
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        if !ns.is_directory(&parent) {
            return Err(FsError::NotFound(format!(
                "parent directory {parent} does not exist"
            )));
        }
        ns.insert_directory(path.clone());
        Ok(true)
    }

    fn delete(&self, path: &Path) -> Result<bool, FsError> {
        let mut ns = self.lock();
        if path.is_root() {
            return Ok(false);
        }
        if let Some(replicas) = ns.file_entry(path).map(|entry| entry.replicas.clone()) {
            let confirmed = fan_out_delete(&ns, path, replicas.iter().copied());
            if confirmed == replicas.len() {
                ns.remove_file(path);
                info!("deleted file {path}");
                return Ok(true);
            }
            return Ok(false);
        }
        if ns.is_directory(path) {
            let owners = ns.owners_under(path);
            let confirmed = fan_out_delete(&ns, path, owners.iter().copied());
            if confirmed == owners.len() {
                ns.purge_subtree(path);
                info!("deleted directory {path}");
                return Ok(true);
            }
            return Ok(false);
        }
        Err(FsError::NotFound(format!("{path} is not known")))
    }

    fn get_storage(&self, path: &Path) -> Result<ProxyRef, FsError> {
        let ns = self.lock();
        ns.file_entry(path)
            .map(|entry| entry.primary)
            .ok_or_else(|| FsError::NotFound(format!("{path} is not a file")))
    }

    fn register(
        &self,
        storage: ProxyRef,
        command: ProxyRef,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, FsError> {
        let mut ns = self.lock();
        let accepted = files.len();
        let duplicates = ns.register(storage, command, files)?;
        info!(
            "registered {storage}: {} path(s) accepted, {} duplicate(s)",
            accepted - duplicates.len(),
            duplicates.len()
        );
        Ok(duplicates)
    }
}

/// Ask every owner to delete `path`; a replica counts only when it confirms.
/// Transport failures are logged and treated as refusals.
fn fan_out_delete(
    ns: &Namespace,
    path: &Path,
    owners: impl Iterator<Item = ProxyRef>,
) -> usize {
    let mut confirmed = 0;
    for storage in owners {
        let Some(command) = ns.command_for(&storage) else {
            warn!("no command reference for {storage}; counting {path} as undeleted");
            continue;
        };
        let proxy = match CommandProxy::from_ref(command) {
            Ok(proxy) => proxy,
            Err(err) => {
                warn!("bad command reference for {storage}: {err}");
                continue;
            }
        };
        match proxy.delete(path) {
            Ok(true) => confirmed += 1,
            Ok(false) => warn!("{storage} refused to delete {path}"),
            Err(err) => warn!("delete of {path} on {storage} failed: {err}"),
        }
    }
    confirmed
}

struct ServiceDispatch(Arc<NamingCore>);

impl Dispatch for ServiceDispatch {
    fn interface(&self) -> &'static InterfaceDef {
        &SERVICE
    }

    fn dispatch(&self, call: &CallFrame) -> Result<Value, RemoteFault> {
        match call.method.as_str() {
            "is_directory" => {
                let path = args::path(&call.args, 0)?;
                Ok(Value::Bool(self.0.is_directory(path)?))
            }
            "list" => {
                let path = args::path(&call.args, 0)?;
                let names = self.0.list(path)?;
                Ok(Value::List(names.into_iter().map(Value::Str).collect()))
            }
            "create_file" => {
                let path = args::path(&call.args, 0)?;
                Ok(Value::Bool(self.0.create_file(path)?))
            }
            "create_directory" => {
                let path = args::path(&call.args, 0)?;
                Ok(Value::Bool(self.0.create_directory(path)?))
            }
            "delete" => {
                let path = args::path(&call.args, 0)?;
                Ok(Value::Bool(self.0.delete(path)?))
            }
            "get_storage" => {
                let path = args::path(&call.args, 0)?;
                Ok(Value::Proxy(self.0.get_storage(path)?))
            }
            other => Err(RemoteFault::new(
                FaultKind::Rpc,
                format!("service interface has no method {other}"),
            )),
        }
    }
}

struct RegistrationDispatch(Arc<NamingCore>);

impl Dispatch for RegistrationDispatch {
    fn interface(&self) -> &'static InterfaceDef {
        &REGISTRATION
    }

    fn dispatch(&self, call: &CallFrame) -> Result<Value, RemoteFault> {
        match call.method.as_str() {
            "register" => {
                let storage = args::proxy(&call.args, 0, combfs_wire::InterfaceId::Storage)?;
                let command = args::proxy(&call.args, 1, combfs_wire::InterfaceId::Command)?;
                let files = args::path_list(&call.args, 2)?;
                let duplicates = self.0.register(storage, command, files)?;
                Ok(Value::List(
                    duplicates.into_iter().map(Value::Path).collect(),
                ))
            }
            other => Err(RemoteFault::new(
                FaultKind::Rpc,
                format!("registration interface has no method {other}"),
            )),
        }
    }
}
