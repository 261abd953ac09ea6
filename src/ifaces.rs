// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Interface tables and typed proxies for the four combfs interfaces.
// Author: Lukas Bower

//! The four combfs remote interfaces.
//!
//! Each interface is one static [`InterfaceDef`] table plus a typed proxy
//! struct whose methods marshal arguments, invoke the transport, and
//! re-raise remote errors as [`FsError`]. Proxies carry only an interface
//! identity and a remote address: two proxies are equal iff both match, and
//! a proxy serializes losslessly as a wire value.

use std::net::{SocketAddr, ToSocketAddrs};

use combfs_rpc::{call, InterfaceDef, MethodDef, RpcError};
use combfs_wire::{
    FaultKind, InterfaceId, Path, ProxyRef, RemoteFault, TypeTag, Value, WireError,
};

use crate::error::FsError;

/// Naming node, client-facing metadata operations.
pub static SERVICE: InterfaceDef = InterfaceDef {
    id: InterfaceId::Service,
    name: "service",
    methods: &[
        MethodDef {
            name: "is_directory",
            params: &[TypeTag::Path],
            throws_rpc: true,
        },
        MethodDef {
            name: "list",
            params: &[TypeTag::Path],
            throws_rpc: true,
        },
        MethodDef {
            name: "create_file",
            params: &[TypeTag::Path],
            throws_rpc: true,
        },
        MethodDef {
            name: "create_directory",
            params: &[TypeTag::Path],
            throws_rpc: true,
        },
        MethodDef {
            name: "delete",
            params: &[TypeTag::Path],
            throws_rpc: true,
        },
        MethodDef {
            name: "get_storage",
            params: &[TypeTag::Path],
            throws_rpc: true,
        },
    ],
};

/// Naming node, storage-facing registration.
pub static REGISTRATION: InterfaceDef = InterfaceDef {
    id: InterfaceId::Registration,
    name: "registration",
    methods: &[MethodDef {
        name: "register",
        params: &[TypeTag::Proxy, TypeTag::Proxy, TypeTag::List],
        throws_rpc: true,
    }],
};

/// Storage node data plane.
pub static STORAGE: InterfaceDef = InterfaceDef {
    id: InterfaceId::Storage,
    name: "storage",
    methods: &[
        MethodDef {
            name: "size",
            params: &[TypeTag::Path],
            throws_rpc: true,
        },
        MethodDef {
            name: "read",
            params: &[TypeTag::Path, TypeTag::U64, TypeTag::U64],
            throws_rpc: true,
        },
        MethodDef {
            name: "write",
            params: &[TypeTag::Path, TypeTag::U64, TypeTag::Bytes],
            throws_rpc: true,
        },
    ],
};

/// Storage node control plane.
pub static COMMAND: InterfaceDef = InterfaceDef {
    id: InterfaceId::Command,
    name: "command",
    methods: &[
        MethodDef {
            name: "create",
            params: &[TypeTag::Path],
            throws_rpc: true,
        },
        MethodDef {
            name: "delete",
            params: &[TypeTag::Path],
            throws_rpc: true,
        },
    ],
};

/// Argument extraction for dispatch implementations. Every mismatch is an
/// `InvalidArgument` fault carried back to the caller.
pub(crate) mod args {
    use super::*;

    fn get<'a>(values: &'a [Value], index: usize) -> Result<&'a Value, RemoteFault> {
        values.get(index).ok_or_else(|| {
            RemoteFault::new(
                FaultKind::InvalidArgument,
                format!("missing argument {index}"),
            )
        })
    }

    fn mismatch(index: usize, expected: &str) -> RemoteFault {
        RemoteFault::new(
            FaultKind::InvalidArgument,
            format!("argument {index} is not a {expected}"),
        )
    }

    pub fn path<'a>(values: &'a [Value], index: usize) -> Result<&'a Path, RemoteFault> {
        match get(values, index)? {
            Value::Path(path) => Ok(path),
            _ => Err(mismatch(index, "path")),
        }
    }

    pub fn u64(values: &[Value], index: usize) -> Result<u64, RemoteFault> {
        match get(values, index)? {
            Value::U64(n) => Ok(*n),
            _ => Err(mismatch(index, "u64")),
        }
    }

    pub fn bytes<'a>(values: &'a [Value], index: usize) -> Result<&'a [u8], RemoteFault> {
        match get(values, index)? {
            Value::Bytes(data) => Ok(data),
            _ => Err(mismatch(index, "byte buffer")),
        }
    }

    pub fn proxy(
        values: &[Value],
        index: usize,
        interface: InterfaceId,
    ) -> Result<ProxyRef, RemoteFault> {
        match get(values, index)? {
            Value::Proxy(proxy) if proxy.interface == interface => Ok(*proxy),
            Value::Proxy(_) => Err(mismatch(index, interface.name())),
            _ => Err(mismatch(index, "proxy")),
        }
    }

    pub fn path_list(values: &[Value], index: usize) -> Result<Vec<Path>, RemoteFault> {
        let items = match get(values, index)? {
            Value::List(items) => items,
            _ => return Err(mismatch(index, "list")),
        };
        items
            .iter()
            .map(|item| match item {
                Value::Path(path) => Ok(path.clone()),
                _ => Err(mismatch(index, "list of paths")),
            })
            .collect()
    }
}

/// A reply whose shape does not match the method's declared result is a
/// protocol violation, reported as a transport failure.
fn shape_error() -> FsError {
    FsError::Rpc(RpcError::Codec(WireError::InvalidValue("reply shape")))
}

fn ret_bool(value: Value) -> Result<bool, FsError> {
    match value {
        Value::Bool(b) => Ok(b),
        _ => Err(shape_error()),
    }
}

fn ret_u64(value: Value) -> Result<u64, FsError> {
    match value {
        Value::U64(n) => Ok(n),
        _ => Err(shape_error()),
    }
}

fn ret_bytes(value: Value) -> Result<Vec<u8>, FsError> {
    match value {
        Value::Bytes(data) => Ok(data),
        _ => Err(shape_error()),
    }
}

fn ret_unit(value: Value) -> Result<(), FsError> {
    match value {
        Value::Null => Ok(()),
        _ => Err(shape_error()),
    }
}

fn ret_names(value: Value) -> Result<Vec<String>, FsError> {
    let items = match value {
        Value::List(items) => items,
        _ => return Err(shape_error()),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Str(name) => Ok(name),
            _ => Err(shape_error()),
        })
        .collect()
}

fn ret_paths(value: Value) -> Result<Vec<Path>, FsError> {
    let items = match value {
        Value::List(items) => items,
        _ => return Err(shape_error()),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Path(path) => Ok(path),
            _ => Err(shape_error()),
        })
        .collect()
}

fn check_interface(target: ProxyRef, expected: InterfaceId) -> Result<ProxyRef, FsError> {
    if target.interface == expected {
        Ok(target)
    } else {
        Err(FsError::InvalidArgument(format!(
            "proxy {target} does not serve the {} interface",
            expected.name()
        )))
    }
}

/// Proxy for the naming node's client-facing interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceProxy {
    target: ProxyRef,
}

impl ServiceProxy {
    /// Proxy for the service interface at `addr`.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        SERVICE.validate();
        Self {
            target: ProxyRef::new(InterfaceId::Service, addr),
        }
    }

    /// The serializable reference this proxy wraps.
    #[must_use]
    pub fn target(&self) -> ProxyRef {
        self.target
    }

    /// True iff `path` names a directory, false iff it names a file.
    pub fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        ret_bool(call(
            &SERVICE,
            self.target.addr,
            "is_directory",
            vec![Value::Path(path.clone())],
        )?)
    }

    /// Immediate child names of the directory at `path`.
    pub fn list(&self, path: &Path) -> Result<Vec<String>, FsError> {
        ret_names(call(
            &SERVICE,
            self.target.addr,
            "list",
            vec![Value::Path(path.clone())],
        )?)
    }

    /// Create an empty file on one storage node chosen by the naming node.
    pub fn create_file(&self, path: &Path) -> Result<bool, FsError> {
        ret_bool(call(
            &SERVICE,
            self.target.addr,
            "create_file",
            vec![Value::Path(path.clone())],
        )?)
    }

    /// Create a directory in the namespace.
    pub fn create_directory(&self, path: &Path) -> Result<bool, FsError> {
        ret_bool(call(
            &SERVICE,
            self.target.addr,
            "create_directory",
            vec![Value::Path(path.clone())],
        )?)
    }

    /// Delete a file or directory everywhere it is stored.
    pub fn delete(&self, path: &Path) -> Result<bool, FsError> {
        ret_bool(call(
            &SERVICE,
            self.target.addr,
            "delete",
            vec![Value::Path(path.clone())],
        )?)
    }

    /// Data-plane proxy of the storage node hosting the file at `path`.
    pub fn get_storage(&self, path: &Path) -> Result<StorageProxy, FsError> {
        match call(
            &SERVICE,
            self.target.addr,
            "get_storage",
            vec![Value::Path(path.clone())],
        )? {
            Value::Proxy(target) => StorageProxy::from_ref(target),
            _ => Err(shape_error()),
        }
    }
}

/// Proxy for the naming node's registration interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationProxy {
    target: ProxyRef,
}

impl RegistrationProxy {
    /// Proxy for the registration interface at `addr`.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        REGISTRATION.validate();
        Self {
            target: ProxyRef::new(InterfaceId::Registration, addr),
        }
    }

    /// The serializable reference this proxy wraps.
    #[must_use]
    pub fn target(&self) -> ProxyRef {
        self.target
    }

    /// Announce a storage node and its file list; the reply is the subset
    /// of `files` the naming node already knew and rejected as duplicates.
    pub fn register(
        &self,
        storage: &StorageProxy,
        command: &CommandProxy,
        files: &[Path],
    ) -> Result<Vec<Path>, FsError> {
        let listed = files.iter().cloned().map(Value::Path).collect();
        ret_paths(call(
            &REGISTRATION,
            self.target.addr,
            "register",
            vec![
                Value::Proxy(storage.target()),
                Value::Proxy(command.target()),
                Value::List(listed),
            ],
        )?)
    }
}

/// Proxy for a storage node's data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageProxy {
    target: ProxyRef,
}

impl StorageProxy {
    /// Proxy for the storage data interface at `addr`.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        STORAGE.validate();
        Self {
            target: ProxyRef::new(InterfaceId::Storage, addr),
        }
    }

    /// Rebuild a typed proxy from a deserialized reference.
    pub fn from_ref(target: ProxyRef) -> Result<Self, FsError> {
        STORAGE.validate();
        Ok(Self {
            target: check_interface(target, InterfaceId::Storage)?,
        })
    }

    /// The serializable reference this proxy wraps.
    #[must_use]
    pub fn target(&self) -> ProxyRef {
        self.target
    }

    /// File length in bytes.
    pub fn size(&self, path: &Path) -> Result<u64, FsError> {
        ret_u64(call(
            &STORAGE,
            self.target.addr,
            "size",
            vec![Value::Path(path.clone())],
        )?)
    }

    /// Exactly `length` bytes starting at `offset`.
    pub fn read(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>, FsError> {
        ret_bytes(call(
            &STORAGE,
            self.target.addr,
            "read",
            vec![
                Value::Path(path.clone()),
                Value::U64(offset),
                Value::U64(length),
            ],
        )?)
    }

    /// Overwrite (extending as needed) from `offset`.
    pub fn write(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), FsError> {
        ret_unit(call(
            &STORAGE,
            self.target.addr,
            "write",
            vec![
                Value::Path(path.clone()),
                Value::U64(offset),
                Value::Bytes(data.to_vec()),
            ],
        )?)
    }
}

/// Proxy for a storage node's control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandProxy {
    target: ProxyRef,
}

impl CommandProxy {
    /// Proxy for the storage command interface at `addr`.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        COMMAND.validate();
        Self {
            target: ProxyRef::new(InterfaceId::Command, addr),
        }
    }

    /// Rebuild a typed proxy from a deserialized reference.
    pub fn from_ref(target: ProxyRef) -> Result<Self, FsError> {
        COMMAND.validate();
        Ok(Self {
            target: check_interface(target, InterfaceId::Command)?,
        })
    }

    /// The serializable reference this proxy wraps.
    #[must_use]
    pub fn target(&self) -> ProxyRef {
        self.target
    }

    /// Create an empty file, making any missing parent directories.
    pub fn create(&self, path: &Path) -> Result<bool, FsError> {
        ret_bool(call(
            &COMMAND,
            self.target.addr,
            "create",
            vec![Value::Path(path.clone())],
        )?)
    }

    /// Remove a file or directory tree.
    pub fn delete(&self, path: &Path) -> Result<bool, FsError> {
        ret_bool(call(
            &COMMAND,
            self.target.addr,
            "delete",
            vec![Value::Path(path.clone())],
        )?)
    }
}

/// Resolve `hostname:port` into the address a proxy should advertise.
pub(crate) fn advertised_addr(hostname: &str, port: u16) -> Result<SocketAddr, FsError> {
    (hostname, port)
        .to_socket_addrs()
        .map_err(|err| {
            FsError::InvalidArgument(format!("cannot resolve hostname {hostname}: {err}"))
        })?
        .next()
        .ok_or_else(|| {
            FsError::InvalidArgument(format!("hostname {hostname} resolved to no address"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn proxies_compare_by_interface_and_address() {
        assert_eq!(ServiceProxy::new(addr(9000)), ServiceProxy::new(addr(9000)));
        assert_ne!(ServiceProxy::new(addr(9000)), ServiceProxy::new(addr(9001)));
        // Same address, different interface: distinct refs.
        assert_ne!(
            StorageProxy::new(addr(9000)).target(),
            CommandProxy::new(addr(9000)).target()
        );
    }

    #[test]
    fn from_ref_rejects_foreign_interfaces() {
        let wrong = ProxyRef::new(InterfaceId::Service, addr(9000));
        assert!(matches!(
            StorageProxy::from_ref(wrong),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn every_interface_table_passes_validation() {
        SERVICE.validate();
        REGISTRATION.validate();
        STORAGE.validate();
        COMMAND.validate();
    }

    #[test]
    fn advertised_addr_resolves_loopback() {
        let resolved = advertised_addr("127.0.0.1", 8080).expect("resolve");
        assert_eq!(resolved, addr(8080));
    }
}
