// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Static interface descriptors and the server-side dispatch seam.
// Author: Lukas Bower

//! Interface descriptors.
//!
//! Each remote interface is a fixed table of named methods with declared
//! parameter shapes. The callee resolves an incoming call by method name
//! plus parameter tags; the caller uses the same table to stamp the
//! declared tags onto the wire. Tables are plain statics, so the method
//! set of every interface is fixed at compile time.

use combfs_wire::{CallFrame, InterfaceId, RemoteFault, TypeTag, Value};

/// One method of a remote interface.
#[derive(Debug)]
pub struct MethodDef {
    /// Method name as it appears on the wire.
    pub name: &'static str,
    /// Declared parameter type descriptors.
    pub params: &'static [TypeTag],
    /// Whether the method declares the transport error among its failures.
    /// Every remote method must; [`InterfaceDef::validate`] enforces it.
    pub throws_rpc: bool,
}

/// A remote interface: a named, fixed set of methods.
#[derive(Debug)]
pub struct InterfaceDef {
    /// Interface identity carried inside serialized proxies.
    pub id: InterfaceId,
    /// Interface name used in diagnostics.
    pub name: &'static str,
    /// Method table.
    pub methods: &'static [MethodDef],
}

impl InterfaceDef {
    /// Look up a method by name alone (caller side, where the declared
    /// parameter list comes from the table itself).
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Resolve a method by name and parameter shape (callee side).
    #[must_use]
    pub fn resolve(&self, name: &str, params: &[TypeTag]) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.params == params)
    }

    /// Enforce the remote-interface rule: every method must declare the
    /// transport error.
    ///
    /// # Panics
    ///
    /// Panics when a method omits the transport error. The tables are
    /// static data, so a violation is a programmer error caught the first
    /// time a listener or proxy is constructed over the interface.
    pub fn validate(&'static self) -> &'static Self {
        for method in self.methods {
            assert!(
                method.throws_rpc,
                "method {}.{} does not declare the transport error",
                self.name, method.name
            );
        }
        self
    }
}

/// Server-side seam: the object a listener forwards resolved calls to.
///
/// Implementations own whatever shared state they touch and are responsible
/// for its synchronization; the listener invokes `dispatch` from one worker
/// thread per connection.
pub trait Dispatch: Send + Sync + 'static {
    /// The interface this object serves.
    fn interface(&self) -> &'static InterfaceDef;

    /// Invoke the already-resolved method. A returned fault is shipped to
    /// the caller verbatim so the original error kind survives the hop.
    fn dispatch(&self, call: &CallFrame) -> Result<Value, RemoteFault>;
}
