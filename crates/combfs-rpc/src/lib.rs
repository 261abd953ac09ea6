// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: TCP transport carrying typed method calls between combfs nodes.
// Author: Lukas Bower

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! combfs RPC transport.
//!
//! The transport carries typed method calls over TCP: a [`Listener`] binds
//! one socket and serves one interface; [`call`] invokes a method on the
//! remote end over a fresh connection. Remote application errors travel
//! back inside a fault envelope and are re-raised with their original kind;
//! only genuine end-to-end failures surface as [`RpcError`].

mod client;
mod error;
mod frame;
mod iface;
mod listener;

pub use client::call;
pub use error::{CallError, RpcError};
pub use iface::{Dispatch, InterfaceDef, MethodDef};
pub use listener::Listener;
