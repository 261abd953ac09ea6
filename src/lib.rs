// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Root library wiring the combfs naming and storage nodes together.
// Author: Lukas Bower

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! combfs: a small distributed file system.
//!
//! One [`NamingNode`] holds the authoritative directory tree and maps every
//! file to the storage nodes hosting it. Any number of [`StorageNode`]s own
//! the bytes under their local roots and register their contents at
//! startup. Clients talk to both through the typed proxies in [`ifaces`],
//! which ride the connection-per-call transport from `combfs-rpc`.
//!
//! The flow end to end: a client builds a [`ServiceProxy`] against the
//! naming node's well-known port, creates or looks up a file, receives a
//! [`StorageProxy`] for the node hosting it, and reads or writes bytes
//! directly against that node.

pub mod error;
pub mod ifaces;
pub mod naming;
pub mod storage;

pub use error::FsError;
pub use ifaces::{CommandProxy, RegistrationProxy, ServiceProxy, StorageProxy};
pub use naming::NamingNode;
pub use storage::StorageNode;
