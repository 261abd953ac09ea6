// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Filesystem error taxonomy and its wire-envelope mapping.
// Author: Lukas Bower

//! combfs error taxonomy.
//!
//! Application failures cross the wire inside a [`RemoteFault`] envelope and
//! are re-raised on the caller as the same [`FsError`] variant, so a client
//! distinguishes a missing file from a dead storage node.

use std::io;

use combfs_rpc::{CallError, RpcError};
use combfs_wire::{FaultKind, PathError, RemoteFault};
use thiserror::Error;

/// Failure raised by naming and storage operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// Named path absent, or present with the wrong kind.
    #[error("not found: {0}")]
    NotFound(String),
    /// Offset/length constraint violation on `read`/`write`.
    #[error("out of bounds: {0}")]
    Bounds(String),
    /// Local filesystem failure below a storage node.
    #[error("i/o failure: {0}")]
    Io(String),
    /// Malformed or mistyped argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Operation illegal in the current state (duplicate registration,
    /// creation with no storage registered).
    #[error("illegal state: {0}")]
    State(String),
    /// The remote call itself could not be completed.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<PathError> for FsError {
    fn from(err: PathError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<FsError> for RemoteFault {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound(m) => RemoteFault::new(FaultKind::NotFound, m),
            FsError::Bounds(m) => RemoteFault::new(FaultKind::Bounds, m),
            FsError::Io(m) => RemoteFault::new(FaultKind::Io, m),
            FsError::InvalidArgument(m) => RemoteFault::new(FaultKind::InvalidArgument, m),
            FsError::State(m) => RemoteFault::new(FaultKind::State, m),
            FsError::Rpc(e) => RemoteFault::new(FaultKind::Rpc, e.to_string()),
        }
    }
}

impl From<RemoteFault> for FsError {
    fn from(fault: RemoteFault) -> Self {
        match fault.kind {
            FaultKind::NotFound => Self::NotFound(fault.message),
            FaultKind::Bounds => Self::Bounds(fault.message),
            FaultKind::Io => Self::Io(fault.message),
            FaultKind::InvalidArgument => Self::InvalidArgument(fault.message),
            FaultKind::State => Self::State(fault.message),
            FaultKind::Rpc => Self::Rpc(RpcError::Remote(fault.message)),
        }
    }
}

impl From<CallError> for FsError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Rpc(e) => Self::Rpc(e),
            CallError::Fault(fault) => fault.into(),
        }
    }
}
