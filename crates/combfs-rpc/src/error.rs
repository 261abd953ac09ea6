// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Error types surfaced by the combfs RPC transport.
// Author: Lukas Bower

//! Transport-layer errors.

use std::io;

use combfs_wire::{RemoteFault, WireError};
use thiserror::Error;

/// The distinguished transport error: the call could not be completed
/// end-to-end. Every remote interface method declares this error; it is the
/// only failure the transport itself may raise.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Socket-level failure (connect, read, write, truncated stream).
    #[error("i/o failure during remote call: {0}")]
    Io(#[from] io::Error),
    /// A frame failed to encode or decode.
    #[error("wire codec failure: {0}")]
    Codec(#[from] WireError),
    /// The far side reported a transport failure of its own.
    #[error("remote transport fault: {0}")]
    Remote(String),
    /// A listener lifecycle rule was violated (start after stop, double
    /// start).
    #[error("listener lifecycle violation: {0}")]
    Lifecycle(&'static str),
}

/// Outcome classification of one proxy invocation.
#[derive(Debug, Error)]
pub enum CallError {
    /// The network itself failed; nothing is known about the remote method.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// The call completed and the remote method raised; the envelope carries
    /// the original error kind for the caller to re-raise.
    #[error("remote fault: {0}")]
    Fault(RemoteFault),
}
