// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Wire-level data model and codec for combfs RPC traffic.
// Author: Lukas Bower

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! combfs wire format: paths, tagged values, and the frame codec.
//!
//! Everything that crosses a combfs TCP connection is described here. The
//! companion `combfs-rpc` crate moves these frames over sockets; this crate
//! stays pure so the format can be tested byte-for-byte.

pub mod codec;
pub mod path;
pub mod types;

pub use codec::{decode_call, decode_reply, encode_call, encode_reply};
pub use path::{Path, PathError};
pub use types::{
    CallFrame, FaultKind, InterfaceId, ProxyRef, RemoteFault, ReplyFrame, TypeTag, Value,
    WireError, MAX_FRAME,
};
