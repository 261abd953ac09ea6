// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Caller-side invocation over a fresh connection per call.
// Author: Lukas Bower

//! Client side of the transport.
//!
//! Each invocation opens its own TCP connection, writes one call frame,
//! reads one reply frame, and closes. The protocol is stateless; per-call
//! connections keep it that way.

use std::io::Write;
use std::net::{SocketAddr, TcpStream};

use combfs_wire::{decode_reply, encode_call, CallFrame, FaultKind, ReplyFrame, Value};

use crate::error::{CallError, RpcError};
use crate::frame::read_frame;
use crate::iface::InterfaceDef;

/// Invoke `method` on the remote end of `iface` at `addr`.
///
/// A [`CallError::Fault`] re-raises the error the remote method itself
/// raised; every other failure mode is the transport error.
///
/// # Panics
///
/// Panics when `method` is not part of `iface`. Proxies are generated from
/// the same tables, so an unknown name is a programmer error, not a runtime
/// condition.
pub fn call(
    iface: &'static InterfaceDef,
    addr: SocketAddr,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, CallError> {
    let def = iface
        .method(method)
        .unwrap_or_else(|| panic!("interface {} has no method {method}", iface.name));
    let frame = encode_call(&CallFrame {
        method: method.to_owned(),
        args,
        params: def.params.to_vec(),
    })
    .map_err(RpcError::from)?;

    let mut stream = TcpStream::connect(addr).map_err(RpcError::from)?;
    stream.write_all(&frame).map_err(RpcError::from)?;
    let reply = read_frame(&mut stream)?;
    drop(stream);

    match decode_reply(&reply).map_err(RpcError::from)? {
        ReplyFrame::Return(value) => Ok(value),
        // A remote-side transport fault is still a transport failure from
        // this caller's point of view.
        ReplyFrame::Fault(fault) if fault.kind == FaultKind::Rpc => {
            Err(CallError::Rpc(RpcError::Remote(fault.message)))
        }
        ReplyFrame::Fault(fault) => Err(CallError::Fault(fault)),
    }
}
