// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Encode and decode combfs wire frames.
// Author: Lukas Bower

//! Encode/decode helpers for combfs call and reply frames.
//!
//! Every frame is length-prefixed (`u32` little-endian, prefix included in
//! the count) and begins with a one-byte frame kind. Decoding validates the
//! declared length against the buffer actually presented and rejects
//! malformed input without trusting any embedded count.

use std::str;

use crate::path::Path;
use crate::types::{
    CallFrame, FaultKind, InterfaceId, ProxyRef, RemoteFault, ReplyFrame, TypeTag, Value,
    WireError, MAX_FRAME,
};

/// Frame kind opcodes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Call = 0x01,
    Reply = 0x02,
}

impl TryFrom<u8> for FrameKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => Self::Call,
            0x02 => Self::Reply,
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

/// Reply discriminators.
const REPLY_RETURN: u8 = 0x00;
const REPLY_FAULT: u8 = 0x01;

/// Encode a call frame into its wire representation.
pub fn encode_call(call: &CallFrame) -> Result<Vec<u8>, WireError> {
    let mut payload = Vec::new();
    put_string(&mut payload, &call.method)?;
    let count: u32 = call.args.len().try_into().map_err(|_| WireError::TooLarge)?;
    payload.extend_from_slice(&count.to_le_bytes());
    for arg in &call.args {
        put_value(&mut payload, arg)?;
    }
    let params: u16 = call
        .params
        .len()
        .try_into()
        .map_err(|_| WireError::TooLarge)?;
    payload.extend_from_slice(&params.to_le_bytes());
    for tag in &call.params {
        payload.push(*tag as u8);
    }
    finish(FrameKind::Call, payload)
}

/// Decode a call frame from the wire representation.
pub fn decode_call(bytes: &[u8]) -> Result<CallFrame, WireError> {
    let payload = open_frame(FrameKind::Call, bytes)?;
    let mut cursor = Cursor::new(payload);
    let method = read_string(&mut cursor)?;
    let count = read_u32(&mut cursor)? as usize;
    let mut args = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        args.push(read_value(&mut cursor)?);
    }
    let params = read_u16(&mut cursor)? as usize;
    let mut tags = Vec::with_capacity(params.min(64));
    for _ in 0..params {
        tags.push(TypeTag::try_from(read_u8(&mut cursor)?)?);
    }
    cursor.finish()?;
    Ok(CallFrame {
        method,
        args,
        params: tags,
    })
}

/// Encode a reply frame into its wire representation.
pub fn encode_reply(reply: &ReplyFrame) -> Result<Vec<u8>, WireError> {
    let mut payload = Vec::new();
    match reply {
        ReplyFrame::Return(value) => {
            payload.push(REPLY_RETURN);
            put_value(&mut payload, value)?;
        }
        ReplyFrame::Fault(fault) => {
            payload.push(REPLY_FAULT);
            put_fault(&mut payload, fault)?;
        }
    }
    finish(FrameKind::Reply, payload)
}

/// Decode a reply frame from the wire representation.
pub fn decode_reply(bytes: &[u8]) -> Result<ReplyFrame, WireError> {
    let payload = open_frame(FrameKind::Reply, bytes)?;
    let mut cursor = Cursor::new(payload);
    let reply = match read_u8(&mut cursor)? {
        REPLY_RETURN => ReplyFrame::Return(read_value(&mut cursor)?),
        REPLY_FAULT => ReplyFrame::Fault(read_fault(&mut cursor)?),
        other => return Err(WireError::UnknownTag(other)),
    };
    cursor.finish()?;
    Ok(reply)
}

fn finish(kind: FrameKind, payload: Vec<u8>) -> Result<Vec<u8>, WireError> {
    let size = payload.len().checked_add(5).ok_or(WireError::TooLarge)?;
    let size: u32 = size.try_into().map_err(|_| WireError::TooLarge)?;
    if size > MAX_FRAME {
        return Err(WireError::TooLarge);
    }
    let mut buffer = Vec::with_capacity(size as usize);
    buffer.extend_from_slice(&size.to_le_bytes());
    buffer.push(kind as u8);
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

fn open_frame(expected: FrameKind, bytes: &[u8]) -> Result<&[u8], WireError> {
    if bytes.len() < 5 {
        return Err(WireError::Truncated);
    }
    let declared = u32::from_le_bytes(bytes[..4].try_into().expect("slice length checked"));
    if declared > MAX_FRAME {
        return Err(WireError::TooLarge);
    }
    if declared as usize != bytes.len() {
        return Err(WireError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    let kind = FrameKind::try_from(bytes[4])?;
    if kind != expected {
        return Err(WireError::UnknownTag(bytes[4]));
    }
    Ok(&bytes[5..])
}

fn put_value(buffer: &mut Vec<u8>, value: &Value) -> Result<(), WireError> {
    buffer.push(value.tag() as u8);
    match value {
        Value::Null => {}
        Value::Bool(b) => buffer.push(u8::from(*b)),
        Value::U64(n) => buffer.extend_from_slice(&n.to_le_bytes()),
        Value::Str(s) => put_string(buffer, s)?,
        Value::Bytes(data) => {
            let len: u32 = data.len().try_into().map_err(|_| WireError::TooLarge)?;
            buffer.extend_from_slice(&len.to_le_bytes());
            buffer.extend_from_slice(data);
        }
        Value::List(items) => {
            let count: u32 = items.len().try_into().map_err(|_| WireError::TooLarge)?;
            buffer.extend_from_slice(&count.to_le_bytes());
            for item in items {
                put_value(buffer, item)?;
            }
        }
        Value::Path(path) => put_string(buffer, &path.to_string())?,
        Value::Proxy(proxy) => {
            buffer.push(proxy.interface as u8);
            put_string(buffer, &proxy.addr.to_string())?;
        }
        Value::Fault(fault) => put_fault(buffer, fault)?,
    }
    Ok(())
}

fn read_value(cursor: &mut Cursor<'_>) -> Result<Value, WireError> {
    let tag = TypeTag::try_from(read_u8(cursor)?)?;
    Ok(match tag {
        TypeTag::Null => Value::Null,
        TypeTag::Bool => match read_u8(cursor)? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(WireError::InvalidValue("bool")),
        },
        TypeTag::U64 => Value::U64(read_u64(cursor)?),
        TypeTag::Str => Value::Str(read_string(cursor)?),
        TypeTag::Bytes => {
            let len = read_u32(cursor)? as usize;
            Value::Bytes(cursor.take(len)?.to_vec())
        }
        TypeTag::List => {
            let count = read_u32(cursor)? as usize;
            let mut items = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                items.push(read_value(cursor)?);
            }
            Value::List(items)
        }
        TypeTag::Path => {
            let raw = read_string(cursor)?;
            let path: Path = raw.parse().map_err(|_| WireError::InvalidPath)?;
            Value::Path(path)
        }
        TypeTag::Proxy => {
            let interface = InterfaceId::try_from(read_u8(cursor)?)?;
            let raw = read_string(cursor)?;
            let addr = raw.parse().map_err(|_| WireError::InvalidEndpoint)?;
            Value::Proxy(ProxyRef::new(interface, addr))
        }
        TypeTag::Fault => Value::Fault(read_fault(cursor)?),
    })
}

fn put_fault(buffer: &mut Vec<u8>, fault: &RemoteFault) -> Result<(), WireError> {
    buffer.push(fault.kind as u8);
    put_string(buffer, &fault.message)
}

fn read_fault(cursor: &mut Cursor<'_>) -> Result<RemoteFault, WireError> {
    let kind = FaultKind::try_from(read_u8(cursor)?)?;
    let message = read_string(cursor)?;
    Ok(RemoteFault { kind, message })
}

fn put_string(buffer: &mut Vec<u8>, value: &str) -> Result<(), WireError> {
    let len: u16 = value.len().try_into().map_err(|_| WireError::TooLarge)?;
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(value.as_bytes());
    Ok(())
}

fn read_string(cursor: &mut Cursor<'_>) -> Result<String, WireError> {
    let len = read_u16(cursor)? as usize;
    let raw = cursor.take(len)?;
    let text = str::from_utf8(raw).map_err(|_| WireError::InvalidUtf8)?;
    Ok(text.to_owned())
}

fn read_u8(cursor: &mut Cursor<'_>) -> Result<u8, WireError> {
    Ok(cursor.take(1)?[0])
}

fn read_u16(cursor: &mut Cursor<'_>) -> Result<u16, WireError> {
    let raw = cursor.take(2)?;
    Ok(u16::from_le_bytes(raw.try_into().expect("slice length checked")))
}

fn read_u32(cursor: &mut Cursor<'_>) -> Result<u32, WireError> {
    let raw = cursor.take(4)?;
    Ok(u32::from_le_bytes(raw.try_into().expect("slice length checked")))
}

fn read_u64(cursor: &mut Cursor<'_>) -> Result<u64, WireError> {
    let raw = cursor.take(8)?;
    Ok(u64::from_le_bytes(raw.try_into().expect("slice length checked")))
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(len).ok_or(WireError::Truncated)?;
        if end > self.buf.len() {
            return Err(WireError::Truncated);
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Reject trailing garbage after the last field.
    fn finish(self) -> Result<(), WireError> {
        if self.pos != self.buf.len() {
            return Err(WireError::LengthMismatch {
                declared: self.pos as u32,
                actual: self.buf.len(),
            });
        }
        Ok(())
    }
}
