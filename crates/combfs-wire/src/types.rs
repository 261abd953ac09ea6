// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define combfs wire value types and constants shared across components.
// Author: Lukas Bower

//! combfs wire data model shared by the codec and the RPC layer.

use std::fmt;
use std::net::SocketAddr;

use crate::path::Path;

/// Upper bound on any single wire frame, prefix included.
pub const MAX_FRAME: u32 = 64 * 1024 * 1024;

/// Possible errors produced while encoding or decoding combfs frames.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    /// Input buffer was shorter than the declared frame length.
    #[error("truncated frame")]
    Truncated,
    /// Declared frame size does not match the actual buffer length.
    #[error("length mismatch: declared {declared} actual {actual}")]
    LengthMismatch {
        /// Frame length declared in the length prefix.
        declared: u32,
        /// Actual byte length observed.
        actual: usize,
    },
    /// A value, interface, or reply discriminator tag was not recognized.
    #[error("unknown wire tag {0:#04x}")]
    UnknownTag(u8),
    /// Encountered malformed UTF-8 in a string field.
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
    /// A field exceeded the size its length prefix can carry, or the frame
    /// exceeded [`MAX_FRAME`].
    #[error("field or frame too large for the wire format")]
    TooLarge,
    /// A serialized path failed path-grammar validation.
    #[error("invalid path on the wire")]
    InvalidPath,
    /// A serialized proxy endpoint was not a parseable socket address.
    #[error("invalid proxy endpoint on the wire")]
    InvalidEndpoint,
    /// A one-byte field held a value outside its domain.
    #[error("invalid {0} encoding")]
    InvalidValue(&'static str),
}

/// Identifies which remote interface a proxy targets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceId {
    /// Naming node, client-facing metadata operations.
    Service = 0,
    /// Naming node, storage-facing registration.
    Registration = 1,
    /// Storage node data plane (`size`/`read`/`write`).
    Storage = 2,
    /// Storage node control plane (`create`/`delete`).
    Command = 3,
}

impl InterfaceId {
    /// Short lowercase name used in debug output.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Registration => "registration",
            Self::Storage => "storage",
            Self::Command => "command",
        }
    }
}

impl TryFrom<u8> for InterfaceId {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Service,
            1 => Self::Registration,
            2 => Self::Storage,
            3 => Self::Command,
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

/// Serializable handle for one remote endpoint of one interface.
///
/// Two references are equal iff they carry the same interface and the same
/// address; a reference round-trips losslessly through the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyRef {
    /// Interface served at the endpoint.
    pub interface: InterfaceId,
    /// Remote TCP endpoint.
    pub addr: SocketAddr,
}

impl ProxyRef {
    /// Construct a reference from its parts.
    #[must_use]
    pub fn new(interface: InterfaceId, addr: SocketAddr) -> Self {
        Self { interface, addr }
    }
}

impl fmt::Display for ProxyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.interface.name(), self.addr)
    }
}

/// Classified failure carried in a reply envelope.
///
/// The discriminator lets the caller re-raise the original error kind
/// instead of collapsing everything into a transport failure.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Named path absent, or present with the wrong kind.
    NotFound = 0,
    /// Offset/length constraint violation.
    Bounds = 1,
    /// Local filesystem failure below a storage node.
    Io = 2,
    /// Malformed or mistyped argument.
    InvalidArgument = 3,
    /// Operation illegal in the current state (duplicate registration).
    State = 4,
    /// A transport failure that occurred on the far side of this hop.
    Rpc = 5,
}

impl TryFrom<u8> for FaultKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::NotFound,
            1 => Self::Bounds,
            2 => Self::Io,
            3 => Self::InvalidArgument,
            4 => Self::State,
            5 => Self::Rpc,
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not-found",
            Self::Bounds => "bounds",
            Self::Io => "io",
            Self::InvalidArgument => "invalid-argument",
            Self::State => "state",
            Self::Rpc => "rpc",
        };
        f.write_str(label)
    }
}

/// Remote-failure envelope: the error a remote method raised, classified
/// and carried back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFault {
    /// Error classification.
    pub kind: FaultKind,
    /// Human-readable description from the remote side.
    pub message: String,
}

impl RemoteFault {
    /// Construct a fault from its parts.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// One-byte type descriptor for a [`Value`] shape.
///
/// Method parameter lists ship as arrays of these tags so the callee can
/// resolve a method by name plus argument shape.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// No value.
    Null = 0x00,
    /// Boolean.
    Bool = 0x01,
    /// Unsigned 64-bit integer.
    U64 = 0x02,
    /// UTF-8 string.
    Str = 0x03,
    /// Raw byte buffer.
    Bytes = 0x04,
    /// Heterogeneous list of values.
    List = 0x05,
    /// Namespace path.
    Path = 0x06,
    /// Remote interface proxy.
    Proxy = 0x07,
    /// Remote-failure envelope.
    Fault = 0x08,
}

impl TryFrom<u8> for TypeTag {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => Self::Null,
            0x01 => Self::Bool,
            0x02 => Self::U64,
            0x03 => Self::Str,
            0x04 => Self::Bytes,
            0x05 => Self::List,
            0x06 => Self::Path,
            0x07 => Self::Proxy,
            0x08 => Self::Fault,
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

/// A tagged wire value.
///
/// Every argument and result of a remote call is one of these shapes;
/// serialization is stable across processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// No value (unit results).
    Null,
    /// Boolean.
    Bool(bool),
    /// Unsigned 64-bit integer (sizes, offsets, lengths).
    U64(u64),
    /// UTF-8 string.
    Str(String),
    /// Raw byte buffer (file contents).
    Bytes(Vec<u8>),
    /// Heterogeneous list.
    List(Vec<Value>),
    /// Namespace path, serialized as its string form.
    Path(Path),
    /// Remote interface proxy.
    Proxy(ProxyRef),
    /// Remote-failure envelope.
    Fault(RemoteFault),
}

impl Value {
    /// The type tag describing this value's shape.
    #[must_use]
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Null => TypeTag::Null,
            Self::Bool(_) => TypeTag::Bool,
            Self::U64(_) => TypeTag::U64,
            Self::Str(_) => TypeTag::Str,
            Self::Bytes(_) => TypeTag::Bytes,
            Self::List(_) => TypeTag::List,
            Self::Path(_) => TypeTag::Path,
            Self::Proxy(_) => TypeTag::Proxy,
            Self::Fault(_) => TypeTag::Fault,
        }
    }
}

/// A method invocation as it travels caller → callee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Method name on the target interface.
    pub method: String,
    /// Argument tuple.
    pub args: Vec<Value>,
    /// Declared parameter type descriptors, used with the name to resolve
    /// the method on the callee.
    pub params: Vec<TypeTag>,
}

/// The single value travelling callee → caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyFrame {
    /// The method returned normally.
    Return(Value),
    /// The method raised; the envelope carries the original error kind.
    Fault(RemoteFault),
}
