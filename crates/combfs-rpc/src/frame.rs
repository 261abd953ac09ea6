// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Read length-prefixed combfs frames from a socket.
// Author: Lukas Bower

//! Socket-side framing.

use std::io::Read;

use combfs_wire::{WireError, MAX_FRAME};

use crate::error::RpcError;

/// Read one complete frame, length prefix included, so the codec can check
/// the declared size against the bytes actually read.
pub(crate) fn read_frame(stream: &mut impl Read) -> Result<Vec<u8>, RpcError> {
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix)?;
    let declared = u32::from_le_bytes(prefix);
    if declared < 5 {
        return Err(RpcError::Codec(WireError::Truncated));
    }
    if declared > MAX_FRAME {
        return Err(RpcError::Codec(WireError::TooLarge));
    }
    let mut buf = vec![0u8; declared as usize];
    buf[..4].copy_from_slice(&prefix);
    stream.read_exact(&mut buf[4..])?;
    Ok(buf)
}
