// Author: Lukas Bower

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Shared networking constants for combfs components.
//!
//! Storage nodes and clients construct their bootstrap proxies from these
//! ports without any discovery step, so both values must stay in lockstep
//! with whatever the naming daemon binds.

/// Well-known loopback TCP port of the naming node's client service interface.
pub const NAMING_SERVICE_PORT: u16 = 6000;
/// Well-known loopback TCP port of the naming node's storage registration interface.
pub const NAMING_REGISTRATION_PORT: u16 = 6001;
