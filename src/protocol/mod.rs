//! # Si46xx Wire Protocol
//!
//! Opcodes, argument encoders and reply decoders for the Si46xx command
//! interface. Everything here is pure: no transport, no timing.

pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod opcodes;
pub mod reply;
pub mod types;

pub use reply::{BootState, CommandReply, DeviceError, DeviceErrorKind};
pub use types::*;
