//! Protocol definitions for beacon communication.
//!
//! This module contains the low-level protocol pieces:
//! - Message kinds and their wire names
//! - Line framing
//! - Encoding and decoding of typed messages

pub mod codec;
pub mod kind;
pub mod line;

pub use codec::{decode_command, decode_event, encode_command, encode_event};
pub use kind::{IncomingKind, OutgoingKind};
pub use line::{LineDecoder, MAX_LINE_SIZE, encode as encode_line};
