//! Wire protocol for the roster presence service.
//!
//! The server speaks newline-delimited JSON: one [`ServerMessage`] per
//! line, written over a single server-to-client stream. Two messages
//! exist — the id assignment a client receives once on admission, and the
//! live session count pushed on every membership change.
//!
//! The coordinator never sees these types; it deals in its own
//! notification enum, and the transport adapter translates at the wire
//! boundary. This crate is shared so clients and fuzz targets can decode
//! what the server encodes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod errors;
mod message;

pub use codec::{MAX_LINE_LEN, decode_line, encode_line};
pub use errors::{ProtocolError, Result};
pub use message::ServerMessage;

/// ALPN identifier negotiated during the transport handshake.
pub const ALPN_PROTOCOL: &[u8] = b"roster/1";
