// Licensed under the Apache-2.0 license

//! Serial wire format for the in-field firmware update link.
//!
//! The WiFi companion streams a firmware image to the controller as a
//! sequence of checksummed chunks, terminated by an end-of-transfer marker
//! and an optional CRC32 announcement. This crate defines the frame layout
//! and the error codes reported back over the same link; it is shared
//! between the firmware and host-side tooling and carries no device state.

#![cfg_attr(not(test), no_std)]

mod error;
mod frame;

pub use error::ErrorCode;
pub use frame::{
    encode_chunk, encode_crc_announce, encode_end, xor_checksum, ChunkHeader, CodecError,
    ANNOUNCE_LEN, CHUNK_ACK, CHUNK_HEADER_LEN, CHUNK_MAGIC, COMMIT_ACK, END_MAGIC, ERROR_PREFIX,
    MAX_CHUNK_PAYLOAD,
};
