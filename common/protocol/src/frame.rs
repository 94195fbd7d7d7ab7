// Licensed under the Apache-2.0 license

use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// First two bytes of every chunk frame.
pub const CHUNK_MAGIC: [u8; 2] = [0x55, 0xAA];
/// End-of-transfer marker. May be repeated by the sender; repeats are drained.
pub const END_MAGIC: [u8; 2] = [0xAA, 0x55];
/// Acknowledge byte emitted after a chunk has been durably staged.
pub const CHUNK_ACK: u8 = 0xAA;
/// First byte of an error report; the wire error code follows.
pub const ERROR_PREFIX: u8 = 0xFF;
/// Final acknowledge emitted after verification, immediately before commit.
pub const COMMIT_ACK: [u8; 3] = [0xAA, 0x55, 0x00];

/// Largest payload a single chunk may carry.
pub const MAX_CHUNK_PAYLOAD: usize = 256;
/// Bytes of header following the chunk magic: sequence (u32) + length (u16).
pub const CHUNK_HEADER_LEN: usize = 6;
/// Bytes following the announce magic: the sender's CRC32, little-endian.
pub const ANNOUNCE_LEN: usize = 4;

/// Chunk header as it appears on the wire, after the two magic bytes.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ChunkHeader {
    pub sequence: U32<LittleEndian>,
    pub length: U16<LittleEndian>,
}

impl ChunkHeader {
    pub fn new(sequence: u32, length: u16) -> ChunkHeader {
        ChunkHeader {
            sequence: U32::new(sequence),
            length: U16::new(length),
        }
    }

    /// Whether the announced payload length is one the receiver will accept.
    pub fn length_in_bounds(&self) -> bool {
        let len = self.length.get() as usize;
        (1..=MAX_CHUNK_PAYLOAD).contains(&len)
    }
}

/// XOR of all payload bytes; the trailing checksum byte of a chunk frame.
pub fn xor_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc ^ b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    BufferTooShort,
    PayloadSize,
}

/// Encode a complete chunk frame into `out`, returning the encoded length.
///
/// Used by host-side senders and tests; the device only ever decodes.
pub fn encode_chunk(sequence: u32, payload: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    if payload.is_empty() || payload.len() > MAX_CHUNK_PAYLOAD {
        return Err(CodecError::PayloadSize);
    }
    let total = CHUNK_MAGIC.len() + CHUNK_HEADER_LEN + payload.len() + 1;
    if out.len() < total {
        return Err(CodecError::BufferTooShort);
    }

    out[..2].copy_from_slice(&CHUNK_MAGIC);
    let header = ChunkHeader::new(sequence, payload.len() as u16);
    header
        .write_to(&mut out[2..2 + CHUNK_HEADER_LEN])
        .map_err(|_| CodecError::BufferTooShort)?;
    let body = 2 + CHUNK_HEADER_LEN;
    out[body..body + payload.len()].copy_from_slice(payload);
    out[body + payload.len()] = xor_checksum(payload);
    Ok(total)
}

/// Encode the end-of-transfer marker.
pub fn encode_end(out: &mut [u8]) -> Result<usize, CodecError> {
    if out.len() < END_MAGIC.len() {
        return Err(CodecError::BufferTooShort);
    }
    out[..2].copy_from_slice(&END_MAGIC);
    Ok(END_MAGIC.len())
}

/// Encode the optional CRC32 announcement that may follow the end marker.
pub fn encode_crc_announce(crc32: u32, out: &mut [u8]) -> Result<usize, CodecError> {
    let total = END_MAGIC.len() + ANNOUNCE_LEN;
    if out.len() < total {
        return Err(CodecError::BufferTooShort);
    }
    out[..2].copy_from_slice(&END_MAGIC);
    out[2..total].copy_from_slice(&crc32.to_le_bytes());
    Ok(total)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_chunk_frame_layout() {
        let payload = [0x11u8, 0x22, 0x33];
        let mut buf = [0u8; 64];
        let len = encode_chunk(7, &payload, &mut buf).unwrap();
        assert_eq!(len, 2 + CHUNK_HEADER_LEN + 3 + 1);
        assert_eq!(&buf[..2], &CHUNK_MAGIC);
        // sequence and length are little-endian
        assert_eq!(&buf[2..6], &[7, 0, 0, 0]);
        assert_eq!(&buf[6..8], &[3, 0]);
        assert_eq!(&buf[8..11], &payload);
        assert_eq!(buf[11], 0x11 ^ 0x22 ^ 0x33);
    }

    #[test]
    fn test_header_decode() {
        let bytes = [0xEF, 0xBE, 0xAD, 0xDE, 0x00, 0x01];
        let header = ChunkHeader::read_from_bytes(&bytes).unwrap();
        assert_eq!(header.sequence.get(), 0xDEAD_BEEF);
        assert_eq!(header.length.get(), 256);
        assert!(header.length_in_bounds());
    }

    #[test]
    fn test_header_length_bounds() {
        assert!(!ChunkHeader::new(0, 0).length_in_bounds());
        assert!(ChunkHeader::new(0, 1).length_in_bounds());
        assert!(ChunkHeader::new(0, 256).length_in_bounds());
        assert!(!ChunkHeader::new(0, 257).length_in_bounds());
    }

    #[test]
    fn test_payload_size_rejected() {
        let mut buf = [0u8; 600];
        assert_eq!(
            encode_chunk(0, &[], &mut buf),
            Err(CodecError::PayloadSize)
        );
        let too_big = [0u8; MAX_CHUNK_PAYLOAD + 1];
        assert_eq!(
            encode_chunk(0, &too_big, &mut buf),
            Err(CodecError::PayloadSize)
        );
    }

    #[test]
    fn test_crc_announce_layout() {
        let mut buf = [0u8; 8];
        let len = encode_crc_announce(0x0403_0201, &mut buf).unwrap();
        assert_eq!(&buf[..len], &[0xAA, 0x55, 0x01, 0x02, 0x03, 0x04]);
    }
}
