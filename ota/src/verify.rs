// Licensed under the Apache-2.0 license

use crate::env::UpdateEnv;
use crate::error::UpdateError;
use crate::log::HexWord;
use core::fmt::Write;

/// First two words of a staged image, interpreted as an ARM vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorSignature {
    pub stack_pointer: u32,
    pub reset_vector: u32,
}

/// Accumulates integrity evidence while chunks stream in.
///
/// The CRC is computed per payload byte as chunks arrive, never by
/// re-reading flash afterward: the XIP cache may serve stale lines for
/// freshly-programmed addresses, so a post-hoc flash walk is not trusted
/// as the primary source. The first eight streamed bytes double as the
/// vector-table signature.
pub struct IntegrityVerifier {
    hasher: crc32fast::Hasher,
    head: [u8; 8],
    absorbed: u32,
}

impl IntegrityVerifier {
    pub fn new() -> IntegrityVerifier {
        IntegrityVerifier {
            hasher: crc32fast::Hasher::new(),
            head: [0; 8],
            absorbed: 0,
        }
    }

    /// Fold one accepted chunk payload into the running checks.
    pub fn absorb(&mut self, payload: &[u8]) {
        let headroom = (8usize).saturating_sub(self.absorbed as usize);
        if headroom > 0 {
            let take = headroom.min(payload.len());
            let base = self.absorbed as usize;
            self.head[base..base + take].copy_from_slice(&payload[..take]);
        }
        self.hasher.update(payload);
        self.absorbed += payload.len() as u32;
    }

    pub fn bytes_absorbed(&self) -> u32 {
        self.absorbed
    }

    /// CRC32 of everything absorbed so far (reflected 0xEDB88320, init
    /// 0xFFFFFFFF, final XOR).
    pub fn streaming_crc(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// The vector-table words, once at least eight bytes have streamed.
    pub fn vector_signature(&self) -> Option<VectorSignature> {
        if self.absorbed < 8 {
            return None;
        }
        let [s0, s1, s2, s3, r0, r1, r2, r3] = self.head;
        Some(VectorSignature {
            stack_pointer: u32::from_le_bytes([s0, s1, s2, s3]),
            reset_vector: u32::from_le_bytes([r0, r1, r2, r3]),
        })
    }
}

impl Default for IntegrityVerifier {
    fn default() -> Self {
        IntegrityVerifier::new()
    }
}

/// The single go/no-go verdict gating commit.
///
/// Three checks, all of which must pass: the vector-table signature, the
/// streaming CRC against the announced value when one was supplied, and,
/// only on a streaming mismatch, one authoritative cache-flushed read-back
/// of the staged region. The announced value is authoritative once
/// supplied: a read-back that agrees with the stream but not the
/// announcement still fails.
pub fn verify_image(
    env: &mut UpdateEnv,
    verifier: &IntegrityVerifier,
    image_len: u32,
    announced: Option<u32>,
) -> Result<(), UpdateError> {
    let signature = match verifier.vector_signature() {
        Some(signature) => signature,
        None => {
            crate::println!("[ota] image too short to carry a vector table");
            return Err(UpdateError::Integrity);
        }
    };
    let sp_ok = env.map.valid_stack_pointer(signature.stack_pointer);
    let pc_ok = env.map.valid_reset_vector(signature.reset_vector);
    if !sp_ok || !pc_ok {
        crate::println!(
            "[ota] bad vector table: SP={} PC={}",
            HexWord(signature.stack_pointer),
            HexWord(signature.reset_vector)
        );
        return Err(UpdateError::Integrity);
    }

    let streamed = verifier.streaming_crc();
    match announced {
        None => {
            // tolerated, but the image is vouched for by per-chunk
            // checksums only
            crate::println!("[ota] no CRC announced, skipping whole-image check");
            Ok(())
        }
        Some(expected) if expected == streamed => {
            crate::println!("[ota] CRC32 verified: {}", HexWord(streamed));
            Ok(())
        }
        Some(expected) => {
            crate::println!(
                "[ota] CRC mismatch: streamed {} announced {}, reading back",
                HexWord(streamed),
                HexWord(expected)
            );
            env.sys.flush_flash_cache();
            let read_back = read_back_crc(env, image_len)?;
            if read_back == expected {
                // the stream disagreed but flash holds the right bytes;
                // a transient cache artifact, not corruption
                crate::println!("[ota] read-back CRC agrees: {}", HexWord(read_back));
                Ok(())
            } else {
                crate::println!("[ota] read-back CRC {} still disagrees", HexWord(read_back));
                Err(UpdateError::Integrity)
            }
        }
    }
}

/// Full read-back of the staged region, watchdog fed per block.
fn read_back_crc(env: &mut UpdateEnv, image_len: u32) -> Result<u32, UpdateError> {
    let mut hasher = crc32fast::Hasher::new();
    let mut block = [0u8; 256];
    let mut offset = 0u32;
    while offset < image_len {
        env.watchdog.feed();
        let take = (image_len - offset).min(block.len() as u32) as usize;
        env.flash
            .read(&mut block[..take], (env.map.staging_offset + offset) as usize)?;
        hasher.update(&block[..take]);
        offset += take as u32;
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_streaming_crc_known_vector() {
        // CRC32("123456789") = 0xCBF43926
        let mut verifier = IntegrityVerifier::new();
        verifier.absorb(b"1234");
        verifier.absorb(b"56789");
        assert_eq!(verifier.streaming_crc(), 0xCBF4_3926);
    }

    #[test]
    fn test_vector_signature_needs_eight_bytes() {
        let mut verifier = IntegrityVerifier::new();
        verifier.absorb(&[0x00, 0x80, 0x04]);
        assert!(verifier.vector_signature().is_none());
        verifier.absorb(&[0x20, 0xED, 0x01, 0x00, 0x10]);
        let signature = verifier.vector_signature().unwrap();
        assert_eq!(signature.stack_pointer, 0x2004_8000);
        assert_eq!(signature.reset_vector, 0x1000_01ED);
    }

    #[test]
    fn test_head_capture_spans_chunk_boundaries() {
        let mut verifier = IntegrityVerifier::new();
        for byte in 0u8..16 {
            verifier.absorb(&[byte]);
        }
        let signature = verifier.vector_signature().unwrap();
        assert_eq!(signature.stack_pointer, u32::from_le_bytes([0, 1, 2, 3]));
        assert_eq!(signature.reset_vector, u32::from_le_bytes([4, 5, 6, 7]));
        assert_eq!(verifier.bytes_absorbed(), 16);
    }
}
