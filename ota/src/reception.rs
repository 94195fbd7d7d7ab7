// Licensed under the Apache-2.0 license

//! Transport framing and the chunk reception loop.
//!
//! Strict stop-and-wait: a chunk is validated, durably staged and ACKed
//! before the sender may transmit the next one. Two timeouts run
//! concurrently (whole session, single chunk) and the watchdog is fed at
//! sub-second granularity inside every byte wait, independent of chunk
//! arrival.

use crate::env::UpdateEnv;
use crate::error::UpdateError;
use crate::session::UpdateSession;
use crate::staging::StagingWriter;
use crate::verify::IntegrityVerifier;
use core::fmt::Write;
use ota_protocol::{
    xor_checksum, ChunkHeader, CHUNK_ACK, CHUNK_HEADER_LEN, CHUNK_MAGIC, END_MAGIC,
    MAX_CHUNK_PAYLOAD,
};
use zerocopy::FromBytes;

/// Short scan quantum used while hunting for a frame magic; a miss is a
/// resync opportunity, not a failure.
const RESYNC_POLL_MS: u32 = 100;

pub(crate) enum Frame {
    Chunk(ChunkHeader),
    End,
}

/// Poll for one byte, feeding the watchdog while waiting.
fn read_byte_timeout(env: &mut UpdateEnv, timeout_ms: u32) -> Result<u8, UpdateError> {
    let start = env.clock.now_ms();
    let mut last_feed = start;
    loop {
        if let Some(byte) = env.transport.try_read_byte() {
            return Ok(byte);
        }
        let now = env.clock.now_ms();
        if now.wrapping_sub(start) >= timeout_ms {
            return Err(UpdateError::ProtocolTimeout);
        }
        if now.wrapping_sub(last_feed) >= env.timings.watchdog_feed_interval_ms {
            env.watchdog.feed();
            last_feed = now;
        }
    }
}

/// Fill `buf`, sharing one deadline across all bytes.
fn read_exact(env: &mut UpdateEnv, buf: &mut [u8], timeout_ms: u32) -> Result<(), UpdateError> {
    let start = env.clock.now_ms();
    for slot in buf.iter_mut() {
        let elapsed = env.elapsed_ms(start);
        if elapsed >= timeout_ms {
            return Err(UpdateError::ProtocolTimeout);
        }
        *slot = read_byte_timeout(env, timeout_ms - elapsed)?;
    }
    Ok(())
}

/// Scan for the next frame within the per-chunk timeout.
///
/// Bytes that do not open a recognized magic are skipped so the receiver
/// resynchronizes after line noise instead of aborting.
fn read_frame(env: &mut UpdateEnv) -> Result<Frame, UpdateError> {
    let chunk_timeout = env.timings.chunk_timeout_ms;
    let start = env.clock.now_ms();
    while env.elapsed_ms(start) < chunk_timeout {
        env.watchdog.feed();
        let first = match read_byte_timeout(env, RESYNC_POLL_MS) {
            Ok(byte) => byte,
            Err(_) => continue,
        };
        if first == CHUNK_MAGIC[0] {
            match read_byte_timeout(env, RESYNC_POLL_MS) {
                Ok(second) if second == CHUNK_MAGIC[1] => {
                    let mut raw = [0u8; CHUNK_HEADER_LEN];
                    read_exact(env, &mut raw, chunk_timeout)?;
                    let header =
                        ChunkHeader::read_from_bytes(&raw).map_err(|_| UpdateError::Size)?;
                    return Ok(Frame::Chunk(header));
                }
                _ => continue,
            }
        } else if first == END_MAGIC[0] {
            match read_byte_timeout(env, RESYNC_POLL_MS) {
                Ok(second) if second == END_MAGIC[1] => return Ok(Frame::End),
                _ => continue,
            }
        }
    }
    Err(UpdateError::ProtocolTimeout)
}

/// Drive the whole transfer: chunks in, ACKs out, staged image flushed.
/// Returns the staged image length in bytes.
pub fn receive_image(
    env: &mut UpdateEnv,
    session: &mut UpdateSession,
    staging: &mut StagingWriter,
    verifier: &mut IntegrityVerifier,
) -> Result<u32, UpdateError> {
    let session_timeout = env.timings.session_timeout_ms;
    let chunk_timeout = env.timings.chunk_timeout_ms;
    let session_start = env.clock.now_ms();
    crate::println!("[ota] waiting for firmware chunks");

    loop {
        env.watchdog.feed();
        if env.elapsed_ms(session_start) > session_timeout {
            return Err(UpdateError::ProtocolTimeout);
        }

        match read_frame(env)? {
            Frame::End => break,
            Frame::Chunk(header) => {
                if !header.length_in_bounds() {
                    crate::println!("[ota] chunk length {} out of bounds", header.length.get());
                    return Err(UpdateError::Size);
                }
                let expected = session.chunks_accepted();
                if header.sequence.get() != expected {
                    crate::println!(
                        "[ota] chunk {} arrived, expected {}",
                        header.sequence.get(),
                        expected
                    );
                    return Err(UpdateError::Sequence);
                }

                let len = header.length.get() as usize;
                let mut payload = [0u8; MAX_CHUNK_PAYLOAD];
                read_exact(env, &mut payload[..len], chunk_timeout)?;
                let declared = read_byte_timeout(env, chunk_timeout)?;
                if xor_checksum(&payload[..len]) != declared {
                    crate::println!("[ota] checksum mismatch on chunk {}", expected);
                    return Err(UpdateError::Checksum);
                }

                verifier.absorb(&payload[..len]);
                staging.push(&payload[..len])?;
                session.note_chunk(len);

                env.watchdog.feed();
                env.transport.write_byte(CHUNK_ACK);
                env.transport.flush();
            }
        }
    }

    let total = staging.finish()?;
    crate::println!(
        "[ota] transfer complete: {} chunks, {} bytes",
        session.chunks_accepted(),
        total
    );
    Ok(total)
}

/// Wait a bounded window for the optional CRC announcement.
///
/// Repeated end markers and stray bytes inside the window are drained here
/// so they are never interpreted by the application protocol afterward.
/// Absence of an announcement is tolerated; the caller logs the reduced
/// verification confidence.
pub fn read_crc_announcement(env: &mut UpdateEnv) -> Option<u32> {
    let announce_wait = env.timings.announce_wait_ms;
    let announce_read = env.timings.announce_read_ms;
    let start = env.clock.now_ms();
    while env.elapsed_ms(start) < announce_wait {
        env.watchdog.feed();
        let first = match read_byte_timeout(env, RESYNC_POLL_MS) {
            Ok(byte) => byte,
            Err(_) => continue,
        };
        if first != END_MAGIC[0] {
            continue;
        }
        match read_byte_timeout(env, RESYNC_POLL_MS) {
            Ok(second) if second == END_MAGIC[1] => {}
            _ => continue,
        }
        let mut raw = [0u8; 4];
        if read_exact(env, &mut raw, announce_read).is_err() {
            // a bare repeated end marker; drained, keep listening
            continue;
        }
        return Some(u32::from_le_bytes(raw));
    }
    None
}
