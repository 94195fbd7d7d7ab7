// Licensed under the Apache-2.0 license

use crate::clock::SimClock;
use brew_ota::hil::ByteTransport;
use ota_protocol::{encode_chunk, encode_crc_announce, encode_end, xor_checksum, CHUNK_MAGIC};
use std::collections::VecDeque;
use std::rc::Rc;

/// Byte link whose receive side is scripted up front.
///
/// Stop-and-wait flow control means the sender never actually reacts to
/// our ACKs in these tests, so the whole transfer can be queued before
/// the engine runs; everything the engine transmits is captured for
/// inspection afterward.
///
/// Two receive queues model the session transition: `stale` bytes are
/// visible immediately (they are what the pre-session drains must eat),
/// while scripted session traffic can be held back until a simulated
/// instant with [`release_scripted_at`](Self::release_scripted_at), so a
/// drain running before that instant cannot swallow the transfer itself.
pub struct ScriptedTransport {
    clock: Option<Rc<SimClock>>,
    stale: VecDeque<u8>,
    rx: VecDeque<u8>,
    release_at_ms: u64,
    tx: Vec<u8>,
}

impl ScriptedTransport {
    pub fn new() -> ScriptedTransport {
        ScriptedTransport {
            clock: None,
            stale: VecDeque::new(),
            rx: VecDeque::new(),
            release_at_ms: 0,
            tx: Vec::new(),
        }
    }

    pub fn with_clock(clock: Rc<SimClock>) -> ScriptedTransport {
        ScriptedTransport {
            clock: Some(clock),
            ..ScriptedTransport::new()
        }
    }

    /// Hold all scripted session bytes until the simulated clock reaches
    /// `ms`. No effect without a clock.
    pub fn release_scripted_at(&mut self, ms: u64) {
        self.release_at_ms = ms;
    }

    /// Residue of the application protocol, visible to reads immediately.
    pub fn script_stale_bytes(&mut self, bytes: &[u8]) {
        self.stale.extend(bytes.iter().copied());
    }

    pub fn script_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn script_chunk(&mut self, sequence: u32, payload: &[u8]) {
        let mut buf = vec![0u8; payload.len() + 16];
        let len = encode_chunk(sequence, payload, &mut buf).unwrap();
        self.script_bytes(&buf[..len]);
    }

    /// A chunk whose checksum byte is off by one.
    pub fn script_chunk_bad_checksum(&mut self, sequence: u32, payload: &[u8]) {
        self.script_bytes(&CHUNK_MAGIC);
        self.script_bytes(&sequence.to_le_bytes());
        self.script_bytes(&(payload.len() as u16).to_le_bytes());
        self.script_bytes(payload);
        self.script_bytes(&[xor_checksum(payload).wrapping_add(1)]);
    }

    pub fn script_end(&mut self) {
        let mut buf = [0u8; 2];
        let len = encode_end(&mut buf).unwrap();
        self.script_bytes(&buf[..len]);
    }

    pub fn script_announce(&mut self, crc32: u32) {
        let mut buf = [0u8; 6];
        let len = encode_crc_announce(crc32, &mut buf).unwrap();
        self.script_bytes(&buf[..len]);
    }

    /// Everything the engine wrote, in order.
    pub fn sent(&self) -> &[u8] {
        &self.tx
    }

    /// Bytes still queued on the receive side, gated or not.
    pub fn unread(&self) -> usize {
        self.stale.len() + self.rx.len()
    }

    fn gated(&self) -> bool {
        match &self.clock {
            Some(clock) => clock.raw_ms() < self.release_at_ms,
            None => false,
        }
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        ScriptedTransport::new()
    }
}

impl ByteTransport for ScriptedTransport {
    fn try_read_byte(&mut self) -> Option<u8> {
        if let Some(byte) = self.stale.pop_front() {
            return Some(byte);
        }
        if self.gated() {
            return None;
        }
        self.rx.pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.tx.push(byte);
    }

    fn flush(&mut self) {}
}
