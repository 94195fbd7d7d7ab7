// Licensed under the Apache-2.0 license

use crate::hil::{ByteTransport, Clock, FlashStorage, SystemControl, SystemHooks, Watchdog};
use brew_config::{BrewMemoryMap, OtaLimits, OtaTimings};

/// Everything the update engine borrows from the platform for the duration
/// of a session.
pub struct UpdateEnv<'a> {
    pub transport: &'a mut dyn ByteTransport,
    pub flash: &'a dyn FlashStorage,
    pub clock: &'a dyn Clock,
    pub watchdog: &'a mut dyn Watchdog,
    pub sys: &'a mut dyn SystemControl,
    pub hooks: &'a mut dyn SystemHooks,
    pub map: BrewMemoryMap,
    pub timings: OtaTimings,
    pub limits: OtaLimits,
}

impl UpdateEnv<'_> {
    /// Milliseconds elapsed since `start`, tolerant of clock wrap.
    pub fn elapsed_ms(&self, start: u32) -> u32 {
        self.clock.now_ms().wrapping_sub(start)
    }

    /// Discard whatever is sitting in the receive path right now.
    /// Returns the number of bytes dropped.
    pub fn drain_transport(&mut self) -> usize {
        let mut dropped = 0;
        while self.transport.try_read_byte().is_some() {
            dropped += 1;
        }
        dropped
    }
}
