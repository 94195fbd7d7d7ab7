// Licensed under the Apache-2.0 license

use brew_ota::hil::Clock;
use std::cell::Cell;

/// Simulated monotonic clock.
///
/// Every `now_ms` observation advances time by `tick_ms` (1 ms by
/// default), so polling loops that wait on the clock make progress
/// without any real sleeping, and timeouts expire after a proportional
/// number of polls.
pub struct SimClock {
    now: Cell<u64>,
    tick_ms: Cell<u64>,
}

impl SimClock {
    pub fn new() -> SimClock {
        SimClock {
            now: Cell::new(0),
            tick_ms: Cell::new(1),
        }
    }

    /// Raw 64-bit time, unaffected by u32 wrap, for gap measurements.
    pub fn raw_ms(&self) -> u64 {
        self.now.get()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set_tick(&self, tick_ms: u64) {
        self.tick_ms.set(tick_ms);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        SimClock::new()
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now + self.tick_ms.get());
        now as u32
    }
}
