// Licensed under the Apache-2.0 license

use crate::clock::SimClock;
use brew_ota::hil::{ResidentFlash, SystemControl, SystemHooks, Watchdog};
use brew_ota::trace::TraceSink;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Panic message used by [`MockWatchdog::force_reboot`], so tests can
/// catch the "reboot" with `catch_unwind` and assert on what led to it.
pub const WATCHDOG_REBOOT_PANIC: &str = "watchdog reboot forced";

/// Records arms and feed times against the simulated clock.
pub struct MockWatchdog {
    clock: Rc<SimClock>,
    armed: Cell<Option<u32>>,
    arms: RefCell<Vec<(u64, u32)>>,
    feeds: RefCell<Vec<u64>>,
}

impl MockWatchdog {
    pub fn new(clock: Rc<SimClock>) -> MockWatchdog {
        MockWatchdog {
            clock,
            armed: Cell::new(None),
            arms: RefCell::new(Vec::new()),
            feeds: RefCell::new(Vec::new()),
        }
    }

    pub fn armed_timeout(&self) -> Option<u32> {
        self.armed.get()
    }

    pub fn arm_history(&self) -> Vec<(u64, u32)> {
        self.arms.borrow().clone()
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.borrow().len()
    }

    /// Longest interval the countdown ran without a reload, from the most
    /// recent arm through the last feed.
    pub fn max_feed_gap_ms(&self) -> u64 {
        let feeds = self.feeds.borrow();
        let start = self
            .arms
            .borrow()
            .last()
            .map(|&(at, _)| at)
            .unwrap_or(0);
        let mut previous = start;
        let mut max_gap = 0u64;
        for &at in feeds.iter().filter(|&&at| at >= start) {
            max_gap = max_gap.max(at - previous);
            previous = at;
        }
        max_gap
    }
}

impl Watchdog for MockWatchdog {
    fn arm(&mut self, timeout_ms: u32) {
        self.armed.set(Some(timeout_ms));
        self.arms.borrow_mut().push((self.clock.raw_ms(), timeout_ms));
    }

    fn feed(&mut self) {
        self.feeds.borrow_mut().push(self.clock.raw_ms());
    }

    fn force_reboot(&mut self) {
        // the real one never returns; unwind so the test observes the
        // reboot instead of hanging in the caller's spin
        panic!("{}", WATCHDOG_REBOOT_PANIC);
    }
}

/// Records fences, cache flushes and reset requests.
///
/// `reset` deliberately returns, violating the trait contract, so tests
/// can drive the commit engine's invariant-violation fallback.
pub struct MockSystemControl {
    pub irq_disabled: Cell<bool>,
    pub fences: Cell<u32>,
    pub cache_flushes: Cell<u32>,
    pub resets: Cell<u32>,
}

impl MockSystemControl {
    pub fn new() -> MockSystemControl {
        MockSystemControl {
            irq_disabled: Cell::new(false),
            fences: Cell::new(0),
            cache_flushes: Cell::new(0),
            resets: Cell::new(0),
        }
    }
}

impl Default for MockSystemControl {
    fn default() -> Self {
        MockSystemControl::new()
    }
}

impl SystemControl for MockSystemControl {
    fn disable_interrupts(&mut self) {
        self.irq_disabled.set(true);
    }

    fn memory_fence(&self) {
        self.fences.set(self.fences.get() + 1);
    }

    fn flush_flash_cache(&mut self) {
        self.cache_flushes.set(self.cache_flushes.get() + 1);
    }

    fn reset(&mut self) {
        self.resets.set(self.resets.get() + 1);
    }
}

/// Counts collaborator invocations.
pub struct MockHooks {
    pub safe_states: Cell<u32>,
    pub protocol_resets: Cell<u32>,
}

impl MockHooks {
    pub fn new() -> MockHooks {
        MockHooks {
            safe_states: Cell::new(0),
            protocol_resets: Cell::new(0),
        }
    }
}

impl Default for MockHooks {
    fn default() -> Self {
        MockHooks::new()
    }
}

impl SystemHooks for MockHooks {
    fn enter_safe_state(&mut self) {
        self.safe_states.set(self.safe_states.get() + 1);
    }

    fn reset_protocol_state(&mut self) {
        self.protocol_resets.set(self.protocol_resets.get() + 1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidentOp {
    Erase { offset: u32 },
    Program { offset: u32, len: usize },
}

/// Recording stand-in for the always-resident commit primitives.
pub struct ResidentRecorder {
    ops: Vec<ResidentOp>,
    mem: Vec<u8>,
}

impl ResidentRecorder {
    pub fn new() -> ResidentRecorder {
        ResidentRecorder {
            ops: Vec::new(),
            mem: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[ResidentOp] {
        &self.ops
    }

    /// The main-region contents after the burn, lowest offset first.
    pub fn programmed(&self) -> &[u8] {
        &self.mem
    }

    fn ensure(&mut self, end: usize) {
        if self.mem.len() < end {
            self.mem.resize(end, 0xFF);
        }
    }
}

impl Default for ResidentRecorder {
    fn default() -> Self {
        ResidentRecorder::new()
    }
}

unsafe impl ResidentFlash for ResidentRecorder {
    fn erase_sector(&mut self, offset: u32, sector_size: u32) {
        self.ops.push(ResidentOp::Erase { offset });
        let end = (offset + sector_size) as usize;
        self.ensure(end);
        for byte in self.mem[offset as usize..end].iter_mut() {
            *byte = 0xFF;
        }
    }

    fn program_page(&mut self, offset: u32, page: &[u8]) {
        self.ops.push(ResidentOp::Program {
            offset,
            len: page.len(),
        });
        let end = offset as usize + page.len();
        self.ensure(end);
        self.mem[offset as usize..end].copy_from_slice(page);
    }
}

/// Captures the raw marker byte stream.
pub struct TraceRecorder {
    pub bytes: Vec<u8>,
}

impl TraceRecorder {
    pub fn new() -> TraceRecorder {
        TraceRecorder { bytes: Vec::new() }
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        TraceRecorder::new()
    }
}

impl TraceSink for TraceRecorder {
    fn emit(&mut self, byte: u8) {
        self.bytes.push(byte);
    }
}
