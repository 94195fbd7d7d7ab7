// Licensed under the Apache-2.0 license

use brew_ota::hil::Watchdog;
use core::ptr::write_volatile;

const WATCHDOG_BASE: usize = 0x4005_8000;
const WATCHDOG_CTRL: usize = 0x000;
const WATCHDOG_LOAD: usize = 0x004;

const CTRL_TRIGGER: u32 = 1 << 31;
const CTRL_ENABLE: u32 = 1 << 30;

const PSM_BASE: usize = 0x4001_0000;
const PSM_WDSEL: usize = 0x008;
// reset every power-on domain except ROSC/XOSC, matching the SDK default
const PSM_WDSEL_RESET_ALL: u32 = 0x0001_fffc;

/// Largest value the 24-bit down-counter can hold.
const MAX_LOAD: u32 = 0x00ff_ffff;

/// RP2040 hardware watchdog.
///
/// The tick block is assumed to be running at 1 us (set up by boot code).
/// Per erratum RP2040-E1 the counter decrements twice per tick, so loads
/// are doubled.
pub struct HwWatchdog {
    reload: u32,
}

impl HwWatchdog {
    pub const fn new() -> HwWatchdog {
        HwWatchdog { reload: MAX_LOAD >> 1 }
    }

    fn load_for(timeout_ms: u32) -> u32 {
        timeout_ms.saturating_mul(1000 * 2).min(MAX_LOAD)
    }
}

impl Default for HwWatchdog {
    fn default() -> Self {
        HwWatchdog::new()
    }
}

impl Watchdog for HwWatchdog {
    fn arm(&mut self, timeout_ms: u32) {
        self.reload = Self::load_for(timeout_ms);
        unsafe {
            write_volatile((PSM_BASE + PSM_WDSEL) as *mut u32, PSM_WDSEL_RESET_ALL);
            write_volatile((WATCHDOG_BASE + WATCHDOG_LOAD) as *mut u32, self.reload);
            write_volatile((WATCHDOG_BASE + WATCHDOG_CTRL) as *mut u32, CTRL_ENABLE);
        }
    }

    // Fed from inside the commit loop with flash mid-erase; must stay a
    // bare register store.
    #[inline(always)]
    fn feed(&mut self) {
        unsafe {
            write_volatile((WATCHDOG_BASE + WATCHDOG_LOAD) as *mut u32, self.reload);
        }
    }

    #[inline(always)]
    fn force_reboot(&mut self) {
        unsafe {
            write_volatile((WATCHDOG_BASE + WATCHDOG_CTRL) as *mut u32, CTRL_TRIGGER);
        }
    }
}
