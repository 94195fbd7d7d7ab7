// Licensed under the Apache-2.0 license

use core::arch::asm;

/// Park the companion core for the rest of the session.
///
/// Called from core 1's main loop once
/// `brew_ota::companion_park_requested()` reads true. Interrupts are
/// masked and the spin body lives in RAM, so this core fetches nothing
/// from flash while the main image is erased and rewritten; the only way
/// out is the hardware reset at the end of the session.
#[link_section = ".data"]
#[inline(never)]
pub fn park_companion_core() -> ! {
    unsafe {
        asm!("cpsid i", options(nomem, nostack, preserves_flags));
        loop {
            asm!("nop", options(nomem, nostack, preserves_flags));
        }
    }
}
