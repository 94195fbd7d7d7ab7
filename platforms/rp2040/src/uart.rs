// Licensed under the Apache-2.0 license

// Polling driver for UART0, the serial link to the WiFi module. Baud and
// pin muxing are set up by the main firmware before an update session can
// start; interrupts on this UART are never used here - reception is pure
// polling per the update design.

use brew_ota::hil::ByteTransport;
use brew_ota::trace::TraceSink;
use core::ptr::{read_volatile, write_volatile};

const UART0_BASE: usize = 0x4003_4000;
const UARTDR: usize = 0x000;
const UARTFR: usize = 0x018;

const FR_BUSY: u32 = 1 << 3;
const FR_RXFE: u32 = 1 << 4;
const FR_TXFF: u32 = 1 << 5;

pub struct CompanionUart {
    base: usize,
}

impl CompanionUart {
    pub const fn new() -> CompanionUart {
        CompanionUart { base: UART0_BASE }
    }

    #[inline(always)]
    fn flags(&self) -> u32 {
        // # Safety: reads a memory-mapped status register
        unsafe { read_volatile((self.base + UARTFR) as *const u32) }
    }

    #[inline(always)]
    fn blocking_write(&self, byte: u8) {
        while self.flags() & FR_TXFF != 0 {}
        unsafe {
            write_volatile((self.base + UARTDR) as *mut u32, byte as u32);
        }
    }
}

impl Default for CompanionUart {
    fn default() -> Self {
        CompanionUart::new()
    }
}

impl ByteTransport for CompanionUart {
    fn try_read_byte(&mut self) -> Option<u8> {
        if self.flags() & FR_RXFE != 0 {
            return None;
        }
        let data = unsafe { read_volatile((self.base + UARTDR) as *const u32) };
        Some(data as u8)
    }

    fn write_byte(&mut self, byte: u8) {
        self.blocking_write(byte);
    }

    fn flush(&mut self) {
        while self.flags() & FR_BUSY != 0 {}
    }
}

impl TraceSink for CompanionUart {
    // Marker emission during commit runs with flash mid-erase, so this
    // must stay free of any out-of-line call.
    #[inline(always)]
    fn emit(&mut self, byte: u8) {
        self.blocking_write(byte);
    }
}
