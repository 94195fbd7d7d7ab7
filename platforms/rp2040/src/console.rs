// Licensed under the Apache-2.0 license

use crate::uart::CompanionUart;
use brew_ota::hil::ByteTransport;
use core::fmt::Write;

/// Narrative-log writer over the shared UART. CR-LF line endings for
/// terminal friendliness, same as the companion's own log output.
pub struct Console {
    uart: CompanionUart,
}

impl Write for Console {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.uart.write_byte(b'\r');
            }
            self.uart.write_byte(byte);
        }
        Ok(())
    }
}

static mut CONSOLE: Console = Console {
    uart: CompanionUart::new(),
};

/// Install the UART console as the engine's log sink. Call once at boot.
pub fn init_console() {
    #[allow(static_mut_refs)]
    brew_ota::log::set_printer(unsafe { &mut CONSOLE });
}
