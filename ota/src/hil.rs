// Licensed under the Apache-2.0 license

//! Hardware interface layer consumed by the update engine.
//!
//! Every trait here is implemented once per platform and once as a mock,
//! so the whole engine runs on the host under test.

/// Simple interface for reading, writing and erasing arbitrary lengths of
/// data on flash storage. Offsets are device offsets, not bus addresses.
///
/// Used for the staging region only during reception; the verifier also
/// reads the staged image back through it.
pub trait FlashStorage {
    /// Read from the flash storage, filling the provided buffer with data.
    fn read(&self, buffer: &mut [u8], offset: usize) -> Result<(), FlashError>;

    /// Program the full contents of the buffer starting at `offset`.
    /// `offset` and the buffer length must respect the device's program
    /// granule.
    fn write(&self, buffer: &[u8], offset: usize) -> Result<(), FlashError>;

    /// Erase `length` bytes starting at `offset`; both must respect the
    /// device's erase granule.
    fn erase(&self, offset: usize, length: usize) -> Result<(), FlashError>;

    /// Size of the flash device in bytes.
    fn capacity(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Erase did not complete or did not verify blank.
    Erase,
    /// Program did not complete.
    Program,
    /// The requested range does not fit the device or partition.
    OutOfBounds,
}

/// Lowest-level erase/program primitives used by the commit engine while
/// the main execution region is being overwritten.
///
/// Operations are infallible: once the first sector of the main region is
/// erased there is no bail-out path, only completion or a watchdog reset.
///
/// # Safety
///
/// Implementations guarantee that every instruction reachable from these
/// methods is resident outside the region under modification (RAM or mask
/// ROM), including their own bodies: implement them `#[inline(always)]` or
/// place them in RAM explicitly. A violation faults the processor on its
/// next instruction fetch.
pub unsafe trait ResidentFlash {
    /// Erase one sector at the given device offset.
    fn erase_sector(&mut self, offset: u32, sector_size: u32);

    /// Program one page at the given device offset from a RAM buffer.
    fn program_page(&mut self, offset: u32, page: &[u8]);
}

/// Byte link to the companion WiFi module.
///
/// Reception is polled with bounded timeouts at the call site; writes block
/// until the byte is queued to hardware.
pub trait ByteTransport {
    fn try_read_byte(&mut self) -> Option<u8>;

    fn write_byte(&mut self, byte: u8);

    /// Wait until everything written has left the transmitter.
    fn flush(&mut self);
}

/// Monotonic milliseconds since boot. Wraps; callers use wrapping
/// subtraction for intervals.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Hardware watchdog, the sole hang-recovery mechanism.
pub trait Watchdog {
    /// Start (or restart) the countdown with a new period.
    fn arm(&mut self, timeout_ms: u32);

    /// Reload the countdown.
    fn feed(&mut self);

    /// Request an immediate watchdog-driven reboot. Must not return; a
    /// caller that observes a return escalates by spinning until the
    /// countdown expires.
    fn force_reboot(&mut self);
}

/// Reset, fence and cache control.
pub trait SystemControl {
    /// Mask interrupts on the controller core with no intent to restore
    /// them; the only continuation after this on the commit path is reset.
    fn disable_interrupts(&mut self);

    /// Full memory barrier ordering the quiescence-flag handshake.
    fn memory_fence(&self);

    /// Invalidate the flash cache so subsequent reads observe programmed
    /// data rather than stale lines.
    fn flush_flash_cache(&mut self);

    /// Trigger a hardware reset. Must not return; a caller that observes a
    /// return treats system state as undefined and forces a watchdog
    /// reboot instead.
    fn reset(&mut self);
}

/// Collaborators owned by the rest of the firmware: actuator safe-state
/// and application-protocol parser reset.
pub trait SystemHooks {
    /// Force heaters, pump and valves off. Invoked when the update session
    /// begins and again before any abort.
    fn enter_safe_state(&mut self);

    /// Reset the routine telemetry/command parser so update frames are
    /// never misparsed as application messages and vice versa.
    fn reset_protocol_state(&mut self);
}
