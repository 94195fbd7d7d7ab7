// Licensed under the Apache-2.0 license

//! Flash access through the RP2040 boot-ROM routines.
//!
//! Erase/program require leaving XIP; the full sequence per operation is
//! connect_internal_flash -> flash_exit_xip -> op -> flash_flush_cache ->
//! flash_enter_cmd_xip. Every function pointer is resolved from the ROM
//! table once at init and kept in static RAM, so the commit path never
//! touches a lookup routine that itself lives in flash.

use crate::sys::SystemCtl;
use crate::uart::CompanionUart;
use crate::watchdog::HwWatchdog;
use crate::XIP_BASE;
use brew_config::BrewMemoryMap;
use brew_ota::hil::{FlashError, FlashStorage, ResidentFlash};
use brew_ota::CommitPlan;

const FLASH_BLOCK_SIZE: u32 = 1 << 16;
const FLASH_BLOCK_ERASE_CMD: u8 = 0xD8;

type RomFnVoid = unsafe extern "C" fn();
type RomFnErase = unsafe extern "C" fn(u32, usize, u32, u8);
type RomFnProgram = unsafe extern "C" fn(u32, *const u8, usize);

unsafe extern "C" fn dummy_void() {}
unsafe extern "C" fn dummy_erase(_: u32, _: usize, _: u32, _: u8) {}
unsafe extern "C" fn dummy_program(_: u32, _: *const u8, _: usize) {}

struct RomFlashFns {
    connect: RomFnVoid,
    exit_xip: RomFnVoid,
    range_erase: RomFnErase,
    range_program: RomFnProgram,
    flush_cache: RomFnVoid,
    enter_cmd_xip: RomFnVoid,
}

// Lives in .data (RAM) so the resident commit loop can reach the pointers
// without a flash fetch.
static mut ROM_FNS: RomFlashFns = RomFlashFns {
    connect: dummy_void,
    exit_xip: dummy_void,
    range_erase: dummy_erase,
    range_program: dummy_program,
    flush_cache: dummy_void,
    enter_cmd_xip: dummy_void,
};

/// Look up a boot-ROM function by its two-character tag. The halfword at
/// 0x14 points at the function table, the one at 0x18 at the table lookup
/// helper.
unsafe fn rom_func_lookup(tag: &[u8; 2]) -> usize {
    let fn_table = *(0x14 as *const u16) as *const u16;
    let lookup: unsafe extern "C" fn(*const u16, u32) -> usize =
        core::mem::transmute::<usize, unsafe extern "C" fn(*const u16, u32) -> usize>(
            *(0x18 as *const u16) as usize,
        );
    lookup(fn_table, u16::from_le_bytes(*tag) as u32)
}

/// Resolve all ROM flash routines. Must run (from core 0, XIP active)
/// before any staging write and before any commit.
pub fn init_rom_funcs() {
    unsafe {
        ROM_FNS = RomFlashFns {
            connect: core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"IF")),
            exit_xip: core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"EX")),
            range_erase: core::mem::transmute::<usize, RomFnErase>(rom_func_lookup(b"RE")),
            range_program: core::mem::transmute::<usize, RomFnProgram>(rom_func_lookup(b"RP")),
            flush_cache: core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"FC")),
            enter_cmd_xip: core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"CX")),
        };
    }
}

/// Invalidate the XIP cache and return to XIP mode.
#[inline(always)]
pub(crate) fn flush_and_reenter_xip() {
    unsafe {
        (ROM_FNS.flush_cache)();
        (ROM_FNS.enter_cmd_xip)();
    }
}

fn with_interrupts_disabled<R>(f: impl FnOnce() -> R) -> R {
    let was_active = cortex_m::register::primask::read().is_active();
    cortex_m::interrupt::disable();
    let result = f();
    if was_active {
        unsafe { cortex_m::interrupt::enable() };
    }
    result
}

/// Staging-phase flash driver.
///
/// Erase/program disable interrupts on this core only, never a cross-core
/// lockout: the staging region is not executed from, so the companion
/// core keeps running from the main region unaffected. Each operation
/// flushes the XIP cache on the way out, which keeps plain XIP-mapped
/// reads coherent with what was just programmed.
pub struct StagingFlash {
    capacity: usize,
}

impl StagingFlash {
    pub fn new(map: &BrewMemoryMap) -> StagingFlash {
        StagingFlash {
            capacity: map.flash_size as usize,
        }
    }
}

impl FlashStorage for StagingFlash {
    fn read(&self, buffer: &mut [u8], offset: usize) -> Result<(), FlashError> {
        if offset + buffer.len() > self.capacity {
            return Err(FlashError::OutOfBounds);
        }
        let src = (XIP_BASE as usize + offset) as *const u8;
        unsafe {
            core::ptr::copy_nonoverlapping(src, buffer.as_mut_ptr(), buffer.len());
        }
        Ok(())
    }

    fn write(&self, buffer: &[u8], offset: usize) -> Result<(), FlashError> {
        if offset + buffer.len() > self.capacity {
            return Err(FlashError::OutOfBounds);
        }
        with_interrupts_disabled(|| unsafe {
            (ROM_FNS.connect)();
            (ROM_FNS.exit_xip)();
            (ROM_FNS.range_program)(offset as u32, buffer.as_ptr(), buffer.len());
            (ROM_FNS.flush_cache)();
            (ROM_FNS.enter_cmd_xip)();
        });
        Ok(())
    }

    fn erase(&self, offset: usize, length: usize) -> Result<(), FlashError> {
        if offset + length > self.capacity {
            return Err(FlashError::OutOfBounds);
        }
        with_interrupts_disabled(|| unsafe {
            (ROM_FNS.connect)();
            (ROM_FNS.exit_xip)();
            (ROM_FNS.range_erase)(offset as u32, length, FLASH_BLOCK_SIZE, FLASH_BLOCK_ERASE_CMD);
            (ROM_FNS.flush_cache)();
            (ROM_FNS.enter_cmd_xip)();
        });
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Commit-phase primitives: the same ROM routines, reached only through
/// pointers already sitting in RAM, with every wrapper forced inline into
/// the RAM-resident caller.
///
/// `init_rom_funcs` must have run; with the dummies still installed the
/// burn loop would be a no-op and the device would reset into the old
/// image, which is the safe direction to fail.
pub struct RomResidentFlash;

impl RomResidentFlash {
    pub const fn new() -> RomResidentFlash {
        RomResidentFlash
    }
}

impl Default for RomResidentFlash {
    fn default() -> Self {
        RomResidentFlash::new()
    }
}

unsafe impl ResidentFlash for RomResidentFlash {
    #[inline(always)]
    fn erase_sector(&mut self, offset: u32, sector_size: u32) {
        unsafe {
            (ROM_FNS.connect)();
            (ROM_FNS.exit_xip)();
            (ROM_FNS.range_erase)(
                offset,
                sector_size as usize,
                FLASH_BLOCK_SIZE,
                FLASH_BLOCK_ERASE_CMD,
            );
            (ROM_FNS.flush_cache)();
            (ROM_FNS.enter_cmd_xip)();
        }
    }

    #[inline(always)]
    fn program_page(&mut self, offset: u32, page: &[u8]) {
        unsafe {
            (ROM_FNS.connect)();
            (ROM_FNS.exit_xip)();
            (ROM_FNS.range_program)(offset, page.as_ptr(), page.len());
            (ROM_FNS.flush_cache)();
            (ROM_FNS.enter_cmd_xip)();
        }
    }
}

/// The point of no return: every instruction from here to the reset is
/// resident in RAM, including the monomorphized, fully-inlined commit
/// engine. Interrupts are still enabled on entry; the engine disables
/// them before the first erase.
#[link_section = ".data"]
#[inline(never)]
pub fn commit_from_ram(plan: &CommitPlan) -> ! {
    let mut flash = RomResidentFlash::new();
    // already armed with the commit budget; feeds reload a mid-range value
    let mut watchdog = HwWatchdog::new();
    let mut sys = SystemCtl::new();
    let mut trace = CompanionUart::new();
    brew_ota::execute(plan, &mut flash, &mut watchdog, &mut sys, &mut trace)
}
