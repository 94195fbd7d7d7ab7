// Licensed under the Apache-2.0 license

//! RP2040 bindings for the update engine.
//!
//! Everything here is register-level: the UART link to the WiFi module,
//! the boot-ROM flash primitives, the watchdog, the system timer and the
//! reset/cache controls. The main firmware wires these into a
//! [`brew_ota::UpdateEnv`] and, when `run_update` hands back a commit
//! plan, jumps to [`commit_from_ram`]:
//!
//! ```ignore
//! flash::init_rom_funcs();
//! let mut uart = CompanionUart::new();
//! let staging = StagingFlash::new(&map);
//! let mut env = brew_ota::UpdateEnv { /* ... */ };
//! let mut ram = /* reserved commit buffer */;
//! match brew_ota::run_update(&mut env, &mut ram) {
//!     brew_ota::SessionOutcome::AlreadyActive => {}
//!     brew_ota::SessionOutcome::Commit(plan) => commit_from_ram(&plan),
//! }
//! ```
//!
//! The companion core's main loop polls
//! `brew_ota::companion_park_requested()` and calls
//! [`park_companion_core`] when it flips.

#![no_std]

#[cfg(target_arch = "arm")]
mod clock;
#[cfg(target_arch = "arm")]
mod console;
#[cfg(target_arch = "arm")]
mod flash;
#[cfg(target_arch = "arm")]
mod park;
#[cfg(target_arch = "arm")]
mod sys;
#[cfg(target_arch = "arm")]
mod uart;
#[cfg(target_arch = "arm")]
mod watchdog;

#[cfg(target_arch = "arm")]
pub use clock::SystemTimer;
#[cfg(target_arch = "arm")]
pub use console::init_console;
#[cfg(target_arch = "arm")]
pub use flash::{commit_from_ram, init_rom_funcs, RomResidentFlash, StagingFlash};
#[cfg(target_arch = "arm")]
pub use park::park_companion_core;
#[cfg(target_arch = "arm")]
pub use sys::SystemCtl;
#[cfg(target_arch = "arm")]
pub use uart::CompanionUart;
#[cfg(target_arch = "arm")]
pub use watchdog::HwWatchdog;

/// XIP-mapped base address of flash.
pub const XIP_BASE: u32 = 0x1000_0000;
