// Licensed under the Apache-2.0 license

//! Host-side test doubles for the update engine's hardware interfaces,
//! shared by unit and scenario tests. Nothing here is compiled into
//! firmware.

mod clock;
mod flash;
mod rig;
mod system;
mod transport;

pub use clock::SimClock;
pub use flash::MockFlash;
pub use rig::TestRig;
pub use system::{
    MockHooks, MockSystemControl, MockWatchdog, ResidentOp, ResidentRecorder, TraceRecorder,
    WATCHDOG_REBOOT_PANIC,
};
pub use transport::ScriptedTransport;
