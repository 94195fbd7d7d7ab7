// Licensed under the Apache-2.0 license

//! Recovery supervisor: watchdog budgets and the one failure path.
//!
//! The main region is only ever overwritten after full verification, so a
//! reset anywhere during reception or verification restores the
//! previously-working firmware. Abandon, never resume.

use crate::env::UpdateEnv;
use crate::error::UpdateError;
use core::fmt::Write;
use ota_protocol::ERROR_PREFIX;

/// Arm the watchdog for the reception phase: generous enough for the
/// slowest chunk round-trip, tight enough to bound a hung sender.
pub fn arm_for_receive(env: &mut UpdateEnv) {
    env.watchdog.arm(env.timings.watchdog_receive_ms);
}

/// Re-arm for the commit phase: sized for the worst-case total sector
/// copy, fed per sector by the burn loop.
pub fn arm_for_commit(env: &mut UpdateEnv) {
    env.watchdog.arm(env.timings.watchdog_commit_ms);
}

/// Report a failure and scrub the transport. Leaves the main image
/// untouched. This firmware always follows up with `abort` rather than
/// returning control to normal execution.
pub fn fail_session(env: &mut UpdateEnv, err: UpdateError) {
    env.hooks.enter_safe_state();

    let code: u8 = err.wire_code().into();
    crate::println!("[ota] session failed: {:?} (code {:#04x})", err, code);
    env.transport.write_byte(ERROR_PREFIX);
    env.transport.write_byte(code);
    env.transport.flush();

    aggressive_drain(env);
}

/// Consume everything the sender may still be streaming at us, so stray
/// firmware bytes are never parsed as application messages after reboot.
/// Bounded by a total budget and ended early by a quiet period.
fn aggressive_drain(env: &mut UpdateEnv) {
    let start = env.clock.now_ms();
    let mut last_byte = start;
    let mut dropped: u32 = 0;
    while env.elapsed_ms(start) < env.timings.abort_drain_ms {
        env.watchdog.feed();
        if env.transport.try_read_byte().is_some() {
            dropped += 1;
            last_byte = env.clock.now_ms();
            continue;
        }
        if env.clock.now_ms().wrapping_sub(last_byte) > env.timings.abort_drain_quiet_ms {
            break;
        }
    }
    if dropped > 0 {
        crate::println!("[ota] drained {} bytes before reset", dropped);
    }
}

/// The terminal failure path: report, drain, reboot. The reset also
/// returns the session flag and the parked companion core to a clean
/// state; `Failed -> Idle` has no software transition.
pub fn abort(env: &mut UpdateEnv, err: UpdateError) -> ! {
    fail_session(env, err);
    crate::println!("[ota] resetting to resume normal operation");
    env.watchdog.force_reboot();
    // force_reboot must not return; spin until the countdown expires
    #[allow(clippy::empty_loop)]
    loop {}
}
