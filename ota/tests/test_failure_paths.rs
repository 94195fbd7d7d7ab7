// Licensed under the Apache-2.0 license

//! Abort reporting, transport scrubbing and the watchdog-backed endings.

use brew_ota::{abort, fail_session, UpdateError};
use brew_testing_common::{TestRig, WATCHDOG_REBOOT_PANIC};
use ota_protocol::ERROR_PREFIX;
use std::panic::{catch_unwind, AssertUnwindSafe};

#[test]
fn test_every_error_reports_its_distinct_code() {
    let cases = [
        (UpdateError::ProtocolTimeout, 0x01),
        (UpdateError::Sequence, 0x02),
        (UpdateError::Checksum, 0x03),
        (UpdateError::FlashErase, 0x04),
        (UpdateError::FlashProgram, 0x05),
        (UpdateError::Size, 0x06),
        (UpdateError::Integrity, 0x07),
        (UpdateError::InternalInvariantViolation, 0x08),
    ];
    for (err, code) in cases {
        let mut rig = TestRig::new();
        let mut env = rig.env();
        fail_session(&mut env, err);
        drop(env);
        assert_eq!(rig.transport.sent(), &[ERROR_PREFIX, code]);
    }
}

#[test]
fn test_failure_forces_actuators_safe_before_reporting() {
    let mut rig = TestRig::new();
    let mut env = rig.env();
    fail_session(&mut env, UpdateError::Checksum);
    drop(env);
    assert_eq!(rig.hooks.safe_states.get(), 1);
}

#[test]
fn test_abort_drain_consumes_a_still_talking_sender() {
    let mut rig = TestRig::new();
    // the sender keeps streaming chunks after our error
    let residue = vec![0x55u8; 1500];
    rig.transport.script_bytes(&residue);

    let mut env = rig.env();
    fail_session(&mut env, UpdateError::Sequence);
    drop(env);

    assert_eq!(rig.transport.unread(), 0);
    // drain kept the watchdog alive
    assert!(rig.watchdog.feed_count() > 0);
}

#[test]
fn test_abort_ends_in_a_watchdog_reboot() {
    let mut rig = TestRig::new();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut env = rig.env();
        abort(&mut env, UpdateError::ProtocolTimeout);
    }));
    let message = *result.unwrap_err().downcast::<String>().unwrap();
    assert_eq!(message, WATCHDOG_REBOOT_PANIC);
    assert_eq!(rig.transport.sent(), &[ERROR_PREFIX, 0x01]);
    assert_eq!(rig.hooks.safe_states.get(), 1);
}
