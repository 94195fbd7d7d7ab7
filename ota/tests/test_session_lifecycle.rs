// Licensed under the Apache-2.0 license

//! Session-slot semantics. The update-active flag is process-global by
//! design (single controller core, single session), so this whole flow
//! lives in one test function and no other test binary touches
//! `try_begin`/`run_update`.

use brew_ota::{
    companion_park_requested, run_update, update_in_progress, SessionOutcome,
};
use brew_testing_common::TestRig;
use ota_protocol::{CHUNK_ACK, COMMIT_ACK};

fn test_image() -> Vec<u8> {
    let mut image = Vec::with_capacity(2560);
    image.extend_from_slice(&0x2004_2000u32.to_le_bytes());
    image.extend_from_slice(&0x1000_01EDu32.to_le_bytes());
    while image.len() < 2560 {
        image.push((image.len() % 253) as u8);
    }
    image
}

#[test]
fn test_start_claims_slot_once_and_duplicates_are_noops() {
    assert!(!update_in_progress());
    assert!(!companion_park_requested());

    let image = test_image();
    let mut rig = TestRig::new();
    // stale application-protocol residue that must be drained, never parsed
    rig.transport.script_stale_bytes(&[0x01, 0x02, 0x03]);
    // the transfer proper starts once the handshake has settled
    rig.transport.release_scripted_at(50);
    for (sequence, chunk) in image.chunks(256).enumerate() {
        rig.transport.script_chunk(sequence as u32, chunk);
    }
    rig.transport.script_end();

    let mut ram = vec![0u8; 4096];
    let mut env = rig.env();
    let outcome = run_update(&mut env, &mut ram);
    drop(env);

    let plan = match outcome {
        SessionOutcome::Commit(plan) => plan,
        SessionOutcome::AlreadyActive => panic!("first start must claim the session"),
    };
    assert_eq!(plan.image_len(), 2560);

    // the quiescence handshake ran in order: safe state, drain, protocol
    // reset, fenced flag raise, drain again
    assert!(update_in_progress());
    assert!(companion_park_requested());
    assert_eq!(rig.hooks.safe_states.get(), 1);
    assert_eq!(rig.hooks.protocol_resets.get(), 1);
    assert!(rig.sys.fences.get() >= 2);
    assert_eq!(rig.transport.unread(), 0);

    // ten chunk ACKs then the final pre-commit ACK
    let sent = rig.transport.sent();
    assert_eq!(&sent[..10], &[CHUNK_ACK; 10]);
    assert_eq!(&sent[10..13], &COMMIT_ACK);

    // watchdog re-armed for the copy budget after the receive budget
    let arms = rig.watchdog.arm_history();
    assert_eq!(arms.len(), 2);
    assert_eq!(arms[0].1, rig.timings.watchdog_receive_ms);
    assert_eq!(arms[1].1, rig.timings.watchdog_commit_ms);

    // a second start while the session is active is a no-op: no state is
    // disturbed, no second session begins
    let mut env = rig.env();
    let outcome = run_update(&mut env, &mut ram);
    drop(env);
    assert!(matches!(outcome, SessionOutcome::AlreadyActive));
    assert_eq!(rig.hooks.safe_states.get(), 1);
    assert_eq!(rig.watchdog.arm_history().len(), 2);
    assert!(update_in_progress());
}
