// Licensed under the Apache-2.0 license

//! Commit preparation and the RAM-resident copy sequence, driven against
//! a staged image placed directly in mock flash.

use brew_ota::trace::marker;
use brew_ota::{execute, prepare, UpdateError};
use brew_testing_common::{
    MockWatchdog, ResidentRecorder, TestRig, TraceRecorder, WATCHDOG_REBOOT_PANIC,
};
use std::panic::{catch_unwind, AssertUnwindSafe};

fn staged_image(len: usize) -> Vec<u8> {
    let mut image = Vec::with_capacity(len);
    image.extend_from_slice(&0x2004_2000u32.to_le_bytes());
    image.extend_from_slice(&0x1000_01EDu32.to_le_bytes());
    while image.len() < len {
        image.push((image.len() * 7 % 251) as u8);
    }
    image
}

#[test]
fn test_prepare_preloads_and_pads_to_sector_boundary() {
    let image = staged_image(5000);
    let mut rig = TestRig::new();
    rig.flash.preload(rig.map.staging_offset as usize, &image);

    let mut ram = vec![0u8; 2 * 4096];
    let mut env = rig.env();
    let plan = prepare(&mut env, 5000, &mut ram).unwrap();
    assert_eq!(plan.image_len(), 5000);
    assert_eq!(plan.sectors(), 2);
    drop(env);
    assert_eq!(&ram[..5000], &image[..]);
    assert!(ram[5000..8192].iter().all(|&b| b == rig.map.erased_fill));
}

#[test]
fn test_prepare_bounds_checks_fire_before_any_read() {
    let mut rig = TestRig::new();
    let mut ram = vec![0u8; 4096];
    let mut env = rig.env();

    assert_eq!(prepare(&mut env, 0, &mut ram), Err(UpdateError::Size));
    assert_eq!(
        prepare(&mut env, rig_limits_max() + 1, &mut ram),
        Err(UpdateError::Size)
    );
    // buffer smaller than the padded image
    assert_eq!(prepare(&mut env, 8000, &mut ram), Err(UpdateError::Size));
}

fn rig_limits_max() -> u32 {
    brew_config::OtaLimits::default().max_image_bytes
}

#[test]
fn test_oversized_sector_count_rejected() {
    let mut rig = TestRig::with_map(brew_config::BrewMemoryMap {
        sector_size: 256,
        ..brew_config::BrewMemoryMap::default()
    });
    // 257 sectors of 256 bytes stays under the byte ceiling but over the
    // sector ceiling
    let mut ram = vec![0u8; 257 * 256];
    let mut env = rig.env();
    assert_eq!(
        prepare(&mut env, 257 * 256, &mut ram),
        Err(UpdateError::Size)
    );
}

#[test]
fn test_execute_escalates_when_the_reset_seam_returns() {
    let image = staged_image(4096);
    let mut rig = TestRig::new();
    rig.flash.preload(rig.map.staging_offset as usize, &image);

    let mut ram = vec![0u8; 4096];
    let mut env = rig.env();
    let plan = prepare(&mut env, 4096, &mut ram).unwrap();
    drop(env);

    let mut flash = ResidentRecorder::new();
    let mut watchdog = MockWatchdog::new(rig.clock.clone());
    let mut sink = TraceRecorder::new();
    let result = catch_unwind(AssertUnwindSafe(|| {
        execute(&plan, &mut flash, &mut watchdog, &mut rig.sys, &mut sink);
    }));
    let message = *result.unwrap_err().downcast::<String>().unwrap();
    assert_eq!(message, WATCHDOG_REBOOT_PANIC);

    // the full sequence ran: irq off, copy, cache flush, reset request
    assert!(rig.sys.irq_disabled.get());
    assert_eq!(rig.sys.cache_flushes.get(), 1);
    assert_eq!(rig.sys.resets.get(), 1);
    assert_eq!(&flash.programmed()[..4096], &image[..]);

    // marker stream: enter with sector count, per-sector, copy done,
    // reset request, then the invariant violation that forced the reboot
    assert_eq!(&sink.bytes[..3], &[marker::COMMIT_ENTER, 1, 0]);
    assert!(sink.bytes.windows(1).any(|w| w == [marker::COPY_DONE]));
    let tail = &sink.bytes[sink.bytes.len() - 2..];
    assert_eq!(tail, &[marker::RESET_REQUEST, marker::INVARIANT_VIOLATION]);
}
