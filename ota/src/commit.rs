// Licensed under the Apache-2.0 license

//! The commit engine: copy the staged image over the main execution
//! region and reset.
//!
//! Split in three so the destructive part stays testable:
//! - [`prepare`] validates bounds and preloads the whole staged image into
//!   a RAM buffer. The last point flash is read; interrupts are still
//!   enabled here.
//! - [`burn`] is the per-sector erase/program loop over [`ResidentFlash`].
//! - [`execute`] strings them together behind interrupt-disable and ends
//!   in a hardware reset. It never returns on the success path; if the
//!   reset seam ever returns, system state is undefined and the watchdog
//!   is forced instead of resuming.
//!
//! `burn` and `execute` are `#[inline(always)]`: the platform calls them
//! from its RAM-resident wrapper and the bodies must monomorphize into
//! that wrapper rather than remain as flash-resident symbols.

use crate::env::UpdateEnv;
use crate::error::UpdateError;
use crate::hil::{ResidentFlash, SystemControl, Watchdog};
use crate::trace::{self, TraceSink};
use core::fmt::Write;

/// A fully validated, RAM-resident image ready to burn.
#[derive(Debug, PartialEq)]
pub struct CommitPlan<'a> {
    /// The image, padded with the erased fill value to a whole number of
    /// sectors. Every byte the burn loop touches lives here, in RAM.
    image: &'a [u8],
    image_len: u32,
    sectors: u32,
    sector_size: u32,
    page_size: u32,
    /// Device offset of the main execution region.
    main_offset: u32,
}

impl CommitPlan<'_> {
    pub fn image_len(&self) -> u32 {
        self.image_len
    }

    pub fn sectors(&self) -> u32 {
        self.sectors
    }
}

/// Validate bounds and preload the staged image into `ram`.
///
/// Nothing destructive happens here; any failure aborts the session with
/// the main region untouched.
pub fn prepare<'r>(
    env: &mut UpdateEnv,
    image_len: u32,
    ram: &'r mut [u8],
) -> Result<CommitPlan<'r>, UpdateError> {
    let sector_size = env.map.sector_size;
    if image_len == 0 || image_len > env.limits.max_image_bytes {
        crate::println!("[ota] image size {} out of bounds", image_len);
        return Err(UpdateError::Size);
    }
    let sectors = image_len.div_ceil(sector_size);
    if sectors == 0 || sectors > env.limits.max_sectors {
        crate::println!("[ota] sector count {} out of bounds", sectors);
        return Err(UpdateError::Size);
    }
    let padded = (sectors * sector_size) as usize;
    if ram.len() < padded {
        crate::println!("[ota] commit buffer too small for {} bytes", padded);
        return Err(UpdateError::Size);
    }

    // Last read of flash on this path. The staging driver flushes its own
    // cache view, so this observes exactly what reception programmed.
    let mut offset = 0usize;
    while offset < image_len as usize {
        env.watchdog.feed();
        let take = (image_len as usize - offset).min(1024);
        env.flash.read(
            &mut ram[offset..offset + take],
            env.map.staging_offset as usize + offset,
        )?;
        offset += take;
    }
    for byte in ram[image_len as usize..padded].iter_mut() {
        *byte = env.map.erased_fill;
    }

    crate::println!(
        "[ota] commit plan ready: {} bytes, {} sectors",
        image_len,
        sectors
    );
    Ok(CommitPlan {
        image: &ram[..padded],
        image_len,
        sectors,
        sector_size,
        page_size: env.map.page_size,
        main_offset: env.map.main_offset,
    })
}

/// Erase and program every sector of the main region from the RAM image.
///
/// A single sector erase can take ~100 ms, so the watchdog is fed before
/// and after both the erase and the program of every sector. There is no
/// error path: once the first erase lands the only exits are completion
/// or a watchdog reset.
#[inline(always)]
pub fn burn<F: ResidentFlash, W: Watchdog, T: TraceSink>(
    plan: &CommitPlan,
    flash: &mut F,
    watchdog: &mut W,
    sink: &mut T,
) {
    let sector_size = plan.sector_size;
    let page_size = plan.page_size as usize;
    let mut sector = 0u32;
    while sector < plan.sectors {
        trace::sector(sink, sector as u16);
        let base = sector * sector_size;

        watchdog.feed();
        flash.erase_sector(plan.main_offset + base, sector_size);
        watchdog.feed();

        let mut page = 0usize;
        while page < sector_size as usize {
            flash.program_page(
                plan.main_offset + base + page as u32,
                &plan.image[base as usize + page..base as usize + page + page_size],
            );
            page += page_size;
        }
        watchdog.feed();

        sector += 1;
    }
}

/// Run the commit to its only legal conclusion: a hardware reset.
///
/// Interrupts are disabled with no intent to restore them; the vector
/// table being overwritten makes resuming normal execution illegal on
/// every path, including failure. Formatted logging is unsafe from here
/// on, so progress goes to the raw marker channel.
#[inline(always)]
pub fn execute<F: ResidentFlash, W: Watchdog, S: SystemControl, T: TraceSink>(
    plan: &CommitPlan,
    flash: &mut F,
    watchdog: &mut W,
    sys: &mut S,
    sink: &mut T,
) -> ! {
    trace::commit_enter(sink, plan.sectors as u16);

    sys.disable_interrupts();
    sys.memory_fence();

    burn(plan, flash, watchdog, sink);

    // make sure post-reset fetches observe the new image, not stale lines
    sys.flush_flash_cache();
    trace::event(sink, trace::marker::COPY_DONE);

    watchdog.feed();
    trace::event(sink, trace::marker::RESET_REQUEST);
    sys.reset();

    // reset must not return; if it did, nothing about the system can be
    // assumed anymore
    trace::event(sink, trace::marker::INVARIANT_VIOLATION);
    watchdog.force_reboot();
    #[allow(clippy::empty_loop)]
    loop {}
}

#[cfg(test)]
mod test {
    use super::*;
    use brew_testing_common::{MockWatchdog, ResidentOp, ResidentRecorder, SimClock, TraceRecorder};
    use std::rc::Rc;

    fn plan_for(image: &[u8], sector_size: u32, page_size: u32) -> CommitPlan<'_> {
        CommitPlan {
            image,
            image_len: image.len() as u32,
            sectors: image.len() as u32 / sector_size,
            sector_size,
            page_size,
            main_offset: 0,
        }
    }

    #[test]
    fn test_burn_erases_before_programming_each_sector() {
        let image: Vec<u8> = (0..8192u32).map(|i| i as u8).collect();
        let plan = plan_for(&image, 4096, 256);
        let mut flash = ResidentRecorder::new();
        let clock = Rc::new(SimClock::new());
        let mut watchdog = MockWatchdog::new(clock);
        let mut sink = TraceRecorder::new();

        burn(&plan, &mut flash, &mut watchdog, &mut sink);

        let ops = flash.ops();
        // two sectors, each: one erase then 16 pages
        assert_eq!(ops.len(), 2 * 17);
        assert!(matches!(ops[0], ResidentOp::Erase { offset: 0 }));
        for (i, op) in ops[1..17].iter().enumerate() {
            match op {
                ResidentOp::Program { offset, len } => {
                    assert_eq!(*offset, i as u32 * 256);
                    assert_eq!(*len, 256);
                }
                other => panic!("unexpected op {:?}", other),
            }
        }
        assert!(matches!(ops[17], ResidentOp::Erase { offset: 4096 }));
        assert_eq!(flash.programmed(), image);
    }

    #[test]
    fn test_burn_feeds_watchdog_around_slow_operations() {
        let image = vec![0x5Au8; 4096 * 4];
        let plan = plan_for(&image, 4096, 256);
        let mut flash = ResidentRecorder::new();
        let clock = Rc::new(SimClock::new());
        let mut watchdog = MockWatchdog::new(clock);
        let mut sink = TraceRecorder::new();

        burn(&plan, &mut flash, &mut watchdog, &mut sink);

        // three feeds per sector: before erase, between erase and program,
        // after program
        assert_eq!(watchdog.feed_count(), 3 * 4);
    }
}
