// Licensed under the Apache-2.0 license

use crate::{MockFlash, MockHooks, MockSystemControl, MockWatchdog, ScriptedTransport, SimClock};
use brew_config::{BrewMemoryMap, OtaLimits, OtaTimings};
use brew_ota::UpdateEnv;
use std::rc::Rc;

/// One of everything the engine needs, wired to the same simulated clock.
///
/// Script the transport first, then borrow an [`UpdateEnv`] with
/// [`TestRig::env`], run the engine, drop the env and assert on the rig.
pub struct TestRig {
    pub clock: Rc<SimClock>,
    pub transport: ScriptedTransport,
    pub flash: MockFlash,
    pub watchdog: MockWatchdog,
    pub sys: MockSystemControl,
    pub hooks: MockHooks,
    pub map: BrewMemoryMap,
    pub timings: OtaTimings,
    pub limits: OtaLimits,
}

impl TestRig {
    pub fn new() -> TestRig {
        let map = BrewMemoryMap::default();
        TestRig::with_map(map)
    }

    pub fn with_map(map: BrewMemoryMap) -> TestRig {
        let clock = Rc::new(SimClock::new());
        TestRig {
            transport: ScriptedTransport::with_clock(Rc::clone(&clock)),
            flash: MockFlash::new(&map),
            watchdog: MockWatchdog::new(Rc::clone(&clock)),
            sys: MockSystemControl::new(),
            hooks: MockHooks::new(),
            clock,
            map,
            timings: OtaTimings::default(),
            limits: OtaLimits::default(),
        }
    }

    pub fn env(&mut self) -> UpdateEnv<'_> {
        UpdateEnv {
            transport: &mut self.transport,
            flash: &self.flash,
            clock: &*self.clock,
            watchdog: &mut self.watchdog,
            sys: &mut self.sys,
            hooks: &mut self.hooks,
            map: self.map,
            timings: self.timings,
            limits: self.limits,
        }
    }
}

impl Default for TestRig {
    fn default() -> Self {
        TestRig::new()
    }
}
