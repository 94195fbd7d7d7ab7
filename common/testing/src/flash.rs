// Licensed under the Apache-2.0 license

use brew_config::BrewMemoryMap;
use brew_ota::hil::{FlashError, FlashStorage};
use std::cell::{Cell, RefCell};

/// RAM-backed flash with the real device's granule rules enforced.
///
/// Misuse that real hardware would silently corrupt (unaligned erases,
/// programming a page that was never erased) panics here so the test
/// points straight at the bug. Fault injection flips the next operation
/// into the corresponding error.
pub struct MockFlash {
    mem: RefCell<Vec<u8>>,
    sector_size: usize,
    page_size: usize,
    erased_fill: u8,
    erase_log: RefCell<Vec<usize>>,
    program_log: RefCell<Vec<usize>>,
    fail_next_erase: Cell<bool>,
    fail_next_program: Cell<bool>,
}

impl MockFlash {
    pub fn new(map: &BrewMemoryMap) -> MockFlash {
        MockFlash {
            mem: RefCell::new(vec![map.erased_fill; map.flash_size as usize]),
            sector_size: map.sector_size as usize,
            page_size: map.page_size as usize,
            erased_fill: map.erased_fill,
            erase_log: RefCell::new(Vec::new()),
            program_log: RefCell::new(Vec::new()),
            fail_next_erase: Cell::new(false),
            fail_next_program: Cell::new(false),
        }
    }

    /// Place bytes directly into the array, bypassing granule rules.
    /// For tests that start from an already-staged image.
    pub fn preload(&self, offset: usize, bytes: &[u8]) {
        self.mem.borrow_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Flip one byte in place, corrupting whatever is staged there.
    pub fn corrupt(&self, offset: usize) {
        let mut mem = self.mem.borrow_mut();
        mem[offset] ^= 0xFF;
    }

    /// Offsets of every erase performed, in order.
    pub fn erase_log(&self) -> Vec<usize> {
        self.erase_log.borrow().clone()
    }

    /// Offsets of every page program performed, in order.
    pub fn program_log(&self) -> Vec<usize> {
        self.program_log.borrow().clone()
    }

    pub fn fail_next_erase(&self) {
        self.fail_next_erase.set(true);
    }

    pub fn fail_next_program(&self) {
        self.fail_next_program.set(true);
    }
}

impl FlashStorage for MockFlash {
    fn read(&self, buffer: &mut [u8], offset: usize) -> Result<(), FlashError> {
        let mem = self.mem.borrow();
        if offset + buffer.len() > mem.len() {
            return Err(FlashError::OutOfBounds);
        }
        buffer.copy_from_slice(&mem[offset..offset + buffer.len()]);
        Ok(())
    }

    fn write(&self, buffer: &[u8], offset: usize) -> Result<(), FlashError> {
        if self.fail_next_program.replace(false) {
            return Err(FlashError::Program);
        }
        assert_eq!(offset % self.page_size, 0, "unaligned page program");
        assert_eq!(buffer.len() % self.page_size, 0, "partial page program");
        let mut mem = self.mem.borrow_mut();
        if offset + buffer.len() > mem.len() {
            return Err(FlashError::OutOfBounds);
        }
        assert!(
            mem[offset..offset + buffer.len()]
                .iter()
                .all(|&b| b == self.erased_fill),
            "programming a page that was not erased first (offset {:#x})",
            offset
        );
        mem[offset..offset + buffer.len()].copy_from_slice(buffer);
        self.program_log.borrow_mut().push(offset);
        Ok(())
    }

    fn erase(&self, offset: usize, length: usize) -> Result<(), FlashError> {
        if self.fail_next_erase.replace(false) {
            return Err(FlashError::Erase);
        }
        assert_eq!(offset % self.sector_size, 0, "unaligned sector erase");
        assert_eq!(length % self.sector_size, 0, "partial sector erase");
        let mut mem = self.mem.borrow_mut();
        if offset + length > mem.len() {
            return Err(FlashError::OutOfBounds);
        }
        for byte in mem[offset..offset + length].iter_mut() {
            *byte = self.erased_fill;
        }
        self.erase_log.borrow_mut().push(offset);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.mem.borrow().len()
    }
}
