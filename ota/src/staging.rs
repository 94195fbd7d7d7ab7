// Licensed under the Apache-2.0 license

use crate::error::UpdateError;
use crate::hil::FlashStorage;
use brew_config::BrewMemoryMap;

/// Largest program granule supported; the page buffer is sized for it.
const MAX_PAGE_SIZE: usize = 256;

/// Assembles the incoming byte stream into the staging flash region.
///
/// Logical offsets are monotonic from zero and map directly past
/// `staging_offset`. Writes accumulate in a page buffer flushed when full;
/// the containing sector is erased on first touch, and since writes are
/// strictly sequential a single "current erased sector" marker is enough
/// to make each erase happen exactly once per session.
///
/// This component never touches the main execution region.
pub struct StagingWriter<'a> {
    flash: &'a dyn FlashStorage,
    staging_offset: u32,
    capacity: u32,
    sector_size: u32,
    page_size: usize,
    erased_fill: u8,
    page_buf: [u8; MAX_PAGE_SIZE],
    buffered: usize,
    /// Absolute device offset the next full page lands at.
    write_offset: u32,
    /// Sector index (device offset / sector size) already erased.
    erased_sector: Option<u32>,
    bytes_staged: u32,
}

impl<'a> StagingWriter<'a> {
    pub fn new(
        flash: &'a dyn FlashStorage,
        map: &BrewMemoryMap,
    ) -> Result<StagingWriter<'a>, UpdateError> {
        let page_size = map.page_size as usize;
        if page_size == 0 || page_size > MAX_PAGE_SIZE || map.sector_size == 0 {
            return Err(UpdateError::Size);
        }
        if map.staging_offset as usize + map.staging_capacity() as usize > flash.capacity() {
            return Err(UpdateError::Size);
        }
        Ok(StagingWriter {
            flash,
            staging_offset: map.staging_offset,
            capacity: map.staging_capacity(),
            sector_size: map.sector_size,
            page_size,
            erased_fill: map.erased_fill,
            page_buf: [0; MAX_PAGE_SIZE],
            buffered: 0,
            write_offset: map.staging_offset,
            erased_sector: None,
            bytes_staged: 0,
        })
    }

    /// Append one validated chunk payload. Full pages are programmed as
    /// they fill; a sub-page remainder stays buffered for the next call.
    pub fn push(&mut self, payload: &[u8]) -> Result<(), UpdateError> {
        if self.bytes_staged + payload.len() as u32 > self.capacity {
            return Err(UpdateError::Size);
        }
        let mut offset = 0;
        while offset < payload.len() {
            let space = self.page_size - self.buffered;
            let take = space.min(payload.len() - offset);
            self.page_buf[self.buffered..self.buffered + take]
                .copy_from_slice(&payload[offset..offset + take]);
            self.buffered += take;
            offset += take;

            if self.buffered == self.page_size {
                self.flush_page()?;
            }
        }
        self.bytes_staged += payload.len() as u32;
        Ok(())
    }

    /// Flush the trailing partial page, padded with the erased fill value,
    /// and return the total number of image bytes staged.
    pub fn finish(&mut self) -> Result<u32, UpdateError> {
        if self.buffered > 0 {
            for byte in self.page_buf[self.buffered..self.page_size].iter_mut() {
                *byte = self.erased_fill;
            }
            self.buffered = self.page_size;
            self.flush_page()?;
        }
        Ok(self.bytes_staged)
    }

    pub fn bytes_staged(&self) -> u32 {
        self.bytes_staged
    }

    fn flush_page(&mut self) -> Result<(), UpdateError> {
        let sector = self.write_offset / self.sector_size;
        if self.erased_sector != Some(sector) {
            self.flash
                .erase((sector * self.sector_size) as usize, self.sector_size as usize)?;
            self.erased_sector = Some(sector);
        }
        self.flash
            .write(&self.page_buf[..self.page_size], self.write_offset as usize)?;
        self.write_offset += self.page_size as u32;
        self.buffered = 0;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use brew_config::BrewMemoryMap;
    use brew_testing_common::MockFlash;

    fn small_map() -> BrewMemoryMap {
        BrewMemoryMap {
            flash_size: 64 * 1024,
            staging_offset: 32 * 1024,
            ..BrewMemoryMap::default()
        }
    }

    #[test]
    fn test_sequential_pages_single_erase_per_sector() {
        let map = small_map();
        let flash = MockFlash::new(&map);
        let mut writer = StagingWriter::new(&flash, &map).unwrap();

        // 4 KiB sector = 16 pages of 256; write 17 pages worth
        for i in 0..17u32 {
            let payload = [i as u8; 256];
            writer.push(&payload).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 17 * 256);
        assert_eq!(flash.erase_log(), vec![32 * 1024, 36 * 1024]);
    }

    #[test]
    fn test_partial_page_padded_with_fill() {
        let map = small_map();
        let flash = MockFlash::new(&map);
        let mut writer = StagingWriter::new(&flash, &map).unwrap();

        writer.push(&[0xAB; 100]).unwrap();
        assert_eq!(writer.finish().unwrap(), 100);

        let mut staged = vec![0u8; 256];
        flash.read(&mut staged, 32 * 1024).unwrap();
        assert_eq!(&staged[..100], &[0xAB; 100][..]);
        assert_eq!(&staged[100..], &[map.erased_fill; 156][..]);
    }

    #[test]
    fn test_unaligned_chunks_reassemble_exactly() {
        let map = small_map();
        let flash = MockFlash::new(&map);
        let mut writer = StagingWriter::new(&flash, &map).unwrap();

        let image: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        for chunk in image.chunks(177) {
            writer.push(chunk).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 1000);

        let mut staged = vec![0u8; 1000];
        flash.read(&mut staged, 32 * 1024).unwrap();
        assert_eq!(staged, image);
    }

    #[test]
    fn test_overflow_rejected_before_flash_is_touched() {
        let map = small_map();
        let flash = MockFlash::new(&map);
        let mut writer = StagingWriter::new(&flash, &map).unwrap();

        let capacity = map.staging_capacity();
        let big = vec![0u8; 4096];
        for _ in 0..capacity / 4096 {
            writer.push(&big).unwrap();
        }
        assert_eq!(writer.push(&[0u8; 1]), Err(UpdateError::Size));
        assert_eq!(writer.bytes_staged(), capacity);
    }

    #[test]
    fn test_erase_failure_aborts() {
        let map = small_map();
        let flash = MockFlash::new(&map);
        flash.fail_next_erase();
        let mut writer = StagingWriter::new(&flash, &map).unwrap();
        assert_eq!(writer.push(&[0u8; 256]), Err(UpdateError::FlashErase));
    }
}
