//! Splitting linear writes into page programs
//!
//! A page program may only touch bytes inside one page. A write of `size`
//! bytes at `addr` is cut into:
//!
//! - a head of `min(size, page_size - addr % page_size)` bytes at the
//!   in-page offset,
//! - as many full pages as fit,
//! - a tail of whatever is left, at offset 0.
//!
//! The split is a pure function of `(addr, size, page_size)`. A size that
//! ends exactly on a page boundary produces no empty trailing chunk, and a
//! zero-size write produces no chunks at all.

use core::ops::Range;

use crate::device::FlashDevice;
use crate::error::Result;
use crate::spi::PAGE_SIZE;
use crate::transport::Transport;

/// One page-program call produced by [`PageSplit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    /// Page index (`addr / page_size`)
    pub page: u32,
    /// Byte offset inside the page
    pub offset: u32,
    /// Bytes of the source buffer this chunk carries
    pub source: Range<usize>,
}

impl PageChunk {
    /// Number of bytes programmed
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// True for a chunk carrying no bytes (never produced by [`PageSplit`])
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

/// Iterator over the page chunks of a linear write
#[derive(Debug, Clone)]
pub struct PageSplit {
    page: u32,
    offset: u32,
    consumed: usize,
    size: usize,
    page_size: u32,
}

impl PageSplit {
    /// Split `size` bytes starting at `addr` into `page_size` pages
    pub fn new(addr: u32, size: usize, page_size: u32) -> Self {
        debug_assert!(page_size > 0);
        Self {
            page: addr / page_size,
            offset: addr % page_size,
            consumed: 0,
            size,
            page_size,
        }
    }
}

impl Iterator for PageSplit {
    type Item = PageChunk;

    fn next(&mut self) -> Option<PageChunk> {
        let remaining = self.size - self.consumed;
        if remaining == 0 {
            return None;
        }
        let room = (self.page_size - self.offset) as usize;
        let len = core::cmp::min(remaining, room);
        let chunk = PageChunk {
            page: self.page,
            offset: self.offset,
            source: self.consumed..self.consumed + len,
        };
        self.page += 1;
        self.offset = 0;
        self.consumed += len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.size - self.consumed;
        if remaining == 0 {
            return (0, Some(0));
        }
        let page_size = self.page_size as usize;
        let head = core::cmp::min(remaining, page_size - self.offset as usize);
        let count = 1 + (remaining - head).div_ceil(page_size);
        (count, Some(count))
    }
}

impl ExactSizeIterator for PageSplit {}

/// Write `data` at linear address `addr`, one page program per chunk
///
/// Stops at the first failing program; pages before it stay written.
pub fn write_pages<T: Transport>(device: &mut FlashDevice<T>, addr: u32, data: &[u8]) -> Result<()> {
    for chunk in PageSplit::new(addr, data.len(), PAGE_SIZE) {
        device.program(chunk.page, chunk.offset, &data[chunk.source])?;
    }
    Ok(())
}
