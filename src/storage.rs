/*
    SdFloppy

    Copyright 2024-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/
//! The backing block device.
//!
//! The emulator reaches the SD card only through [BlockDevice]. Blocks are [SECTOR_SIZE] bytes
//! and addressed absolutely; the mounted image occupies the contiguous run reported by
//! [BlockDevice::contiguous_range]. Every method reports failure through [StorageError], which
//! the emulator treats as fatal.
//!
//! [ImageBlockDevice] implements the trait over any `Read + Write + Seek` source holding a
//! flat image, optionally placed at a nonzero first block as it would be on a card.

use crate::{StorageError, SectorData, SECTOR_SIZE};
use std::io::{Read, Seek, SeekFrom, Write};

/// A contiguous run of blocks, inclusive of both ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockExtent {
    pub first: u32,
    pub last:  u32,
}

impl BlockExtent {
    pub fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    pub fn len(&self) -> u32 {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    pub fn contains(&self, block: u32) -> bool {
        block >= self.first && block <= self.last
    }

    /// The size of the extent in bytes.
    pub fn byte_len(&self) -> u64 {
        self.len() as u64 * SECTOR_SIZE as u64
    }
}

pub trait BlockDevice {
    /// Read a single block.
    fn read_block(&mut self, block: u32, buf: &mut SectorData) -> Result<(), StorageError>;
    /// Begin a multi-block read at `block`.
    fn read_start(&mut self, block: u32) -> Result<(), StorageError>;
    /// Read the next block of a multi-block read.
    fn read_data(&mut self, buf: &mut SectorData) -> Result<(), StorageError>;
    fn read_stop(&mut self) -> Result<(), StorageError>;
    /// Begin a multi-block write of `count` blocks at `block`.
    fn write_start(&mut self, block: u32, count: u32) -> Result<(), StorageError>;
    /// Write the next block of a multi-block write.
    fn write_data(&mut self, buf: &SectorData) -> Result<(), StorageError>;
    fn write_stop(&mut self) -> Result<(), StorageError>;
    /// The extent occupied by the mounted image, or `None` if it is fragmented.
    fn contiguous_range(&mut self) -> Result<Option<BlockExtent>, StorageError>;
    /// Whether the medium's write protect switch is set.
    fn write_protected(&self) -> bool {
        false
    }
}

/// Transfer counters, mostly of interest to tests and the simulator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub blocks_read: u32,
    pub blocks_written: u32,
    pub write_batches: u32,
}

/// A [BlockDevice] over a flat image held by any seekable stream.
pub struct ImageBlockDevice<T> {
    inner: T,
    extent: BlockExtent,
    read_cursor: Option<u32>,
    write_cursor: Option<(u32, u32)>,
    write_protected: bool,
    stats: DeviceStats,
}

impl<T: Read + Write + Seek> ImageBlockDevice<T> {
    /// Wrap an image starting at block 0.
    pub fn new(inner: T) -> Result<Self, StorageError> {
        Self::with_first_block(inner, 0)
    }

    /// Wrap an image as if it were stored on a card starting at `first_block`.
    pub fn with_first_block(mut inner: T, first_block: u32) -> Result<Self, StorageError> {
        let len = crate::util::get_length(&mut inner)?;
        let blocks = len.div_ceil(SECTOR_SIZE as u64) as u32;
        // An empty image yields an empty extent (last < first).
        let extent = BlockExtent::new(first_block + 1, first_block);
        let extent = if blocks == 0 {
            extent
        }
        else {
            BlockExtent::new(first_block, first_block + blocks - 1)
        };
        Ok(Self {
            inner,
            extent,
            read_cursor: None,
            write_cursor: None,
            write_protected: false,
            stats: DeviceStats::default(),
        })
    }

    pub fn set_write_protected(&mut self, state: bool) {
        self.write_protected = state;
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn seek_block(&mut self, block: u32) -> Result<(), StorageError> {
        if !self.extent.contains(block) {
            return Err(StorageError::OutOfRange(block));
        }
        let offset = (block - self.extent.first) as u64 * SECTOR_SIZE as u64;
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read_at(&mut self, block: u32, buf: &mut SectorData) -> Result<(), StorageError> {
        self.seek_block(block)?;
        // The final block of an image that is not a multiple of the block size is zero-padded.
        buf.fill(0);
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        self.stats.blocks_read += 1;
        Ok(())
    }
}

impl<T: Read + Write + Seek> BlockDevice for ImageBlockDevice<T> {
    fn read_block(&mut self, block: u32, buf: &mut SectorData) -> Result<(), StorageError> {
        self.read_at(block, buf).map_err(|e| {
            log::error!("read_block(): {}", e);
            StorageError::ReadFailed(block)
        })
    }

    fn read_start(&mut self, block: u32) -> Result<(), StorageError> {
        if !self.extent.contains(block) {
            return Err(StorageError::ReadStart(block));
        }
        self.read_cursor = Some(block);
        Ok(())
    }

    fn read_data(&mut self, buf: &mut SectorData) -> Result<(), StorageError> {
        let block = self.read_cursor.ok_or(StorageError::ReadFailed(u32::MAX))?;
        self.read_at(block, buf).map_err(|_| StorageError::ReadFailed(block))?;
        self.read_cursor = Some(block + 1);
        Ok(())
    }

    fn read_stop(&mut self) -> Result<(), StorageError> {
        self.read_cursor.take().map(|_| ()).ok_or(StorageError::ReadStop)
    }

    fn write_start(&mut self, block: u32, count: u32) -> Result<(), StorageError> {
        let in_range = count > 0 && self.extent.contains(block) && self.extent.contains(block + count - 1);
        if self.write_protected || !in_range {
            return Err(StorageError::WriteStart { block, count });
        }
        self.write_cursor = Some((block, count));
        self.stats.write_batches += 1;
        Ok(())
    }

    fn write_data(&mut self, buf: &SectorData) -> Result<(), StorageError> {
        let (block, remaining) = match self.write_cursor {
            Some((block, remaining)) if remaining > 0 => (block, remaining),
            _ => return Err(StorageError::WriteFailed(u32::MAX)),
        };
        self.seek_block(block)
            .and_then(|_| self.inner.write_all(buf).map_err(StorageError::from))
            .map_err(|e| {
                log::error!("write_data(): {}", e);
                StorageError::WriteFailed(block)
            })?;
        self.stats.blocks_written += 1;
        self.write_cursor = Some((block + 1, remaining - 1));
        Ok(())
    }

    fn write_stop(&mut self) -> Result<(), StorageError> {
        match self.write_cursor.take() {
            Some((_, 0)) => {
                self.inner.flush()?;
                Ok(())
            }
            _ => Err(StorageError::WriteStop),
        }
    }

    fn contiguous_range(&mut self) -> Result<Option<BlockExtent>, StorageError> {
        Ok((!self.extent.is_empty()).then_some(self.extent))
    }

    fn write_protected(&self) -> bool {
        self.write_protected
    }
}
