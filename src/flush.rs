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

    src/flush.rs

    Writes dirty sector buffers back to the block device.
*/
//! The flush controller: writes the dirty sectors of a track back to the block device.
//!
//! Dirty slots are written as one multi-block transfer covering the span from the first to the
//! last dirty slot. Slots inside the span that are not dirty have no current data in the cache,
//! so they are read back from the device first and written out unchanged.
//!
//! A read-only mount has nowhere to write to. Its dirty slots are dropped, reverting the
//! host's changes.

use crate::{
    drive::DriveShared,
    image::MountedImage,
    storage::BlockDevice,
    types::BufferFlags,
    DriveError,
    StorageError,
};
use std::{ops::RangeInclusive, time::Instant};

/// The work needed to flush one track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlushPlan {
    pub track: u8,
    /// The slots written, first to last dirty slot inclusive.
    pub span: RangeInclusive<usize>,
    /// Slots inside the span that must be read back before the write.
    pub read_back: Vec<usize>,
    /// The absolute device block of the first slot in the span.
    pub first_block: u32,
}

impl FlushPlan {
    pub fn block_count(&self) -> u32 {
        (self.span.end() - self.span.start() + 1) as u32
    }

    /// The device block of a slot inside the span.
    pub fn block_of(&self, slot: usize) -> u32 {
        self.first_block + (slot - self.span.start()) as u32
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was dirty.
    Clean,
    /// The mount is read-only and the dirty slots were discarded.
    Reverted { track: u8 },
    Saved { track: u8, blocks: u32, millis: u128 },
}

impl FlushOutcome {
    /// The status line shown for this outcome, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            FlushOutcome::Clean => None,
            FlushOutcome::Reverted { track } => Some(format!("Reverted trk {:02}", track)),
            FlushOutcome::Saved { track, millis, .. } => Some(format!("Saved trk {:02} in {}", track, millis)),
        }
    }
}

pub struct FlushController;

impl FlushController {
    /// Work out what flushing `track` involves. Returns `None` if nothing is dirty.
    pub fn plan(shared: &DriveShared, image: &MountedImage, track: u8) -> Result<Option<FlushPlan>, DriveError> {
        let geometry = shared.geometry(track);
        let flags = shared.cache().all_flags();
        let limit = geometry.slot_limit();
        let (write_track, write_side) = shared.last_write();

        let mut span: Option<(usize, usize)> = None;
        for (slot, flag) in flags[..limit].iter().enumerate() {
            if !flag.contains(BufferFlags::DIRTY) {
                continue;
            }
            if write_track != track {
                return Err(DriveError::WrongTrack {
                    flushing: track,
                    written:  write_track,
                });
            }
            span = Some(match span {
                None => (slot, slot),
                Some((first, _)) => (first, slot),
            });
        }

        let Some((first, last)) = span
        else {
            return Ok(None);
        };

        let read_back = (first..=last)
            .filter(|&slot| !flags[slot].contains(BufferFlags::DIRTY))
            .collect();
        let first_block = image.block(geometry.slot_block(image.sides(), write_side, first));

        Ok(Some(FlushPlan {
            track,
            span: first..=last,
            read_back,
            first_block,
        }))
    }

    /// Flush the dirty slots of `track`.
    pub fn flush<D: BlockDevice + ?Sized>(
        shared: &DriveShared,
        image: &MountedImage,
        device: &mut D,
        track: u8,
    ) -> Result<FlushOutcome, DriveError> {
        let Some(plan) = Self::plan(shared, image, track)?
        else {
            return Ok(FlushOutcome::Clean);
        };
        let cache = shared.cache();

        if image.read_only() {
            log::debug!("flush(): read-only, reverting slots {:?} of track {}", plan.span, track);
            cache.clean_span(plan.span.clone());
            return Ok(FlushOutcome::Reverted { track });
        }

        let start = Instant::now();
        for &slot in &plan.read_back {
            let block = plan.block_of(slot);
            log::trace!("flush(): reading back slot {} from block {}", slot, block);
            device.read_block(block, &mut cache.data_mut(slot))?;
        }

        let count = plan.block_count();
        device.write_start(plan.first_block, count).map_err(|e| {
            log::error!("flush(): write_start failed: {}", e);
            StorageError::WriteStart {
                block: plan.first_block,
                count,
            }
        })?;
        for slot in plan.span.clone() {
            device.write_data(&cache.data(slot))?;
            cache.clean_span(slot..=slot);
        }
        device.write_stop()?;

        let millis = start.elapsed().as_millis();
        log::debug!(
            "flush(): track {} slots {:?} -> blocks {}+{} in {}ms",
            track,
            plan.span,
            plan.first_block,
            count,
            millis
        );
        Ok(FlushOutcome::Saved {
            track,
            blocks: count,
            millis,
        })
    }
}
