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

    src/cache.rs

    The fixed pool of sector buffers and their status flags.
*/
//! The sector buffer cache.
//!
//! A fixed pool of [BUFFER_COUNT] sector buffers, each with a [BufferFlags] status byte. The
//! status bytes are shared between interrupt context (write capture, step handling) and the
//! main loop (streaming, flushing). Every read-modify-write of the flags happens inside one
//! critical section, the equivalent of running with interrupts masked.
//!
//! Buffer payloads are guarded separately. Ownership of a payload follows the flags: a slot
//! is written only by whoever set its LOCKED bit, and streamed only while DATA_VALID is set and
//! LOCKED is clear.

use crate::{types::BufferFlags, util::critical, SectorData, BUFFER_COUNT, SECTOR_SIZE};
use std::{
    ops::RangeInclusive,
    sync::{Mutex, MutexGuard},
};

pub struct SectorCache {
    flags: Mutex<[BufferFlags; BUFFER_COUNT]>,
    slots: Box<[Mutex<SectorData>]>,
}

impl Default for SectorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SectorCache {
    pub fn new() -> Self {
        let slots = (0..BUFFER_COUNT)
            .map(|_| Mutex::new([0u8; SECTOR_SIZE]))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            flags: Mutex::new([BufferFlags::empty(); BUFFER_COUNT]),
            slots,
        }
    }

    /// A snapshot of the flags of one slot.
    pub fn flags(&self, slot: usize) -> BufferFlags {
        critical(&self.flags)[slot]
    }

    /// A snapshot of the flags of every slot.
    pub fn all_flags(&self) -> [BufferFlags; BUFFER_COUNT] {
        *critical(&self.flags)
    }

    /// Claim a slot as the target of a write capture. Fails without touching the flags if the
    /// slot is already locked; otherwise sets LOCKED and clears DATA_VALID.
    pub fn try_claim_for_write(&self, slot: usize) -> bool {
        let mut flags = critical(&self.flags);
        if flags[slot].contains(BufferFlags::LOCKED) {
            return false;
        }
        flags[slot].insert(BufferFlags::LOCKED);
        flags[slot].remove(BufferFlags::DATA_VALID);
        true
    }

    /// Claim a slot to be filled from storage. Fails if the slot already holds valid data or
    /// is locked; otherwise sets LOCKED.
    pub fn try_claim_for_read(&self, slot: usize) -> bool {
        let mut flags = critical(&self.flags);
        if flags[slot].intersects(BufferFlags::DATA_VALID | BufferFlags::LOCKED) {
            return false;
        }
        flags[slot].insert(BufferFlags::LOCKED);
        true
    }

    /// Store a captured sector in a slot claimed with [SectorCache::try_claim_for_write] and
    /// mark it valid and dirty.
    pub fn commit_write(&self, slot: usize, data: &SectorData) {
        self.data_mut(slot).copy_from_slice(data);
        let mut flags = critical(&self.flags);
        flags[slot].insert(BufferFlags::DATA_VALID | BufferFlags::DIRTY);
        flags[slot].remove(BufferFlags::LOCKED);
    }

    /// Mark a slot claimed with [SectorCache::try_claim_for_read] as valid.
    pub fn commit_read(&self, slot: usize) {
        let mut flags = critical(&self.flags);
        flags[slot].insert(BufferFlags::DATA_VALID);
        flags[slot].remove(BufferFlags::LOCKED);
    }

    /// Release a claim without publishing any data.
    pub fn release(&self, slot: usize) {
        critical(&self.flags)[slot].remove(BufferFlags::LOCKED);
    }

    /// The inclusive span between the first and last dirty slot below `limit`.
    pub fn dirty_span(&self, limit: usize) -> Option<RangeInclusive<usize>> {
        let flags = critical(&self.flags);
        Self::find_dirty_span(&flags[..limit.min(BUFFER_COUNT)])
    }

    fn find_dirty_span(flags: &[BufferFlags]) -> Option<RangeInclusive<usize>> {
        let first = flags.iter().position(|f| f.contains(BufferFlags::DIRTY))?;
        let last = flags.iter().rposition(|f| f.contains(BufferFlags::DIRTY))?;
        Some(first..=last)
    }

    /// Prepare the dirty span below `limit` for a track change. Valid slots inside the span are
    /// marked dirty so the span flushes as one unit, and every slot inside it is locked so
    /// nothing streams or captures into it before the flush.
    pub fn lock_dirty_span(&self, limit: usize) -> Option<RangeInclusive<usize>> {
        let mut flags = critical(&self.flags);
        let span = Self::find_dirty_span(&flags[..limit.min(BUFFER_COUNT)])?;
        for flag in flags[span.clone()].iter_mut() {
            if flag.contains(BufferFlags::DATA_VALID) {
                flag.insert(BufferFlags::DIRTY);
            }
            flag.insert(BufferFlags::LOCKED);
        }
        Some(span)
    }

    /// Clear DIRTY and LOCKED over a span after it was flushed or reverted.
    pub fn clean_span(&self, span: RangeInclusive<usize>) {
        let mut flags = critical(&self.flags);
        for flag in flags[span].iter_mut() {
            flag.remove(BufferFlags::DIRTY | BufferFlags::LOCKED);
        }
    }

    /// Insert flags on a slot directly. Used by flush read-back, which owns the slot through
    /// the lock taken by [SectorCache::lock_dirty_span].
    pub fn insert_flags(&self, slot: usize, set: BufferFlags) {
        critical(&self.flags)[slot].insert(set);
    }

    /// Forget the contents of every slot. Locks and dirty state are kept.
    pub fn invalidate_all(&self) {
        let mut flags = critical(&self.flags);
        for flag in flags.iter_mut() {
            flag.remove(BufferFlags::DATA_VALID);
        }
    }

    /// Return every slot to the empty state.
    pub fn reset(&self) {
        let mut flags = critical(&self.flags);
        flags.fill(BufferFlags::empty());
    }

    /// Shared access to a slot's payload.
    pub fn data(&self, slot: usize) -> MutexGuard<'_, SectorData> {
        critical(&self.slots[slot])
    }

    /// Exclusive access to a slot's payload.
    pub fn data_mut(&self, slot: usize) -> MutexGuard<'_, SectorData> {
        critical(&self.slots[slot])
    }
}
