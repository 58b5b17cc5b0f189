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

    src/capture.rs

    Rebuilds sectors from the write tick stream sent by the host.
*/
//! The write capture state machine.
//!
//! While the host holds the write request line, the drive interface controller decodes the
//! incoming flux and presents the data on the bus, toggling the write tick line once per unit:
//!
//! * GCR: one tick per disk byte. The controller drops the always-set high bit, so the bus
//!   carries seven bits.
//! * MFM: two ticks per byte. The falling tick carries the high nibble, the rising tick the
//!   low nibble and completes the byte. Sync marks arrive as plain 0xA1 bytes.
//!
//! Each completed byte advances a counter through the data field. The counter doubles as the
//! progress measure reported in an incomplete write fault, so it keeps the same numbering as
//! the wire layout:
//!
//! | GCR count | Byte                    | MFM count | Byte          |
//! |-----------|-------------------------|-----------|---------------|
//! | 0-2       | D5 AA AD                | 0-1       | A1 A1         |
//! | 3         | sector number           | 2         | A1 ... FB     |
//! | 4-702     | encoded tags and data   | 3-514     | data          |
//! | 703-706   | checksum                | 515-516   | CRC           |
//!
//! Payload bytes are staged in the decoder and copied into the target slot only once the
//! checksum verified, so a failed capture never exposes partial data. The target slot is
//! claimed as soon as the header matched and stays LOCKED without DATA_VALID until the capture
//! ends.

use crate::{
    cache::SectorCache,
    codec::{
        gcr::{self, GcrDecodeError, GcrDecoder, GcrProgress, GCR_DATA_PROLOGUE, GCR_ENCODED_PAYLOAD_LEN},
        mfm::{MfmDataField, MfmProgress, MFM_DAM, MFM_SYNC_BYTE},
    },
    geometry::TrackGeometry,
    types::TickEdge,
    WriteFault,
    WriteFaultKind,
    SECTOR_SIZE,
};

/// The number of bytes received once the header is complete. A write cut short at or past
/// this point is reported as incomplete.
pub const CAPTURE_HEADER_LEN: u16 = 3;

const GCR_SECTOR_POS: u16 = 3;
const GCR_PAYLOAD_START: u16 = GCR_SECTOR_POS + 1;
const GCR_CHECKSUM_START: u16 = GCR_PAYLOAD_START + GCR_ENCODED_PAYLOAD_LEN as u16;
const MFM_PAYLOAD_START: u16 = 3;
const MFM_CRC_START: u16 = MFM_PAYLOAD_START + SECTOR_SIZE as u16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CapturePhase {
    /// Looking for the data field prologue.
    IdleSearchingSync,
    /// The prologue matched and a slot was claimed; no payload received yet.
    HeaderMatched,
    AccumulatingPayload,
    VerifyingChecksum,
}

/// What a capture writes into: the cache and the drive position at the time of the tick.
pub struct CaptureContext<'a> {
    pub cache: &'a SectorCache,
    pub geometry: TrackGeometry,
    pub side: u8,
    /// The sector most recently streamed. MFM data fields carry no sector number, so the host
    /// is assumed to be writing the sector whose address it just read.
    pub sector: u8,
    pub read_only: bool,
}

/// The outcome of one byte of a capture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CaptureStatus {
    Searching,
    /// The header matched and `slot` was claimed for sector `sector`.
    Claimed { slot: usize, sector: u8 },
    Receiving,
    /// The sector verified and was committed to `slot`.
    Committed { slot: usize },
}

pub struct WriteCapture {
    count: u16,
    nibble: u8,
    slot: usize,
    gcr: GcrDecoder,
    mfm: MfmDataField,
}

impl Default for WriteCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteCapture {
    pub fn new() -> Self {
        Self {
            count: 0,
            nibble: 0,
            slot: 0,
            gcr: GcrDecoder::new(),
            mfm: MfmDataField::new(),
        }
    }

    /// Abandon the current capture and search for a new header.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// The number of bytes of the current data field received so far.
    pub fn received(&self) -> u16 {
        self.count
    }

    /// Whether enough of a data field arrived that cutting it off loses a write.
    pub fn in_progress(&self) -> bool {
        self.count >= CAPTURE_HEADER_LEN
    }

    pub fn phase(&self, mfm: bool) -> CapturePhase {
        let (payload_start, checksum_start) = if mfm {
            (MFM_PAYLOAD_START, MFM_CRC_START)
        }
        else {
            (GCR_PAYLOAD_START, GCR_CHECKSUM_START)
        };
        match self.count {
            c if c < payload_start => CapturePhase::IdleSearchingSync,
            c if c == payload_start => CapturePhase::HeaderMatched,
            c if c < checksum_start => CapturePhase::AccumulatingPayload,
            _ => CapturePhase::VerifyingChecksum,
        }
    }

    /// Process one GCR write tick. `bus` holds the seven data lines.
    pub fn gcr_byte(&mut self, bus: u8, ctx: &CaptureContext) -> Result<CaptureStatus, WriteFault> {
        let disk_byte = 0x80 | bus;

        match self.count {
            c if c < GCR_SECTOR_POS => {
                if disk_byte != GCR_DATA_PROLOGUE[c as usize] || ctx.read_only {
                    self.count = 0;
                    return Ok(CaptureStatus::Searching);
                }
                self.count += 1;
                Ok(CaptureStatus::Searching)
            }
            GCR_SECTOR_POS => {
                let sector = self.fail_on(gcr::decode_disk_byte(disk_byte).ok_or(WriteFaultKind::InvalidDiskByte {
                    value: disk_byte,
                }))?;
                if sector >= ctx.geometry.sector_count() {
                    return Err(self.fault(WriteFaultKind::BadSector {
                        sector,
                        track: ctx.geometry.track(),
                    }));
                }
                let slot = ctx.geometry.slot(ctx.side, sector);
                if !ctx.cache.try_claim_for_write(slot) {
                    return Err(self.fault(WriteFaultKind::BufferLocked {
                        track: ctx.geometry.track(),
                        side: ctx.side,
                        sector,
                    }));
                }
                self.slot = slot;
                self.gcr = GcrDecoder::new();
                self.count += 1;
                log::trace!("gcr_byte(): claimed slot {} for sector {}", slot, sector);
                Ok(CaptureStatus::Claimed { slot, sector })
            }
            _ => match self.gcr.push(disk_byte) {
                Ok(GcrProgress::Complete) => {
                    ctx.cache.commit_write(self.slot, self.gcr.data());
                    self.count = 0;
                    Ok(CaptureStatus::Committed { slot: self.slot })
                }
                Ok(_) => {
                    self.count += 1;
                    Ok(CaptureStatus::Receiving)
                }
                Err(GcrDecodeError::InvalidDiskByte(value)) => {
                    Err(self.fault(WriteFaultKind::InvalidDiskByte { value }))
                }
                Err(GcrDecodeError::Checksum { lane, .. }) => Err(self.fault(WriteFaultKind::Checksum { lane })),
                Err(GcrDecodeError::Truncated(_)) => {
                    // The decoder completes before it can run past the trailer.
                    self.count = 0;
                    Ok(CaptureStatus::Searching)
                }
            },
        }
    }

    /// Process one MFM write tick. Only the low nibble of `bus` is significant.
    pub fn mfm_tick(&mut self, edge: TickEdge, bus: u8, ctx: &CaptureContext) -> Result<CaptureStatus, WriteFault> {
        match edge {
            TickEdge::Falling => {
                self.nibble = (bus << 4) & 0xF0;
                Ok(if self.in_progress() {
                    CaptureStatus::Receiving
                }
                else {
                    CaptureStatus::Searching
                })
            }
            TickEdge::Rising => {
                let byte = self.nibble | (bus & 0x0F);
                self.mfm_byte(byte, ctx)
            }
        }
    }

    /// Process one reassembled MFM byte.
    pub fn mfm_byte(&mut self, byte: u8, ctx: &CaptureContext) -> Result<CaptureStatus, WriteFault> {
        match self.count {
            0 => {
                if byte == MFM_SYNC_BYTE {
                    self.count = 1;
                }
                Ok(CaptureStatus::Searching)
            }
            1 => {
                self.count = if byte == MFM_SYNC_BYTE { 2 } else { 0 };
                Ok(CaptureStatus::Searching)
            }
            2 => {
                if byte == MFM_DAM {
                    let sector = ctx.sector;
                    let slot = ctx.geometry.slot(ctx.side, sector);
                    if !ctx.cache.try_claim_for_write(slot) {
                        return Err(self.fault(WriteFaultKind::MfmBufferLocked {
                            track: ctx.geometry.track(),
                            side: ctx.side,
                            sector,
                        }));
                    }
                    self.slot = slot;
                    self.mfm = MfmDataField::new();
                    self.count = MFM_PAYLOAD_START;
                    log::trace!("mfm_byte(): claimed slot {} for sector {}", slot, sector);
                    return Ok(CaptureStatus::Claimed { slot, sector });
                }
                // Any number of sync marks may precede the data mark.
                if byte != MFM_SYNC_BYTE {
                    self.count = 0;
                }
                Ok(CaptureStatus::Searching)
            }
            _ => match self.mfm.push(byte) {
                Ok(MfmProgress::Complete) => {
                    ctx.cache.commit_write(self.slot, self.mfm.data());
                    self.count = 0;
                    Ok(CaptureStatus::Committed { slot: self.slot })
                }
                Ok(_) => {
                    self.count += 1;
                    Ok(CaptureStatus::Receiving)
                }
                Err(e) => Err(self.fault(WriteFaultKind::Crc {
                    received:   e.received,
                    calculated: e.calculated,
                })),
            },
        }
    }

    fn fault(&mut self, kind: WriteFaultKind) -> WriteFault {
        self.count = 0;
        WriteFault::new(kind)
    }

    fn fail_on<T>(&mut self, result: Result<T, WriteFaultKind>) -> Result<T, WriteFault> {
        result.map_err(|kind| self.fault(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{gcr::encode_sector, mfm::data_field_crc},
        types::{BufferFlags, DriveEncoding},
    };

    fn context(cache: &SectorCache, encoding: DriveEncoding) -> CaptureContext<'_> {
        CaptureContext {
            cache,
            geometry: TrackGeometry::new(encoding, 0),
            side: 1,
            sector: 4,
            read_only: false,
        }
    }

    fn gcr_field(sector: u8, data: &[u8; SECTOR_SIZE]) -> Vec<u8> {
        let mut field = GCR_DATA_PROLOGUE.to_vec();
        field.push(gcr::encode_6and2(sector));
        field.extend(encode_sector(data));
        field
    }

    #[test]
    fn test_gcr_commit() {
        let cache = SectorCache::new();
        let ctx = context(&cache, DriveEncoding::Gcr);
        let data = [0x5Au8; SECTOR_SIZE];
        let mut capture = WriteCapture::new();

        let mut statuses = Vec::new();
        // Leading sync bytes are ignored.
        for byte in [0xFF, 0xFF].into_iter().chain(gcr_field(3, &data)) {
            statuses.push(capture.gcr_byte(byte & 0x7F, &ctx).unwrap());
        }
        assert!(statuses.contains(&CaptureStatus::Claimed { slot: 15, sector: 3 }));
        assert_eq!(statuses.last(), Some(&CaptureStatus::Committed { slot: 15 }));
        assert_eq!(cache.flags(15), BufferFlags::DATA_VALID | BufferFlags::DIRTY);
        assert_eq!(*cache.data(15), data);
        assert_eq!(capture.received(), 0);
    }

    #[test]
    fn test_gcr_phases() {
        let cache = SectorCache::new();
        let ctx = context(&cache, DriveEncoding::Gcr);
        let field = gcr_field(0, &[0u8; SECTOR_SIZE]);
        let mut capture = WriteCapture::new();

        assert_eq!(capture.phase(false), CapturePhase::IdleSearchingSync);
        for &byte in &field[..4] {
            capture.gcr_byte(byte & 0x7F, &ctx).unwrap();
        }
        assert_eq!(capture.phase(false), CapturePhase::HeaderMatched);
        capture.gcr_byte(field[4] & 0x7F, &ctx).unwrap();
        assert_eq!(capture.phase(false), CapturePhase::AccumulatingPayload);
        for &byte in &field[5..field.len() - 1] {
            capture.gcr_byte(byte & 0x7F, &ctx).unwrap();
        }
        assert_eq!(capture.phase(false), CapturePhase::VerifyingChecksum);
    }

    #[test]
    fn test_gcr_bad_sector() {
        let cache = SectorCache::new();
        let ctx = context(&cache, DriveEncoding::Gcr);
        let mut capture = WriteCapture::new();
        let mut result = Ok(CaptureStatus::Searching);
        for byte in [0xD5, 0xAA, 0xAD, gcr::encode_6and2(12)] {
            result = capture.gcr_byte(byte & 0x7F, &ctx);
        }
        assert_eq!(result.unwrap_err().code(), 60);
        assert_eq!(capture.received(), 0);
    }

    #[test]
    fn test_gcr_locked_slot() {
        let cache = SectorCache::new();
        let ctx = context(&cache, DriveEncoding::Gcr);
        cache.insert_flags(12, BufferFlags::LOCKED);
        let mut capture = WriteCapture::new();
        let mut result = Ok(CaptureStatus::Searching);
        for byte in [0xD5, 0xAA, 0xAD, gcr::encode_6and2(0)] {
            result = capture.gcr_byte(byte & 0x7F, &ctx);
        }
        assert_eq!(result.unwrap_err().code(), 61);
        assert_eq!(cache.flags(12), BufferFlags::LOCKED);
    }

    #[test]
    fn test_gcr_read_only_ignores_writes() {
        let cache = SectorCache::new();
        let mut ctx = context(&cache, DriveEncoding::Gcr);
        ctx.read_only = true;
        let mut capture = WriteCapture::new();
        for byte in gcr_field(0, &[1u8; SECTOR_SIZE]) {
            assert_eq!(capture.gcr_byte(byte & 0x7F, &ctx), Ok(CaptureStatus::Searching));
        }
        assert_eq!(cache.flags(12), BufferFlags::empty());
    }

    fn mfm_stream(data: &[u8; SECTOR_SIZE]) -> Vec<u8> {
        let mut stream = vec![0x4E, 0x00, 0xA1, 0xA1, 0xA1, MFM_DAM];
        stream.extend_from_slice(data);
        stream.extend_from_slice(&data_field_crc(data).to_be_bytes());
        stream
    }

    fn feed_mfm(capture: &mut WriteCapture, bytes: &[u8], ctx: &CaptureContext) -> Result<CaptureStatus, WriteFault> {
        let mut status = Ok(CaptureStatus::Searching);
        for &byte in bytes {
            capture.mfm_tick(TickEdge::Falling, byte >> 4, ctx)?;
            status = capture.mfm_tick(TickEdge::Rising, byte & 0x0F, ctx);
            status?;
        }
        status
    }

    #[test]
    fn test_mfm_commit() {
        let cache = SectorCache::new();
        let ctx = context(&cache, DriveEncoding::Mfm);
        let mut data = [0u8; SECTOR_SIZE];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i * 7) as u8;
        }
        let mut capture = WriteCapture::new();
        let status = feed_mfm(&mut capture, &mfm_stream(&data), &ctx).unwrap();
        // MFM slots follow the streaming cursor; the side is not part of the slot.
        assert_eq!(status, CaptureStatus::Committed { slot: 4 });
        assert_eq!(*cache.data(4), data);
        assert_eq!(cache.flags(4), BufferFlags::DATA_VALID | BufferFlags::DIRTY);
    }

    #[test]
    fn test_mfm_bad_crc() {
        let cache = SectorCache::new();
        let ctx = context(&cache, DriveEncoding::Mfm);
        let data = [0x11u8; SECTOR_SIZE];
        let mut stream = mfm_stream(&data);
        let last = stream.len() - 1;
        stream[last] ^= 0xFF;

        let mut capture = WriteCapture::new();
        let fault = feed_mfm(&mut capture, &stream, &ctx).unwrap_err();
        assert_eq!(fault.code(), 70);
        // The slot stays claimed and never becomes valid.
        assert_eq!(cache.flags(4), BufferFlags::LOCKED);
    }

    #[test]
    fn test_mfm_sync_reset() {
        let cache = SectorCache::new();
        let ctx = context(&cache, DriveEncoding::Mfm);
        let mut capture = WriteCapture::new();
        feed_mfm(&mut capture, &[0xA1, 0x00], &ctx).unwrap();
        assert_eq!(capture.received(), 0);
        feed_mfm(&mut capture, &[0xA1, 0xA1, 0xA1, 0xA1], &ctx).unwrap();
        assert_eq!(capture.received(), 2);
        assert_eq!(capture.phase(true), CapturePhase::IdleSearchingSync);
        assert!(!capture.in_progress());
    }
}
