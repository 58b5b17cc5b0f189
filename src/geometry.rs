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
//! Track geometry: sectors per track, the first logical block of a track, the native sector
//! interleave, buffer slot mapping, and the rotation speed zones of GCR media.
//!
//! GCR (Macintosh 400K/800K) disks use zoned constant linear velocity recording. The 80 tracks
//! are divided into five zones of sixteen tracks, with outer zones holding more sectors and
//! spinning slower:
//!
//! | Zone | Tracks | Sectors | RPM |
//! |------|--------|---------|-----|
//! | 0    | 0-15   | 12      | 394 |
//! | 1    | 16-31  | 11      | 429 |
//! | 2    | 32-47  | 10      | 472 |
//! | 3    | 48-63  | 9       | 525 |
//! | 4    | 64-79  | 8       | 590 |
//!
//! MFM (1440K) disks have a constant 18 sectors per track.

use crate::{types::DriveEncoding, BUFFER_COUNT, TRACK_COUNT};

pub const GCR_ZONE_COUNT: usize = 5;
pub const GCR_TRACKS_PER_ZONE: u8 = 16;
pub const GCR_ZONE_SECTORS: [u8; GCR_ZONE_COUNT] = [12, 11, 10, 9, 8];
pub const GCR_ZONE_RPM: [u32; GCR_ZONE_COUNT] = [394, 429, 472, 525, 590];
pub const MFM_SECTORS_PER_TRACK: u8 = 18;

/// The speed zone of a GCR track.
#[inline]
pub fn gcr_zone(track: u8) -> usize {
    std::cmp::min((track / GCR_TRACKS_PER_ZONE) as usize, GCR_ZONE_COUNT - 1)
}

const fn build_gcr_track_starts() -> [u16; TRACK_COUNT as usize] {
    let mut starts = [0u16; TRACK_COUNT as usize];
    let mut track = 1;
    while track < TRACK_COUNT as usize {
        let zone = (track - 1) / GCR_TRACKS_PER_ZONE as usize;
        starts[track] = starts[track - 1] + GCR_ZONE_SECTORS[zone] as u16;
        track += 1;
    }
    starts
}

/// The first sector of each GCR track, counted per side.
static GCR_TRACK_START: [u16; TRACK_COUNT as usize] = build_gcr_track_starts();

/// The layout of a single track for a given encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TrackGeometry {
    encoding: DriveEncoding,
    track: u8,
    sector_count: u8,
    track_start: u16,
}

impl TrackGeometry {
    pub fn new(encoding: DriveEncoding, track: u8) -> Self {
        let track = std::cmp::min(track, TRACK_COUNT - 1);
        let (sector_count, track_start) = match encoding {
            DriveEncoding::Gcr => (
                GCR_ZONE_SECTORS[gcr_zone(track)],
                GCR_TRACK_START[track as usize],
            ),
            DriveEncoding::Mfm => (
                MFM_SECTORS_PER_TRACK,
                track as u16 * MFM_SECTORS_PER_TRACK as u16,
            ),
        };
        Self {
            encoding,
            track,
            sector_count,
            track_start,
        }
    }

    pub fn encoding(&self) -> DriveEncoding {
        self.encoding
    }

    pub fn track(&self) -> u8 {
        self.track
    }

    /// The number of sectors on one side of this track.
    pub fn sector_count(&self) -> u8 {
        self.sector_count
    }

    /// The first sector of this track, counted per side.
    pub fn track_start(&self) -> u16 {
        self.track_start
    }

    /// The sector that follows `prev` in the native interleave order. MFM tracks are read
    /// sequentially. GCR tracks use 2:1 interleave, e.g. `0 6 1 7 2 8 3 9 4 10 5 11` for a twelve
    /// sector track. An out of range `prev` restarts the sequence at sector 0.
    pub fn next_interleaved_sector(&self, prev: u8) -> u8 {
        let len = self.sector_count;
        match self.encoding {
            DriveEncoding::Mfm => {
                if prev >= len - 1 {
                    0
                }
                else {
                    prev + 1
                }
            }
            DriveEncoding::Gcr => {
                let half = (len + 1) >> 1;
                let odd = len & 1 == 1;
                if prev > len - 1 || (!odd && prev == len - 1) || (odd && prev == half - 1) {
                    0
                }
                else if prev < half {
                    prev + half
                }
                else {
                    prev + 1 - half
                }
            }
        }
    }

    /// An iterator over one full revolution of sectors in interleave order.
    pub fn interleave(&self) -> impl Iterator<Item = u8> + '_ {
        let mut next = Some(0u8);
        std::iter::from_fn(move || {
            let current = next?;
            let following = self.next_interleaved_sector(current);
            next = (following != 0).then_some(following);
            Some(current)
        })
    }

    /// The buffer slot holding a sector. MFM keeps one side in the cache at a time; GCR keeps
    /// both sides, the second side following the first.
    pub fn slot(&self, side: u8, sector: u8) -> usize {
        match self.encoding {
            DriveEncoding::Mfm => sector as usize,
            DriveEncoding::Gcr => side as usize * self.sector_count as usize + sector as usize,
        }
    }

    /// The exclusive upper bound of the slots that can belong to this track.
    pub fn slot_limit(&self) -> usize {
        std::cmp::min(self.sector_count as usize * 2, BUFFER_COUNT)
    }

    /// The logical block of the image holding buffer slot `slot`, relative to the start of the
    /// image data. `side` selects the side for MFM, where slots do not carry it.
    pub fn slot_block(&self, sides: u8, side: u8, slot: usize) -> u32 {
        let mut block = self.track_start as u32 * sides as u32 + slot as u32;
        if self.encoding.is_mfm() {
            block += self.sector_count as u32 * side as u32;
        }
        block
    }

    /// The logical block holding a sector, relative to the start of the image data.
    pub fn sector_block(&self, sides: u8, side: u8, sector: u8) -> u32 {
        self.slot_block(sides, side, self.slot(side, sector))
    }

    /// The nominal rotation speed of this track in RPM.
    pub fn rpm(&self) -> u32 {
        match self.encoding {
            DriveEncoding::Gcr => GCR_ZONE_RPM[gcr_zone(self.track)],
            DriveEncoding::Mfm => 300,
        }
    }

    /// Half the tachometer period in timer ticks, for a timer clocked at `clock_hz`. The drive
    /// produces 60 tach pulses per revolution.
    pub fn tach_half_period(&self, clock_hz: u32) -> u16 {
        // clock / (rpm / 60 * 60) / 2
        let ticks = clock_hz / (2 * self.rpm());
        std::cmp::min(ticks, u16::MAX as u32) as u16
    }
}
