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
//! The [SectorAddress] type addresses one sector on the emulated disk by track, side and
//! zero-based sector number.

use std::fmt::Display;

/// A track/side/sector triple. Sector numbers are always zero-based here; the MFM address
/// field adds one when it is transmitted.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct SectorAddress {
    track:  u8,
    side:   u8,
    sector: u8,
}

impl From<(u8, u8, u8)> for SectorAddress {
    fn from((track, side, sector): (u8, u8, u8)) -> Self {
        Self { track, side, sector }
    }
}

impl Display for SectorAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[t:{} s:{} sec:{}]", self.track, self.side, self.sector)
    }
}

impl SectorAddress {
    pub fn new(track: u8, side: u8, sector: u8) -> Self {
        Self { track, side, sector }
    }

    pub fn get(&self) -> (u8, u8, u8) {
        (self.track, self.side, self.sector)
    }
    #[inline]
    pub fn track(&self) -> u8 {
        self.track
    }
    #[inline]
    pub fn side(&self) -> u8 {
        self.side
    }
    #[inline]
    pub fn sector(&self) -> u8 {
        self.sector
    }

    /// Return a copy of this address pointing at another sector of the same track and side.
    pub fn with_sector(&self, sector: u8) -> Self {
        Self { sector, ..*self }
    }
}
