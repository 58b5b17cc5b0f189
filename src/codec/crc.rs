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
//! Table-driven CRC-16/CCITT (polynomial 0x1021, MSB first) as used by MFM address and data
//! fields. A field's CRC covers the three 0xA1 sync marks and the address mark that precede
//! it, so a hasher is normally created with [CrcCcitt::primed].

use crate::codec::mfm::MFM_SYNC_BYTE;

const CCITT_POLY: u16 = 0x1021;

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CCITT_POLY;
            }
            else {
                crc <<= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC_CCITT_TABLE: [u16; 256] = build_table();

/// Running CRC-16/CCITT hasher.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CrcCcitt {
    crc: u16,
}

impl CrcCcitt {
    /// A hasher with the standard 0xFFFF initial value.
    pub fn new() -> Self {
        Self { crc: 0xFFFF }
    }

    /// A hasher that has already absorbed the three sync marks and the given address mark.
    pub fn primed(mark: u8) -> Self {
        let mut crc = Self::new();
        crc.update_sync();
        crc.update_sync();
        crc.update_sync();
        crc.update(mark);
        crc
    }

    /// Absorb one sync mark. Sync marks are sent with a missing clock bit and are not data
    /// bytes on the wire, but the CRC still counts them as 0xA1.
    #[inline]
    pub fn update_sync(&mut self) {
        self.update(MFM_SYNC_BYTE);
    }

    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.crc = (self.crc << 8) ^ CRC_CCITT_TABLE[((self.crc >> 8) as u8 ^ byte) as usize];
    }

    pub fn update_slice(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    #[inline]
    pub fn value(&self) -> u16 {
        self.crc
    }
}

impl Default for CrcCcitt {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate the CRC of a complete field in one call. `start` overrides the initial value.
pub fn crc_ccitt(data: &[u8], start: Option<u16>) -> u16 {
    let mut crc = CrcCcitt {
        crc: start.unwrap_or(0xFFFF),
    };
    crc.update_slice(data);
    crc.value()
}
