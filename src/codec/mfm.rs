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
//! IBM MFM framing as seen on the drive interface bus.
//!
//! The drive interface controller performs the actual MFM bit encoding. The emulator hands it
//! every byte as two nibble transfers, high nibble first. Sync marks (0xA1 with a missing clock)
//! cannot be expressed as plain data and are sent as the reserved transfer pair
//! [MFM_SYNC_TRANSFERS].

use crate::{
    codec::crc::CrcCcitt,
    types::SectorAddress,
    SectorData,
    SECTOR_SIZE,
};
use thiserror::Error;

pub const MFM_SYNC_BYTE: u8 = 0xA1;
pub const MFM_SYNC_COUNT: usize = 3;
pub const MFM_IDAM: u8 = 0xFE;
pub const MFM_DAM: u8 = 0xFB;
pub const MFM_GAP_BYTE: u8 = 0x4E;
/// Sector size code for 512 byte sectors.
pub const MFM_SIZE_CODE: u8 = 2;
/// The two bus transfers that produce an 0xA1 sync mark.
pub const MFM_SYNC_TRANSFERS: [u8; 2] = [0x0A, 0x11];

/// Split a byte into its two bus transfers, high nibble first.
#[inline]
pub fn byte_transfers(byte: u8) -> [u8; 2] {
    [byte >> 4, byte & 0x0F]
}

/// One decoded symbol of the bus transfer stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferSymbol {
    Sync,
    Byte(u8),
}

/// Reassemble a pair of bus transfers. Returns `None` for a pair that is neither a data byte
/// nor a sync mark.
pub fn join_transfers(high: u8, low: u8) -> Option<TransferSymbol> {
    if [high, low] == MFM_SYNC_TRANSFERS {
        Some(TransferSymbol::Sync)
    }
    else if high <= 0x0F && low <= 0x0F {
        Some(TransferSymbol::Byte((high << 4) | low))
    }
    else {
        None
    }
}

/// The four ID field bytes following the address mark: track, side, 1-based sector, size code.
pub fn id_field(address: SectorAddress) -> [u8; 4] {
    [address.track(), address.side(), address.sector() + 1, MFM_SIZE_CODE]
}

/// CRC of the ID field, including the sync marks and address mark.
pub fn id_field_crc(address: SectorAddress) -> u16 {
    let mut crc = CrcCcitt::primed(MFM_IDAM);
    crc.update_slice(&id_field(address));
    crc.value()
}

/// CRC of a data field, including the sync marks and data mark.
pub fn data_field_crc(data: &SectorData) -> u16 {
    let mut crc = CrcCcitt::primed(MFM_DAM);
    crc.update_slice(data);
    crc.value()
}

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
#[error("Data field CRC mismatch: received {received:04X}, calculated {calculated:04X}")]
pub struct MfmCrcError {
    pub received:   u16,
    pub calculated: u16,
}

/// Result of feeding one byte to an [MfmDataField].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MfmProgress {
    Payload,
    CrcHigh,
    Complete,
}

/// Accumulates the payload and CRC of a data field after its data mark was seen.
#[derive(Clone)]
pub struct MfmDataField {
    crc: CrcCcitt,
    data: SectorData,
    pos: usize,
    received_high: u8,
}

impl Default for MfmDataField {
    fn default() -> Self {
        Self::new()
    }
}

impl MfmDataField {
    pub fn new() -> Self {
        Self {
            crc: CrcCcitt::primed(MFM_DAM),
            data: [0; SECTOR_SIZE],
            pos: 0,
            received_high: 0,
        }
    }

    /// The number of bytes consumed since the data mark.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn data(&self) -> &SectorData {
        &self.data
    }

    pub fn push(&mut self, byte: u8) -> Result<MfmProgress, MfmCrcError> {
        let pos = self.pos;
        self.pos += 1;

        if pos < SECTOR_SIZE {
            self.data[pos] = byte;
            self.crc.update(byte);
            Ok(MfmProgress::Payload)
        }
        else if pos == SECTOR_SIZE {
            self.received_high = byte;
            Ok(MfmProgress::CrcHigh)
        }
        else {
            let received = u16::from_be_bytes([self.received_high, byte]);
            let calculated = self.crc.value();
            if received != calculated {
                Err(MfmCrcError { received, calculated })
            }
            else {
                Ok(MfmProgress::Complete)
            }
        }
    }
}
