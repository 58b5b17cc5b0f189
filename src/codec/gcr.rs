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

    src/codec/gcr.rs

    Apple 6-and-2 GCR tables, checksum lanes, encoder and decoder.
*/
//! Apple 6-and-2 GCR sector codec.
//!
//! A Macintosh sector data field carries 12 tag bytes followed by 512 data bytes. The 524
//! source bytes are processed in groups of three (the last group holds only two), each group
//! producing one 6-bit value holding the top two bits of every encoded byte, then the low six
//! bits of each byte. Every 6-bit value is translated to a
//! disk byte through [GCR_ENCODE_TABLE].
//!
//! The encoded bytes are not the source bytes themselves: three rolling checksum lanes are
//! carried through the sector with an add-with-carry chain, and each source byte is XORed with
//! one of them before it is split. The final lane values follow the data as a four byte trailer.

use crate::{types::SectorAddress, SectorData, SECTOR_SIZE};
use thiserror::Error;

/// Number of tag bytes that precede the sector data. The emulator always sends zeroed tags.
pub const GCR_TAG_LEN: usize = 12;
/// Number of disk bytes taken by the encoded tags.
pub const GCR_ENCODED_TAG_LEN: usize = 16;
/// Number of disk bytes taken by the encoded tags and data, excluding the checksum trailer.
pub const GCR_ENCODED_PAYLOAD_LEN: usize = 699;
/// Number of disk bytes taken by the checksum trailer.
pub const GCR_CHECKSUM_LEN: usize = 4;
/// Number of disk bytes in an encoded data field body (tags, data and checksum).
pub const GCR_DATA_FIELD_LEN: usize = GCR_ENCODED_PAYLOAD_LEN + GCR_CHECKSUM_LEN;

/// Self-sync filler byte.
pub const GCR_SYNC: u8 = 0xFF;
pub const GCR_ADDRESS_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0x96];
pub const GCR_DATA_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0xAD];
pub const GCR_ADDRESS_EPILOGUE: [u8; 2] = [0xDE, 0xAA];
pub const GCR_DATA_EPILOGUE: [u8; 3] = [0xDE, 0xAA, 0xFF];

/// Format byte of the address field for double-sided media.
pub const GCR_FORMAT_DOUBLE_SIDED: u8 = 0x22;
/// Format byte of the address field for single-sided media.
pub const GCR_FORMAT_SINGLE_SIDED: u8 = 0x02;

const SOURCE_LEN: usize = GCR_TAG_LEN + SECTOR_SIZE;

/// Translation of 6-bit values to disk bytes.
#[rustfmt::skip]
pub const GCR_ENCODE_TABLE: [u8; 64] = [
    0x96, 0x97, 0x9A, 0x9B, 0x9D, 0x9E, 0x9F, 0xA6,
    0xA7, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, 0xB2, 0xB3,
    0xB4, 0xB5, 0xB6, 0xB7, 0xB9, 0xBA, 0xBB, 0xBC,
    0xBD, 0xBE, 0xBF, 0xCB, 0xCD, 0xCE, 0xCF, 0xD3,
    0xD6, 0xD7, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE,
    0xDF, 0xE5, 0xE6, 0xE7, 0xE9, 0xEA, 0xEB, 0xEC,
    0xED, 0xEE, 0xEF, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6,
    0xF7, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

/// Marks a disk byte with no 6-bit value in [GCR_DECODE_TABLE].
pub const GCR_INVALID: u8 = 0xFF;

const fn build_decode_table() -> [u8; 256] {
    let mut table = [GCR_INVALID; 256];
    let mut i = 0;
    while i < GCR_ENCODE_TABLE.len() {
        table[GCR_ENCODE_TABLE[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Translation of disk bytes back to 6-bit values. Bytes outside the alphabet map to
/// [GCR_INVALID].
pub static GCR_DECODE_TABLE: [u8; 256] = build_decode_table();

/// Translate the low six bits of `value` to a disk byte.
#[inline]
pub fn encode_6and2(value: u8) -> u8 {
    GCR_ENCODE_TABLE[(value & 0x3F) as usize]
}

/// Translate a disk byte to its 6-bit value, or `None` if the byte is not in the alphabet.
#[inline]
pub fn decode_disk_byte(byte: u8) -> Option<u8> {
    match GCR_DECODE_TABLE[byte as usize] {
        GCR_INVALID => None,
        value => Some(value),
    }
}

/// Pack the top two bits of three bytes into one 6-bit value.
#[inline]
fn high_bits(b0: u8, b1: u8, b2: u8) -> u8 {
    ((b0 & 0xC0) >> 2) | ((b1 & 0xC0) >> 4) | ((b2 & 0xC0) >> 6)
}

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum GcrDecodeError {
    #[error("Disk byte {0:02X} is not a valid 6-and-2 value")]
    InvalidDiskByte(u8),
    #[error("Checksum lane {lane} mismatch: received {received:02X}, calculated {calculated:02X}")]
    Checksum { lane: u8, received: u8, calculated: u8 },
    #[error("Data field ended after {0} bytes")]
    Truncated(usize),
}

// Position within a group -> (lane XORed into the byte, lane the byte is added to)
const KEY_LANE: [usize; 3] = [0, 2, 1];
const SUM_LANE: [usize; 3] = [2, 1, 0];

/// The three rolling checksum lanes and the carry that links them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GcrChecksum {
    lanes: [u8; 3],
    carry: bool,
}

impl GcrChecksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotate lane 0 left through the carry. Called once at the start of every group.
    #[inline]
    pub fn begin_group(&mut self) {
        self.carry = self.lanes[0] & 0x80 != 0;
        self.lanes[0] = self.lanes[0].rotate_left(1);
    }

    #[inline]
    fn absorb(&mut self, pos: usize, data: u8) {
        let lane = &mut self.lanes[SUM_LANE[pos]];
        let sum = *lane as u16 + data as u16 + self.carry as u16;
        *lane = sum as u8;
        self.carry = sum > 0xFF;
    }

    /// Encode the source byte at position `pos` (0..3) of the current group.
    #[inline]
    pub fn encode(&mut self, pos: usize, data: u8) -> u8 {
        let encoded = data ^ self.lanes[KEY_LANE[pos]];
        self.absorb(pos, data);
        encoded
    }

    /// Recover the source byte at position `pos` (0..3) of the current group.
    #[inline]
    pub fn decode(&mut self, pos: usize, encoded: u8) -> u8 {
        let data = encoded ^ self.lanes[KEY_LANE[pos]];
        self.absorb(pos, data);
        data
    }

    /// The trailer values in transmission order.
    pub fn trailer(&self) -> [u8; 3] {
        [self.lanes[2], self.lanes[1], self.lanes[0]]
    }
}

/// An iterator producing the [GCR_DATA_FIELD_LEN] disk bytes of a sector data field body:
/// encoded tags, encoded data and the checksum trailer. The prologue, sector number and
/// epilogue are not included.
pub struct GcrEncoder<'a> {
    data: &'a SectorData,
    checksum: GcrChecksum,
    group: [u8; 4],
    group_len: usize,
    group_pos: usize,
    source_pos: usize,
    trailer_done: bool,
}

impl<'a> GcrEncoder<'a> {
    pub fn new(data: &'a SectorData) -> Self {
        Self {
            data,
            checksum: GcrChecksum::new(),
            group: [0; 4],
            group_len: 0,
            group_pos: 0,
            source_pos: 0,
            trailer_done: false,
        }
    }

    #[inline]
    fn source(&self, index: usize) -> u8 {
        if index < GCR_TAG_LEN {
            0
        }
        else {
            self.data[index - GCR_TAG_LEN]
        }
    }

    fn load_group(&mut self) {
        let count = std::cmp::min(3, SOURCE_LEN - self.source_pos);
        let mut encoded = [0u8; 3];

        self.checksum.begin_group();
        for (pos, enc) in encoded.iter_mut().enumerate().take(count) {
            *enc = self.checksum.encode(pos, self.source(self.source_pos + pos));
        }
        self.source_pos += count;

        self.group[0] = encode_6and2(high_bits(encoded[0], encoded[1], encoded[2]));
        for pos in 0..count {
            self.group[pos + 1] = encode_6and2(encoded[pos]);
        }
        self.group_len = count + 1;
        self.group_pos = 0;
    }

    fn load_trailer(&mut self) {
        let [c0, c1, c2] = self.checksum.trailer();
        self.group = [
            encode_6and2(high_bits(c0, c1, c2)),
            encode_6and2(c0),
            encode_6and2(c1),
            encode_6and2(c2),
        ];
        self.group_len = 4;
        self.group_pos = 0;
        self.trailer_done = true;
    }
}

impl Iterator for GcrEncoder<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.group_pos >= self.group_len {
            if self.source_pos < SOURCE_LEN {
                self.load_group();
            }
            else if !self.trailer_done {
                self.load_trailer();
            }
            else {
                return None;
            }
        }
        let byte = self.group[self.group_pos];
        self.group_pos += 1;
        Some(byte)
    }
}

/// Encode a sector into a complete data field body.
pub fn encode_sector(data: &SectorData) -> Vec<u8> {
    GcrEncoder::new(data).collect()
}

/// Result of feeding one disk byte to a [GcrDecoder].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GcrProgress {
    /// More bytes are needed.
    Payload,
    /// The byte was part of the checksum trailer and matched; more trailer bytes follow.
    Trailer,
    /// The whole field decoded and verified.
    Complete,
}

/// Incremental decoder for a data field body, fed one disk byte at a time.
#[derive(Clone)]
pub struct GcrDecoder {
    checksum: GcrChecksum,
    pos: usize,
    pending: u8,
    data: SectorData,
    data_len: usize,
}

impl Default for GcrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GcrDecoder {
    pub fn new() -> Self {
        Self {
            checksum: GcrChecksum::new(),
            pos: 0,
            pending: 0,
            data: [0; SECTOR_SIZE],
            data_len: 0,
        }
    }

    /// The number of disk bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The decoded sector data. Only meaningful once [GcrProgress::Complete] was returned.
    pub fn data(&self) -> &SectorData {
        &self.data
    }

    pub fn push(&mut self, disk_byte: u8) -> Result<GcrProgress, GcrDecodeError> {
        let value = decode_disk_byte(disk_byte).ok_or(GcrDecodeError::InvalidDiskByte(disk_byte))?;
        let pos = self.pos;
        self.pos += 1;

        if pos < GCR_ENCODED_PAYLOAD_LEN {
            let phase = pos & 0x03;
            if phase == 0 {
                // A7 A6 B7 B6 C7 C6 0 0
                self.pending = value << 2;
                self.checksum.begin_group();
            }
            else {
                let encoded = (self.pending & 0xC0) | value;
                self.pending <<= 2;
                let byte = self.checksum.decode(phase - 1, encoded);
                if pos >= GCR_ENCODED_TAG_LEN {
                    self.data[self.data_len] = byte;
                    self.data_len += 1;
                }
            }
            return Ok(GcrProgress::Payload);
        }

        match pos - GCR_ENCODED_PAYLOAD_LEN {
            0 => {
                self.pending = value << 2;
                Ok(GcrProgress::Trailer)
            }
            k @ 1..=3 => {
                let received = (self.pending & 0xC0) | value;
                self.pending <<= 2;
                let calculated = self.checksum.trailer()[k - 1];
                if received != calculated {
                    return Err(GcrDecodeError::Checksum {
                        lane: (k - 1) as u8,
                        received,
                        calculated,
                    });
                }
                if k == 3 {
                    Ok(GcrProgress::Complete)
                }
                else {
                    Ok(GcrProgress::Trailer)
                }
            }
            _ => Err(GcrDecodeError::Truncated(pos)),
        }
    }
}

/// Decode a complete data field body.
pub fn decode_sector(field: &[u8]) -> Result<SectorData, GcrDecodeError> {
    let mut decoder = GcrDecoder::new();
    for &byte in field {
        if decoder.push(byte)? == GcrProgress::Complete {
            return Ok(decoder.data);
        }
    }
    Err(GcrDecodeError::Truncated(decoder.position()))
}

/// The decoded contents of an address field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GcrAddressField {
    pub address: SectorAddress,
    pub format:  u8,
}

/// Build the ten byte address field (prologue, five translated values, epilogue) for a
/// sector on a disk with `sides` sides.
pub fn address_field(address: SectorAddress, sides: u8) -> [u8; 10] {
    let format = if sides == 2 {
        GCR_FORMAT_DOUBLE_SIDED
    }
    else {
        GCR_FORMAT_SINGLE_SIDED
    };
    let track_low = address.track() & 0x3F;
    let track_high = (address.side() << 5) | (address.track() >> 6);
    let checksum = (track_low ^ address.sector() ^ track_high ^ format) & 0x3F;

    [
        GCR_ADDRESS_PROLOGUE[0],
        GCR_ADDRESS_PROLOGUE[1],
        GCR_ADDRESS_PROLOGUE[2],
        encode_6and2(track_low),
        encode_6and2(address.sector()),
        encode_6and2(track_high),
        encode_6and2(format),
        encode_6and2(checksum),
        GCR_ADDRESS_EPILOGUE[0],
        GCR_ADDRESS_EPILOGUE[1],
    ]
}

/// Parse the five translated values that follow an address prologue. Returns `None` if any
/// byte is invalid or the checksum does not match.
pub fn parse_address_field(body: &[u8]) -> Option<GcrAddressField> {
    if body.len() < 5 {
        return None;
    }
    let mut values = [0u8; 5];
    for (value, &byte) in values.iter_mut().zip(body) {
        *value = decode_disk_byte(byte)?;
    }
    let [track_low, sector, track_high, format, checksum] = values;
    if (track_low ^ sector ^ track_high ^ format) & 0x3F != checksum {
        return None;
    }
    let track = ((track_high & 0x1F) << 6) | track_low;
    let side = (track_high >> 5) & 0x01;
    Some(GcrAddressField {
        address: SectorAddress::new(track, side, sector),
        format,
    })
}
