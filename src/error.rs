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
//! Error types. [WriteFault] is raised in interrupt context by the write capture state machine
//! and surfaced by the main loop; [StorageError] comes from the block device; [DriveError] is
//! everything the main loop can fail with.

use thiserror::Error;

/// The host event that cut a sector write short.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IncompleteCause {
    Step,
    SideChange,
    WriteModeChange,
}

impl IncompleteCause {
    fn code_base(&self) -> u16 {
        match self {
            IncompleteCause::Step => 1000,
            IncompleteCause::SideChange => 2000,
            IncompleteCause::WriteModeChange => 3000,
        }
    }
}

/// The reason a sector write from the host was rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum WriteFaultKind {
    /// The sector number in a GCR data field is outside the current track.
    #[error("bad sector {sector} for t{track}")]
    BadSector { sector: u8, track: u8 },
    /// The target buffer of a GCR write was already locked.
    #[error("buf locked {track}/{side}:{sector}")]
    BufferLocked { track: u8, side: u8, sector: u8 },
    /// One of the three GCR checksum lanes did not match.
    #[error("checksum failure {lane}")]
    Checksum { lane: u8 },
    /// A received byte is not a valid 6-and-2 disk byte.
    #[error("bad disk byte {value:02X}")]
    InvalidDiskByte { value: u8 },
    /// The MFM data field CRC did not match.
    #[error("checksum fail")]
    Crc { received: u16, calculated: u16 },
    /// The target buffer of an MFM write was already locked.
    #[error("buf locked {track}/{side}:{sector}")]
    MfmBufferLocked { track: u8, side: u8, sector: u8 },
    /// A write was interrupted after `received` bytes by a step, side or mode change.
    #[error("incomplete write")]
    Incomplete { cause: IncompleteCause, received: u16 },
}

/// A write capture failure, with the numeric diagnostic code shown to the operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error(transparent)]
pub struct WriteFault {
    pub kind: WriteFaultKind,
}

impl WriteFault {
    pub fn new(kind: WriteFaultKind) -> Self {
        Self { kind }
    }

    pub fn code(&self) -> u16 {
        match self.kind {
            WriteFaultKind::BadSector { .. } => 60,
            WriteFaultKind::BufferLocked { .. } => 61,
            WriteFaultKind::Checksum { lane } => 62 + lane as u16,
            WriteFaultKind::InvalidDiskByte { .. } => 65,
            WriteFaultKind::Crc { .. } => 70,
            WriteFaultKind::MfmBufferLocked { .. } => 71,
            WriteFaultKind::Incomplete { cause, received } => cause.code_base() + received,
        }
    }
}

impl From<WriteFaultKind> for WriteFault {
    fn from(kind: WriteFaultKind) -> Self {
        Self { kind }
    }
}

/// Failures reported by the backing block device.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SD read error at block {0}")]
    ReadFailed(u32),
    #[error("SD read start error at block {0}")]
    ReadStart(u32),
    #[error("SD read stop error")]
    ReadStop,
    #[error("SD writeStart fail at block {block} ({count} blocks)")]
    WriteStart { block: u32, count: u32 },
    #[error("SD write error at block {0}")]
    WriteFailed(u32),
    #[error("SD writeStop fail")]
    WriteStop,
    #[error("Block {0} is outside the device")]
    OutOfRange(u32),
    #[error("An IO error occurred accessing the block device: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the emulator's main loop. All of them end emulation of the current disk.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("{} ({})", .0, .0.code())]
    Write(#[from] WriteFault),
    #[error("wr wrong track {flushing}/{written}")]
    WrongTrack { flushing: u8, written: u8 },
    #[error("image not contiguous")]
    ImageNotContiguous,
    #[error("Unknown disk image format")]
    UnknownImage,
    #[error("No disk is inserted")]
    NoDisk,
}

impl DriveError {
    /// Write faults are reported as a write error, everything else as a fatal error.
    pub fn is_write_fault(&self) -> bool {
        matches!(self, DriveError::Write(_))
    }
}
