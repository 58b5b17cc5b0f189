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
//! # SdFloppy
//!
//! SdFloppy is the real-time core of an SD-card backed floppy drive emulator for classic
//! Macintosh and PC-compatible hosts. An external drive interface controller translates the
//! host's disk controller signals into simple bus events; this crate supplies everything in
//! between:
//!
//! * a [codec] for the two on-wire sector encodings (Apple 6-and-2 GCR and IBM MFM),
//! * a fixed pool of sector buffers shared between interrupt and main-loop context ([cache]),
//! * the [capture] state machine that rebuilds sectors from host write ticks,
//! * the [stream] engine that plays sectors back to the host in native interleave order,
//! * the [flush] controller that writes modified sectors back to the block device,
//! * and the [emulator] context that sequences all of the above.
//!
//! Hardware is reached only through traits: [storage::BlockDevice] for the SD card,
//! [interface::DriveInterface] for the controller lines, and [status::StatusDisplay] for the
//! operator display.

pub mod cache;
pub mod capture;
pub mod codec;
pub mod config;
pub mod drive;
pub mod emulator;
mod error;
pub mod flush;
pub mod geometry;
pub mod image;
pub mod interface;
pub mod status;
pub mod storage;
pub mod stream;
pub mod types;
mod util;

/// The size of a logical sector, and of a block on the backing device.
pub const SECTOR_SIZE: usize = 512;
/// The number of sector buffers in the cache. Two sides of the longest GCR track.
pub const BUFFER_COUNT: usize = 24;
/// The number of tracks per side on every supported disk.
pub const TRACK_COUNT: u8 = 80;

/// A single sector's payload.
pub type SectorData = [u8; SECTOR_SIZE];

pub use crate::{
    cache::SectorCache,
    config::EmulatorConfig,
    drive::{DriveEvent, DriveShared, DriveSnapshot},
    emulator::{Emulator, ServiceOutcome},
    error::{DriveError, IncompleteCause, StorageError, WriteFault, WriteFaultKind},
    geometry::TrackGeometry,
    image::{DiskImageKind, MountedImage},
    types::{BufferFlags, DriveEncoding, SectorAddress, StepDirection},
};

pub mod prelude {
    pub use crate::{
        codec::{gcr, mfm, CrcCcitt},
        interface::DriveInterface,
        status::StatusDisplay,
        storage::{BlockDevice, BlockExtent},
        DiskImageKind,
        DriveEncoding,
        DriveError,
        DriveEvent,
        DriveShared,
        Emulator,
        SectorAddress,
        ServiceOutcome,
        StepDirection,
        TrackGeometry,
        SECTOR_SIZE,
    };
}
