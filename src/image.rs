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
//! Disk image detection and mounting.
//!
//! Two container types are supported, each in three sizes:
//!
//! * Raw sector images, identified purely by size: 400K (GCR, single sided), 800K (GCR, double
//!   sided) and 1440K (MFM, double sided).
//! * DiskCopy 4.2 images, which prefix the same sector data with an 84 byte header. The header is
//!   not block aligned, so every sector of a DiskCopy image straddles two blocks of the backing
//!   device. DiskCopy images are always mounted read-only.

use crate::{
    storage::{BlockDevice, BlockExtent},
    types::{ControllerConfig, DriveEncoding},
    util::read_pascal_string,
    DriveError,
    SectorData,
    SECTOR_SIZE,
};
use binrw::{binrw, BinRead};
use std::{
    fmt::{self, Display, Formatter},
    io::Cursor,
};

/// The size of the DiskCopy 4.2 header, and the offset of the first sector within the image.
pub const DISKCOPY_HEADER_LEN: usize = 0x54;
pub const DISKCOPY_MAGIC: u16 = 0x0100;
/// Offset of the volume name within the sector data (block 2 of an HFS/MFS volume).
pub const VOLUME_NAME_OFFSET: usize = 0x424;
/// The longest volume name that is displayed.
pub const VOLUME_NAME_MAX: usize = 21;

const KB: u64 = 1024;

#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct DiskCopyHeader {
    pub name: [u8; 64],
    pub data_size: u32,
    pub tag_size: u32,
    pub data_checksum: u32,
    pub tag_checksum: u32,
    pub disk_format: u8,
    pub format_byte: u8,
    pub magic: u16,
}

impl DiskCopyHeader {
    /// The size of the sector data in KiB. Only the low 24 bits of the size field are significant.
    pub fn data_kb(&self) -> u64 {
        (self.data_size & 0x00FF_FFFF) as u64 / KB
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiskImageKind {
    Raw400K,
    Raw800K,
    Raw1440K,
    DiskCopy400K,
    DiskCopy800K,
    DiskCopy1440K,
}

impl Display for DiskImageKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let container = if self.is_diskcopy() { "DiskCopy" } else { "raw" };
        write!(f, "{}K {} image", self.size_kb(), container)
    }
}

impl DiskImageKind {
    pub fn size_kb(&self) -> u64 {
        use DiskImageKind::*;
        match self {
            Raw400K | DiskCopy400K => 400,
            Raw800K | DiskCopy800K => 800,
            Raw1440K | DiskCopy1440K => 1440,
        }
    }

    pub fn is_diskcopy(&self) -> bool {
        matches!(
            self,
            DiskImageKind::DiskCopy400K | DiskImageKind::DiskCopy800K | DiskImageKind::DiskCopy1440K
        )
    }

    pub fn encoding(&self) -> DriveEncoding {
        match self.size_kb() {
            1440 => DriveEncoding::Mfm,
            _ => DriveEncoding::Gcr,
        }
    }

    pub fn sides(&self) -> u8 {
        match self.size_kb() {
            400 => 1,
            _ => 2,
        }
    }

    /// The byte offset of the first sector within the image.
    pub fn data_offset(&self) -> usize {
        if self.is_diskcopy() {
            DISKCOPY_HEADER_LEN
        }
        else {
            0
        }
    }

    fn raw_from_kb(kb: u64) -> Option<Self> {
        match kb {
            400 => Some(DiskImageKind::Raw400K),
            800 => Some(DiskImageKind::Raw800K),
            1440 => Some(DiskImageKind::Raw1440K),
            _ => None,
        }
    }

    fn diskcopy_from_kb(kb: u64) -> Option<Self> {
        match kb {
            400 => Some(DiskImageKind::DiskCopy400K),
            800 => Some(DiskImageKind::DiskCopy800K),
            1440 => Some(DiskImageKind::DiskCopy1440K),
            _ => None,
        }
    }

    /// Identify an image from its total size and first block.
    pub fn detect(size: u64, first_block: &SectorData) -> Option<Self> {
        if size % KB == 0 {
            if let Some(kind) = Self::raw_from_kb(size / KB) {
                return Some(kind);
            }
        }
        if size <= 400 * KB || size >= 1500 * KB {
            return None;
        }
        let header = DiskCopyHeader::read(&mut Cursor::new(&first_block[..])).ok()?;
        if header.magic != DISKCOPY_MAGIC {
            log::debug!("detect(): bad DiskCopy magic {:04X}", header.magic);
            return None;
        }
        Self::diskcopy_from_kb(header.data_kb())
    }
}

/// An image mounted from a [BlockDevice].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountedImage {
    kind: DiskImageKind,
    extent: BlockExtent,
    read_only: bool,
    volume_name: String,
}

impl MountedImage {
    /// Detect and mount the image occupying the device's contiguous extent.
    pub fn mount<D: BlockDevice + ?Sized>(device: &mut D) -> Result<Self, DriveError> {
        let extent = device.contiguous_range()?.ok_or(DriveError::ImageNotContiguous)?;

        let mut first = [0u8; SECTOR_SIZE];
        device.read_block(extent.first, &mut first)?;
        let kind = DiskImageKind::detect(extent.byte_len(), &first).ok_or(DriveError::UnknownImage)?;

        let read_only = kind.is_diskcopy() || device.write_protected();
        let volume_name = Self::read_volume_name(device, extent, kind)?;

        log::debug!(
            "mount(): {} at blocks {}-{}, {} sides, read_only: {} volume: {:?}",
            kind,
            extent.first,
            extent.last,
            kind.sides(),
            read_only,
            volume_name
        );

        Ok(Self {
            kind,
            extent,
            read_only,
            volume_name,
        })
    }

    fn read_volume_name<D: BlockDevice + ?Sized>(
        device: &mut D,
        extent: BlockExtent,
        kind: DiskImageKind,
    ) -> Result<String, DriveError> {
        let offset = kind.data_offset() + VOLUME_NAME_OFFSET;
        let block = extent.first + (offset / SECTOR_SIZE) as u32;

        // The name may straddle a block boundary, so read two blocks where available.
        let mut window = vec![0u8; SECTOR_SIZE * 2];
        let mut buf = [0u8; SECTOR_SIZE];
        device.read_block(block, &mut buf)?;
        window[..SECTOR_SIZE].copy_from_slice(&buf);
        if extent.contains(block + 1) {
            device.read_block(block + 1, &mut buf)?;
            window[SECTOR_SIZE..].copy_from_slice(&buf);
        }

        let mut cursor = Cursor::new(window);
        read_pascal_string(&mut cursor, (offset % SECTOR_SIZE) as u64, VOLUME_NAME_MAX)
            .map_err(|e| DriveError::Storage(e.into()))
    }

    pub fn kind(&self) -> DiskImageKind {
        self.kind
    }

    pub fn encoding(&self) -> DriveEncoding {
        self.kind.encoding()
    }

    pub fn sides(&self) -> u8 {
        self.kind.sides()
    }

    pub fn extent(&self) -> BlockExtent {
        self.extent
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    /// The configuration byte handed to the drive interface controller on insert.
    pub fn controller_config(&self) -> ControllerConfig {
        let mut config = ControllerConfig::empty();
        config.set(ControllerConfig::WRITABLE, !self.read_only);
        config.set(ControllerConfig::GCR, !self.encoding().is_mfm());
        config
    }

    /// The absolute device block holding logical sector block `index`.
    pub fn block(&self, index: u32) -> u32 {
        self.extent.first + index
    }

    /// Read logical sector block `index` into `buf`.
    pub fn read_sector<D: BlockDevice + ?Sized>(
        &self,
        device: &mut D,
        index: u32,
        buf: &mut SectorData,
    ) -> Result<(), DriveError> {
        let block = self.block(index);
        if !self.kind.is_diskcopy() {
            device.read_block(block, buf)?;
            return Ok(());
        }

        // The sector starts DISKCOPY_HEADER_LEN bytes into `block` and ends in the next one.
        let split = SECTOR_SIZE - DISKCOPY_HEADER_LEN;
        let mut scratch = [0u8; SECTOR_SIZE];
        device.read_start(block)?;
        device.read_data(&mut scratch)?;
        buf[..split].copy_from_slice(&scratch[DISKCOPY_HEADER_LEN..]);
        device.read_data(&mut scratch)?;
        buf[split..].copy_from_slice(&scratch[..DISKCOPY_HEADER_LEN]);
        device.read_stop()?;
        Ok(())
    }
}
