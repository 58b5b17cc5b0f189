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
//! Bit flags for sector buffers and the drive interface controller.

use bitflags::bitflags;

bitflags! {
    /// Status bits carried by every slot of the sector buffer cache. The bits are independent;
    /// a slot may be any combination of them.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[rustfmt::skip]
    pub struct BufferFlags: u8 {
        #[doc = "Buffer holds sector data newer than the backing store"]
        const DIRTY         = 0b0000_0001;
        #[doc = "Buffer holds the sector data for the current track"]
        const DATA_VALID    = 0b0000_0010;
        #[doc = "Buffer is owned by an in-progress read, write capture or flush"]
        const LOCKED        = 0b0000_0100;
    }
}

bitflags! {
    /// The configuration byte latched by the drive interface controller when a disk is inserted.
    /// The controller reads it from the data bus while RD_READY is asserted without DISK_IN.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[rustfmt::skip]
    pub struct ControllerConfig: u8 {
        #[doc = "Disk is writable (the controller line is active low write-protect)"]
        const WRITABLE      = 0b0000_0001;
        #[doc = "Disk uses GCR encoding; clear for MFM"]
        const GCR           = 0b0000_0010;
    }
}
