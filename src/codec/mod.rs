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
//! Sector codecs for the two on-wire encodings spoken to the host.
//!
//! * [gcr] implements the Apple 6-and-2 group code: three payload bytes become four disk bytes,
//!   each drawn from a 64-entry alphabet of bit patterns the drive hardware can record.
//! * [mfm] implements the byte framing of IBM System 34 style MFM sectors as presented to the
//!   drive interface controller, which performs the actual clock-bit insertion.
//!
//! Both codecs are free of I/O. Encoders are iterators, so the streaming engine can poll for
//! a restart between any two bytes; decoders are fed one byte at a time, so the write capture
//! state machine can run them from a clock-edge handler.

pub mod crc;
pub mod gcr;
pub mod mfm;

pub use crc::CrcCcitt;
