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
//! Defines common enum types

use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// The on-wire sector encoding of the mounted disk.
/// * Gcr: Apple 6-and-2 Group Code Recording, used by 400K and 800K Macintosh diskettes.
///   Tracks are divided into five speed zones with 12 down to 8 sectors per track.
/// * Mfm: Modified Frequency Modulation, used by 1.44MB diskettes. Every track holds 18 sectors.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveEncoding {
    #[default]
    #[doc = "Apple 6-and-2 Group Code Recording"]
    Gcr,
    #[doc = "Modified Frequency Modulation"]
    Mfm,
}

impl DriveEncoding {
    pub fn is_mfm(&self) -> bool {
        matches!(self, DriveEncoding::Mfm)
    }
}

impl Display for DriveEncoding {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DriveEncoding::Gcr => write!(f, "GCR"),
            DriveEncoding::Mfm => write!(f, "MFM"),
        }
    }
}

/// The direction of a head step request, as sampled from the step direction line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepDirection {
    /// Towards track 0.
    Out,
    /// Towards the hub.
    In,
}

/// The level transition of the write clock line that produced a write tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickEdge {
    Falling,
    Rising,
}

impl From<bool> for TickEdge {
    fn from(level: bool) -> Self {
        match level {
            false => TickEdge::Falling,
            true => TickEdge::Rising,
        }
    }
}

/// What the drive is doing, as shown on the status line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DriveActivity {
    Read,
    Write,
    Idle,
}

impl Display for DriveActivity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DriveActivity::Read => write!(f, " Read"),
            DriveActivity::Write => write!(f, "Write"),
            DriveActivity::Idle => write!(f, " Idle"),
        }
    }
}
