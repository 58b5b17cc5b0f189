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
//! Emulator tuning parameters.

/// Gap lengths and timing constants used while streaming. The defaults reproduce what real
/// drives present to the host; the gaps are byte counts of the fill pattern of each encoding
/// (0xFF self-sync bytes for GCR, 0x4E for MFM).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EmulatorConfig {
    /// Self-sync bytes sent before each GCR address field.
    pub gcr_sector_gap: usize,
    /// Self-sync bytes between a GCR address field and its data field.
    pub gcr_address_gap: usize,
    /// Gap bytes sent before each MFM ID field.
    pub mfm_sector_gap: usize,
    /// Gap bytes between an MFM ID field and its data field.
    pub mfm_address_gap: usize,
    /// Zero bytes preceding every MFM sync mark run.
    pub mfm_sync_len: usize,
    /// Clock of the timer that generates the tach signal.
    pub cpu_clock_hz: u32,
    /// Tach period jitter added each revolution. Some early ROMs crash when two successive
    /// speed measurements are identical.
    pub tach_flutter_step: u16,
    pub tach_flutter_limit: u16,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            gcr_sector_gap: 55,
            gcr_address_gap: 10,
            mfm_sector_gap: 50,
            mfm_address_gap: 22,
            mfm_sync_len: 12,
            cpu_clock_hz: 20_000_000,
            tach_flutter_step: 25,
            tach_flutter_limit: 125,
        }
    }
}

impl EmulatorConfig {
    /// The flutter offset that follows `flutter`.
    pub fn next_flutter(&self, flutter: u16) -> u16 {
        let next = flutter + self.tach_flutter_step;
        if next >= self.tach_flutter_limit {
            0
        }
        else {
            next
        }
    }
}
