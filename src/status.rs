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
//! The operator status display.

use crate::{image::MountedImage, types::DriveActivity, DriveError, WriteFault};

/// Receives everything the emulator reports to the operator. Only [StatusDisplay::message]
/// and [StatusDisplay::fatal] are required; the remaining calls update optional fields.
pub trait StatusDisplay {
    /// Show a line on the status row, replacing the previous one.
    fn message(&mut self, text: &str);

    /// Show an unrecoverable error. The emulator stops after this call.
    fn fatal(&mut self, error: &DriveError);

    fn disk_inserted(&mut self, _image: &MountedImage) {}

    fn disk_ejected(&mut self) {}

    fn position(&mut self, _track: u8, _side: u8) {}

    fn activity(&mut self, _activity: DriveActivity) {}

    /// Report a rejected host write. The default shows it on the status row.
    fn write_error(&mut self, fault: &WriteFault) {
        self.message(&format!("{} ({})", fault, fault.code()));
    }
}

/// A [StatusDisplay] that writes through the `log` facade.
#[derive(Default)]
pub struct LogDisplay {
    last: Option<String>,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent status line.
    pub fn last_message(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

impl StatusDisplay for LogDisplay {
    fn message(&mut self, text: &str) {
        log::info!("{}", text);
        self.last = Some(text.to_string());
    }

    fn fatal(&mut self, error: &DriveError) {
        log::error!("{}", error);
        self.last = Some(error.to_string());
    }

    fn disk_inserted(&mut self, image: &MountedImage) {
        log::info!(
            "{} \"{}\"{}",
            image.kind(),
            image.volume_name(),
            if image.read_only() { " (locked)" } else { "" }
        );
    }

    fn disk_ejected(&mut self) {
        log::info!("Disk ejected");
    }

    fn position(&mut self, track: u8, side: u8) {
        log::debug!("Track {:02} Side {}", track, side);
    }

    fn activity(&mut self, activity: DriveActivity) {
        log::debug!("{}", activity);
    }

    fn write_error(&mut self, fault: &WriteFault) {
        log::warn!("Write error: {} ({})", fault, fault.code());
        self.last = Some(format!("{} ({})", fault, fault.code()));
    }
}
