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
//! The drive interface controller.
//!
//! [DriveInterface] is everything the main loop needs from the hardware that sits between the
//! emulator and the host. [HandshakeInterface] implements it over raw [SignalLines], with the
//! byte-ready / acknowledge handshake the controller uses to pace transfers.

use crate::{drive::DriveShared, types::ControllerConfig};
use std::sync::Arc;

pub trait DriveInterface {
    /// Hand one transfer to the controller, blocking until the controller has taken it. GCR
    /// transfers are disk bytes without their high bit; MFM transfers are nibbles or one half
    /// of a sync mark.
    fn send(&mut self, transfer: u8);
    /// Whether the host asked to eject the disk.
    fn eject_requested(&mut self) -> bool;
    fn motor_on(&mut self) -> bool;
    fn set_led(&mut self, on: bool);
    /// Program the tach timer compare value, in timer ticks per half period.
    fn set_tach(&mut self, half_period: u16);
    /// Drive the track 0 indicator.
    fn set_track0(&mut self, on: bool);
    /// Load the configuration byte and assert disk present.
    fn insert_disk(&mut self, config: ControllerConfig);
    /// Deassert disk present.
    fn remove_disk(&mut self);
}

/// The raw controller lines.
pub trait SignalLines {
    /// Drive the seven bit data bus.
    fn set_data(&mut self, value: u8);
    /// Set the read-ready line. While the disk is present this flags a valid byte on the bus;
    /// without a disk it latches the bus as the configuration byte.
    fn set_ready(&mut self, state: bool);
    /// Sample the read acknowledge line.
    fn ack(&mut self) -> bool;
    fn set_disk_in(&mut self, state: bool);
    fn eject_request(&mut self) -> bool;
    fn motor_on(&mut self) -> bool;
    fn set_led(&mut self, on: bool);
    fn set_tach_compare(&mut self, ticks: u16);
    fn set_track0(&mut self, state: bool);
}

/// A [DriveInterface] that paces transfers with the controller's handshake: present the byte
/// and raise ready, wait for acknowledge to rise and then fall, drop ready.
///
/// The waits have no timeout, as the host protocol has none. A pending restart ends the wait
/// early, since the transfer will be abandoned anyway.
pub struct HandshakeInterface<L> {
    lines: L,
    shared: Arc<DriveShared>,
    led: bool,
}

impl<L: SignalLines> HandshakeInterface<L> {
    pub fn new(lines: L, shared: Arc<DriveShared>) -> Self {
        Self {
            lines,
            shared,
            led: false,
        }
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    fn wait_ack(&mut self, level: bool) -> bool {
        while self.lines.ack() != level {
            if self.shared.restart_pending() {
                return false;
            }
            std::hint::spin_loop();
        }
        true
    }
}

impl<L: SignalLines> DriveInterface for HandshakeInterface<L> {
    fn send(&mut self, transfer: u8) {
        // The bus belongs to the controller while the host writes.
        if self.shared.write_mode() {
            return;
        }
        self.lines.set_data(transfer & 0x7F);
        self.lines.set_ready(true);
        if self.wait_ack(true) {
            self.wait_ack(false);
        }
        self.lines.set_ready(false);
    }

    fn eject_requested(&mut self) -> bool {
        self.lines.eject_request()
    }

    fn motor_on(&mut self) -> bool {
        self.lines.motor_on()
    }

    fn set_led(&mut self, on: bool) {
        self.led = on;
        self.lines.set_led(on);
    }

    fn set_tach(&mut self, half_period: u16) {
        self.lines.set_tach_compare(half_period);
    }

    fn set_track0(&mut self, on: bool) {
        self.lines.set_track0(on);
    }

    fn insert_disk(&mut self, config: ControllerConfig) {
        // Ready without disk-in latches the configuration byte.
        self.lines.set_disk_in(false);
        self.lines.set_data(config.bits());
        self.lines.set_ready(true);
        self.lines.set_ready(false);
        self.lines.set_disk_in(true);
    }

    fn remove_disk(&mut self) {
        self.lines.set_disk_in(false);
    }
}
