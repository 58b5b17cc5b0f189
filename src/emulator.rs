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

    src/emulator.rs

    The emulator context and main loop.
*/
//! The emulator context and its main sequencing loop.
//!
//! [Emulator] owns the collaborators that live in main-loop context (block device, drive
//! interface, status display) and shares a [DriveShared] with the interrupt side. Each call to
//! [Emulator::service] is one pass of the main loop: report any pending write fault, take a
//! snapshot of the head position, flush the previous track if the head moved, then stream
//! sectors of the current track in interleave order until a restart is posted.

use crate::{
    config::EmulatorConfig,
    drive::{DriveShared, DriveSnapshot},
    flush::{FlushController, FlushOutcome},
    image::MountedImage,
    interface::DriveInterface,
    status::StatusDisplay,
    storage::BlockDevice,
    stream::{StreamOutcome, StreamingEngine},
    types::{BufferFlags, DriveActivity, DriveEncoding, SectorAddress},
    DriveError,
};
use std::sync::Arc;

/// The result of one pass of the main loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// No disk is inserted.
    NoDisk,
    /// The host is writing; the interrupt side does all the work until a restart.
    Writing,
    /// Streaming was interrupted by a step, side or write mode change.
    Restarted,
    /// The host ejected the disk.
    Ejected,
}

pub struct Emulator<D, I, S> {
    shared: Arc<DriveShared>,
    engine: StreamingEngine,
    device: D,
    iface: I,
    display: S,
    image: Option<MountedImage>,
    prev_track: u8,
    prev_side: u8,
    flutter: u16,
    led: bool,
    writing: bool,
    motor_on: Option<bool>,
}

impl<D, I, S> Emulator<D, I, S>
where
    D: BlockDevice,
    I: DriveInterface,
    S: StatusDisplay,
{
    pub fn new(config: EmulatorConfig, device: D, iface: I, display: S) -> Self {
        let shared = Arc::new(DriveShared::new(&config));
        Self::with_shared(config, shared, device, iface, display)
    }

    /// Create an emulator around existing shared state, for interfaces that need a handle to
    /// it before the emulator exists.
    pub fn with_shared(config: EmulatorConfig, shared: Arc<DriveShared>, device: D, iface: I, display: S) -> Self {
        Self {
            shared,
            engine: StreamingEngine::new(config),
            device,
            iface,
            display,
            image: None,
            prev_track: 0,
            prev_side: 0,
            flutter: 0,
            led: false,
            writing: false,
            motor_on: None,
        }
    }

    /// A handle for delivering host events from interrupt context.
    pub fn shared(&self) -> Arc<DriveShared> {
        self.shared.clone()
    }

    pub fn image(&self) -> Option<&MountedImage> {
        self.image.as_ref()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn interface(&self) -> &I {
        &self.iface
    }

    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.iface
    }

    pub fn display(&self) -> &S {
        &self.display
    }

    pub fn engine(&self) -> &StreamingEngine {
        &self.engine
    }

    /// Give back the block device, discarding any unflushed sectors.
    pub fn into_device(self) -> D {
        self.device
    }

    /// Return to the power-on state with no disk inserted.
    pub fn reset(&mut self) {
        self.shared.reset();
        self.image = None;
        self.prev_track = 0;
        self.prev_side = 0;
        self.flutter = 0;
        self.writing = false;
        self.motor_on = None;
        self.iface.set_track0(self.shared.at_track0());
    }

    /// Mount the image on the block device and present it to the host. Sectors the host wrote
    /// to a disk that is already mounted are flushed first.
    pub fn insert(&mut self) -> Result<&MountedImage, DriveError> {
        self.flush_track(self.prev_track)?;
        self.reset();
        let image = MountedImage::mount(&mut self.device)?;

        self.shared.insert(image.encoding(), image.sides(), image.read_only());
        self.iface.insert_disk(image.controller_config());
        self.iface.set_tach(self.shared.tach_half_period());
        self.display.disk_inserted(&image);

        Ok(self.image.insert(image))
    }

    /// Flush the current track and remove the disk.
    pub fn eject(&mut self) -> Result<(), DriveError> {
        self.iface.remove_disk();
        self.shared.remove();
        let track = self.shared.track();
        let result = self.flush_track(track);
        self.reset();
        self.display.disk_ejected();
        result.map(|_| ())
    }

    /// Write back any dirty sectors of the current track.
    pub fn flush(&mut self) -> Result<FlushOutcome, DriveError> {
        let track = self.shared.track();
        self.flush_track(track)
    }

    fn flush_track(&mut self, track: u8) -> Result<FlushOutcome, DriveError> {
        let Some(image) = &self.image
        else {
            return Ok(FlushOutcome::Clean);
        };
        let outcome = FlushController::flush(&self.shared, image, &mut self.device, track)?;
        if let Some(message) = outcome.message() {
            self.display.message(&message);
        }
        Ok(outcome)
    }

    /// One pass of the main loop.
    pub fn service(&mut self) -> Result<ServiceOutcome, DriveError> {
        if let Some(fault) = self.shared.take_fault() {
            // A rejected write leaves the cache in an unknown state. Drop the disk.
            self.iface.remove_disk();
            if self.writing {
                self.led = false;
                self.iface.set_led(false);
            }
            self.reset();
            self.display.write_error(&fault);
            return Err(DriveError::Write(fault));
        }

        let snapshot = self.shared.snapshot();
        if self.image.is_none() || !self.shared.inserted() {
            return Ok(ServiceOutcome::NoDisk);
        }
        self.display.position(snapshot.track, snapshot.side);

        let mfm = self.shared.encoding().is_mfm();
        if self.prev_track != snapshot.track || (mfm && self.prev_side != snapshot.side) {
            // MFM caches one side at a time, so a side change also changes the cached track.
            self.flush_track(self.prev_track)?;
            self.prev_track = snapshot.track;
            self.prev_side = snapshot.side;
            self.shared.cache().invalidate_all();

            // A step may have crossed into another speed zone.
            self.iface.set_track0(snapshot.track == 0);
            self.iface
                .set_tach(self.shared.tach_half_period().saturating_sub(self.flutter));
        }

        if self.shared.write_mode() {
            // The LED stays lit for as long as the host writes.
            if !self.writing {
                self.writing = true;
                self.led = true;
                self.iface.set_led(true);
            }
            self.display.activity(DriveActivity::Write);
            return Ok(ServiceOutcome::Writing);
        }
        if self.writing {
            self.writing = false;
            self.led = false;
            self.iface.set_led(false);
        }

        self.stream_track(snapshot)
    }

    /// Run the main loop until `stop` returns true for an outcome or an error occurs. The error
    /// is shown on the display before it is returned.
    pub fn run_until<F>(&mut self, mut stop: F) -> Result<(), DriveError>
    where
        F: FnMut(ServiceOutcome) -> bool,
    {
        loop {
            match self.service() {
                Ok(outcome) => {
                    if stop(outcome) {
                        return Ok(());
                    }
                }
                Err(e) => {
                    // Write faults were already shown by service().
                    if !e.is_write_fault() {
                        self.display.fatal(&e);
                    }
                    return Err(e);
                }
            }
        }
    }

    fn stream_track(&mut self, snapshot: DriveSnapshot) -> Result<ServiceOutcome, DriveError> {
        let geometry = self.shared.geometry(snapshot.track);
        let sides = self.shared.sides();
        let encoding = self.shared.encoding();

        // Stepping to a track with fewer sectors can leave the cursor out of range.
        let mut sector = self.shared.sector();
        if sector >= geometry.sector_count() {
            sector = 0;
            self.shared.set_sector(0);
        }

        loop {
            if self.shared.restart_pending() {
                return Ok(ServiceOutcome::Restarted);
            }

            if self.iface.eject_requested() {
                log::debug!("stream_track(): eject requested");
                self.eject()?;
                return Ok(ServiceOutcome::Ejected);
            }

            let motor_on = self.iface.motor_on();
            if !motor_on {
                self.flush_track(snapshot.track)?;
            }
            if self.motor_on != Some(motor_on) {
                self.motor_on = Some(motor_on);
                if motor_on {
                    self.display.activity(DriveActivity::Read);
                }
                else {
                    self.display.activity(DriveActivity::Idle);
                    self.led = false;
                    self.iface.set_led(false);
                }
            }

            let slot = geometry.slot(snapshot.side, sector);
            if self.shared.cache().try_claim_for_read(slot) {
                let image = self.image.as_ref().ok_or(DriveError::NoDisk)?;
                let block = geometry.sector_block(sides, snapshot.side, sector);
                let result = image.read_sector(&mut self.device, block, &mut self.shared.cache().data_mut(slot));
                if let Err(e) = result {
                    self.shared.cache().release(slot);
                    return Err(e);
                }
                self.shared.cache().commit_read(slot);
            }

            if sector == 0 {
                if motor_on {
                    self.led = !self.led;
                    self.iface.set_led(self.led);
                }
                self.flutter = self.engine.config().next_flutter(self.flutter);
                self.iface
                    .set_tach(self.shared.tach_half_period().saturating_sub(self.flutter));
            }

            let flags = self.shared.cache().flags(slot);
            if flags.contains(BufferFlags::DATA_VALID) && !flags.contains(BufferFlags::LOCKED) {
                let data = *self.shared.cache().data(slot);
                let address = SectorAddress::new(snapshot.track, snapshot.side, sector);
                let outcome = self.stream_sector(encoding, address, sides, &data);
                if let StreamOutcome::Restarted { phase, sent } = outcome {
                    log::trace!("stream_track(): {} restarted in {:?} after {}", address, phase, sent);
                    return Ok(ServiceOutcome::Restarted);
                }
            }
            else {
                log::trace!("stream_track(): slot {} busy ({:?}), skipping", slot, flags);
            }

            sector = geometry.next_interleaved_sector(sector);
            self.shared.set_sector(sector);
        }
    }

    fn stream_sector(
        &mut self,
        encoding: DriveEncoding,
        address: SectorAddress,
        sides: u8,
        data: &crate::SectorData,
    ) -> StreamOutcome {
        self.engine
            .stream_sector(&mut self.iface, &self.shared, encoding, address, sides, data)
    }
}
