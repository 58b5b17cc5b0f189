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

    src/drive.rs

    State shared between the interrupt handlers and the main loop.
*/
//! State shared between the drive interface's interrupt handlers and the main loop.
//!
//! Host signal transitions are delivered as [DriveEvent]s to [DriveShared::dispatch], which
//! plays the role of the interrupt handlers. Dispatch runs under one critical section (the
//! `isr` lock), so handlers never interleave with each other or with the main loop's
//! snapshot of the track and side. Fields the main loop polls without the critical section
//! are atomics.
//!
//! Lock order is `isr`, then the cache flags.

use crate::{
    cache::SectorCache,
    capture::{CaptureContext, CaptureStatus, WriteCapture},
    config::EmulatorConfig,
    geometry::TrackGeometry,
    types::{DriveEncoding, StepDirection, TickEdge},
    util::critical,
    IncompleteCause,
    WriteFault,
    WriteFaultKind,
    TRACK_COUNT,
};
use std::sync::{
    atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering},
    Mutex,
};

/// A host signal transition, as seen by the interrupt handlers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DriveEvent {
    /// The step request line was asserted.
    StepRequest(StepDirection),
    /// The side select line changed.
    SideSelect(u8),
    /// The write request line changed. `tick_level` is the write tick line at that moment.
    WriteRequest { active: bool, tick_level: bool },
    /// The write tick line changed, with the data bus sampled at the transition.
    WriteTick { level: bool, data: u8 },
}

/// State private to interrupt context.
struct IsrState {
    capture: WriteCapture,
    tick_level: bool,
}

/// A consistent view of the head position, taken by the main loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DriveSnapshot {
    pub track: u8,
    pub side: u8,
}

pub struct DriveShared {
    isr: Mutex<IsrState>,
    cache: SectorCache,
    track: AtomicU8,
    side: AtomicU8,
    sector: AtomicU8,
    sides: AtomicU8,
    mfm: AtomicBool,
    read_only: AtomicBool,
    inserted: AtomicBool,
    write_mode: AtomicBool,
    restart: AtomicBool,
    write_track: AtomicU8,
    write_side: AtomicU8,
    tach_half_period: AtomicU16,
    fault: Mutex<Option<WriteFault>>,
    cpu_clock_hz: u32,
}

impl DriveShared {
    pub fn new(config: &EmulatorConfig) -> Self {
        let shared = Self {
            isr: Mutex::new(IsrState {
                capture: WriteCapture::new(),
                tick_level: false,
            }),
            cache: SectorCache::new(),
            track: AtomicU8::new(0),
            side: AtomicU8::new(0),
            sector: AtomicU8::new(0),
            sides: AtomicU8::new(2),
            mfm: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
            inserted: AtomicBool::new(false),
            write_mode: AtomicBool::new(false),
            restart: AtomicBool::new(false),
            write_track: AtomicU8::new(0),
            write_side: AtomicU8::new(0),
            tach_half_period: AtomicU16::new(0),
            fault: Mutex::new(None),
            cpu_clock_hz: config.cpu_clock_hz,
        };
        shared.update_tach(0);
        shared
    }

    /// Return to the power-on state: no disk, head at track 0, every buffer empty.
    pub fn reset(&self) {
        let mut isr = critical(&self.isr);
        isr.capture.reset();
        isr.tick_level = false;
        self.track.store(0, Ordering::SeqCst);
        self.side.store(0, Ordering::SeqCst);
        self.sector.store(0, Ordering::SeqCst);
        self.sides.store(2, Ordering::SeqCst);
        self.mfm.store(false, Ordering::SeqCst);
        self.read_only.store(false, Ordering::SeqCst);
        self.inserted.store(false, Ordering::SeqCst);
        self.write_mode.store(false, Ordering::SeqCst);
        self.restart.store(false, Ordering::SeqCst);
        self.write_track.store(0, Ordering::SeqCst);
        self.write_side.store(0, Ordering::SeqCst);
        *critical(&self.fault) = None;
        self.cache.reset();
        self.update_tach(0);
    }

    /// Record a newly inserted disk.
    pub fn insert(&self, encoding: DriveEncoding, sides: u8, read_only: bool) {
        let _isr = critical(&self.isr);
        self.mfm.store(encoding.is_mfm(), Ordering::SeqCst);
        self.sides.store(sides, Ordering::SeqCst);
        self.read_only.store(read_only, Ordering::SeqCst);
        self.inserted.store(true, Ordering::SeqCst);
    }

    /// Mark the disk as removed. The main loop resets the rest of the state once it flushed.
    pub fn remove(&self) {
        self.inserted.store(false, Ordering::SeqCst);
    }

    pub fn cache(&self) -> &SectorCache {
        &self.cache
    }

    pub fn track(&self) -> u8 {
        self.track.load(Ordering::SeqCst)
    }

    pub fn side(&self) -> u8 {
        self.side.load(Ordering::SeqCst)
    }

    /// The sector cursor of the streaming engine.
    pub fn sector(&self) -> u8 {
        self.sector.load(Ordering::SeqCst)
    }

    pub fn set_sector(&self, sector: u8) {
        self.sector.store(sector, Ordering::SeqCst);
    }

    pub fn sides(&self) -> u8 {
        self.sides.load(Ordering::SeqCst)
    }

    pub fn encoding(&self) -> DriveEncoding {
        if self.mfm.load(Ordering::SeqCst) {
            DriveEncoding::Mfm
        }
        else {
            DriveEncoding::Gcr
        }
    }

    pub fn read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    pub fn inserted(&self) -> bool {
        self.inserted.load(Ordering::SeqCst)
    }

    pub fn write_mode(&self) -> bool {
        self.write_mode.load(Ordering::SeqCst)
    }

    pub fn at_track0(&self) -> bool {
        self.track() == 0
    }

    pub fn geometry(&self, track: u8) -> TrackGeometry {
        TrackGeometry::new(self.encoding(), track)
    }

    /// The track and side of the most recent write capture.
    pub fn last_write(&self) -> (u8, u8) {
        (
            self.write_track.load(Ordering::SeqCst),
            self.write_side.load(Ordering::SeqCst),
        )
    }

    pub fn tach_half_period(&self) -> u16 {
        self.tach_half_period.load(Ordering::SeqCst)
    }

    fn update_tach(&self, track: u8) {
        let period = TrackGeometry::new(DriveEncoding::Gcr, track).tach_half_period(self.cpu_clock_hz);
        self.tach_half_period.store(period, Ordering::SeqCst);
    }

    /// Whether an in-progress stream must unwind to the sequencing loop.
    #[inline]
    pub fn restart_pending(&self) -> bool {
        self.restart.load(Ordering::SeqCst)
    }

    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::SeqCst);
    }

    /// Capture the track and side together and acknowledge any pending restart.
    pub fn snapshot(&self) -> DriveSnapshot {
        let _isr = critical(&self.isr);
        self.restart.store(false, Ordering::SeqCst);
        DriveSnapshot {
            track: self.track(),
            side: self.side(),
        }
    }

    /// Take the pending write fault, if any.
    pub fn take_fault(&self) -> Option<WriteFault> {
        critical(&self.fault).take()
    }

    /// Whether a write capture has received enough of a data field to be in progress.
    pub fn capture_in_progress(&self) -> bool {
        critical(&self.isr).capture.in_progress()
    }

    /// Handle one host signal transition.
    pub fn dispatch(&self, event: DriveEvent) {
        let mut isr = critical(&self.isr);
        match event {
            DriveEvent::StepRequest(direction) => self.on_step(&mut isr, direction),
            DriveEvent::SideSelect(side) => self.on_side(&mut isr, side),
            DriveEvent::WriteRequest { active, tick_level } => self.on_write_request(&mut isr, active, tick_level),
            DriveEvent::WriteTick { level, data } => self.on_write_tick(&mut isr, level, data),
        }
    }

    fn on_step(&self, isr: &mut IsrState, direction: StepDirection) {
        let track = self.track();

        // Lock the outgoing track's dirty span so a write for the new track cannot land in a
        // buffer before the old contents are flushed.
        let limit = self.geometry(track).slot_limit();
        if let Some(span) = self.cache.lock_dirty_span(limit) {
            log::trace!("on_step(): locked dirty span {:?} of track {}", span, track);
        }

        let new_track = match direction {
            StepDirection::Out => track.saturating_sub(1),
            StepDirection::In => std::cmp::min(track + 1, TRACK_COUNT - 1),
        };
        self.track.store(new_track, Ordering::SeqCst);
        self.update_tach(new_track);

        self.check_incomplete(isr, IncompleteCause::Step);
        self.request_restart();
    }

    fn on_side(&self, isr: &mut IsrState, side: u8) {
        if side == self.side() {
            return;
        }
        let side = if self.sides() == 2 { side & 0x01 } else { 0 };
        self.side.store(side, Ordering::SeqCst);
        self.request_restart();
        self.check_incomplete(isr, IncompleteCause::SideChange);
    }

    fn on_write_request(&self, isr: &mut IsrState, active: bool, tick_level: bool) {
        if active == self.write_mode() {
            return;
        }
        self.write_mode.store(active, Ordering::SeqCst);
        if active {
            isr.tick_level = tick_level;
            isr.capture.reset();
        }
        else {
            self.check_incomplete(isr, IncompleteCause::WriteModeChange);
        }
        self.request_restart();
    }

    fn on_write_tick(&self, isr: &mut IsrState, level: bool, data: u8) {
        if !self.write_mode() || level == isr.tick_level {
            return;
        }
        isr.tick_level = level;

        let track = self.track();
        let ctx = CaptureContext {
            cache: &self.cache,
            geometry: self.geometry(track),
            side: self.side(),
            sector: self.sector(),
            read_only: self.read_only(),
        };
        let result = if self.mfm.load(Ordering::SeqCst) {
            isr.capture.mfm_tick(TickEdge::from(level), data, &ctx)
        }
        else {
            isr.capture.gcr_byte(data & 0x7F, &ctx)
        };

        match result {
            Ok(CaptureStatus::Claimed { slot, sector }) => {
                self.write_track.store(track, Ordering::SeqCst);
                self.write_side.store(ctx.side, Ordering::SeqCst);
                log::trace!("on_write_tick(): receiving sector {} into slot {}", sector, slot);
            }
            Ok(CaptureStatus::Committed { slot }) => {
                log::trace!("on_write_tick(): committed slot {}", slot);
            }
            Ok(_) => {}
            Err(fault) => self.write_error(isr, fault),
        }
    }

    fn check_incomplete(&self, isr: &mut IsrState, cause: IncompleteCause) {
        if isr.capture.in_progress() {
            let received = isr.capture.received();
            self.write_error(isr, WriteFaultKind::Incomplete { cause, received }.into());
        }
    }

    /// Abandon write mode and post a fault for the main loop.
    fn write_error(&self, isr: &mut IsrState, fault: WriteFault) {
        log::warn!("write_error(): {} ({})", fault, fault.code());
        self.write_mode.store(false, Ordering::SeqCst);
        self.request_restart();
        isr.capture.reset();
        let mut pending = critical(&self.fault);
        // The first fault is the cause; later ones are consequences of it.
        if pending.is_none() {
            *pending = Some(fault);
        }
    }
}
