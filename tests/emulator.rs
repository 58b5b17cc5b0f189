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
mod common;

use common::*;
use sdfloppy::{
    prelude::*,
    types::{BufferFlags, ControllerConfig, DriveActivity},
    IncompleteCause,
    SectorData,
    ServiceOutcome,
    WriteFaultKind,
};

/// Transfers taken by one GCR sector with the default gaps.
const GCR_SECTOR_TRANSFERS: usize = 55 + 10 + 10 + 3 + 1 + 703 + 3;
/// Transfers taken by one MFM sector with the default gaps: two per byte.
const MFM_SECTOR_TRANSFERS: usize = 2 * (62 + 3 + 1 + 4 + 2 + 34 + 3 + 1 + 512 + 2);

fn pattern(seed: u8) -> SectorData {
    let mut data = [0u8; SECTOR_SIZE];
    for (i, b) in data.iter_mut().enumerate() {
        *b = seed.wrapping_mul(31).wrapping_add(i as u8);
    }
    data
}

fn step_in(count: usize) -> HostAction {
    HostAction::Events(vec![DriveEvent::StepRequest(StepDirection::In); count])
}

#[test]
fn test_insert_raw_800k() {
    let mut image = raw_image(800);
    image[0x424] = 8;
    image[0x425..0x42D].copy_from_slice(b"Untitled");

    let mut emu = emulator(image);
    let mounted = emu.insert().unwrap().clone();
    assert_eq!(mounted.kind(), DiskImageKind::Raw800K);
    assert_eq!(mounted.sides(), 2);
    assert!(!mounted.read_only());
    assert_eq!(mounted.volume_name(), "Untitled");

    let host = emu.interface();
    assert_eq!(host.config, Some(ControllerConfig::WRITABLE | ControllerConfig::GCR));
    assert!(host.disk_in);
    assert_eq!(host.tach, vec![(20_000_000 / (2 * 394)) as u16]);
    assert_eq!(emu.display().inserted.as_deref(), Some("Untitled"));
}

#[test]
fn test_insert_rejects_unknown_images() {
    let mut emu = emulator(raw_image(100));
    assert!(matches!(emu.insert(), Err(DriveError::UnknownImage)));
    assert!(emu.image().is_none());

    let mut emu = emulator(Vec::new());
    assert!(matches!(emu.insert(), Err(DriveError::ImageNotContiguous)));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::NoDisk);
}

#[test]
fn test_stream_gcr_track0() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    emu.interface_mut().at(12 * GCR_SECTOR_TRANSFERS, HostAction::Restart);

    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    let host = emu.interface();
    assert_eq!(host.sent.len(), 12 * GCR_SECTOR_TRANSFERS);
    let sectors = decode_gcr_stream(&host.sent);
    let expected: Vec<u8> = TrackGeometry::new(DriveEncoding::Gcr, 0).interleave().collect();
    assert_eq!(sectors.len(), 12);
    for ((address, data), sector) in sectors.iter().zip(expected) {
        assert_eq!(*address, SectorAddress::new(0, 0, sector));
        assert_eq!(*data, block_pattern(sector as u32));
    }

    // One revolution: the LED toggled once, the tach picked up its first flutter step.
    assert_eq!(host.led_changes, 1);
    assert_eq!(host.tach.last(), Some(&((20_000_000 / (2 * 394)) as u16 - 25)));
    assert_eq!(emu.shared().sector(), 0);
}

#[test]
fn test_stream_gcr_side1_and_zone() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    emu.interface_mut().at(1, HostAction::Events(vec![DriveEvent::SideSelect(1)]));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    let start = emu.interface().sent.len();
    emu.interface_mut().after(12 * GCR_SECTOR_TRANSFERS, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    let sectors = decode_gcr_stream(&emu.interface().sent[start..]);
    assert_eq!(sectors.len(), 12);
    for (address, data) in &sectors {
        assert_eq!(address.side(), 1);
        assert_eq!(*data, block_pattern(12 + address.sector() as u32));
    }

    // Track 16 is the first track of zone 1: 11 sectors starting at logical sector 192 per side.
    emu.interface_mut().after(1, step_in(16));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    let start = emu.interface().sent.len();
    emu.interface_mut().after(11 * GCR_SECTOR_TRANSFERS, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    let sectors = decode_gcr_stream(&emu.interface().sent[start..]);
    assert_eq!(sectors.len(), 11);
    for (address, data) in &sectors {
        assert_eq!(address.track(), 16);
        assert_eq!(*data, block_pattern(192 * 2 + 11 + address.sector() as u32));
    }
}

#[test]
fn test_cursor_wraps_on_shorter_track() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    let shared = emu.shared();
    shared.set_sector(11);
    shared.dispatch(DriveEvent::StepRequest(StepDirection::In));
    for _ in 0..63 {
        shared.dispatch(DriveEvent::StepRequest(StepDirection::In));
    }
    assert_eq!(shared.track(), 64);

    emu.interface_mut().at(GCR_SECTOR_TRANSFERS, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    let sectors = decode_gcr_stream(&emu.interface().sent);
    assert_eq!(sectors[0].0, SectorAddress::new(64, 0, 0));
}

#[test]
fn test_gcr_write_flushed_on_step() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    let data = pattern(5);

    emu.interface_mut().at(1, HostAction::Events(gcr_write_events(5, &data)));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    let shared = emu.shared();
    assert!(shared.cache().flags(5).contains(BufferFlags::DIRTY | BufferFlags::DATA_VALID));
    assert_eq!(shared.last_write(), (0, 0));

    emu.interface_mut().after(10, step_in(1));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    assert!(shared.cache().flags(5).contains(BufferFlags::LOCKED));

    emu.interface_mut().after(1, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    assert_eq!(image_block(emu.device(), 5), &data[..]);
    assert_eq!(image_block(emu.device(), 4), &block_pattern(4)[..]);
    assert_eq!(emu.device().stats().write_batches, 1);
    assert_eq!(emu.device().stats().blocks_written, 1);
    assert!(emu.display().messages.iter().any(|m| m.starts_with("Saved trk 00 in ")));
    assert_eq!(shared.cache().flags(5), BufferFlags::empty());
}

#[test]
fn test_idle_flush_reads_back_gaps() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    let writes = [2u8, 3, 5];

    for &sector in &writes {
        emu.interface_mut().after(1, HostAction::Events(gcr_write_events(sector, &pattern(sector))));
        assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    }

    // With the motor off every pass flushes the current track.
    emu.interface_mut().motor = false;
    emu.interface_mut().after(1, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    for sector in 2..=5u32 {
        let expected = if sector == 4 { block_pattern(4) } else { pattern(sector as u8) };
        assert_eq!(image_block(emu.device(), sector), &expected[..]);
    }
    let stats = emu.device().stats();
    assert_eq!(stats.write_batches, 1);
    assert_eq!(stats.blocks_written, 4);

    let display = emu.display();
    assert_eq!(display.activity.last(), Some(&DriveActivity::Idle));
    assert!(!emu.interface().led);
}

#[test]
fn test_read_only_ignores_writes() {
    let mut emu = emulator(diskcopy_image(800));
    let mounted = emu.insert().unwrap().clone();
    assert_eq!(mounted.kind(), DiskImageKind::DiskCopy800K);
    assert!(mounted.read_only());
    assert_eq!(emu.interface().config, Some(ControllerConfig::GCR));

    emu.interface_mut().at(1, HostAction::Events(gcr_write_events(5, &pattern(1))));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    assert!(!emu.shared().cache().flags(5).contains(BufferFlags::DIRTY));
    assert!(emu.display().write_errors.is_empty());

    // DiskCopy sectors straddle device blocks but stream intact.
    emu.interface_mut().after(12 * GCR_SECTOR_TRANSFERS, HostAction::Restart);
    let start = emu.interface().sent.len();
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    let sectors = decode_gcr_stream(&emu.interface().sent[start..]);
    assert!(!sectors.is_empty());
    for (address, data) in &sectors {
        assert_eq!(*data, block_pattern(address.sector() as u32));
    }
    assert_eq!(emu.device().stats().write_batches, 0);
}

#[test]
fn test_checksum_fault_ejects_disk() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();

    let mut events = gcr_write_events(3, &pattern(3));
    // The last tick before write mode ends carries the lane 2 checksum byte.
    let last_tick = events.len() - 2;
    if let DriveEvent::WriteTick { level, data } = events[last_tick] {
        let value = sdfloppy::codec::gcr::decode_disk_byte(data | 0x80).unwrap();
        events[last_tick] = DriveEvent::WriteTick {
            level,
            data: sdfloppy::codec::gcr::encode_6and2(value ^ 0x01) & 0x7F,
        };
    }
    emu.interface_mut().at(1, HostAction::Events(events));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    let fault = match emu.run_until(|_| false) {
        Err(DriveError::Write(fault)) => fault,
        other => panic!("expected a write fault, got {:?}", other),
    };
    assert_eq!(fault.kind, WriteFaultKind::Checksum { lane: 2 });
    assert_eq!(fault.code(), 64);

    let display = emu.display();
    assert_eq!(display.write_errors, vec![fault]);
    assert!(display.fatal.is_none());
    assert!(!emu.interface().disk_in);
    assert!(emu.image().is_none());
    assert_eq!(emu.shared().cache().flags(3), BufferFlags::empty());
    assert_eq!(emu.service().unwrap(), ServiceOutcome::NoDisk);
}

#[test]
fn test_incomplete_write_on_step() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();

    let mut events = gcr_write_events(2, &pattern(2));
    // Write mode on, the prologue, the sector number and 20 bytes of payload.
    events.truncate(1 + 3 + 1 + 20);
    events.push(DriveEvent::StepRequest(StepDirection::In));
    emu.interface_mut().at(1, HostAction::Events(events));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    match emu.service() {
        Err(DriveError::Write(fault)) => {
            assert_eq!(
                fault.kind,
                WriteFaultKind::Incomplete {
                    cause:    IncompleteCause::Step,
                    received: 24,
                }
            );
            assert_eq!(fault.code(), 1024);
        }
        other => panic!("expected an incomplete write, got {:?}", other),
    }
}

#[test]
fn test_write_mode_holds_stream() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    emu.interface_mut().at(
        1,
        HostAction::Events(vec![DriveEvent::WriteRequest {
            active:     true,
            tick_level: false,
        }]),
    );
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    let sent = emu.interface().sent.len();

    assert_eq!(emu.service().unwrap(), ServiceOutcome::Writing);
    assert_eq!(emu.interface().sent.len(), sent);
    assert_eq!(emu.display().activity.last(), Some(&DriveActivity::Write));
}

#[test]
fn test_eject_flushes() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    let data = pattern(7);

    emu.interface_mut().at(1, HostAction::Events(gcr_write_events(7, &data)));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    emu.interface_mut().after(100, HostAction::Eject);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Ejected);
    assert_eq!(image_block(emu.device(), 7), &data[..]);
    assert_eq!(emu.display().ejected, 1);
    assert!(!emu.interface().disk_in);
    assert!(emu.image().is_none());
    assert_eq!(emu.service().unwrap(), ServiceOutcome::NoDisk);
}

#[test]
fn test_tach_flutter() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    emu.interface_mut().at(5 * 12 * GCR_SECTOR_TRANSFERS, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    let base = (20_000_000 / (2 * 394)) as u16;
    let expected: Vec<u16> = [0, 25, 50, 75, 100, 0].iter().map(|f| base - f).collect();
    assert_eq!(emu.interface().tach, expected);
}

#[test]
fn test_tach_follows_step() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    let shared = emu.shared();
    shared.set_sector(5);

    // Track 16 is the first track of the second speed zone.
    for _ in 0..16 {
        shared.dispatch(DriveEvent::StepRequest(StepDirection::In));
    }
    emu.interface_mut().at(1, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    let zone0 = (20_000_000 / (2 * 394)) as u16;
    let zone1 = (20_000_000 / (2 * 429)) as u16;
    assert_eq!(emu.interface().tach, vec![zone0, zone1]);
}

#[test]
fn test_track0_indicator() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    assert_eq!(emu.interface().track0, vec![true]);
    let shared = emu.shared();

    shared.dispatch(DriveEvent::StepRequest(StepDirection::In));
    emu.interface_mut().after(1, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    assert_eq!(emu.interface().track0, vec![true, false]);

    shared.dispatch(DriveEvent::StepRequest(StepDirection::Out));
    emu.interface_mut().after(1, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    assert_eq!(emu.interface().track0, vec![true, false, true]);

    // The head is already against the stop.
    shared.dispatch(DriveEvent::StepRequest(StepDirection::Out));
    emu.interface_mut().after(1, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    assert_eq!(shared.track(), 0);
    assert_eq!(emu.interface().track0, vec![true, false, true]);
}

#[test]
fn test_led_lit_while_writing() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    let shared = emu.shared();
    shared.set_sector(5);
    let data = pattern(5);
    let events = gcr_write_events(5, &data);

    emu.interface_mut().at(1, HostAction::Events(events[..1].to_vec()));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    assert!(!emu.interface().led);

    assert_eq!(emu.service().unwrap(), ServiceOutcome::Writing);
    assert!(emu.interface().led);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Writing);
    assert_eq!(emu.interface().led_changes, 1);

    for event in &events[1..] {
        shared.dispatch(*event);
    }
    assert!(shared.cache().flags(5).contains(BufferFlags::DIRTY));

    shared.set_sector(5);
    emu.interface_mut().after(1, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    assert!(!emu.interface().led);
    assert_eq!(emu.interface().led_changes, 2);
}

#[test]
fn test_reinsert_flushes() {
    let mut emu = emulator(raw_image(800));
    emu.insert().unwrap();
    let data = pattern(5);

    emu.interface_mut().at(1, HostAction::Events(gcr_write_events(5, &data)));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    assert!(emu.shared().cache().flags(5).contains(BufferFlags::DIRTY));

    emu.insert().unwrap();
    assert_eq!(image_block(emu.device(), 5), &data[..]);
    assert!(emu.display().messages.iter().any(|m| m.starts_with("Saved trk 00 in ")));
    assert_eq!(emu.shared().cache().flags(5), BufferFlags::empty());
}

#[test]
fn test_stream_mfm_track0() {
    let mut emu = emulator(raw_image(1440));
    let mounted = emu.insert().unwrap().clone();
    assert_eq!(mounted.kind(), DiskImageKind::Raw1440K);
    assert_eq!(emu.interface().config, Some(ControllerConfig::WRITABLE));

    emu.interface_mut().at(18 * MFM_SECTOR_TRANSFERS, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    let sectors = decode_mfm_stream(&emu.interface().sent);
    assert_eq!(sectors.len(), 18);
    for (i, (address, data)) in sectors.iter().enumerate() {
        assert_eq!(*address, SectorAddress::new(0, 0, i as u8));
        assert_eq!(*data, block_pattern(i as u32));
    }
}

#[test]
fn test_mfm_write_flushed_on_side_change() {
    let mut emu = emulator(raw_image(1440));
    emu.insert().unwrap();
    let data = pattern(3);

    // The host writes sector 3 right after reading its ID field.
    emu.interface_mut()
        .at(3 * MFM_SECTOR_TRANSFERS + 200, HostAction::Events(mfm_write_events(&data)));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    let shared = emu.shared();
    assert!(shared.cache().flags(3).contains(BufferFlags::DIRTY));

    // MFM caches one side at a time, so a side change flushes.
    emu.interface_mut().after(10, HostAction::Events(vec![DriveEvent::SideSelect(1)]));
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);
    let start = emu.interface().sent.len();
    emu.interface_mut().after(MFM_SECTOR_TRANSFERS, HostAction::Restart);
    assert_eq!(emu.service().unwrap(), ServiceOutcome::Restarted);

    assert_eq!(image_block(emu.device(), 3), &data[..]);
    assert!(!shared.cache().flags(3).contains(BufferFlags::DIRTY));

    // The cursor carried over from side 0; side 1 starts 18 blocks later.
    let sectors = decode_mfm_stream(&emu.interface().sent[start..]);
    let (address, streamed) = &sectors[0];
    assert_eq!(address.side(), 1);
    assert_eq!(*streamed, block_pattern(18 + address.sector() as u32));
}
