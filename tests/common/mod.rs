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
#![allow(dead_code)]

use sdfloppy::{
    codec::{
        gcr::{self, GCR_ADDRESS_PROLOGUE, GCR_DATA_PROLOGUE},
        mfm::{self, join_transfers, TransferSymbol, MFM_DAM, MFM_IDAM},
    },
    image::DISKCOPY_HEADER_LEN,
    interface::DriveInterface,
    prelude::*,
    status::StatusDisplay,
    storage::ImageBlockDevice,
    types::{ControllerConfig, DriveActivity},
    EmulatorConfig,
    MountedImage,
    SectorData,
    WriteFault,
};

use hex::encode;
use sha1::{Digest, Sha1};
use std::{collections::VecDeque, io::Cursor, sync::Arc};

pub type MemoryDevice = ImageBlockDevice<Cursor<Vec<u8>>>;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn compute_slice_hash(slice: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(slice);
    let result = hasher.finalize();

    encode(result)
}

/// The contents given to logical block `index` of a test image: the block number in the first
/// four bytes, then a byte pattern that differs from block to block.
pub fn block_pattern(index: u32) -> SectorData {
    let mut data = [0u8; SECTOR_SIZE];
    for (i, b) in data.iter_mut().enumerate() {
        *b = (i as u32 ^ index) as u8;
    }
    data[..4].copy_from_slice(&index.to_be_bytes());
    data
}

/// A raw image of `kb` kilobytes with every block holding [block_pattern].
pub fn raw_image(kb: usize) -> Vec<u8> {
    let mut image = vec![0u8; kb * 1024];
    for (i, chunk) in image.chunks_mut(SECTOR_SIZE).enumerate() {
        chunk.copy_from_slice(&block_pattern(i as u32));
    }
    image
}

/// A DiskCopy 4.2 image of `kb` kilobytes of data, holding [block_pattern] after its header.
pub fn diskcopy_image(kb: usize) -> Vec<u8> {
    let data_len = kb * 1024;
    let mut image = vec![0u8; DISKCOPY_HEADER_LEN];
    image[0] = 9;
    image[1..10].copy_from_slice(b"Test Disk");
    image[0x40..0x44].copy_from_slice(&(data_len as u32).to_be_bytes());
    image[0x52] = 0x01;
    image.extend(raw_image(kb));
    image
}

pub fn memory_device(image: Vec<u8>) -> MemoryDevice {
    ImageBlockDevice::new(Cursor::new(image)).unwrap()
}

/// Read logical block `index` back out of a raw image.
pub fn image_block(device: &MemoryDevice, index: u32) -> &[u8] {
    let start = index as usize * SECTOR_SIZE;
    &device.get_ref().get_ref()[start..start + SECTOR_SIZE]
}

/// The events a host produces when it writes one GCR data field: write mode on, one tick per
/// disk byte, write mode off.
pub fn gcr_write_events(sector: u8, data: &SectorData) -> Vec<DriveEvent> {
    let mut bytes = GCR_DATA_PROLOGUE.to_vec();
    bytes.push(gcr::encode_6and2(sector));
    bytes.extend(gcr::encode_sector(data));
    write_events(&bytes, false)
}

/// The events a host produces when it writes one MFM data field.
pub fn mfm_write_events(data: &SectorData) -> Vec<DriveEvent> {
    let mut bytes = vec![0x00; 12];
    bytes.extend([0xA1, 0xA1, 0xA1, MFM_DAM]);
    bytes.extend_from_slice(data);
    bytes.extend(mfm::data_field_crc(data).to_be_bytes());
    write_events(&bytes, true)
}

/// Feed MFM transfers the drive sent back in as write ticks, one nibble per tick.
pub fn mfm_replay_events(transfers: &[u8]) -> Vec<DriveEvent> {
    let mut level = true;
    let mut events = vec![DriveEvent::WriteRequest {
        active:     true,
        tick_level: level,
    }];
    for &transfer in transfers {
        level = !level;
        events.push(DriveEvent::WriteTick {
            level,
            data: transfer & 0x0F,
        });
    }
    events.push(DriveEvent::WriteRequest {
        active:     false,
        tick_level: level,
    });
    events
}

fn write_events(bytes: &[u8], mfm: bool) -> Vec<DriveEvent> {
    // The tick line idles high, so the first MFM tick is a falling edge carrying a high nibble.
    let mut level = mfm;
    let mut events = vec![DriveEvent::WriteRequest {
        active:     true,
        tick_level: level,
    }];
    for &byte in bytes {
        if mfm {
            for nibble in [byte >> 4, byte & 0x0F] {
                level = !level;
                events.push(DriveEvent::WriteTick { level, data: nibble });
            }
        }
        else {
            level = !level;
            events.push(DriveEvent::WriteTick {
                level,
                data: byte & 0x7F,
            });
        }
    }
    events.push(DriveEvent::WriteRequest {
        active:     false,
        tick_level: level,
    });
    events
}

/// Something the host does at a scripted point of the transfer stream.
pub enum HostAction {
    Events(Vec<DriveEvent>),
    /// Post a restart directly, as any head or mode change would.
    Restart,
    Eject,
    Motor(bool),
}

/// A model of the host side of the drive interface. Transfers are recorded, and scripted
/// actions are carried out once a given number of transfers has been sent. Past `limit`
/// transfers every send posts a restart, so a test that forgets to stop the stream ends.
pub struct MockHost {
    shared: Arc<DriveShared>,
    script: VecDeque<(usize, HostAction)>,
    pub sent: Vec<u8>,
    pub limit: usize,
    pub motor: bool,
    pub eject: bool,
    pub led: bool,
    pub led_changes: usize,
    pub tach: Vec<u16>,
    /// Every change of the track 0 line.
    pub track0: Vec<bool>,
    pub config: Option<ControllerConfig>,
    pub disk_in: bool,
}

impl MockHost {
    pub fn new(shared: Arc<DriveShared>) -> Self {
        Self {
            shared,
            script: VecDeque::new(),
            sent: Vec::new(),
            limit: 200_000,
            motor: true,
            eject: false,
            led: false,
            led_changes: 0,
            tach: Vec::new(),
            track0: Vec::new(),
            config: None,
            disk_in: false,
        }
    }

    /// Carry out `action` once `after` transfers have been sent in total.
    pub fn at(&mut self, after: usize, action: HostAction) {
        self.script.push_back((after, action));
    }

    /// Carry out `action` after `after` more transfers.
    pub fn after(&mut self, after: usize, action: HostAction) {
        let base = self.sent.len();
        self.at(base + after, action);
    }

    pub fn pending(&self) -> usize {
        self.script.len()
    }

    fn run_script(&mut self) {
        while let Some((after, _)) = self.script.front() {
            if *after > self.sent.len() {
                break;
            }
            let Some((_, action)) = self.script.pop_front()
            else {
                break;
            };
            match action {
                HostAction::Events(events) => {
                    for event in events {
                        self.shared.dispatch(event);
                    }
                }
                HostAction::Restart => self.shared.request_restart(),
                HostAction::Eject => self.eject = true,
                HostAction::Motor(state) => self.motor = state,
            }
        }
        if self.sent.len() >= self.limit {
            self.shared.request_restart();
        }
    }
}

impl DriveInterface for MockHost {
    fn send(&mut self, transfer: u8) {
        if !self.shared.write_mode() {
            self.sent.push(transfer & 0x7F);
        }
        self.run_script();
    }

    fn eject_requested(&mut self) -> bool {
        self.eject
    }

    fn motor_on(&mut self) -> bool {
        self.motor
    }

    fn set_led(&mut self, on: bool) {
        if on != self.led {
            self.led_changes += 1;
        }
        self.led = on;
    }

    fn set_tach(&mut self, half_period: u16) {
        self.tach.push(half_period);
    }

    fn set_track0(&mut self, on: bool) {
        if self.track0.last() != Some(&on) {
            self.track0.push(on);
        }
    }

    fn insert_disk(&mut self, config: ControllerConfig) {
        self.config = Some(config);
        self.disk_in = true;
    }

    fn remove_disk(&mut self) {
        self.disk_in = false;
        self.eject = false;
    }
}

/// A [StatusDisplay] that keeps everything it was shown.
#[derive(Default)]
pub struct RecordingDisplay {
    pub messages: Vec<String>,
    pub fatal: Option<String>,
    pub write_errors: Vec<WriteFault>,
    pub inserted: Option<String>,
    pub ejected: usize,
    pub activity: Vec<DriveActivity>,
}

impl StatusDisplay for RecordingDisplay {
    fn message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn fatal(&mut self, error: &DriveError) {
        self.fatal = Some(error.to_string());
    }

    fn disk_inserted(&mut self, image: &MountedImage) {
        self.inserted = Some(image.volume_name().to_string());
    }

    fn disk_ejected(&mut self) {
        self.ejected += 1;
    }

    fn activity(&mut self, activity: DriveActivity) {
        self.activity.push(activity);
    }

    fn write_error(&mut self, fault: &WriteFault) {
        self.write_errors.push(*fault);
    }
}

pub type TestEmulator = Emulator<MemoryDevice, MockHost, RecordingDisplay>;

/// An emulator over an in-memory image, with a [MockHost] sharing its drive state.
pub fn emulator(image: Vec<u8>) -> TestEmulator {
    init();
    let config = EmulatorConfig::default();
    let shared = Arc::new(DriveShared::new(&config));
    let host = MockHost::new(shared.clone());
    Emulator::with_shared(config, shared, memory_device(image), host, RecordingDisplay::default())
}

/// Decode a GCR transfer stream into the sectors it carries.
pub fn decode_gcr_stream(sent: &[u8]) -> Vec<(SectorAddress, SectorData)> {
    let bytes: Vec<u8> = sent.iter().map(|&b| b | 0x80).collect();
    let mut sectors = Vec::new();
    let mut i = 0;
    while i + 3 <= bytes.len() {
        if bytes[i..i + 3] != GCR_ADDRESS_PROLOGUE {
            i += 1;
            continue;
        }
        let Some(field) = gcr::parse_address_field(&bytes[i + 3..])
        else {
            i += 1;
            continue;
        };
        let Some(data_start) = bytes[i..]
            .windows(3)
            .position(|w| w == GCR_DATA_PROLOGUE)
            .map(|p| i + p + 4)
        else {
            break;
        };
        match bytes.get(data_start..).map(gcr::decode_sector) {
            Some(Ok(data)) => {
                sectors.push((field.address, data));
                i = data_start;
            }
            _ => break,
        }
    }
    sectors
}

/// Decode an MFM transfer stream into the sectors it carries. Sector numbers are 0-based.
pub fn decode_mfm_stream(sent: &[u8]) -> Vec<(SectorAddress, SectorData)> {
    let symbols: Vec<TransferSymbol> = sent
        .chunks_exact(2)
        .filter_map(|pair| join_transfers(pair[0], pair[1]))
        .collect();
    let byte_at = |i: usize| match symbols.get(i) {
        Some(TransferSymbol::Byte(b)) => Some(*b),
        _ => None,
    };

    let mut sectors = Vec::new();
    let mut address = None;
    let mut i = 0;
    while i < symbols.len() {
        if symbols[i] != TransferSymbol::Sync || symbols.get(i + 1) == Some(&TransferSymbol::Sync) {
            i += 1;
            continue;
        }
        match byte_at(i + 1) {
            Some(MFM_IDAM) => {
                let id: Option<Vec<u8>> = (i + 2..i + 6).map(byte_at).collect();
                address = id.map(|id| SectorAddress::new(id[0], id[1], id[2] - 1));
                i += 6;
            }
            Some(MFM_DAM) => {
                let payload: Option<Vec<u8>> = (i + 2..i + 2 + SECTOR_SIZE).map(byte_at).collect();
                if let (Some(addr), Some(payload)) = (address.take(), payload) {
                    let mut data = [0u8; SECTOR_SIZE];
                    data.copy_from_slice(&payload);
                    sectors.push((addr, data));
                }
                i += 2 + SECTOR_SIZE;
            }
            _ => i += 1,
        }
    }
    sectors
}
