/*
    sdfloppy_sim

    Copyright 2025 Daniel Balsom

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
//! A simulated host: receives the transfer stream, delivers scripted drive events, and decodes
//! the stream back into sectors.

use sdfloppy::{
    codec::{
        gcr::{self, GCR_ADDRESS_PROLOGUE, GCR_DATA_PROLOGUE},
        mfm::{self, join_transfers, TransferSymbol, MFM_DAM, MFM_IDAM, MFM_SYNC_BYTE, MFM_SYNC_COUNT},
    },
    interface::DriveInterface,
    types::ControllerConfig,
    DriveEncoding,
    DriveEvent,
    DriveShared,
    SectorAddress,
    SectorData,
    SECTOR_SIZE,
};
use std::{collections::VecDeque, sync::Arc};

pub struct SimHost {
    shared: Arc<DriveShared>,
    script: VecDeque<(usize, Vec<DriveEvent>)>,
    transfers: Vec<u8>,
    limit: usize,
    tach: u16,
    led: bool,
}

impl SimHost {
    pub fn new(shared: Arc<DriveShared>) -> Self {
        Self {
            shared,
            script: VecDeque::new(),
            transfers: Vec::new(),
            limit: 0,
            tach: 0,
            led: false,
        }
    }

    /// Post a restart once `count` more transfers have been received.
    pub fn stop_after(&mut self, count: usize) {
        self.limit = self.transfers.len().saturating_add(count);
    }

    /// Deliver `events` once `count` more transfers have been received.
    pub fn schedule(&mut self, count: usize, events: Vec<DriveEvent>) {
        self.script.push_back((self.transfers.len() + count, events));
    }

    /// Take everything received so far. Pending limits and events keep their positions.
    pub fn take_transfers(&mut self) -> Vec<u8> {
        let taken = self.transfers.len();
        self.limit = self.limit.saturating_sub(taken);
        self.script.iter_mut().for_each(|(at, _)| *at = at.saturating_sub(taken));
        std::mem::take(&mut self.transfers)
    }

    pub fn tach(&self) -> u16 {
        self.tach
    }
}

impl DriveInterface for SimHost {
    fn send(&mut self, transfer: u8) {
        self.transfers.push(transfer);
        while self.script.front().is_some_and(|(at, _)| *at <= self.transfers.len()) {
            if let Some((_, events)) = self.script.pop_front() {
                events.into_iter().for_each(|event| self.shared.dispatch(event));
            }
        }
        if self.transfers.len() >= self.limit {
            self.shared.request_restart();
        }
    }

    fn eject_requested(&mut self) -> bool {
        false
    }

    fn motor_on(&mut self) -> bool {
        true
    }

    fn set_led(&mut self, on: bool) {
        if on != self.led {
            log::trace!("set_led(): {}", on);
        }
        self.led = on;
    }

    fn set_tach(&mut self, half_period: u16) {
        self.tach = half_period;
    }

    fn set_track0(&mut self, on: bool) {
        log::trace!("set_track0(): {}", on);
    }

    fn insert_disk(&mut self, config: ControllerConfig) {
        log::debug!("insert_disk(): config {:02X}", config.bits());
    }

    fn remove_disk(&mut self) {
        log::debug!("remove_disk()");
    }
}

/// A sector as the host received it.
pub struct ReceivedSector {
    pub address: SectorAddress,
    pub data: SectorData,
    pub valid: bool,
}

/// Decode a transfer stream into the sectors it carries.
pub fn decode(encoding: DriveEncoding, transfers: &[u8]) -> Vec<ReceivedSector> {
    match encoding {
        DriveEncoding::Gcr => decode_gcr(transfers),
        DriveEncoding::Mfm => decode_mfm(transfers),
    }
}

fn decode_gcr(transfers: &[u8]) -> Vec<ReceivedSector> {
    let bytes: Vec<u8> = transfers.iter().map(|&b| b | 0x80).collect();
    let mut sectors = Vec::new();

    let mut i = 0;
    while i + GCR_ADDRESS_PROLOGUE.len() <= bytes.len() {
        if bytes[i..i + 3] != GCR_ADDRESS_PROLOGUE {
            i += 1;
            continue;
        }
        let Some(field) = gcr::parse_address_field(&bytes[i + 3..])
        else {
            i += 1;
            continue;
        };
        let Some(start) = bytes[i..].windows(3).position(|w| w == GCR_DATA_PROLOGUE)
        else {
            break;
        };
        // Skip the prologue and the sector number.
        let body = i + start + GCR_DATA_PROLOGUE.len() + 1;
        match gcr::decode_sector(&bytes[body.min(bytes.len())..]) {
            Ok(data) => sectors.push(ReceivedSector {
                address: field.address,
                data,
                valid: true,
            }),
            Err(gcr::GcrDecodeError::Truncated(_)) => break,
            Err(e) => {
                log::warn!("decode_gcr(): {}: {}", field.address, e);
                sectors.push(ReceivedSector {
                    address: field.address,
                    data: [0; SECTOR_SIZE],
                    valid: false,
                });
            }
        }
        i = body;
    }
    sectors
}

fn decode_mfm(transfers: &[u8]) -> Vec<ReceivedSector> {
    let symbols: Vec<TransferSymbol> = transfers
        .chunks_exact(2)
        .filter_map(|pair| join_transfers(pair[0], pair[1]))
        .collect();
    let bytes = |range: std::ops::Range<usize>| -> Option<Vec<u8>> {
        range
            .map(|i| match symbols.get(i) {
                Some(TransferSymbol::Byte(b)) => Some(*b),
                _ => None,
            })
            .collect()
    };

    let mut sectors = Vec::new();
    let mut address = None;
    let mut i = 0;
    while i + 1 < symbols.len() {
        // The last of a run of sync marks is followed by the address mark.
        if symbols[i] != TransferSymbol::Sync || symbols[i + 1] == TransferSymbol::Sync {
            i += 1;
            continue;
        }
        match symbols[i + 1] {
            TransferSymbol::Byte(MFM_IDAM) => {
                address = bytes(i + 2..i + 8).and_then(|id| {
                    let crc = u16::from_be_bytes([id[4], id[5]]);
                    let address = SectorAddress::new(id[0], id[1], id[2].wrapping_sub(1));
                    (crc == mfm::id_field_crc(address)).then_some(address)
                });
                i += 8;
            }
            TransferSymbol::Byte(MFM_DAM) => {
                let Some(field) = bytes(i + 2..i + 4 + SECTOR_SIZE)
                else {
                    break;
                };
                let mut data = [0u8; SECTOR_SIZE];
                data.copy_from_slice(&field[..SECTOR_SIZE]);
                let crc = u16::from_be_bytes([field[SECTOR_SIZE], field[SECTOR_SIZE + 1]]);
                if let Some(address) = address.take() {
                    sectors.push(ReceivedSector {
                        address,
                        data,
                        valid: crc == mfm::data_field_crc(&data),
                    });
                }
                i += 4 + SECTOR_SIZE;
            }
            _ => i += 1,
        }
    }
    sectors
}

/// The events a host produces to write one data field for `sector`: write mode on, one tick
/// per disk byte or nibble, write mode off.
pub fn write_events(encoding: DriveEncoding, sector: u8, data: &SectorData) -> Vec<DriveEvent> {
    let (bytes, mfm) = match encoding {
        DriveEncoding::Gcr => {
            let mut bytes = GCR_DATA_PROLOGUE.to_vec();
            bytes.push(gcr::encode_6and2(sector));
            bytes.extend(gcr::encode_sector(data));
            (bytes, false)
        }
        DriveEncoding::Mfm => {
            let mut bytes = vec![0x00; 12];
            bytes.extend([MFM_SYNC_BYTE; MFM_SYNC_COUNT]);
            bytes.push(MFM_DAM);
            bytes.extend_from_slice(data);
            bytes.extend(mfm::data_field_crc(data).to_be_bytes());
            (bytes, true)
        }
    };

    // The tick line idles high. An MFM byte goes out high nibble first, on a falling edge.
    let mut level = mfm;
    let mut events = vec![DriveEvent::WriteRequest {
        active:     true,
        tick_level: level,
    }];
    for byte in bytes {
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
