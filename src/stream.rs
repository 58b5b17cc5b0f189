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

    src/stream.rs

    Plays a cached sector back to the host as a stream of bus transfers.
*/
//! The streaming engine: plays one sector to the host in its native encoding.
//!
//! A sector is sent as gap, address field, a second gap, then the data field. The restart flag
//! is checked before every transfer; once it is set the sector is abandoned at that transfer
//! boundary and [StreamOutcome::Restarted] reports where.

use crate::{
    codec::{
        gcr::{self, GcrEncoder, GCR_DATA_EPILOGUE, GCR_DATA_PROLOGUE, GCR_ENCODED_PAYLOAD_LEN, GCR_SYNC},
        mfm::{self, byte_transfers, MFM_DAM, MFM_GAP_BYTE, MFM_IDAM, MFM_SYNC_COUNT, MFM_SYNC_TRANSFERS},
        CrcCcitt,
    },
    config::EmulatorConfig,
    drive::DriveShared,
    interface::DriveInterface,
    types::{DriveEncoding, SectorAddress},
    SectorData,
    SECTOR_SIZE,
};

/// The part of a sector being transmitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    Gap,
    Address,
    Sync,
    Payload,
    Checksum,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    /// A restart was posted. `sent` transfers of the sector went out before it was abandoned.
    Restarted { phase: StreamPhase, sent: usize },
}

/// Marker for an abandoned transmission.
struct Interrupted;

struct Transmitter<'a, I: ?Sized> {
    iface: &'a mut I,
    shared: &'a DriveShared,
    phase: StreamPhase,
    sent: usize,
    crc: CrcCcitt,
}

impl<I: DriveInterface + ?Sized> Transmitter<'_, I> {
    #[inline]
    fn transfer(&mut self, value: u8) -> Result<(), Interrupted> {
        if self.shared.restart_pending() {
            return Err(Interrupted);
        }
        self.iface.send(value);
        self.sent += 1;
        Ok(())
    }

    fn gcr(&mut self, byte: u8) -> Result<(), Interrupted> {
        self.transfer(byte & 0x7F)
    }

    fn gcr_bytes(&mut self, bytes: &[u8]) -> Result<(), Interrupted> {
        bytes.iter().try_for_each(|&b| self.gcr(b))
    }

    fn gcr_fill(&mut self, byte: u8, count: usize) -> Result<(), Interrupted> {
        (0..count).try_for_each(|_| self.gcr(byte))
    }

    fn mfm(&mut self, byte: u8) -> Result<(), Interrupted> {
        let [high, low] = byte_transfers(byte);
        self.transfer(high)?;
        self.crc.update(byte);
        self.transfer(low)
    }

    fn mfm_fill(&mut self, byte: u8, count: usize) -> Result<(), Interrupted> {
        (0..count).try_for_each(|_| self.mfm(byte))
    }

    /// Send the sync marks and address mark that open a field, restarting the CRC.
    fn mfm_mark(&mut self, mark: u8) -> Result<(), Interrupted> {
        self.crc = CrcCcitt::new();
        for _ in 0..MFM_SYNC_COUNT {
            self.transfer(MFM_SYNC_TRANSFERS[0])?;
            self.crc.update_sync();
            self.transfer(MFM_SYNC_TRANSFERS[1])?;
        }
        self.mfm(mark)
    }

    fn mfm_crc(&mut self) -> Result<(), Interrupted> {
        let [high, low] = self.crc.value().to_be_bytes();
        self.mfm(high)?;
        self.mfm(low)
    }
}

/// Streams sectors with the gap lengths of an [EmulatorConfig].
#[derive(Clone, Debug, Default)]
pub struct StreamingEngine {
    config: EmulatorConfig,
}

impl StreamingEngine {
    pub fn new(config: EmulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// The number of transfers one uninterrupted sector takes.
    pub fn sector_transfers(&self, encoding: DriveEncoding) -> usize {
        let c = &self.config;
        match encoding {
            DriveEncoding::Gcr => {
                c.gcr_sector_gap
                    + gcr::address_field(SectorAddress::default(), 2).len()
                    + c.gcr_address_gap
                    + GCR_DATA_PROLOGUE.len()
                    + 1
                    + gcr::GCR_DATA_FIELD_LEN
                    + GCR_DATA_EPILOGUE.len()
            }
            DriveEncoding::Mfm => {
                // Sync marks, address mark, four ID bytes and the CRC
                let id = MFM_SYNC_COUNT + 1 + 4 + 2;
                let data = MFM_SYNC_COUNT + 1 + SECTOR_SIZE + 2;
                let bytes = c.mfm_sector_gap + c.mfm_sync_len + id + c.mfm_address_gap + c.mfm_sync_len + data;
                bytes * 2
            }
        }
    }

    /// Transmit one sector. `sides` selects the format byte of GCR address fields.
    pub fn stream_sector<I: DriveInterface + ?Sized>(
        &self,
        iface: &mut I,
        shared: &DriveShared,
        encoding: DriveEncoding,
        address: SectorAddress,
        sides: u8,
        data: &SectorData,
    ) -> StreamOutcome {
        let mut tx = Transmitter {
            iface,
            shared,
            phase: StreamPhase::Gap,
            sent: 0,
            crc: CrcCcitt::new(),
        };
        let result = match encoding {
            DriveEncoding::Gcr => self.send_gcr(&mut tx, address, sides, data),
            DriveEncoding::Mfm => self.send_mfm(&mut tx, address, data),
        };
        match result {
            Ok(()) => StreamOutcome::Completed,
            Err(Interrupted) => {
                log::trace!(
                    "stream_sector(): {} restarted in {:?} after {} transfers",
                    address,
                    tx.phase,
                    tx.sent
                );
                StreamOutcome::Restarted {
                    phase: tx.phase,
                    sent:  tx.sent,
                }
            }
        }
    }

    fn send_gcr<I: DriveInterface + ?Sized>(
        &self,
        tx: &mut Transmitter<'_, I>,
        address: SectorAddress,
        sides: u8,
        data: &SectorData,
    ) -> Result<(), Interrupted> {
        tx.phase = StreamPhase::Gap;
        tx.gcr_fill(GCR_SYNC, self.config.gcr_sector_gap)?;

        tx.phase = StreamPhase::Address;
        tx.gcr_bytes(&gcr::address_field(address, sides))?;

        tx.phase = StreamPhase::Sync;
        tx.gcr_fill(GCR_SYNC, self.config.gcr_address_gap)?;
        tx.gcr_bytes(&GCR_DATA_PROLOGUE)?;
        tx.gcr(gcr::encode_6and2(address.sector()))?;

        tx.phase = StreamPhase::Payload;
        for (i, byte) in GcrEncoder::new(data).enumerate() {
            if i == GCR_ENCODED_PAYLOAD_LEN {
                tx.phase = StreamPhase::Checksum;
            }
            tx.gcr(byte)?;
        }
        tx.gcr_bytes(&GCR_DATA_EPILOGUE)
    }

    fn send_mfm<I: DriveInterface + ?Sized>(
        &self,
        tx: &mut Transmitter<'_, I>,
        address: SectorAddress,
        data: &SectorData,
    ) -> Result<(), Interrupted> {
        tx.phase = StreamPhase::Gap;
        tx.mfm_fill(MFM_GAP_BYTE, self.config.mfm_sector_gap)?;
        tx.mfm_fill(0x00, self.config.mfm_sync_len)?;

        tx.phase = StreamPhase::Address;
        tx.mfm_mark(MFM_IDAM)?;
        for byte in mfm::id_field(address) {
            tx.mfm(byte)?;
        }
        tx.mfm_crc()?;

        tx.phase = StreamPhase::Sync;
        tx.mfm_fill(MFM_GAP_BYTE, self.config.mfm_address_gap)?;
        tx.mfm_fill(0x00, self.config.mfm_sync_len)?;
        tx.mfm_mark(MFM_DAM)?;

        tx.phase = StreamPhase::Payload;
        for &byte in data.iter() {
            tx.mfm(byte)?;
        }

        tx.phase = StreamPhase::Checksum;
        tx.mfm_crc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mfm::{join_transfers, TransferSymbol};
    use std::sync::Arc;

    struct Recorder {
        shared: Arc<DriveShared>,
        sent: Vec<u8>,
        restart_after: Option<usize>,
    }

    impl DriveInterface for Recorder {
        fn send(&mut self, transfer: u8) {
            self.sent.push(transfer);
            if Some(self.sent.len()) == self.restart_after {
                self.shared.request_restart();
            }
        }
        fn eject_requested(&mut self) -> bool {
            false
        }
        fn motor_on(&mut self) -> bool {
            true
        }
        fn set_led(&mut self, _on: bool) {}
        fn set_tach(&mut self, _half_period: u16) {}
        fn set_track0(&mut self, _on: bool) {}
        fn insert_disk(&mut self, _config: crate::types::ControllerConfig) {}
        fn remove_disk(&mut self) {}
    }

    fn recorder(restart_after: Option<usize>) -> Recorder {
        Recorder {
            shared: Arc::new(DriveShared::new(&EmulatorConfig::default())),
            sent: Vec::new(),
            restart_after,
        }
    }

    #[test]
    fn test_gcr_sector_layout() {
        let engine = StreamingEngine::default();
        let mut rec = recorder(None);
        let shared = rec.shared.clone();
        let data = [0u8; SECTOR_SIZE];
        let outcome = engine.stream_sector(
            &mut rec,
            &shared,
            DriveEncoding::Gcr,
            SectorAddress::new(0, 0, 0),
            2,
            &data,
        );
        assert_eq!(outcome, StreamOutcome::Completed);
        // gap + address + gap + prologue + sector + body + epilogue
        assert_eq!(rec.sent.len(), 55 + 10 + 10 + 3 + 1 + 703 + 3);
        assert_eq!(rec.sent.len(), engine.sector_transfers(DriveEncoding::Gcr));
        assert!(rec.sent.iter().all(|&b| b < 0x80));
        assert_eq!(&rec.sent[55..58], &[0x55, 0x2A, 0x16]);
    }

    #[test]
    fn test_gcr_restart_mid_sector() {
        let engine = StreamingEngine::default();
        let mut rec = recorder(Some(3));
        let shared = rec.shared.clone();
        let outcome = engine.stream_sector(
            &mut rec,
            &shared,
            DriveEncoding::Gcr,
            SectorAddress::new(0, 0, 0),
            2,
            &[0u8; SECTOR_SIZE],
        );
        assert_eq!(
            outcome,
            StreamOutcome::Restarted {
                phase: StreamPhase::Gap,
                sent:  3,
            }
        );
        assert_eq!(rec.sent.len(), 3);
    }

    #[test]
    fn test_mfm_sector_layout() {
        let engine = StreamingEngine::default();
        let mut rec = recorder(None);
        let shared = rec.shared.clone();
        let mut data = [0u8; SECTOR_SIZE];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        let outcome = engine.stream_sector(
            &mut rec,
            &shared,
            DriveEncoding::Mfm,
            SectorAddress::new(0, 0, 0),
            2,
            &data,
        );
        assert_eq!(outcome, StreamOutcome::Completed);

        let symbols: Vec<TransferSymbol> = rec
            .sent
            .chunks(2)
            .map(|pair| join_transfers(pair[0], pair[1]).unwrap())
            .collect();
        // 62 bytes of gap, 3 sync, IDAM, 4 ID bytes, 2 CRC, 34 bytes of gap, 3 sync, DAM, data, CRC
        assert_eq!(symbols.len(), 62 + 3 + 1 + 4 + 2 + 34 + 3 + 1 + 512 + 2);
        assert_eq!(rec.sent.len(), engine.sector_transfers(DriveEncoding::Mfm));
        assert_eq!(symbols[62], TransferSymbol::Sync);
        assert_eq!(symbols[65], TransferSymbol::Byte(MFM_IDAM));
        assert_eq!(&symbols[70..72], &[TransferSymbol::Byte(0xCA), TransferSymbol::Byte(0x6F)]);
        let tail = &symbols[symbols.len() - 2..];
        assert_eq!(tail, &[TransferSymbol::Byte(0x9A), TransferSymbol::Byte(0xB4)]);
    }
}
