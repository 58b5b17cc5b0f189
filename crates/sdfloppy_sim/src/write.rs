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
use crate::{
    args::{GlobalOptions, WriteParams},
    host,
    load_emulator,
    seek,
};
use anyhow::{anyhow, bail, Error};
use sdfloppy::{storage::ImageBlockDevice, DriveEncoding, MountedImage, ServiceOutcome, SECTOR_SIZE};
use std::io::Cursor;

pub(crate) fn run(global: &GlobalOptions, params: &WriteParams) -> Result<(), Error> {
    let mut emu = load_emulator(&params.in_file)?;
    if emu.image().is_some_and(|image| image.read_only()) {
        bail!("{} is read only", params.in_file.display());
    }
    seek(&emu, params.track, params.side)?;

    let shared = emu.shared();
    let encoding = shared.encoding();
    let geometry = shared.geometry(params.track);
    if params.sector >= geometry.sector_count() {
        bail!(
            "Sector {} out of range, track {} has {} sectors",
            params.sector,
            params.track,
            geometry.sector_count()
        );
    }

    let sector_transfers = emu.engine().sector_transfers(encoding);
    let data = [params.fill; SECTOR_SIZE];
    let events = host::write_events(encoding, params.sector, &data);
    match encoding {
        // A GCR data field carries its own sector number, so the write can start anywhere.
        DriveEncoding::Gcr => emu.interface_mut().schedule(1, events),
        // An MFM write lands on the sector under the head. Let the ID field go by first.
        DriveEncoding::Mfm => {
            shared.set_sector(params.sector);
            emu.interface_mut().schedule(sector_transfers / 4, events);
        }
    }
    emu.interface_mut().stop_after(usize::MAX);

    match emu.service()? {
        ServiceOutcome::Restarted => {}
        outcome => bail!("Write was interrupted: {:?}", outcome),
    }
    if let Some(fault) = shared.take_fault() {
        bail!("Write rejected: {} ({})", fault, fault.code());
    }

    let image = emu.image().cloned().ok_or_else(|| anyhow!("No disk inserted"))?;
    let block = geometry.sector_block(image.sides(), params.side, params.sector);
    emu.eject()?;

    let mut device = emu.into_device();
    let mut verify = [0u8; SECTOR_SIZE];
    image.read_sector(&mut device, block, &mut verify)?;
    if verify != data {
        bail!("Verify failed for block {}", block);
    }

    let buffer = device.into_inner().into_inner();
    std::fs::write(&params.out_file, &buffer)?;

    // Make sure the saved image still mounts.
    let mut saved = ImageBlockDevice::new(Cursor::new(buffer))?;
    MountedImage::mount(&mut saved)?;

    if !global.silent {
        println!(
            "Wrote sector {} of track {} side {} (block {}) with {:02X}, saved to {}",
            params.sector,
            params.track,
            params.side,
            block,
            params.fill,
            params.out_file.display()
        );
    }
    Ok(())
}
