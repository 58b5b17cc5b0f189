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
    args::{GlobalOptions, MapParams},
    host,
    load_emulator,
    seek,
};
use anyhow::{bail, Error};
use sdfloppy::ServiceOutcome;

pub(crate) fn run(global: &GlobalOptions, params: &MapParams) -> Result<(), Error> {
    let mut emu = load_emulator(&params.in_file)?;
    seek(&emu, params.track, params.side)?;

    let shared = emu.shared();
    let encoding = shared.encoding();
    let sectors = shared.geometry(params.track).sector_count() as usize;
    let budget = sectors * emu.engine().sector_transfers(encoding) * params.revolutions;

    emu.interface_mut().stop_after(budget);
    match emu.service()? {
        ServiceOutcome::Restarted => {}
        outcome => bail!("Streaming stopped early: {:?}", outcome),
    }

    let transfers = emu.interface_mut().take_transfers();
    let received = host::decode(encoding, &transfers);
    if !global.silent {
        println!(
            "Track {} side {}: {} transfers, {} sectors received",
            params.track,
            params.side,
            transfers.len(),
            received.len()
        );
        println!("{}", "-".repeat(79));
    }

    for sector in &received {
        let status = if sector.valid { "ok" } else { "BAD" };
        println!("{} {:02X?} .. {}", sector.address, &sector.data[..8], status);
    }

    if received.iter().any(|s| !s.valid) {
        bail!("One or more sectors were received with a bad checksum");
    }
    Ok(())
}
