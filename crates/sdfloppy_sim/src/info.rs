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
    args::{GlobalOptions, InfoParams},
    load_emulator,
};
use anyhow::{anyhow, Error};

pub(crate) fn run(_global: &GlobalOptions, params: &InfoParams) -> Result<(), Error> {
    let emu = load_emulator(&params.in_file)?;
    let image = emu.image().ok_or_else(|| anyhow!("No disk inserted"))?;
    let extent = image.extent();

    println!("Disk image info:");
    println!("{}", "-".repeat(79));
    println!("Image type:    {}", image.kind());
    println!("Volume name:   {}", image.volume_name());
    println!("Encoding:      {}", image.encoding());
    println!("Sides:         {}", image.sides());
    println!("Read only:     {}", image.read_only());
    println!("Block extent:  {}..={} ({} blocks)", extent.first, extent.last, extent.len());
    println!("Controller:    {:02X}", image.controller_config().bits());
    println!("Tach period:   {}", emu.interface().tach());
    Ok(())
}
