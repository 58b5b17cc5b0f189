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
pub mod args;
mod host;
mod info;
mod map;
mod write;

use anyhow::{bail, Error};
use bpaf::Parser;
use sdfloppy::{
    status::LogDisplay,
    storage::ImageBlockDevice,
    DriveEvent,
    DriveShared,
    Emulator,
    EmulatorConfig,
    StepDirection,
};
use std::{io::Cursor, path::Path, sync::Arc};

use crate::{args::Command, host::SimHost};
use args::command_parser;

pub(crate) type SimDevice = ImageBlockDevice<Cursor<Vec<u8>>>;
pub(crate) type SimEmulator = Emulator<SimDevice, SimHost, LogDisplay>;

fn main() -> Result<(), Error> {
    env_logger::init();

    let app_params = command_parser().run();

    let command_result = match &app_params.command {
        Command::Version => {
            println!("sdfloppy_sim v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Info(params) => info::run(&app_params.global, params),
        Command::Map(params) => map::run(&app_params.global, params),
        Command::Write(params) => write::run(&app_params.global, params),
    };

    match command_result {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("Command '{}' failed: {}", app_params.command, e);
            for cause in e.chain().skip(1) {
                eprintln!("Caused by: {}", cause);
            }
            std::process::exit(1);
        }
    }
}

pub(crate) fn read_file(path: &Path) -> Result<Cursor<Vec<u8>>, Error> {
    let buffer = std::fs::read(path)?;
    Ok(Cursor::new(buffer))
}

/// Load an image file and insert it into a fresh emulator wired to a simulated host.
pub(crate) fn load_emulator(path: &Path) -> Result<SimEmulator, Error> {
    let device = ImageBlockDevice::new(read_file(path)?)?;
    let config = EmulatorConfig::default();
    let shared = Arc::new(DriveShared::new(&config));
    let host = SimHost::new(shared.clone());

    let mut emu = Emulator::with_shared(config, shared, device, host, LogDisplay::new());
    if let Err(e) = emu.insert() {
        bail!("Error mounting {}: {}", path.display(), e);
    }
    Ok(emu)
}

/// Step the head out from track 0 to `track` and select `side`, as a host would.
pub(crate) fn seek(emu: &SimEmulator, track: u8, side: u8) -> Result<(), Error> {
    let shared = emu.shared();
    for _ in 0..track {
        shared.dispatch(DriveEvent::StepRequest(StepDirection::In));
    }
    shared.dispatch(DriveEvent::SideSelect(side));

    if shared.track() != track || shared.side() != side {
        bail!(
            "Head is at track {} side {}, could not reach track {} side {}",
            shared.track(),
            shared.side(),
            track,
            side
        );
    }
    Ok(())
}
