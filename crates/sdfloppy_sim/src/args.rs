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
use bpaf::*;
use std::{
    fmt::{self, Display, Formatter},
    path::PathBuf,
};

#[derive(Clone, Debug)]
pub enum Command {
    Version,
    Info(InfoParams),
    Map(MapParams),
    Write(WriteParams),
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Command::Version => write!(f, "version"),
            Command::Info(_) => write!(f, "info"),
            Command::Map(_) => write!(f, "map"),
            Command::Write(_) => write!(f, "write"),
        }
    }
}

#[derive(Debug)]
pub struct AppParams {
    pub global: GlobalOptions,
    pub command: Command,
}

#[derive(Debug)]
pub struct GlobalOptions {
    pub silent: bool,
}

#[derive(Clone, Debug)]
pub struct InfoParams {
    pub in_file: PathBuf,
}

#[derive(Clone, Debug)]
pub struct MapParams {
    pub in_file: PathBuf,
    pub track: u8,
    pub side: u8,
    pub revolutions: usize,
}

#[derive(Clone, Debug)]
pub struct WriteParams {
    pub in_file: PathBuf,
    pub out_file: PathBuf,
    pub track: u8,
    pub side: u8,
    pub sector: u8,
    pub fill: u8,
}

pub fn global_options_parser() -> impl Parser<GlobalOptions> {
    let silent = long("silent")
        .help("Suppress all output except required output")
        .switch();

    construct!(GlobalOptions { silent })
}

fn in_file_parser() -> impl Parser<PathBuf> {
    long("in_file")
        .short('i')
        .argument::<PathBuf>("IN_FILE")
        .help("Path to the disk image")
}

fn track_parser() -> impl Parser<u8> {
    long("track")
        .short('t')
        .argument::<u8>("TRACK")
        .help("Track to position the head on")
        .guard(|&track| track < 80, "Track must be between 0 and 79")
        .fallback(0)
}

fn side_parser() -> impl Parser<u8> {
    long("side")
        .short('h')
        .argument::<u8>("SIDE")
        .help("Side to select")
        .guard(|&side| side == 0 || side == 1, "Side must be either 0 or 1")
        .fallback(0)
}

fn info_parser() -> impl Parser<InfoParams> {
    let in_file = in_file_parser();
    construct!(InfoParams { in_file })
}

fn map_parser() -> impl Parser<MapParams> {
    let in_file = in_file_parser();
    let track = track_parser();
    let side = side_parser();
    let revolutions = long("revolutions")
        .short('r')
        .argument::<usize>("COUNT")
        .help("Number of revolutions to stream")
        .guard(|&count| count > 0, "At least one revolution is required")
        .fallback(1);

    construct!(MapParams {
        in_file,
        track,
        side,
        revolutions
    })
}

fn write_parser() -> impl Parser<WriteParams> {
    let in_file = in_file_parser();
    let out_file = long("out_file")
        .short('o')
        .argument::<PathBuf>("OUT_FILE")
        .help("Path to write the modified image to");
    let track = track_parser();
    let side = side_parser();
    let sector = long("sector")
        .short('s')
        .argument::<u8>("SECTOR")
        .help("Sector to write, counted from 0");
    let fill = long("fill")
        .short('f')
        .argument::<String>("BYTE")
        .help("Byte value to fill the sector with, in hex")
        .parse(|s| u8::from_str_radix(s.trim_start_matches("0x"), 16))
        .fallback(0xE5);

    construct!(WriteParams {
        in_file,
        out_file,
        track,
        side,
        sector,
        fill
    })
}

pub(crate) fn command_parser() -> impl Parser<AppParams> {
    let global = global_options_parser();

    let version = pure(Command::Version)
        .to_options()
        .command("version")
        .help("Display version information and exit");
    let info = construct!(Command::Info(info_parser()))
        .to_options()
        .command("info")
        .help("Mount a disk image and describe it");
    let map = construct!(Command::Map(map_parser()))
        .to_options()
        .command("map")
        .help("Stream a track to a simulated host and list the sectors it received");
    let write = construct!(Command::Write(write_parser()))
        .to_options()
        .command("write")
        .help("Have a simulated host write one sector, then flush it to a copy of the image");

    let command = construct!([version, info, map, write]);

    construct!(AppParams { global, command })
}
