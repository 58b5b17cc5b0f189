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
//! Miscellaneous helpers shared across modules.

use std::{
    io::{Read, Seek, SeekFrom},
    sync::{Mutex, MutexGuard, PoisonError},
};

/// Enter a critical section guarded by `mutex`. Interrupt-context handlers never panic while
/// holding a guard, so a poisoned lock still protects consistent data and is simply reclaimed.
#[inline]
pub(crate) fn critical<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Return the total length of a seekable source, leaving it positioned at the start.
pub(crate) fn get_length<T: Seek>(source: &mut T) -> Result<u64, std::io::Error> {
    let length = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(0))?;
    Ok(length)
}

/// Read a length-prefixed (Pascal) string of at most `max_len` characters at `offset`.
/// Non-printable characters are replaced with '?'.
pub(crate) fn read_pascal_string<T: Read + Seek>(
    source: &mut T,
    offset: u64,
    max_len: usize,
) -> Result<String, std::io::Error> {
    source.seek(SeekFrom::Start(offset))?;
    let mut len = [0u8; 1];
    source.read_exact(&mut len)?;
    let len = std::cmp::min(len[0] as usize, max_len);

    let mut buf = vec![0u8; len];
    source.read_exact(&mut buf)?;
    Ok(buf
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect())
}
