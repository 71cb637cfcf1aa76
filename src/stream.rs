// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::io::{self, ErrorKind, Read, Seek, SeekFrom};

/// Readable, seekable, finite byte stream holding a compressed image.
///
/// Implemented for every `Read + Seek` type, so files, cursors over byte
/// slices and memory maps can all be handed to the decoder directly.
pub trait ByteStream {
    /// Reads one byte. End of stream is an `UnexpectedEof` error.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Reads up to `buf.len()` bytes, stopping early only at end of stream.
    /// Returns the number of bytes read.
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Moves back to the first byte of the stream.
    fn rewind(&mut self) -> io::Result<()>;

    /// Total length of the stream in bytes.
    fn length(&mut self) -> io::Result<u64>;
}

impl<T: Read + Seek> ByteStream for T {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    fn length(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let len = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(len)
    }
}
