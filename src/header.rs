// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! JPEG header scanning.
//!
//! The decode component needs the frame geometry and chroma layout before
//! any buffer can be sized, but not the entropy-coded data itself. The
//! parser walks marker segments up to the first start-of-scan and stops.

use crate::{
    error::{Error, Result},
    stream::ByteStream,
};
use std::{fmt, io::ErrorKind};
use tracing::{debug, trace};

/// Start of image.
pub const SOI: u8 = 0xD8;
/// End of image.
pub const EOI: u8 = 0xD9;
/// Start of scan.
pub const SOS: u8 = 0xDA;
/// Progressive DCT, Huffman coded.
pub const SOF2: u8 = 0xC2;

/// Longest run of `0xFF` fill bytes tolerated in front of a marker.
pub const MAX_PADDING: usize = 14;

/// Width alignment required by the decode hardware.
pub const WIDTH_ALIGN: u32 = 32;
/// Height alignment required by the decode hardware.
pub const HEIGHT_ALIGN: u32 = 16;

/// Chroma sampling layout of the coded image, classified from the
/// per-component sampling factors of the frame header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sampling {
    Gray,
    Yuv420Planar,
    Yuv411Planar,
    Yuv422Interleaved,
    Yuv444Interleaved,
    Unsupported,
}

impl fmt::Display for Sampling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Sampling::Gray => "gray",
            Sampling::Yuv420Planar => "yuv420p",
            Sampling::Yuv411Planar => "yuv411p",
            Sampling::Yuv422Interleaved => "yuv422i",
            Sampling::Yuv444Interleaved => "yuv444i",
            Sampling::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Frame metadata gathered by [`parse_header`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Frame width rounded up to a multiple of [`WIDTH_ALIGN`].
    pub width: u32,
    /// Frame height rounded up to a multiple of [`HEIGHT_ALIGN`].
    pub height: u32,
    /// Width as coded in the frame header.
    pub coded_width: u32,
    /// Height as coded in the frame header.
    pub coded_height: u32,
    pub sampling: Sampling,
    pub progressive: bool,
    /// Declared payload size. This is the length of the whole stream, an
    /// upper bound on the compressed data rather than its exact size.
    pub payload_len: usize,
}

impl fmt::Display for HeaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} (coded {}x{}) {}{} payload:{}",
            self.width,
            self.height,
            self.coded_width,
            self.coded_height,
            self.sampling,
            if self.progressive { " progressive" } else { "" },
            self.payload_len
        )
    }
}

const fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

const fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF)
}

fn be16(data: &[u8], offset: usize) -> u32 {
    u32::from(data[offset]) << 8 | u32::from(data[offset + 1])
}

/// Classifies the chroma layout of a frame segment.
///
/// `segment` starts with the two length bytes, as stored in the stream.
/// Only the luma and first chroma component are compared: the ratio of
/// their sampling areas, together with the luma horizontal factor, tells
/// the layouts the decoder understands apart.
///
/// A segment too short to hold the component list is `Unsupported`.
pub fn classify_sampling(segment: &[u8]) -> Sampling {
    let Some(&components) = segment.get(7) else {
        return Sampling::Unsupported;
    };
    let components = components as usize;
    if segment.len() < 8 + components * 3 {
        return Sampling::Unsupported;
    }
    let factors = |j: usize| {
        let byte = segment[9 + j * 3];
        (u32::from(byte >> 4), u32::from(byte & 0x0F))
    };

    match components {
        1 => Sampling::Gray,
        3 => {
            let (h0, v0) = factors(0);
            let (h1, v1) = factors(1);
            if h1 * v1 == 0 {
                return Sampling::Unsupported;
            }
            match ((h0 * v0) / (h1 * v1), h0) {
                (4, 2) => Sampling::Yuv420Planar,
                (4, 4) => Sampling::Yuv411Planar,
                (2, _) => Sampling::Yuv422Interleaved,
                (1, _) => Sampling::Yuv444Interleaved,
                _ => Sampling::Unsupported,
            }
        }
        _ => Sampling::Unsupported,
    }
}

fn truncated(e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof {
        Error::MalformedInput("truncated segment")
    } else {
        Error::Io(e)
    }
}

/// Reads the next marker code, skipping the fill bytes in front of it.
fn read_marker<S: ByteStream + ?Sized>(stream: &mut S) -> Result<u8> {
    for _ in 0..=MAX_PADDING {
        let byte = stream.read_byte().map_err(truncated)?;
        if byte != 0xFF {
            return Ok(byte);
        }
    }
    Err(Error::MalformedInput("too many padding bytes"))
}

/// Scans `stream` for the frame header without decoding any scan data.
///
/// The stream is rewound first and is left positioned after the
/// start-of-scan segment on success.
///
/// # Errors
///
/// - [`Error::MalformedInput`] if the start-of-image marker is missing, a
///   marker is preceded by more than [`MAX_PADDING`] fill bytes, or a
///   segment is truncated or shorter than its own header.
/// - [`Error::NoImageData`] if the image ends, or its first scan starts,
///   before any start-of-frame segment. A scan without a frame is refused
///   rather than reported with unknown dimensions.
pub fn parse_header<S: ByteStream + ?Sized>(stream: &mut S) -> Result<HeaderInfo> {
    let stream_len = stream.length()? as usize;
    stream.rewind()?;

    let mut soi = [0u8; 2];
    if stream.read_bytes(&mut soi)? != 2 || soi != [0xFF, SOI] {
        return Err(Error::MalformedInput("missing start of image marker"));
    }

    let mut frame: Option<HeaderInfo> = None;
    let mut progressive = false;

    loop {
        let marker = read_marker(stream)?;
        if marker == EOI {
            debug!("end of image before start of scan");
            return Err(Error::NoImageData);
        }

        // The segment keeps its two length bytes so that field offsets
        // match the ones used by the frame header layout.
        let mut segment = vec![0u8; 2];
        if stream.read_bytes(&mut segment)? != 2 {
            return Err(Error::MalformedInput("truncated segment length"));
        }
        let len = be16(&segment, 0) as usize;
        if len < 2 {
            return Err(Error::MalformedInput("invalid segment length"));
        }
        segment.resize(len, 0);
        if stream.read_bytes(&mut segment[2..])? != len - 2 {
            return Err(Error::MalformedInput("truncated segment"));
        }
        trace!("marker 0x{:02x} length {}", marker, len);

        match marker {
            SOS => {
                let mut info = frame.ok_or(Error::NoImageData)?;
                info.progressive = progressive;
                info.payload_len = stream_len;
                debug!("jpeg header {}", info);
                return Ok(info);
            }
            m if is_start_of_frame(m) => {
                if len < 8 || len < 8 + segment[7] as usize * 3 {
                    return Err(Error::MalformedInput("short frame header"));
                }
                if m == SOF2 {
                    progressive = true;
                }
                let coded_height = be16(&segment, 3);
                let coded_width = be16(&segment, 5);
                let sampling = classify_sampling(&segment);
                debug!(
                    "frame 0x{:02x} {}x{} sampling {}",
                    m, coded_width, coded_height, sampling
                );
                frame = Some(HeaderInfo {
                    width: align_up(coded_width, WIDTH_ALIGN),
                    height: align_up(coded_height, HEIGHT_ALIGN),
                    coded_width,
                    coded_height,
                    sampling,
                    progressive,
                    payload_len: 0,
                });
            }
            _ => {}
        }
    }
}
