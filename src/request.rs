// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{component::ColorFormat, error::Error};
use std::fmt;

/// Pixel configuration requested for the decoded image.
#[derive(clap::ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputConfig {
    /// 8-bit grayscale
    Gray,
    /// 16-bit RGB 5:6:5
    Rgb565,
    /// 32-bit RGBA, 8 bits per channel
    Rgba8888,
    /// Native interleaved YUV 4:2:2 as produced by the component
    Yuv,
}

impl OutputConfig {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            OutputConfig::Gray => 1,
            OutputConfig::Rgb565 => 2,
            OutputConfig::Rgba8888 => 4,
            OutputConfig::Yuv => 2,
        }
    }

    /// Color format negotiated on the component's output port.
    pub const fn color_format(self) -> ColorFormat {
        match self {
            OutputConfig::Gray => ColorFormat::L8,
            OutputConfig::Rgb565 => ColorFormat::Rgb565,
            OutputConfig::Rgba8888 => ColorFormat::Argb8888,
            OutputConfig::Yuv => ColorFormat::CbYCrY,
        }
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            OutputConfig::Gray => "gray",
            OutputConfig::Rgb565 => "rgb565",
            OutputConfig::Rgba8888 => "rgba8888",
            OutputConfig::Yuv => "yuv",
        };
        f.write_str(name)
    }
}

/// Downscale applied by the component while decoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScaleFactor {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
}

impl ScaleFactor {
    /// Maps an arbitrary sample size onto the nearest supported factor not
    /// larger than it, clamped to 1..=8.
    pub const fn from_sample_size(sample_size: u32) -> Self {
        match sample_size {
            0 | 1 => ScaleFactor::One,
            2 | 3 => ScaleFactor::Two,
            4..=7 => ScaleFactor::Four,
            _ => ScaleFactor::Eight,
        }
    }

    pub const fn divisor(self) -> u32 {
        self as u32
    }

    /// Scale setting sent to the component, in percent of the frame size.
    pub const fn percent(self) -> u32 {
        match self {
            ScaleFactor::One => 100,
            ScaleFactor::Two => 50,
            ScaleFactor::Four => 25,
            ScaleFactor::Eight => 12,
        }
    }
}

impl TryFrom<u32> for ScaleFactor {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ScaleFactor::One),
            2 => Ok(ScaleFactor::Two),
            4 => Ok(ScaleFactor::Four),
            8 => Ok(ScaleFactor::Eight),
            v => Err(Error::UnsupportedScale(v)),
        }
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "1/{}", self.divisor())
    }
}

/// What the caller wants out of a decode. The compressed stream itself is
/// passed alongside the request and is only read, rewound and measured.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecodeRequest {
    pub config: OutputConfig,
    pub scale: ScaleFactor,
}

impl DecodeRequest {
    pub fn new(config: OutputConfig, scale: ScaleFactor) -> Self {
        Self { config, scale }
    }

    /// Builds a request from a free-form sample size, see
    /// [`ScaleFactor::from_sample_size`].
    pub fn with_sample_size(config: OutputConfig, sample_size: u32) -> Self {
        Self::new(config, ScaleFactor::from_sample_size(sample_size))
    }
}
