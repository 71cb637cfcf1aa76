// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_jpegdec::{
    decoder::{DecoderOptions, DEFAULT_COMPONENT},
    request::{DecodeRequest, OutputConfig},
};
use std::{path::PathBuf, time::Duration};

/// Command-line arguments for the EdgeFirst JPEG decoder.
///
/// Decodes one JPEG file through the decode component and writes the raw
/// pixels to a file. Arguments can be specified via command line or
/// environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edgefirst-jpegdec image.jpg --output image.rgba --config rgba8888 --scale 2
///
/// # Via environment variables
/// export INPUT=image.jpg
/// export CONFIG=gray
/// edgefirst-jpegdec --bounds
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Compressed JPEG image to decode
    #[arg(env = "INPUT")]
    pub input: PathBuf,

    /// Write the decoded raw pixels to this file
    #[arg(short, long, env = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Pixel configuration of the decoded image
    #[arg(short, long, env = "CONFIG", default_value = "rgba8888", value_enum)]
    pub config: OutputConfig,

    /// Sample size; rounded down to 1, 2, 4 or 8
    #[arg(short, long, env = "SCALE", default_value = "1")]
    pub scale: u32,

    /// Name of the decode component to instantiate
    #[arg(long, env = "COMPONENT", default_value = DEFAULT_COMPONENT)]
    pub component: String,

    /// Abort a decode when the component is silent for this many
    /// milliseconds (0 waits forever)
    #[arg(long, env = "WATCHDOG_MS", default_value = "0")]
    pub watchdog_ms: u64,

    /// Print the header and output bounds as JSON instead of decoding
    #[arg(long)]
    pub bounds: bool,

    /// Number of times to decode the image
    #[arg(long, env = "REPEAT", default_value = "1")]
    pub repeat: u32,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log to the systemd journal
    #[arg(long, env = "JOURNALD")]
    pub journald: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl Args {
    pub fn request(&self) -> DecodeRequest {
        DecodeRequest::with_sample_size(self.config, self.scale)
    }
}

impl From<&Args> for DecoderOptions {
    fn from(args: &Args) -> Self {
        DecoderOptions {
            component: args.component.clone(),
            watchdog: match args.watchdog_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }
}
