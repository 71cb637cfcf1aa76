// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst JPEG Decoder Library
//!
//! This library decodes JPEG images through an external, asynchronously
//! driven decode component such as a hardware JPEG block. It parses the
//! stream header, negotiates the component's ports, runs one decode session
//! through an event-driven state machine and delivers the decoded pixels
//! back to the caller.
//!
//! ## Features
//!
//! - **Header Parsing**: Frame size, chroma sampling and progressive mode
//!   are read from the marker segments without decoding entropy data.
//! - **Component Sessions**: Every decode acquires a component instance,
//!   negotiates both ports, owns the two transfer buffers and releases
//!   everything again, on success and on failure alike.
//! - **Output Formats**: Grayscale, RGB565, RGBA8888 and native YUV, with
//!   downscaling by 1/2, 1/4 or 1/8.
//! - **Software Component**: A libjpeg-turbo backed component implementing
//!   the same contract, for hosts without decode hardware.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_jpegdec::{
//!     decoder::{Decoder, DecoderOptions},
//!     request::{DecodeRequest, OutputConfig},
//!     soft::SoftCore,
//! };
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let decoder = Decoder::new(SoftCore, DecoderOptions::default());
//! let mut file = File::open("image.jpg")?;
//!
//! // Decode at quarter size
//! let request = DecodeRequest::with_sample_size(OutputConfig::Gray, 4);
//! let image = decoder.decode(&mut file, &request)?;
//! assert_eq!(image.pixels.len(), (image.width * image.height) as usize);
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//!
//! The caller's thread blocks for the whole decode. Component callbacks may
//! arrive on any thread; they only record events and copy the output, the
//! decisions are all taken on the caller's thread.

pub mod bridge;
pub mod buffer;
pub mod component;
pub mod decoder;
pub mod error;
pub mod header;
pub mod machine;
pub mod mailbox;
pub mod request;
pub mod session;
pub mod soft;
pub mod stats;
pub mod stream;

pub use decoder::{Bounds, DecodedImage, Decoder, DecoderOptions};
pub use error::{Error, Result, Status};
pub use request::{DecodeRequest, OutputConfig, ScaleFactor};
