// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    bridge::CompletionBridge,
    component::{ComponentCore, ComponentState},
    error::{Error, Result},
    header::{parse_header, HeaderInfo},
    mailbox::{EventAdapter, Mailbox},
    machine::StateMachine,
    request::{DecodeRequest, OutputConfig, ScaleFactor},
    session::Session,
    stats,
    stream::ByteStream,
};
use std::{fmt, sync::Arc, time::Duration, time::Instant};
use tracing::{debug, info, info_span};

/// Component instantiated when no other name is configured.
pub const DEFAULT_COMPONENT: &str = "jpeg.decoder";

/// Decoder configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Name of the component to instantiate for every decode.
    pub component: String,
    /// Upper bound on the wait for each component event. `None` waits
    /// forever.
    pub watchdog: Option<Duration>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            component: DEFAULT_COMPONENT.to_owned(),
            watchdog: None,
        }
    }
}

/// Output geometry of a decode, known from the header alone.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
    pub config: OutputConfig,
    pub scale: ScaleFactor,
    pub header: HeaderInfo,
}

/// A decoded image.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub config: OutputConfig,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("config", &self.config)
            .field("pixels", &self.pixels.len())
            .finish()
    }
}

impl fmt::Display for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} {} bytes",
            self.width,
            self.height,
            self.config,
            self.pixels.len()
        )
    }
}

/// Decodes compressed images through an external decode component.
///
/// Every call to [`Decoder::decode`] acquires a fresh component instance
/// from the core, drives it through one decode and releases it again. The
/// calling thread blocks until the component has been torn down.
///
/// # Example
///
/// ```no_run
/// use edgefirst_jpegdec::{
///     decoder::{Decoder, DecoderOptions},
///     request::{DecodeRequest, OutputConfig, ScaleFactor},
///     soft::SoftCore,
/// };
/// use std::fs::File;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let decoder = Decoder::new(SoftCore, DecoderOptions::default());
/// let mut file = File::open("image.jpg")?;
/// let request = DecodeRequest::new(OutputConfig::Rgba8888, ScaleFactor::Two);
/// let image = decoder.decode(&mut file, &request)?;
/// println!("decoded {}", image);
/// # Ok(())
/// # }
/// ```
pub struct Decoder<C: ComponentCore> {
    core: C,
    options: DecoderOptions,
}

impl<C: ComponentCore> Decoder<C> {
    pub fn new(core: C, options: DecoderOptions) -> Self {
        Self { core, options }
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Reads only the header and reports the output geometry of `request`.
    /// No component resources are used.
    pub fn read_bounds<S: ByteStream + ?Sized>(
        &self,
        stream: &mut S,
        request: &DecodeRequest,
    ) -> Result<Bounds> {
        let header = parse_header(stream)?;
        Ok(Bounds {
            width: header.coded_width / request.scale.divisor(),
            height: header.coded_height / request.scale.divisor(),
            config: request.config,
            scale: request.scale,
            header,
        })
    }

    /// Decodes `stream` into pixels as described by `request`.
    ///
    /// The output is `width/scale` by `height/scale` pixels of the aligned
    /// frame size reported by the header.
    ///
    /// # Errors
    ///
    /// Header and configuration errors are returned before any buffer is
    /// allocated. Errors raised while the component runs are returned after
    /// the component has been torn down.
    pub fn decode<S: ByteStream + ?Sized>(
        &self,
        stream: &mut S,
        request: &DecodeRequest,
    ) -> Result<DecodedImage> {
        let _span = info_span!("decode", config = %request.config, scale = %request.scale).entered();
        let start = Instant::now();

        let res = self.decode_inner(stream, request);
        match &res {
            Ok(image) => {
                let rate = stats::record(start.elapsed());
                info!("decoded {} in {:?} ({} /s)", image, start.elapsed(), rate);
            }
            Err(e) => {
                stats::record_failure();
                debug!("decode failed: {}", e);
            }
        }
        res
    }

    fn decode_inner<S: ByteStream + ?Sized>(
        &self,
        stream: &mut S,
        request: &DecodeRequest,
    ) -> Result<DecodedImage> {
        let header = parse_header(stream)?;

        let bridge = Arc::new(CompletionBridge::new(request.config.color_format()));
        let mailbox = Arc::new(Mailbox::new());
        let adapter = Arc::new(EventAdapter::new(mailbox.clone(), bridge.clone()));

        let mut session = Session::acquire(&self.core, &self.options.component, adapter)?;
        session.configure(&header, request)?;
        session.allocate_buffers()?;
        session.request_state(ComponentState::Idle)?;

        let history = StateMachine::new(&mut session, &mailbox, stream)
            .with_watchdog(self.options.watchdog)
            .run()?;
        debug!("session states {:?}", history);

        let pixels = bridge.take().ok_or(Error::OutputMissing)?;
        Ok(DecodedImage {
            width: header.width / request.scale.divisor(),
            height: header.height / request.scale.divisor(),
            config: request.config,
            pixels,
        })
    }
}
