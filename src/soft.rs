// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Software JPEG decode component.
//!
//! Implements the component contract on top of libjpeg-turbo so that the
//! decode session can run on hosts without a hardware JPEG block. Commands
//! and buffer transfers are queued to a worker thread which performs the
//! state transitions and the decode, and reports back through the
//! registered callbacks exactly like an asynchronous hardware component.

use crate::{
    buffer::BufferHeader,
    component::{
        Callbacks, ColorFormat, Command, Component, ComponentCore, ComponentEvent,
        ComponentState, Compression, Config, Index, Param, Port, PortConfig, EXT_MAX_RESOLUTION,
        EXT_OUTPUT_COLOR_FORMAT, EXT_PROGRESSIVE,
    },
    decoder::DEFAULT_COMPONENT,
    error::Status,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
};
use tracing::{debug, error, trace, warn};
use turbojpeg::{Decompressor, Image, PixelFormat};

/// Largest buffer the component agrees to allocate.
pub const MAX_BUFFER_SIZE: usize = 256 * 1024 * 1024;

const EXT_BASE: u32 = 0x7F00_0000;

static INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Component runtime providing the software decoder under
/// [`DEFAULT_COMPONENT`].
///
/// Initialisation is process-wide and reference counted: every `init`
/// must be balanced by a `deinit`, and handles can only be created while
/// the count is positive.
#[derive(Copy, Clone, Debug, Default)]
pub struct SoftCore;

impl SoftCore {
    /// Number of outstanding `init` calls.
    pub fn init_count() -> usize {
        INIT_COUNT.load(Ordering::SeqCst)
    }
}

impl ComponentCore for SoftCore {
    fn init(&self) -> Result<(), Status> {
        INIT_COUNT.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_handle(
        &self,
        name: &str,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<Box<dyn Component>, Status> {
        if Self::init_count() == 0 {
            return Err(Status::IncorrectStateOperation);
        }
        if name != DEFAULT_COMPONENT {
            return Err(Status::ComponentNotFound);
        }
        Ok(Box::new(SoftDecoder::spawn(callbacks)?))
    }

    fn free_handle(&self, component: Box<dyn Component>) -> Result<(), Status> {
        drop(component);
        Ok(())
    }

    fn deinit(&self) -> Result<(), Status> {
        INIT_COUNT
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| Status::IncorrectStateOperation)
    }
}

enum Message {
    Command(Command),
    Empty(Arc<BufferHeader>),
    Fill(Arc<BufferHeader>),
    BuffersChanged,
    Shutdown,
}

struct Settings {
    state: ComponentState,
    ports: [PortConfig; 2],
    scale_pct: u32,
    progressive: bool,
    max_resolution: (u32, u32),
    buffers: Vec<Arc<BufferHeader>>,
    next_id: u64,
}

impl Settings {
    fn port(&self, index: u32) -> Result<&PortConfig, Status> {
        self.ports.get(index as usize).ok_or(Status::BadParameter)
    }

    fn populated(&self) -> bool {
        self.ports
            .iter()
            .filter(|port| port.enabled)
            .all(|port| self.buffers.iter().any(|b| b.port() == port.index))
    }
}

type Shared = Arc<Mutex<Settings>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Settings> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One software decoder instance with its worker thread.
pub struct SoftDecoder {
    shared: Shared,
    tx: kanal::Sender<Message>,
    worker: Option<JoinHandle<()>>,
}

impl SoftDecoder {
    pub fn spawn(callbacks: Arc<dyn Callbacks>) -> Result<Self, Status> {
        let mut input = PortConfig::new(0, Port::Input);
        input.compression = Compression::Jpeg;
        let mut output = PortConfig::new(1, Port::Output);
        output.color_format = ColorFormat::CbYCrY;

        let shared = Arc::new(Mutex::new(Settings {
            state: ComponentState::Loaded,
            ports: [input, output],
            scale_pct: 100,
            progressive: false,
            max_resolution: (0, 0),
            buffers: Vec::new(),
            next_id: 1,
        }));

        let (tx, rx) = kanal::unbounded();
        let worker = Worker {
            shared: shared.clone(),
            callbacks,
            pending: None,
            input: None,
            output: None,
        };
        let worker = thread::Builder::new()
            .name("soft-jpegdec".to_owned())
            .spawn(move || worker.run(rx))
            .map_err(|e| {
                error!("failed to spawn decoder worker: {}", e);
                Status::InsufficientResources
            })?;

        Ok(Self {
            shared,
            tx,
            worker: Some(worker),
        })
    }

    fn queue(&self, message: Message) -> Result<(), Status> {
        self.tx.send(message).map_err(|_| Status::InvalidState)
    }
}

impl Drop for SoftDecoder {
    fn drop(&mut self) {
        _ = self.tx.send(Message::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("decoder worker panicked");
            }
        }
        debug!("software decoder destroyed");
    }
}

fn supported_output(format: ColorFormat) -> bool {
    matches!(
        format,
        ColorFormat::L8 | ColorFormat::Rgb565 | ColorFormat::Argb8888
    )
}

impl Component for SoftDecoder {
    fn get_parameter(&self, index: Index) -> Result<Param, Status> {
        let settings = lock(&self.shared);
        match index {
            Index::PortRange => Ok(Param::PortRange { start: 0, count: 2 }),
            Index::PortDefinition(port) => Ok(Param::PortDefinition(settings.port(port)?.clone())),
            Index::Extension(n) if n == EXT_BASE + 3 => Ok(Param::Resolution {
                width: settings.max_resolution.0,
                height: settings.max_resolution.1,
            }),
            _ => Err(Status::UnsupportedIndex),
        }
    }

    fn set_parameter(&self, index: Index, param: &Param) -> Result<(), Status> {
        let mut settings = lock(&self.shared);
        if settings.state != ComponentState::Loaded {
            return Err(Status::IncorrectStateOperation);
        }
        match (index, param) {
            (Index::PortDefinition(n), Param::PortDefinition(port)) => {
                settings.port(n)?;
                if port.index != n || port.buffer_count == 0 || port.buffer_size == 0 {
                    return Err(Status::BadParameter);
                }
                match port.direction {
                    Port::Input if port.compression != Compression::Jpeg => {
                        return Err(Status::UnsupportedSetting)
                    }
                    Port::Output if !supported_output(port.color_format) => {
                        return Err(Status::UnsupportedSetting)
                    }
                    _ => {}
                }
                settings.ports[n as usize] = port.clone();
                Ok(())
            }
            (Index::Extension(n), Param::Resolution { width, height }) if n == EXT_BASE + 3 => {
                settings.max_resolution = (*width, *height);
                Ok(())
            }
            (Index::PortDefinition(_), _) | (Index::Extension(_), _) => Err(Status::BadParameter),
            _ => Err(Status::UnsupportedIndex),
        }
    }

    fn get_extension_index(&self, name: &str) -> Result<Index, Status> {
        match name {
            EXT_PROGRESSIVE => Ok(Index::Extension(EXT_BASE + 1)),
            EXT_OUTPUT_COLOR_FORMAT => Ok(Index::Extension(EXT_BASE + 2)),
            EXT_MAX_RESOLUTION => Ok(Index::Extension(EXT_BASE + 3)),
            _ => Err(Status::UnsupportedIndex),
        }
    }

    fn set_config(&self, index: Index, config: &Config) -> Result<(), Status> {
        let mut settings = lock(&self.shared);
        match (index, config) {
            (
                Index::CommonScale,
                Config::Scale {
                    width_pct,
                    height_pct,
                },
            ) => {
                if width_pct != height_pct || !matches!(width_pct, 100 | 50 | 25 | 12) {
                    return Err(Status::UnsupportedSetting);
                }
                settings.scale_pct = *width_pct;
                Ok(())
            }
            (Index::Extension(n), Config::Progressive(progressive)) if n == EXT_BASE + 1 => {
                settings.progressive = *progressive;
                Ok(())
            }
            (Index::Extension(n), Config::ColorFormat(format)) if n == EXT_BASE + 2 => {
                if !supported_output(*format) {
                    return Err(Status::UnsupportedSetting);
                }
                settings.ports[1].color_format = *format;
                Ok(())
            }
            (Index::CommonScale, _) | (Index::Extension(_), _) => Err(Status::BadParameter),
            _ => Err(Status::UnsupportedIndex),
        }
    }

    fn allocate_buffer(&self, port: u32, size: usize) -> Result<Arc<BufferHeader>, Status> {
        let mut settings = lock(&self.shared);
        if settings.state != ComponentState::Loaded {
            return Err(Status::IncorrectStateOperation);
        }
        if size < settings.port(port)?.buffer_size {
            return Err(Status::BadParameter);
        }
        if size > MAX_BUFFER_SIZE {
            return Err(Status::InsufficientResources);
        }
        let id = settings.next_id;
        settings.next_id += 1;
        let buffer = Arc::new(BufferHeader::new(id, port, size));
        settings.buffers.push(buffer.clone());
        drop(settings);

        trace!("allocated buffer {} on port {}: {} bytes", id, port, size);
        self.queue(Message::BuffersChanged)?;
        Ok(buffer)
    }

    fn free_buffer(&self, port: u32, buffer: &Arc<BufferHeader>) -> Result<(), Status> {
        let mut settings = lock(&self.shared);
        let pos = settings
            .buffers
            .iter()
            .position(|b| b.id() == buffer.id() && b.port() == port)
            .ok_or(Status::BadParameter)?;
        settings.buffers.swap_remove(pos);
        drop(settings);

        trace!("freed buffer {} on port {}", buffer.id(), port);
        self.queue(Message::BuffersChanged)
    }

    fn send_command(&self, command: Command) -> Result<(), Status> {
        if let Command::PortDisable(n) | Command::PortEnable(n) = command {
            lock(&self.shared).port(n)?;
        }
        self.queue(Message::Command(command))
    }

    fn submit_for_consumption(&self, buffer: &Arc<BufferHeader>) -> Result<(), Status> {
        if buffer.port() != 0 {
            return Err(Status::BadParameter);
        }
        self.queue(Message::Empty(buffer.clone()))
    }

    fn request_fill(&self, buffer: &Arc<BufferHeader>) -> Result<(), Status> {
        if buffer.port() != 1 {
            return Err(Status::BadParameter);
        }
        self.queue(Message::Fill(buffer.clone()))
    }
}

struct Worker {
    shared: Shared,
    callbacks: Arc<dyn Callbacks>,
    /// State transition waiting for buffers to be allocated or freed.
    pending: Option<ComponentState>,
    input: Option<Arc<BufferHeader>>,
    output: Option<Arc<BufferHeader>>,
}

impl Worker {
    fn run(mut self, rx: kanal::Receiver<Message>) {
        while let Ok(message) = rx.recv() {
            match message {
                Message::Command(command) => self.command(command),
                Message::Empty(buffer) => self.transfer(buffer, true),
                Message::Fill(buffer) => self.transfer(buffer, false),
                Message::BuffersChanged => self.complete_pending(),
                Message::Shutdown => break,
            }
        }
        trace!("decoder worker exiting");
    }

    fn state(&self) -> ComponentState {
        lock(&self.shared).state
    }

    fn error(&self, status: Status) {
        self.callbacks.on_event(ComponentEvent::Error(status));
    }

    fn confirm(&self, state: ComponentState) {
        lock(&self.shared).state = state;
        self.callbacks
            .on_event(ComponentEvent::CommandComplete(Command::StateSet(state)));
    }

    fn command(&mut self, command: Command) {
        match command {
            Command::StateSet(target) => self.state_set(target),
            Command::PortDisable(n) | Command::PortEnable(n) => {
                let enable = matches!(command, Command::PortEnable(_));
                if let Some(port) = lock(&self.shared).ports.get_mut(n as usize) {
                    port.enabled = enable;
                }
                self.callbacks
                    .on_event(ComponentEvent::CommandComplete(command));
            }
        }
    }

    fn state_set(&mut self, target: ComponentState) {
        let current = self.state();
        if current == target {
            self.error(Status::IncorrectStateOperation);
            return;
        }
        match (current, target) {
            (_, ComponentState::Invalid) => {
                self.pending = None;
                self.input = None;
                self.output = None;
                lock(&self.shared).state = ComponentState::Invalid;
            }
            (ComponentState::Invalid, _) => self.error(Status::InvalidState),
            (ComponentState::Loaded, ComponentState::Idle)
            | (ComponentState::Idle, ComponentState::Loaded) => {
                self.pending = Some(target);
                self.complete_pending();
            }
            (ComponentState::Idle, ComponentState::Executing) => self.confirm(target),
            (ComponentState::Executing, ComponentState::Idle) => {
                // Buffers still queued are dropped unprocessed.
                self.input = None;
                self.output = None;
                self.confirm(target);
            }
            _ => self.error(Status::IncorrectStateOperation),
        }
    }

    fn complete_pending(&mut self) {
        let ready = {
            let settings = lock(&self.shared);
            match self.pending {
                Some(ComponentState::Idle) => settings.populated(),
                Some(ComponentState::Loaded) => settings.buffers.is_empty(),
                _ => false,
            }
        };
        if ready {
            if let Some(target) = self.pending.take() {
                self.confirm(target);
            }
        }
    }

    fn transfer(&mut self, buffer: Arc<BufferHeader>, input: bool) {
        if self.state() != ComponentState::Executing {
            self.error(Status::IncorrectStateOperation);
            return;
        }
        if input {
            self.input = Some(buffer);
        } else {
            self.output = Some(buffer);
        }
        if self.input.is_none() || self.output.is_none() {
            return;
        }

        let (Some(input), Some(output)) = (self.input.take(), self.output.take()) else {
            return;
        };
        let jpeg = input.lock().filled().to_vec();
        let target = {
            let settings = lock(&self.shared);
            trace!(
                "decoding {} bytes at {}% (progressive {})",
                jpeg.len(),
                settings.scale_pct,
                settings.progressive
            );
            Target {
                format: settings.ports[1].color_format,
                width: settings.ports[1].frame_width,
                height: settings.ports[1].frame_height,
                step: scale_step(settings.scale_pct),
            }
        };

        let res = {
            let mut contents = output.lock();
            decode_into(&jpeg, &mut contents.data, &target).map(|n| contents.filled_len = n)
        };
        match res {
            Ok(()) => {
                self.callbacks.on_output_filled(&output);
                self.callbacks.on_input_consumed(&input);
            }
            Err(status) => {
                error!("software decode failed: {}", status);
                self.error(status);
            }
        }
    }
}

struct Target {
    format: ColorFormat,
    width: u32,
    height: u32,
    step: usize,
}

fn scale_step(pct: u32) -> usize {
    match pct {
        50 => 2,
        25 => 4,
        12 => 8,
        _ => 1,
    }
}

/// Decodes `jpeg` into `out` as a `width/step` by `height/step` frame of
/// `target.format`. Returns the number of bytes written.
fn decode_into(jpeg: &[u8], out: &mut [u8], target: &Target) -> Result<usize, Status> {
    let (format, src_bpp, dst_bpp) = match target.format {
        ColorFormat::L8 => (PixelFormat::GRAY, 1, 1),
        ColorFormat::Rgb565 => (PixelFormat::RGB, 3, 2),
        ColorFormat::Argb8888 => (PixelFormat::BGRA, 4, 4),
        _ => return Err(Status::UnsupportedSetting),
    };

    let mut decompressor = Decompressor::new().map_err(|_| Status::InsufficientResources)?;
    let header = decompressor
        .read_header(jpeg)
        .map_err(|_| Status::StreamCorrupt)?;

    let pitch = header.width * src_bpp;
    let mut image = Image {
        pixels: vec![0u8; header.height * pitch],
        width: header.width,
        pitch,
        height: header.height,
        format,
    };
    decompressor
        .decompress(jpeg, image.as_deref_mut())
        .map_err(|_| Status::StreamCorrupt)?;

    let out_width = target.width as usize / target.step;
    let out_height = target.height as usize / target.step;
    let stride = out_width * dst_bpp;
    let len = stride * out_height;
    if out.len() < len {
        return Err(Status::InsufficientResources);
    }
    out[..len].fill(0);

    for y in 0..out_height.min(header.height.div_ceil(target.step)) {
        let src_row = &image.pixels[y * target.step * pitch..][..pitch];
        let dst_row = &mut out[y * stride..][..stride];
        for x in 0..out_width.min(header.width.div_ceil(target.step)) {
            let src = &src_row[x * target.step * src_bpp..][..src_bpp];
            let dst = &mut dst_row[x * dst_bpp..][..dst_bpp];
            if target.format == ColorFormat::Rgb565 {
                let px = (u16::from(src[0] >> 3) << 11)
                    | (u16::from(src[1] >> 2) << 5)
                    | u16::from(src[2] >> 3);
                dst.copy_from_slice(&px.to_le_bytes());
            } else {
                dst.copy_from_slice(src);
            }
        }
    }

    Ok(len)
}
