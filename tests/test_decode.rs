// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_jpegdec::{
    buffer::{BufferHeader, Owner},
    component::{
        Callbacks, ColorFormat, Command, Component, ComponentCore, ComponentEvent,
        ComponentState, Config, Index, Param, Port, PortConfig,
    },
    decoder::{Decoder, DecoderOptions},
    error::{Error, Status},
    machine::SessionState,
    request::{DecodeRequest, OutputConfig, ScaleFactor},
    soft::SoftCore,
    stats,
};
use serial_test::serial;
use std::{
    error::Error as StdError,
    io::Cursor,
    sync::{Arc, Mutex},
    time::Duration,
};
use turbojpeg::{Image, PixelFormat, Subsamp};

fn compress(
    width: usize,
    height: usize,
    rgb: impl Fn(usize, usize) -> [u8; 3],
    subsamp: Subsamp,
) -> Result<Vec<u8>, Box<dyn StdError>> {
    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&rgb(x, y));
        }
    }
    let image = Image {
        pixels: pixels.as_slice(),
        width,
        pitch: width * 3,
        height,
        format: PixelFormat::RGB,
    };
    Ok(turbojpeg::compress(image, 100, subsamp)?.to_vec())
}

fn gradient(width: usize, height: usize) -> Result<Vec<u8>, Box<dyn StdError>> {
    compress(
        width,
        height,
        |x, y| [(x * 255 / width) as u8, (y * 255 / height) as u8, 96],
        Subsamp::Sub2x2,
    )
}

fn solid(width: usize, height: usize, rgb: [u8; 3]) -> Result<Vec<u8>, Box<dyn StdError>> {
    compress(width, height, |_, _| rgb, Subsamp::None)
}

fn soft_decoder() -> Decoder<SoftCore> {
    Decoder::new(SoftCore, DecoderOptions::default())
}

#[test]
#[serial]
fn test_soft_rgba() -> Result<(), Box<dyn StdError>> {
    let jpeg = solid(64, 32, [250, 10, 20])?;
    let request = DecodeRequest::new(OutputConfig::Rgba8888, ScaleFactor::One);
    let image = soft_decoder().decode(&mut Cursor::new(jpeg), &request)?;
    println!("{}", image);

    assert_eq!((image.width, image.height), (64, 32));
    assert_eq!(image.pixels.len(), 64 * 32 * 4);
    for px in image.pixels.chunks_exact(4) {
        // Red first: the component writes B,G,R,A and the bridge swaps.
        assert!(px[0] > 230, "{:?}", px);
        assert!(px[2] < 40, "{:?}", px);
        assert_eq!(px[3], 255);
    }
    Ok(())
}

#[test]
#[serial]
fn test_soft_rgb565() -> Result<(), Box<dyn StdError>> {
    let jpeg = solid(32, 16, [255, 0, 0])?;
    let request = DecodeRequest::new(OutputConfig::Rgb565, ScaleFactor::One);
    let image = soft_decoder().decode(&mut Cursor::new(jpeg), &request)?;

    assert_eq!(image.pixels.len(), 32 * 16 * 2);
    for px in image.pixels.chunks_exact(2) {
        let px = u16::from_le_bytes([px[0], px[1]]);
        assert!(px >> 11 >= 30, "{:04x}", px);
        assert!(px & 0x1F <= 1, "{:04x}", px);
    }
    Ok(())
}

#[test]
#[serial]
fn test_soft_gray_matches_reference() -> Result<(), Box<dyn StdError>> {
    let jpeg = gradient(100, 75)?;
    let reference = turbojpeg::decompress(&jpeg, PixelFormat::GRAY)?;
    let decoder = soft_decoder();

    for scale in [ScaleFactor::One, ScaleFactor::Two] {
        let step = scale.divisor() as usize;
        let request = DecodeRequest::new(OutputConfig::Gray, scale);
        let image = decoder.decode(&mut Cursor::new(jpeg.clone()), &request)?;

        // Aligned frame is 128x80.
        let width = 128 / step;
        assert_eq!(image.width as usize, width);
        assert_eq!(image.height as usize, 80 / step);
        assert_eq!(image.pixels.len(), width * 80 / step);

        for y in 0..75usize.div_ceil(step) {
            for x in 0..100usize.div_ceil(step) {
                assert_eq!(
                    image.pixels[y * width + x],
                    reference.pixels[y * step * reference.pitch + x * step],
                    "scale {} at {},{}",
                    scale,
                    x,
                    y
                );
            }
            // Alignment padding is left black.
            assert!(image.pixels[y * width + 100usize.div_ceil(step)..(y + 1) * width]
                .iter()
                .all(|&p| p == 0));
        }
    }
    Ok(())
}

#[test]
#[serial]
fn test_soft_scales() -> Result<(), Box<dyn StdError>> {
    let jpeg = gradient(256, 128)?;
    let decoder = soft_decoder();

    for sample_size in [1, 2, 3, 4, 6, 8, 16] {
        let request = DecodeRequest::with_sample_size(OutputConfig::Rgba8888, sample_size);
        let image = decoder.decode(&mut Cursor::new(jpeg.clone()), &request)?;
        let scale = request.scale.divisor();
        assert_eq!(image.width, 256 / scale);
        assert_eq!(image.height, 128 / scale);
        assert_eq!(image.pixels.len(), (image.width * image.height * 4) as usize);
    }
    Ok(())
}

#[test]
#[serial]
fn test_soft_releases_component() -> Result<(), Box<dyn StdError>> {
    let before = SoftCore::init_count();
    let jpeg = gradient(64, 64)?;
    let decoder = soft_decoder();

    decoder.decode(
        &mut Cursor::new(jpeg.clone()),
        &DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One),
    )?;
    assert_eq!(SoftCore::init_count(), before);

    // Native YUV output is not produced by the software component.
    let res = decoder.decode(
        &mut Cursor::new(jpeg),
        &DecodeRequest::new(OutputConfig::Yuv, ScaleFactor::One),
    );
    assert!(matches!(
        res,
        Err(Error::InvalidPortConfig {
            port: Port::Output,
            status: Status::UnsupportedSetting
        })
    ));
    assert_eq!(SoftCore::init_count(), before);
    Ok(())
}

#[test]
#[serial]
fn test_soft_unknown_component() -> Result<(), Box<dyn StdError>> {
    let before = SoftCore::init_count();
    let options = DecoderOptions {
        component: "video.decoder".to_owned(),
        ..Default::default()
    };
    let decoder = Decoder::new(SoftCore, options);
    let res = decoder.decode(
        &mut Cursor::new(gradient(32, 32)?),
        &DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One),
    );
    assert!(matches!(
        res,
        Err(Error::ComponentUnavailable {
            status: Status::ComponentNotFound,
            ..
        })
    ));
    assert_eq!(SoftCore::init_count(), before);
    Ok(())
}

#[test]
#[serial]
fn test_soft_corrupt_scan() -> Result<(), Box<dyn StdError>> {
    let mut jpeg = gradient(64, 64)?;
    // Keep the headers, drop most of the entropy-coded data.
    let sos = jpeg
        .windows(2)
        .position(|w| w == [0xFF, 0xDA])
        .ok_or("no scan")?;
    jpeg.truncate(sos + 16);

    let res = soft_decoder().decode(
        &mut Cursor::new(jpeg),
        &DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One),
    );
    // libjpeg-turbo may pad a truncated scan instead of failing; either way
    // the session ends and the component is released.
    match res {
        Ok(image) => assert_eq!(image.pixels.len(), 64 * 64),
        Err(e) => assert!(matches!(e, Error::ComponentReportedError(_)), "{}", e),
    }
    Ok(())
}

#[test]
#[serial]
fn test_read_bounds() -> Result<(), Box<dyn StdError>> {
    let before = SoftCore::init_count();
    let jpeg = gradient(100, 75)?;
    let decoder = soft_decoder();

    let request = DecodeRequest::new(OutputConfig::Rgb565, ScaleFactor::Two);
    let bounds = decoder.read_bounds(&mut Cursor::new(jpeg), &request)?;
    assert_eq!((bounds.width, bounds.height), (50, 37));
    assert_eq!(bounds.config, OutputConfig::Rgb565);
    assert_eq!(bounds.header.width, 128);
    assert_eq!(SoftCore::init_count(), before);
    Ok(())
}

#[test]
#[serial]
fn test_stats() -> Result<(), Box<dyn StdError>> {
    stats::init(4);
    let jpeg = gradient(32, 32)?;
    let decoder = soft_decoder();
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);

    decoder.decode(&mut Cursor::new(jpeg.clone()), &request)?;
    decoder.decode(&mut Cursor::new(jpeg), &request)?;
    assert!(decoder
        .decode(&mut Cursor::new(vec![0u8; 16]), &request)
        .is_err());

    let snapshot = stats::snapshot();
    assert_eq!(snapshot.decodes, 2);
    assert_eq!(snapshot.failures, 1);
    assert!(snapshot.rate > 0);

    stats::reset();
    assert_eq!(stats::snapshot(), stats::Snapshot::default());
    Ok(())
}

/// Failure injected by the scripted component.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Fault {
    None,
    /// Report an error instead of confirming the first Idle transition.
    ErrorOnIdle,
    /// Return the input buffer and report an error right after it.
    ConsumedThenError,
    /// Never confirm the first Idle transition.
    Silent,
    /// Refuse the Executing transition.
    RejectExecuting,
    /// Refuse the scale setting.
    RejectScale,
    /// Consume the input but never return the output buffer.
    NoOutput,
    /// Report an error instead of confirming the Executing transition.
    ErrorOnExecuting,
    /// Confirm Executing a second time instead of returning any buffer.
    DuplicateExecuting,
}

#[derive(Default, Debug)]
struct Log {
    inits: usize,
    deinits: usize,
    handles: usize,
    handles_freed: usize,
    commands: Vec<Command>,
    scales: Vec<u32>,
    allocated: Vec<u32>,
    sizes: Vec<usize>,
    freed: Vec<u32>,
}

struct ScriptedCore {
    fault: Fault,
    log: Arc<Mutex<Log>>,
}

impl ScriptedCore {
    fn new(fault: Fault) -> (Self, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        (
            Self {
                fault,
                log: log.clone(),
            },
            log,
        )
    }
}

impl ComponentCore for ScriptedCore {
    fn init(&self) -> Result<(), Status> {
        self.log.lock().unwrap().inits += 1;
        Ok(())
    }

    fn get_handle(
        &self,
        _name: &str,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<Box<dyn Component>, Status> {
        self.log.lock().unwrap().handles += 1;
        Ok(Box::new(Scripted {
            fault: self.fault,
            log: self.log.clone(),
            callbacks,
            format: Mutex::new(ColorFormat::Unused),
            input: Mutex::new(None),
            idle_seen: Mutex::new(false),
        }))
    }

    fn free_handle(&self, component: Box<dyn Component>) -> Result<(), Status> {
        drop(component);
        self.log.lock().unwrap().handles_freed += 1;
        Ok(())
    }

    fn deinit(&self) -> Result<(), Status> {
        self.log.lock().unwrap().deinits += 1;
        Ok(())
    }
}

/// Component that answers synchronously, from inside the calls of the
/// driving loop, on ports 4 and 5.
struct Scripted {
    fault: Fault,
    log: Arc<Mutex<Log>>,
    callbacks: Arc<dyn Callbacks>,
    format: Mutex<ColorFormat>,
    input: Mutex<Option<Arc<BufferHeader>>>,
    idle_seen: Mutex<bool>,
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

impl Component for Scripted {
    fn get_parameter(&self, index: Index) -> Result<Param, Status> {
        match index {
            Index::PortRange => Ok(Param::PortRange { start: 4, count: 2 }),
            Index::PortDefinition(4) => Ok(Param::PortDefinition(PortConfig::new(4, Port::Input))),
            Index::PortDefinition(5) => {
                Ok(Param::PortDefinition(PortConfig::new(5, Port::Output)))
            }
            _ => Err(Status::BadParameter),
        }
    }

    fn set_parameter(&self, index: Index, param: &Param) -> Result<(), Status> {
        if let (Index::PortDefinition(5), Param::PortDefinition(port)) = (index, param) {
            *self.format.lock().unwrap() = port.color_format;
        }
        Ok(())
    }

    fn get_extension_index(&self, name: &str) -> Result<Index, Status> {
        Ok(Index::Extension(name.len() as u32))
    }

    fn set_config(&self, _index: Index, config: &Config) -> Result<(), Status> {
        if let Config::Scale { width_pct, .. } = config {
            self.log.lock().unwrap().scales.push(*width_pct);
            if self.fault == Fault::RejectScale {
                return Err(Status::UnsupportedSetting);
            }
        }
        Ok(())
    }

    fn allocate_buffer(&self, port: u32, size: usize) -> Result<Arc<BufferHeader>, Status> {
        let mut log = self.log.lock().unwrap();
        log.allocated.push(port);
        log.sizes.push(size);
        Ok(Arc::new(BufferHeader::new(log.allocated.len() as u64, port, size)))
    }

    fn free_buffer(&self, port: u32, _buffer: &Arc<BufferHeader>) -> Result<(), Status> {
        self.log.lock().unwrap().freed.push(port);
        Ok(())
    }

    fn send_command(&self, command: Command) -> Result<(), Status> {
        self.log.lock().unwrap().commands.push(command);
        match command {
            Command::StateSet(ComponentState::Executing) if self.fault == Fault::RejectExecuting => {
                return Err(Status::InsufficientResources)
            }
            Command::StateSet(ComponentState::Executing) if self.fault == Fault::ErrorOnExecuting => {
                self.callbacks.on_event(ComponentEvent::Error(Status::Hardware));
                return Ok(());
            }
            Command::StateSet(ComponentState::Idle) => {
                let first = !std::mem::replace(&mut *self.idle_seen.lock().unwrap(), true);
                if first && self.fault == Fault::ErrorOnIdle {
                    self.callbacks.on_event(ComponentEvent::Error(Status::Hardware));
                    return Ok(());
                }
                if first && self.fault == Fault::Silent {
                    return Ok(());
                }
            }
            Command::StateSet(ComponentState::Invalid) => return Ok(()),
            _ => {}
        }
        self.callbacks
            .on_event(ComponentEvent::CommandComplete(command));
        Ok(())
    }

    fn submit_for_consumption(&self, buffer: &Arc<BufferHeader>) -> Result<(), Status> {
        assert_eq!(buffer.owner(), Owner::Component);
        assert!(buffer.end_of_stream());
        *self.input.lock().unwrap() = Some(buffer.clone());
        Ok(())
    }

    fn request_fill(&self, buffer: &Arc<BufferHeader>) -> Result<(), Status> {
        assert_eq!(buffer.owner(), Owner::Component);
        let input = self.input.lock().unwrap().take().ok_or(Status::BadParameter)?;

        match self.fault {
            Fault::ConsumedThenError => {
                self.callbacks.on_input_consumed(&input);
                self.callbacks.on_event(ComponentEvent::Error(Status::Hardware));
            }
            Fault::NoOutput => self.callbacks.on_input_consumed(&input),
            Fault::DuplicateExecuting => {
                *self.input.lock().unwrap() = Some(input);
                self.callbacks.on_event(ComponentEvent::CommandComplete(Command::StateSet(
                    ComponentState::Executing,
                )));
            }
            _ => {
                {
                    let mut contents = buffer.lock();
                    let len = contents.data.len();
                    contents.data.copy_from_slice(&pattern(len));
                    contents.filled_len = len;
                }
                self.callbacks.on_output_filled(buffer);
                self.callbacks.on_input_consumed(&input);
            }
        }
        Ok(())
    }
}

fn scripted(fault: Fault) -> (Decoder<ScriptedCore>, Arc<Mutex<Log>>) {
    let (core, log) = ScriptedCore::new(fault);
    let options = DecoderOptions {
        watchdog: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    (Decoder::new(core, options), log)
}

fn assert_released(log: &Log) {
    assert_eq!(log.inits, log.deinits, "{:?}", log);
    assert_eq!(log.handles, log.handles_freed, "{:?}", log);
    let mut freed = log.freed.clone();
    freed.sort();
    assert_eq!(freed, log.allocated, "{:?}", log);
}

#[test]
#[serial]
fn test_scripted_sequence() -> Result<(), Box<dyn StdError>> {
    let (decoder, log) = scripted(Fault::None);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);
    let image = decoder.decode(&mut Cursor::new(gradient(64, 32)?), &request)?;
    assert_eq!(image.pixels, pattern(64 * 32));

    let log = log.lock().unwrap();
    assert_eq!(log.allocated, vec![4, 5]);
    assert_eq!(
        log.commands,
        vec![
            Command::StateSet(ComponentState::Idle),
            Command::StateSet(ComponentState::Executing),
            Command::StateSet(ComponentState::Idle),
            Command::StateSet(ComponentState::Loaded),
            Command::PortDisable(4),
            Command::PortDisable(5),
        ]
    );
    assert_released(&log);
    Ok(())
}

#[test]
#[serial]
fn test_scripted_rgba_swapped() -> Result<(), Box<dyn StdError>> {
    let (decoder, _) = scripted(Fault::None);
    let request = DecodeRequest::new(OutputConfig::Rgba8888, ScaleFactor::Two);
    let image = decoder.decode(&mut Cursor::new(gradient(64, 32)?), &request)?;

    // Buffer holds width * height * bpp / scale bytes.
    let mut expected = pattern(64 * 32 * 4 / 2);
    for px in expected.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    assert_eq!(image.pixels, expected);
    assert_eq!((image.width, image.height), (32, 16));
    Ok(())
}

#[test]
#[serial]
fn test_scripted_scale_percent() -> Result<(), Box<dyn StdError>> {
    let jpeg = gradient(64, 64)?;
    for (scale, pct) in [
        (ScaleFactor::One, 100),
        (ScaleFactor::Two, 50),
        (ScaleFactor::Four, 25),
        (ScaleFactor::Eight, 12),
    ] {
        let (decoder, log) = scripted(Fault::None);
        let request = DecodeRequest::new(OutputConfig::Rgb565, scale);
        decoder.decode(&mut Cursor::new(jpeg.clone()), &request)?;

        let log = log.lock().unwrap();
        assert_eq!(log.scales, vec![pct]);
        assert_eq!(log.sizes[0], jpeg.len());
        assert_eq!(log.sizes[1], 64 * 64 * 2 / scale.divisor() as usize);
    }
    Ok(())
}

#[test]
#[serial]
fn test_malformed_uses_no_resources() {
    let (decoder, log) = scripted(Fault::None);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);
    let res = decoder.decode(&mut Cursor::new(b"not a jpeg".to_vec()), &request);
    assert!(matches!(res, Err(Error::MalformedInput(_))));

    let log = log.lock().unwrap();
    assert_eq!(log.inits, 0);
    assert_eq!(log.handles, 0);
    assert!(log.allocated.is_empty());
}

#[test]
#[serial]
fn test_error_before_executing() -> Result<(), Box<dyn StdError>> {
    let (decoder, log) = scripted(Fault::ErrorOnIdle);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);
    let res = decoder.decode(&mut Cursor::new(gradient(32, 32)?), &request);
    assert!(matches!(
        res,
        Err(Error::ComponentReportedError(Status::Hardware))
    ));

    let log = log.lock().unwrap();
    assert!(log
        .commands
        .contains(&Command::StateSet(ComponentState::Invalid)));
    assert!(!log
        .commands
        .contains(&Command::StateSet(ComponentState::Executing)));
    // Each buffer freed exactly once.
    assert_eq!(log.freed.len(), 2);
    assert_released(&log);
    Ok(())
}

#[test]
#[serial]
fn test_error_after_idle() -> Result<(), Box<dyn StdError>> {
    let (decoder, log) = scripted(Fault::ErrorOnExecuting);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);
    let res = decoder.decode(&mut Cursor::new(gradient(32, 32)?), &request);
    assert!(matches!(
        res,
        Err(Error::ComponentReportedError(Status::Hardware))
    ));

    let log = log.lock().unwrap();
    assert!(log
        .commands
        .contains(&Command::StateSet(ComponentState::Executing)));
    assert!(log
        .commands
        .contains(&Command::StateSet(ComponentState::Invalid)));
    assert_eq!(log.freed.len(), 2);
    assert_released(&log);
    Ok(())
}

#[test]
#[serial]
fn test_duplicate_executing() -> Result<(), Box<dyn StdError>> {
    let (decoder, log) = scripted(Fault::DuplicateExecuting);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);
    let res = decoder.decode(&mut Cursor::new(gradient(32, 32)?), &request);
    assert!(matches!(
        res,
        Err(Error::UnexpectedTransition {
            from: SessionState::Executing,
            to: SessionState::Executing,
        })
    ));

    // Buffers still lent to the component are freed all the same.
    let log = log.lock().unwrap();
    assert_eq!(log.freed.len(), 2);
    assert_released(&log);
    Ok(())
}

#[test]
#[serial]
fn test_error_displaces_consumed() -> Result<(), Box<dyn StdError>> {
    let (decoder, log) = scripted(Fault::ConsumedThenError);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);
    let res = decoder.decode(&mut Cursor::new(gradient(32, 32)?), &request);
    assert!(matches!(
        res,
        Err(Error::ComponentReportedError(Status::Hardware))
    ));

    // The input-consumed signal was collapsed into the error, so the
    // session never asked for the return to Idle.
    let log = log.lock().unwrap();
    let idles = log
        .commands
        .iter()
        .filter(|c| **c == Command::StateSet(ComponentState::Idle))
        .count();
    assert_eq!(idles, 1);
    assert!(!log
        .commands
        .contains(&Command::StateSet(ComponentState::Loaded)));
    assert_released(&log);
    Ok(())
}

#[test]
#[serial]
fn test_watchdog() -> Result<(), Box<dyn StdError>> {
    let (core, log) = ScriptedCore::new(Fault::Silent);
    let options = DecoderOptions {
        watchdog: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let decoder = Decoder::new(core, options);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);
    let res = decoder.decode(&mut Cursor::new(gradient(32, 32)?), &request);
    assert!(matches!(res, Err(Error::Timeout(_))));
    assert_released(&log.lock().unwrap());
    Ok(())
}

#[test]
#[serial]
fn test_rejected_command() -> Result<(), Box<dyn StdError>> {
    let (decoder, log) = scripted(Fault::RejectExecuting);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);
    let res = decoder.decode(&mut Cursor::new(gradient(32, 32)?), &request);
    assert!(matches!(
        res,
        Err(Error::CommandSubmissionFailed {
            status: Status::InsufficientResources,
            ..
        })
    ));
    assert_released(&log.lock().unwrap());
    Ok(())
}

#[test]
#[serial]
fn test_rejected_scale() -> Result<(), Box<dyn StdError>> {
    let (decoder, log) = scripted(Fault::RejectScale);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::Eight);
    let res = decoder.decode(&mut Cursor::new(gradient(32, 32)?), &request);
    assert!(matches!(res, Err(Error::CapabilityUnsupported { .. })));

    let log = log.lock().unwrap();
    assert!(log.allocated.is_empty());
    assert!(log.commands.iter().all(|c| matches!(c, Command::PortDisable(_))));
    assert_released(&log);
    Ok(())
}

#[test]
#[serial]
fn test_output_missing() -> Result<(), Box<dyn StdError>> {
    let (decoder, log) = scripted(Fault::NoOutput);
    let request = DecodeRequest::new(OutputConfig::Gray, ScaleFactor::One);
    let res = decoder.decode(&mut Cursor::new(gradient(32, 32)?), &request);
    assert!(matches!(res, Err(Error::OutputMissing)));
    assert_released(&log.lock().unwrap());
    Ok(())
}

#[test]
fn test_sample_sizes() {
    for (size, scale) in [
        (0, ScaleFactor::One),
        (1, ScaleFactor::One),
        (2, ScaleFactor::Two),
        (3, ScaleFactor::Two),
        (5, ScaleFactor::Four),
        (7, ScaleFactor::Four),
        (8, ScaleFactor::Eight),
        (64, ScaleFactor::Eight),
    ] {
        assert_eq!(ScaleFactor::from_sample_size(size), scale, "{}", size);
    }
    assert!(matches!(
        ScaleFactor::try_from(3),
        Err(Error::UnsupportedScale(3))
    ));
    assert_eq!(ScaleFactor::try_from(4).ok(), Some(ScaleFactor::Four));
}
