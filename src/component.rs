// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Contract between the decode session and an external decode component.
//!
//! A component is an asynchronously driven codec instance. Commands and
//! buffer transfers are submitted through [`Component`] and return as soon
//! as they are queued; their completion is reported later, usually from a
//! thread owned by the component, through the [`Callbacks`] entry points the
//! session registered when the handle was acquired.
//!
//! Components are created and destroyed through a [`ComponentCore`], which
//! also carries the process-wide init/deinit of the component runtime.

use crate::{buffer::BufferHeader, error::Status};
use std::{fmt, sync::Arc};

/// Direction of a component port.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Port {
    Input,
    Output,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Port::Input => f.write_str("input"),
            Port::Output => f.write_str("output"),
        }
    }
}

/// Component states reachable through [`Command::StateSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComponentState {
    Loaded,
    Idle,
    Executing,
    Invalid,
}

/// Asynchronous commands. Completion is reported through
/// [`Callbacks::on_event`] with [`ComponentEvent::CommandComplete`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    StateSet(ComponentState),
    PortDisable(u32),
    PortEnable(u32),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Command::StateSet(state) => write!(f, "state-set {:?}", state),
            Command::PortDisable(port) => write!(f, "port-disable {}", port),
            Command::PortEnable(port) => write!(f, "port-enable {}", port),
        }
    }
}

/// Pixel layouts understood by the decode component.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorFormat {
    Unused,
    /// 8-bit luminance.
    L8,
    /// 16-bit RGB 5:6:5, little endian.
    Rgb565,
    /// 32-bit ARGB stored little endian, so B, G, R, A in memory.
    Argb8888,
    /// Interleaved YUV 4:2:2, byte order Cb Y Cr Y.
    CbYCrY,
    /// Interleaved YUV 4:2:2, byte order Y Cb Y Cr.
    YCbYCr,
    Yuv420Planar,
    Yuv411Planar,
    Yuv444Interleaved,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Compression {
    Unused,
    Jpeg,
}

/// Negotiated definition of one port.
///
/// Read with [`Index::PortDefinition`], modified, and written back while
/// the component is Loaded. The session holds one per direction and never
/// changes it after the component leaves the Loaded state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortConfig {
    pub index: u32,
    pub direction: Port,
    pub enabled: bool,
    pub buffer_count: u32,
    pub buffer_size: usize,
    pub frame_width: u32,
    pub frame_height: u32,
    pub compression: Compression,
    pub color_format: ColorFormat,
}

impl PortConfig {
    pub fn new(index: u32, direction: Port) -> Self {
        Self {
            index,
            direction,
            enabled: true,
            buffer_count: 1,
            buffer_size: 0,
            frame_width: 0,
            frame_height: 0,
            compression: Compression::Unused,
            color_format: ColorFormat::Unused,
        }
    }
}

/// Parameter and config indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Index {
    /// First port number and number of ports of the image domain.
    PortRange,
    PortDefinition(u32),
    /// Output scaling, in percent of the frame size.
    CommonScale,
    /// Vendor index resolved through [`Component::get_extension_index`].
    Extension(u32),
}

/// Payload of [`Component::get_parameter`] and [`Component::set_parameter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Param {
    PortRange { start: u32, count: u32 },
    PortDefinition(PortConfig),
    Resolution { width: u32, height: u32 },
}

/// Payload of [`Component::set_config`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Config {
    Scale { width_pct: u32, height_pct: u32 },
    Progressive(bool),
    ColorFormat(ColorFormat),
}

/// Extension enabling the progressive decode path.
pub const EXT_PROGRESSIVE: &str = "jpeg.decode.config.progressive";
/// Extension selecting the color format produced on the output port.
pub const EXT_OUTPUT_COLOR_FORMAT: &str = "jpeg.decode.config.output-color-format";
/// Extension bounding the frame size the component prepares for.
pub const EXT_MAX_RESOLUTION: &str = "jpeg.decode.param.max-resolution";

/// Events delivered through [`Callbacks::on_event`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComponentEvent {
    CommandComplete(Command),
    Error(Status),
}

/// Entry points the component invokes when asynchronous work completes.
///
/// They may be called from any thread and must not block on the component.
pub trait Callbacks: Send + Sync {
    fn on_event(&self, event: ComponentEvent);

    /// The component is done reading `buffer`, submitted with
    /// [`Component::submit_for_consumption`].
    fn on_input_consumed(&self, buffer: &BufferHeader);

    /// The component has written `buffer`, submitted with
    /// [`Component::request_fill`]. Its filled length is valid.
    fn on_output_filled(&self, buffer: &BufferHeader);
}

/// One instance of an external decode component.
pub trait Component: Send {
    fn get_parameter(&self, index: Index) -> Result<Param, Status>;

    fn set_parameter(&self, index: Index, param: &Param) -> Result<(), Status>;

    fn get_extension_index(&self, name: &str) -> Result<Index, Status>;

    fn set_config(&self, index: Index, config: &Config) -> Result<(), Status>;

    /// Allocates a buffer of `size` bytes for `port`.
    fn allocate_buffer(&self, port: u32, size: usize) -> Result<Arc<BufferHeader>, Status>;

    fn free_buffer(&self, port: u32, buffer: &Arc<BufferHeader>) -> Result<(), Status>;

    /// Queues `command`. Acceptance only means the command was queued.
    fn send_command(&self, command: Command) -> Result<(), Status>;

    /// Hands a filled input buffer to the component.
    fn submit_for_consumption(&self, buffer: &Arc<BufferHeader>) -> Result<(), Status>;

    /// Hands an empty output buffer to the component to be filled.
    fn request_fill(&self, buffer: &Arc<BufferHeader>) -> Result<(), Status>;
}

/// Runtime that instantiates components by name.
pub trait ComponentCore: Send + Sync {
    /// Process-wide initialisation. Every successful `init` is paired with
    /// one `deinit`.
    fn init(&self) -> Result<(), Status>;

    fn get_handle(
        &self,
        name: &str,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<Box<dyn Component>, Status>;

    /// Destroys a component. No callback is delivered once this returns.
    fn free_handle(&self, component: Box<dyn Component>) -> Result<(), Status>;

    fn deinit(&self) -> Result<(), Status>;
}
