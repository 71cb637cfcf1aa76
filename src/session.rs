// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    buffer::{output_buffer_size, BufferManager, ManagedBuffer, Owner},
    component::{
        Callbacks, ColorFormat, Command, Component, ComponentCore, ComponentState, Compression,
        Config, Index, Param, Port, PortConfig, EXT_MAX_RESOLUTION, EXT_OUTPUT_COLOR_FORMAT,
        EXT_PROGRESSIVE,
    },
    error::{Error, Result, Status},
    header::{HeaderInfo, Sampling},
    request::{DecodeRequest, ScaleFactor},
    stream::ByteStream,
};
use std::sync::Arc;
use tracing::{debug, info_span, warn};

/// Settings applied to one port by [`Session::configure_port`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PortSettings {
    pub frame_width: u32,
    pub frame_height: u32,
    pub compression: Compression,
    pub color_format: ColorFormat,
    pub buffer_size: usize,
}

/// Color format hinted on the input port for a given chroma layout.
pub fn input_color_hint(sampling: Sampling) -> ColorFormat {
    match sampling {
        Sampling::Yuv422Interleaved | Sampling::Yuv444Interleaved | Sampling::Unsupported => {
            ColorFormat::CbYCrY
        }
        _ => ColorFormat::Yuv420Planar,
    }
}

/// Lifecycle of one external decode component instance.
///
/// A session acquires the component, negotiates both ports while the
/// component is Loaded, owns the two port buffers and tears everything
/// down again. Dropping a session that still holds the component performs
/// the same best-effort teardown as [`Session::release`].
pub struct Session<'c> {
    core: &'c dyn ComponentCore,
    name: String,
    component: Option<Box<dyn Component>>,
    input: PortConfig,
    output: PortConfig,
    buffers: BufferManager,
    enabled: [bool; 2],
    frozen: bool,
}

impl<'c> Session<'c> {
    /// Initialises the component runtime and instantiates `name`.
    ///
    /// # Errors
    ///
    /// [`Error::ComponentUnavailable`] if the runtime cannot be initialised
    /// or the component cannot be instantiated. The runtime is deinitialised
    /// again in the latter case.
    pub fn acquire(
        core: &'c dyn ComponentCore,
        name: &str,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<Self> {
        let unavailable = |status| Error::ComponentUnavailable {
            name: name.to_owned(),
            status,
        };

        core.init().map_err(unavailable)?;
        let component = match core.get_handle(name, callbacks) {
            Ok(component) => component,
            Err(status) => {
                if let Err(e) = core.deinit() {
                    warn!("component runtime deinit failed: {}", e);
                }
                return Err(unavailable(status));
            }
        };
        debug!("acquired component {}", name);

        // Dropping the session on the error paths below releases the
        // component again.
        let mut session = Self::new(core, name, component);
        let start = match session.component()?.get_parameter(Index::PortRange) {
            Ok(Param::PortRange { start, count }) if count >= 2 => start,
            Ok(_) => {
                return Err(Error::InvalidPortConfig {
                    port: Port::Input,
                    status: Status::BadParameter,
                })
            }
            Err(status) => {
                return Err(Error::InvalidPortConfig {
                    port: Port::Input,
                    status,
                })
            }
        };
        session.input.index = start;
        session.output.index = start + 1;
        Ok(session)
    }

    fn new(core: &'c dyn ComponentCore, name: &str, component: Box<dyn Component>) -> Self {
        Self {
            core,
            name: name.to_owned(),
            component: Some(component),
            input: PortConfig::new(0, Port::Input),
            output: PortConfig::new(1, Port::Output),
            buffers: BufferManager::default(),
            enabled: [true, true],
            frozen: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The component handle, as long as the session was not released.
    pub fn component(&self) -> Result<&dyn Component> {
        self.component
            .as_deref()
            .ok_or_else(|| Error::ComponentUnavailable {
                name: self.name.clone(),
                status: Status::InvalidState,
            })
    }

    pub fn is_released(&self) -> bool {
        self.component.is_none()
    }

    pub fn port(&self, direction: Port) -> &PortConfig {
        match direction {
            Port::Input => &self.input,
            Port::Output => &self.output,
        }
    }

    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    pub fn buffer(&self, direction: Port) -> Option<&ManagedBuffer> {
        self.buffers.get(direction)
    }

    /// Reads, updates and writes back the definition of one port.
    ///
    /// Only valid while the component is Loaded, before buffers exist.
    pub fn configure_port(&mut self, direction: Port, settings: PortSettings) -> Result<()> {
        let invalid = |status| Error::InvalidPortConfig {
            port: direction,
            status,
        };
        if self.frozen {
            return Err(invalid(Status::IncorrectStateOperation));
        }

        let index = self.port(direction).index;
        let mut port = match self
            .component()?
            .get_parameter(Index::PortDefinition(index))
            .map_err(invalid)?
        {
            Param::PortDefinition(port) => port,
            _ => return Err(invalid(Status::BadParameter)),
        };

        port.index = index;
        port.direction = direction;
        port.enabled = true;
        port.buffer_count = 1;
        port.buffer_size = settings.buffer_size;
        port.frame_width = settings.frame_width;
        port.frame_height = settings.frame_height;
        port.compression = settings.compression;
        port.color_format = settings.color_format;

        debug!(
            "{} port {}: {}x{} {:?}/{:?} buffer {} bytes",
            direction,
            index,
            port.frame_width,
            port.frame_height,
            port.compression,
            port.color_format,
            port.buffer_size
        );
        self.component()?
            .set_parameter(Index::PortDefinition(index), &Param::PortDefinition(port.clone()))
            .map_err(invalid)?;

        match direction {
            Port::Input => self.input = port,
            Port::Output => self.output = port,
        }
        Ok(())
    }

    /// Sends the scale setting matching `scale`.
    pub fn configure_scale(&mut self, scale: ScaleFactor) -> Result<()> {
        let pct = scale.percent();
        debug!("scale {} -> {}%", scale, pct);
        self.component()?
            .set_config(
                Index::CommonScale,
                &Config::Scale {
                    width_pct: pct,
                    height_pct: pct,
                },
            )
            .map_err(|status| Error::CapabilityUnsupported {
                name: "scale".to_owned(),
                status,
            })
    }

    fn extension(&self, name: &str) -> Result<Index> {
        self.component()?
            .get_extension_index(name)
            .map_err(|status| Error::CapabilityUnsupported {
                name: name.to_owned(),
                status,
            })
    }

    /// Applies the vendor extensions: progressive hint, output color format
    /// and maximum resolution.
    pub fn configure_extensions(&mut self, header: &HeaderInfo) -> Result<()> {
        let unsupported = |name: &str| {
            let name = name.to_owned();
            move |status| Error::CapabilityUnsupported { name, status }
        };

        let index = self.extension(EXT_PROGRESSIVE)?;
        self.component()?
            .set_config(index, &Config::Progressive(header.progressive))
            .map_err(unsupported(EXT_PROGRESSIVE))?;

        let index = self.extension(EXT_OUTPUT_COLOR_FORMAT)?;
        self.component()?
            .set_config(index, &Config::ColorFormat(self.output.color_format))
            .map_err(unsupported(EXT_OUTPUT_COLOR_FORMAT))?;

        let index = self.extension(EXT_MAX_RESOLUTION)?;
        self.component()?
            .set_parameter(
                index,
                &Param::Resolution {
                    width: header.width,
                    height: header.height,
                },
            )
            .map_err(unsupported(EXT_MAX_RESOLUTION))
    }

    /// Negotiates both ports, the scale and the extensions for `request`.
    pub fn configure(&mut self, header: &HeaderInfo, request: &DecodeRequest) -> Result<()> {
        self.configure_port(
            Port::Input,
            PortSettings {
                frame_width: header.width,
                frame_height: header.height,
                compression: Compression::Jpeg,
                color_format: input_color_hint(header.sampling),
                buffer_size: header.payload_len,
            },
        )?;
        self.configure_port(
            Port::Output,
            PortSettings {
                frame_width: header.width,
                frame_height: header.height,
                compression: Compression::Unused,
                color_format: request.config.color_format(),
                buffer_size: output_buffer_size(
                    header.width,
                    header.height,
                    request.config.bytes_per_pixel(),
                    request.scale.divisor(),
                ),
            },
        )?;
        self.configure_scale(request.scale)?;
        self.configure_extensions(header)
    }

    /// Allocates the input and output buffers. Port definitions are frozen
    /// from here on.
    pub fn allocate_buffers(&mut self) -> Result<()> {
        self.frozen = true;
        let component = self.component()?;
        self.buffers = BufferManager::allocate(component, &self.input, &self.output)?;
        Ok(())
    }

    /// Submits `command`, mapping a rejection to
    /// [`Error::CommandSubmissionFailed`].
    pub fn send_command(&self, command: Command) -> Result<()> {
        debug!("send {}", command);
        self.component()?
            .send_command(command)
            .map_err(|status| Error::CommandSubmissionFailed {
                command: command.to_string(),
                status,
            })
    }

    pub fn request_state(&self, state: ComponentState) -> Result<()> {
        self.send_command(Command::StateSet(state))
    }

    /// Disables the port of `direction`. A port is only ever disabled once,
    /// whether or not the component accepted the command.
    pub fn disable_port(&mut self, direction: Port) -> Result<()> {
        let slot = match direction {
            Port::Input => &mut self.enabled[0],
            Port::Output => &mut self.enabled[1],
        };
        if !std::mem::replace(slot, false) {
            return Ok(());
        }
        let index = self.port(direction).index;
        self.send_command(Command::PortDisable(index))
    }

    pub fn free_buffer(&mut self, direction: Port) -> Result<()> {
        let component = self.component.as_deref().ok_or_else(|| Error::ComponentUnavailable {
            name: self.name.clone(),
            status: Status::InvalidState,
        })?;
        self.buffers
            .free(component, direction)
            .map_err(|status| Error::CommandSubmissionFailed {
                command: format!("free {} buffer", direction),
                status,
            })
    }

    /// Rewinds `stream` and copies it into the input buffer, flagged as end
    /// of stream. Returns the number of bytes copied.
    pub fn fill_input<S: ByteStream + ?Sized>(&self, stream: &mut S) -> Result<usize> {
        let input = self.buffers.input().ok_or_else(|| Error::CommandSubmissionFailed {
            command: "fill input buffer".to_owned(),
            status: Status::BadParameter,
        })?;
        if let Some(output) = self.buffers.output() {
            output.reset()?;
        }
        input.fill_from(stream)
    }

    /// Hands the input buffer to the component for consumption.
    pub fn submit_input(&self) -> Result<()> {
        self.transfer(Port::Input)
    }

    /// Hands the output buffer to the component to be filled.
    pub fn request_output(&self) -> Result<()> {
        self.transfer(Port::Output)
    }

    fn transfer(&self, direction: Port) -> Result<()> {
        let buffer = self
            .buffers
            .get(direction)
            .ok_or_else(|| Error::CommandSubmissionFailed {
                command: format!("transfer {} buffer", direction),
                status: Status::BadParameter,
            })?;
        let component = self.component()?;
        let previous = buffer.lend();
        let res = match direction {
            Port::Input => component.submit_for_consumption(buffer.header()),
            Port::Output => component.request_fill(buffer.header()),
        };
        res.map_err(|status| {
            if previous == Owner::Session {
                buffer.reclaim();
            }
            Error::CommandSubmissionFailed {
                command: match direction {
                    Port::Input => "empty buffer".to_owned(),
                    Port::Output => "fill buffer".to_owned(),
                },
                status,
            }
        })
    }

    /// Best-effort teardown: disables both ports, frees both buffers,
    /// destroys the component and deinitialises the runtime. Every step is
    /// attempted even if an earlier one failed; failures are only logged.
    /// Steps already performed are not repeated.
    pub fn release(&mut self) {
        if self.component.is_none() {
            return;
        }
        let _span = info_span!("teardown", component = %self.name).entered();

        for direction in [Port::Input, Port::Output] {
            if let Err(e) = self.disable_port(direction) {
                warn!("{}", e);
            }
        }
        for direction in [Port::Input, Port::Output] {
            if let Err(e) = self.free_buffer(direction) {
                warn!("{}", e);
            }
        }
        if let Some(component) = self.component.take() {
            if let Err(status) = self.core.free_handle(component) {
                warn!("free handle of {} failed: {}", self.name, status);
            }
        }
        if let Err(status) = self.core.deinit() {
            warn!("component runtime deinit failed: {}", status);
        }
        debug!("component {} released", self.name);
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
