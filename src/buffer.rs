// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    component::{Component, Port, PortConfig},
    error::{Error, Result, Status},
    stream::ByteStream,
};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

/// Side currently allowed to touch a buffer's memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    Session,
    Component,
}

/// Memory and transfer fields of a [`BufferHeader`].
pub struct BufferContents {
    pub data: Box<[u8]>,
    pub filled_len: usize,
    pub end_of_stream: bool,
    owner: Owner,
}

impl BufferContents {
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// The filled part of the buffer.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.filled_len.min(self.data.len())]
    }

    pub fn filled_mut(&mut self) -> &mut [u8] {
        let len = self.filled_len.min(self.data.len());
        &mut self.data[..len]
    }
}

/// A buffer region allocated by a component for one of its ports.
///
/// The header is shared between the session and the component, but only
/// the current [`Owner`] may read or write the memory. Ownership moves to
/// the component when the session submits the buffer and back to the
/// session when the matching completion callback arrives.
pub struct BufferHeader {
    id: u64,
    port: u32,
    contents: Mutex<BufferContents>,
}

impl BufferHeader {
    /// Creates a zeroed, session-owned buffer. Called by components from
    /// [`Component::allocate_buffer`].
    pub fn new(id: u64, port: u32, size: usize) -> Self {
        Self {
            id,
            port,
            contents: Mutex::new(BufferContents {
                data: vec![0u8; size].into_boxed_slice(),
                filled_len: 0,
                end_of_stream: false,
                owner: Owner::Session,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn alloc_len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn filled_len(&self) -> usize {
        self.lock().filled_len
    }

    pub fn end_of_stream(&self) -> bool {
        self.lock().end_of_stream
    }

    pub fn owner(&self) -> Owner {
        self.lock().owner
    }

    /// Locks the buffer contents.
    pub fn lock(&self) -> MutexGuard<'_, BufferContents> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_owner(&self, owner: Owner) {
        self.lock().owner = owner;
    }
}

impl fmt::Debug for BufferHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let contents = self.lock();
        f.debug_struct("BufferHeader")
            .field("id", &self.id)
            .field("port", &self.port)
            .field("alloc_len", &contents.data.len())
            .field("filled_len", &contents.filled_len)
            .field("owner", &contents.owner)
            .finish()
    }
}

/// Session handle on one allocated buffer.
pub struct ManagedBuffer {
    header: Arc<BufferHeader>,
    direction: Port,
}

impl ManagedBuffer {
    pub fn header(&self) -> &Arc<BufferHeader> {
        &self.header
    }

    pub fn direction(&self) -> Port {
        self.direction
    }

    pub fn size(&self) -> usize {
        self.header.alloc_len()
    }

    pub fn owner(&self) -> Owner {
        self.header.owner()
    }

    /// Locks the contents, refusing while the buffer is lent to the
    /// component.
    fn session_contents(&self) -> Result<MutexGuard<'_, BufferContents>> {
        let contents = self.header.lock();
        if contents.owner != Owner::Session {
            warn!(
                "{} buffer {} accessed while lent to the component",
                self.direction, self.header.id
            );
            return Err(Error::CommandSubmissionFailed {
                command: format!("access {} buffer", self.direction),
                status: Status::IncorrectStateOperation,
            });
        }
        Ok(contents)
    }

    /// Fills the buffer from the start of `stream` and marks it as the
    /// last buffer of the stream. Returns the filled length.
    ///
    /// # Errors
    ///
    /// [`Error::CommandSubmissionFailed`] if the buffer is currently lent to
    /// the component, [`Error::Io`] if the stream fails.
    pub fn fill_from<S: ByteStream + ?Sized>(&self, stream: &mut S) -> Result<usize> {
        let mut contents = self.session_contents()?;
        stream.rewind()?;
        let n = stream.read_bytes(&mut contents.data)?;
        contents.filled_len = n;
        contents.end_of_stream = true;
        Ok(n)
    }

    /// Clears transfer fields before the buffer is handed out for filling.
    pub fn reset(&self) -> Result<()> {
        let mut contents = self.session_contents()?;
        contents.filled_len = 0;
        contents.end_of_stream = false;
        Ok(())
    }

    /// Marks the buffer as owned by the component. Returns the previous
    /// owner so that a rejected submission can restore it.
    pub(crate) fn lend(&self) -> Owner {
        let mut contents = self.header.lock();
        std::mem::replace(&mut contents.owner, Owner::Component)
    }

    pub(crate) fn reclaim(&self) {
        self.header.set_owner(Owner::Session);
    }
}

/// Output buffer size for an aligned frame: the scale divides the whole
/// product, not each dimension.
pub fn output_buffer_size(width: u32, height: u32, bytes_per_pixel: u32, scale: u32) -> usize {
    width as usize * height as usize * bytes_per_pixel as usize / scale as usize
}

/// Holds the single input and single output buffer of a session.
///
/// Each buffer is freed at most once: freeing takes it out of the manager
/// before the component is called, whatever the component answers.
#[derive(Default)]
pub struct BufferManager {
    input: Option<ManagedBuffer>,
    output: Option<ManagedBuffer>,
}

impl BufferManager {
    /// Allocates one buffer per port, sized from the negotiated port
    /// definitions. If the output allocation fails the input buffer is
    /// released again before returning.
    pub fn allocate(
        component: &dyn Component,
        input: &PortConfig,
        output: &PortConfig,
    ) -> Result<Self> {
        let mut manager = Self::default();
        manager.input = Some(Self::allocate_one(component, input)?);
        match Self::allocate_one(component, output) {
            Ok(buffer) => manager.output = Some(buffer),
            Err(e) => {
                if let Err(status) = manager.free(component, Port::Input) {
                    warn!("failed to release input buffer: {}", status);
                }
                return Err(e);
            }
        }
        Ok(manager)
    }

    fn allocate_one(component: &dyn Component, port: &PortConfig) -> Result<ManagedBuffer> {
        let header = component
            .allocate_buffer(port.index, port.buffer_size)
            .map_err(|status| Error::BufferAllocationFailed {
                port: port.direction,
                size: port.buffer_size,
                status,
            })?;
        debug!(
            "{} buffer {} allocated: {} bytes",
            port.direction,
            header.id(),
            port.buffer_size
        );
        Ok(ManagedBuffer {
            header,
            direction: port.direction,
        })
    }

    pub fn input(&self) -> Option<&ManagedBuffer> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&ManagedBuffer> {
        self.output.as_ref()
    }

    pub fn get(&self, direction: Port) -> Option<&ManagedBuffer> {
        match direction {
            Port::Input => self.input(),
            Port::Output => self.output(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }

    /// Frees the buffer of `direction`. A buffer that was already freed is
    /// not handed to the component again.
    pub fn free(&mut self, component: &dyn Component, direction: Port) -> Result<(), Status> {
        let slot = match direction {
            Port::Input => &mut self.input,
            Port::Output => &mut self.output,
        };
        let Some(buffer) = slot.take() else {
            return Ok(());
        };
        let header = buffer.header;
        debug!("{} buffer {} freed", direction, header.id());
        component.free_buffer(header.port(), &header)
    }
}
