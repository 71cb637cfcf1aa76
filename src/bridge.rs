// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{buffer::BufferHeader, component::ColorFormat};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// Swaps the first and third byte of every 4-byte pixel in place, turning
/// B,G,R,A into R,G,B,A and back. A trailing partial pixel is left alone.
pub fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

/// Delivers the component's filled output buffer to the caller.
///
/// [`CompletionBridge::deliver`] runs on the thread that reports the filled
/// buffer. It corrects the byte order of 32-bit output and copies the
/// pixels out of the component buffer before the callback returns.
pub struct CompletionBridge {
    format: ColorFormat,
    pixels: Mutex<Option<Vec<u8>>>,
}

impl CompletionBridge {
    pub fn new(format: ColorFormat) -> Self {
        Self {
            format,
            pixels: Mutex::new(None),
        }
    }

    pub fn format(&self) -> ColorFormat {
        self.format
    }

    pub fn deliver(&self, buffer: &BufferHeader) {
        let mut contents = buffer.lock();
        let filled = contents.filled_mut();
        if self.format == ColorFormat::Argb8888 {
            swap_red_blue(filled);
        }
        trace!("delivering {} bytes of {:?}", filled.len(), self.format);
        *self.pixels.lock().unwrap_or_else(PoisonError::into_inner) = Some(filled.to_vec());
    }

    /// Whether an output buffer was delivered and not yet taken.
    pub fn is_delivered(&self) -> bool {
        self.pixels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Takes the delivered pixels.
    pub fn take(&self) -> Option<Vec<u8>> {
        self.pixels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
