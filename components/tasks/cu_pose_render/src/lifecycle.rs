//! Host/device lifecycle of the frame shared by a chain of renderers.
//!
//! All the stages of a chain draw into one device copy of the frame, the [`FrameMirror`].
//! For every frame the driver creates a [`FrameContext`] and hands it to each stage in order.
//! The first stage that draws uploads the frame, the others find it already on the device,
//! and the tail stage downloads the result once.

use crate::device::{Device, DeviceBuffer};
use crate::error::{RenderError, RenderResult};
use log::debug;
use std::sync::Arc;

/// Whether the device mirror holds the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyState {
    #[default]
    NotCopied,
    Copied,
}

/// Device copy of the frame, sized lazily after the host frame.
pub struct FrameMirror<D: Device> {
    device: Arc<D>,
    buffer: Option<D::Buffer>,
}

impl<D: Device> FrameMirror<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            buffer: None,
        }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn is_allocated(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn len(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free the device memory. Nothing happens if it was never allocated.
    pub fn release(&mut self) {
        if self.buffer.take().is_some() {
            debug!("Released the device frame mirror.");
        }
    }

    fn ensure(&mut self, volume: usize) -> RenderResult<&mut D::Buffer> {
        let reuse = matches!(&self.buffer, Some(buffer) if buffer.len() == volume);
        if !reuse {
            debug!("Allocating a device frame mirror of {} floats.", volume);
            // The previous mirror is dropped before the new allocation.
            self.buffer = None;
            self.buffer = Some(self.device.alloc(volume)?);
        }
        self.buffer
            .as_mut()
            .ok_or_else(|| RenderError::device("allocating the frame mirror", "no buffer"))
    }
}

/// Per frame state threaded through the stages of a chain.
pub struct FrameContext<'m, D: Device> {
    mirror: &'m mut FrameMirror<D>,
    copy: CopyState,
    is_tail: bool,
}

impl<'m, D: Device> FrameContext<'m, D> {
    pub fn new(mirror: &'m mut FrameMirror<D>, is_tail: bool) -> Self {
        Self {
            mirror,
            copy: CopyState::NotCopied,
            is_tail,
        }
    }

    /// Set by the driver before each stage.
    pub fn set_tail(&mut self, is_tail: bool) {
        self.is_tail = is_tail;
    }

    pub fn is_tail(&self) -> bool {
        self.is_tail
    }

    pub fn copy_state(&self) -> CopyState {
        self.copy
    }

    pub fn device(&self) -> &Arc<D> {
        self.mirror.device()
    }

    /// Upload `host` unless an earlier stage of this frame already did.
    /// Returns true when a copy happened.
    pub fn copy_in_if_needed(&mut self, host: &[f32]) -> RenderResult<bool> {
        match self.copy {
            CopyState::Copied => {
                if self.mirror.len() != host.len() {
                    return Err(RenderError::InvalidInput(format!(
                        "frame volume changed within a frame: {} on the device, {} on the host",
                        self.mirror.len(),
                        host.len()
                    )));
                }
                Ok(false)
            }
            CopyState::NotCopied => {
                let device = self.mirror.device.clone();
                let buffer = self.mirror.ensure(host.len())?;
                device.upload(host, buffer)?;
                self.copy = CopyState::Copied;
                Ok(true)
            }
        }
    }

    /// Download the mirror into `host` if this stage is the tail and the frame went to the device.
    /// Returns true when a copy happened.
    pub fn copy_out_if_last(&mut self, host: &mut [f32]) -> RenderResult<bool> {
        if !self.is_tail || self.copy == CopyState::NotCopied {
            return Ok(false);
        }
        let buffer = self.mirror.buffer.as_ref().ok_or_else(|| {
            RenderError::device("downloading the frame", "the frame mirror is not allocated")
        })?;
        if buffer.len() != host.len() {
            return Err(RenderError::InvalidInput(format!(
                "frame volume changed within a frame: {} on the device, {} on the host",
                buffer.len(),
                host.len()
            )));
        }
        self.mirror.device.download(buffer, host)?;
        self.copy = CopyState::NotCopied;
        Ok(true)
    }

    /// The device frame, for kernels. Only available once the frame has been copied in.
    pub fn device_frame(&mut self) -> RenderResult<&mut D::Buffer> {
        if self.copy == CopyState::NotCopied {
            return Err(RenderError::device(
                "accessing the device frame",
                "the frame has not been copied to the device",
            ));
        }
        self.mirror
            .buffer
            .as_mut()
            .ok_or_else(|| RenderError::device("accessing the device frame", "no buffer"))
    }
}
