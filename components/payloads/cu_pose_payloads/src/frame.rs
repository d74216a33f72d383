use crate::{PayloadError, PayloadResult};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Planar float frame, laid out as channels × height × width.
#[derive(Default, Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct FrameBuffer {
    pub seq: u64,
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl FrameBuffer {
    /// Zero filled frame.
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            seq: 0,
            channels,
            height,
            width,
            data: vec![0.0; channels * height * width],
        }
    }

    pub fn from_vec(
        channels: usize,
        height: usize,
        width: usize,
        data: Vec<f32>,
    ) -> PayloadResult<Self> {
        let expected = channels * height * width;
        if data.len() != expected {
            return Err(PayloadError::ShapeMismatch {
                shape: vec![channels, height, width],
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            seq: 0,
            channels,
            height,
            width,
            data,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Size of one dimension: 0 = channels, 1 = height, 2 = width.
    pub fn size(&self, dimension: usize) -> PayloadResult<usize> {
        match dimension {
            0 => Ok(self.channels),
            1 => Ok(self.height),
            2 => Ok(self.width),
            _ => Err(PayloadError::OutOfBounds {
                dimension,
                index: dimension,
                size: 3,
            }),
        }
    }

    /// (width, height) as expected by the drawing kernels.
    pub fn frame_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Total number of floats.
    pub fn volume(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn get(&self, channel: usize, y: usize, x: usize) -> PayloadResult<f32> {
        let offset = self.offset(channel, y, x)?;
        Ok(self.data[offset])
    }

    pub fn set(&mut self, channel: usize, y: usize, x: usize, value: f32) -> PayloadResult<()> {
        let offset = self.offset(channel, y, x)?;
        self.data[offset] = value;
        Ok(())
    }

    fn offset(&self, channel: usize, y: usize, x: usize) -> PayloadResult<usize> {
        for (dimension, (index, size)) in [
            (channel, self.channels),
            (y, self.height),
            (x, self.width),
        ]
        .into_iter()
        .enumerate()
        {
            if index >= size {
                return Err(PayloadError::OutOfBounds {
                    dimension,
                    index,
                    size,
                });
            }
        }
        Ok((channel * self.height + y) * self.width + x)
    }
}
