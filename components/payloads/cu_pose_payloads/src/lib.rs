//! Payloads exchanged between the pose extractor, the renderers and the video driver.
//!
//! Both payloads are dense, row-major `f32` tensors with their shape stored next to the data:
//! - [`FrameBuffer`]: channels × height × width pixels.
//! - [`KeypointSet`]: people × body parts × (x, y, score).

mod frame;
mod keypoints;

pub use frame::FrameBuffer;
pub use keypoints::{Keypoint, KeypointSet, KEYPOINT_STRIDE};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("Shape {shape:?} needs {expected} elements but {actual} were given")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Index {index} is out of bounds for dimension {dimension} of size {size}")]
    OutOfBounds {
        dimension: usize,
        index: usize,
        size: usize,
    },
}

pub type PayloadResult<T> = Result<T, PayloadError>;
