//! Seams towards the drawing kernels and the pose extractor.

use crate::device::Device;
use crate::error::{RenderError, RenderResult};
use crate::model::{ModelDescriptor, PoseModel};

/// Parameters common to every draw command of a frame.
#[derive(Debug, Clone, Copy)]
pub struct DrawContext<'a> {
    pub model: PoseModel,
    pub descriptor: &'a ModelDescriptor,
    /// Output frame (width, height).
    pub frame_size: (usize, usize),
    /// Network heat map tensor (width, height).
    pub heat_map_size: (u32, u32),
}

/// One arm per element category.
#[derive(Debug)]
pub enum DrawCommand<'a, B> {
    Keypoints {
        /// Device keypoints, `people` of them are valid.
        keypoints: &'a B,
        people: usize,
        render_threshold: f32,
        show_googly_eyes: bool,
        blend_original_frame: bool,
        alpha: f32,
    },
    HeatMap {
        heat_maps: &'a [f32],
        part: u32,
        scale_net_to_output: f32,
        alpha: f32,
    },
    HeatMaps {
        heat_maps: &'a [f32],
        scale_net_to_output: f32,
        alpha: f32,
    },
    Pafs {
        heat_maps: &'a [f32],
        scale_net_to_output: f32,
        alpha: f32,
    },
    Paf {
        heat_maps: &'a [f32],
        /// Network channel of the x component, y follows it.
        channel: u32,
        scale_net_to_output: f32,
        alpha: f32,
    },
}

/// Drawing kernels for one device backend. Kernels draw into the device frame in place.
pub trait PoseKernels<D: Device>: Send {
    fn draw(
        &mut self,
        frame: &mut D::Buffer,
        context: &DrawContext<'_>,
        command: DrawCommand<'_, D::Buffer>,
    ) -> RenderResult<()>;
}

/// Read access to the heat maps and PAFs of the last network output, row-major
/// channels × height × width.
pub trait HeatMapSource: Send + Sync {
    /// Call `f` with the tensor for the current frame.
    fn with_heat_maps(
        &self,
        f: &mut dyn FnMut(&[f32]) -> RenderResult<()>,
    ) -> RenderResult<()>;
}

/// Heat maps held directly in memory.
impl HeatMapSource for Vec<f32> {
    fn with_heat_maps(
        &self,
        f: &mut dyn FnMut(&[f32]) -> RenderResult<()>,
    ) -> RenderResult<()> {
        f(self)
    }
}

impl<T: HeatMapSource> HeatMapSource for std::sync::Mutex<T> {
    fn with_heat_maps(
        &self,
        f: &mut dyn FnMut(&[f32]) -> RenderResult<()>,
    ) -> RenderResult<()> {
        let inner = self
            .lock()
            .map_err(|e| RenderError::device("reading the heat maps", e))?;
        inner.with_heat_maps(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_mutex_source_reads_current_tensor() {
        let source = Mutex::new(vec![0.25f32, 0.5]);
        let mut seen = Vec::new();
        source
            .with_heat_maps(&mut |heat_maps| {
                seen.extend_from_slice(heat_maps);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![0.25, 0.5]);
    }

    #[test]
    fn test_poisoned_source_is_a_device_failure() {
        let source = Arc::new(Mutex::new(vec![1.0f32]));
        let writer = source.clone();
        let _ = std::thread::spawn(move || {
            let _guard = writer.lock().unwrap();
            panic!("extractor crashed while writing");
        })
        .join();
        assert!(matches!(
            source.with_heat_maps(&mut |_| Ok(())),
            Err(RenderError::Device { .. })
        ));
    }
}
