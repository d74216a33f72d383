//! Copper task drawing the pose overlay on the host device.
//!
//! Inputs: the frame, the keypoints and the network heat map tensor (channels × height ×
//! width, carried as a [`FrameBuffer`]). Output: the frame with the overlay and what was drawn.
//! A dropped frame clears the output.
//!
//! ```ron
//! (
//!     id: "pose_overlay",
//!     type: "cu_pose_render::PoseRenderTask<my_kernels::CpuKernels>",
//!     config: {
//!         "model": "MPI",
//!         "heat_map_width": 656,
//!         "heat_map_height": 368,
//!         "element_to_render": 3,
//!     },
//! )
//! ```

use crate::chain::RenderChain;
use crate::config::RenderConfig;
use crate::device::HostDevice;
use crate::element::ElementSelection;
use crate::error::{RenderError, RenderResult};
use crate::kernels::{HeatMapSource, PoseKernels};
use crate::renderer::PoseRenderer;
use bincode::{Decode, Encode};
use cu29::prelude::*;
use cu_pose_payloads::{FrameBuffer, KeypointSet};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

#[derive(Default, Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct RenderedElement {
    pub index: i32,
    pub name: String,
}

impl From<&ElementSelection> for RenderedElement {
    fn from(selection: &ElementSelection) -> Self {
        Self {
            index: selection.index,
            name: selection.name.to_string(),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct PoseOverlay {
    pub frame: FrameBuffer,
    pub elements: Vec<RenderedElement>,
}

/// Build a [`RenderConfig`] from the task section of a Copper configuration.
/// Missing keys keep their defaults.
pub fn render_config_from_component(
    config: Option<&ComponentConfig>,
) -> RenderResult<RenderConfig> {
    let mut render = RenderConfig::default();
    if let Some(config) = config {
        if let Some(model) = config.get::<String>("model") {
            render.model = model.parse()?;
        }
        if let Some(width) = config.get::<u32>("heat_map_width") {
            render.heat_map_size.0 = width;
        }
        if let Some(height) = config.get::<u32>("heat_map_height") {
            render.heat_map_size.1 = height;
        }
        if let Some(threshold) = config.get::<f64>("render_threshold") {
            render.render_threshold = threshold as f32;
        }
        if let Some(alpha) = config.get::<f64>("alpha_keypoint") {
            render.alpha_keypoint = alpha as f32;
        }
        if let Some(alpha) = config.get::<f64>("alpha_heat_map") {
            render.alpha_heat_map = alpha as f32;
        }
        if let Some(blend) = config.get::<bool>("blend_original_frame") {
            render.blend_original_frame = blend;
        }
        if let Some(googly) = config.get::<bool>("show_googly_eyes") {
            render.show_googly_eyes = googly;
        }
        if let Some(element) = config.get::<u32>("element_to_render") {
            render.element_to_render = element;
        }
    }
    render.validate()?;
    Ok(render)
}

/// One stage render chain wrapped as a Copper task. `K` must be constructible from nothing,
/// the runtime only hands the task its configuration.
pub struct PoseRenderTask<K> {
    chain: RenderChain<HostDevice>,
    heat_maps: Arc<Mutex<Vec<f32>>>,
    heat_map_width: u32,
    scale_net_to_output: Option<f32>,
    _kernels: PhantomData<K>,
}

impl<K> PoseRenderTask<K> {
    /// Configured scale, or the ratio between the frame and heat map widths.
    fn scale_for(&self, frame: &FrameBuffer) -> f32 {
        self.scale_net_to_output
            .unwrap_or(frame.width() as f32 / self.heat_map_width as f32)
    }
}

impl<K> Freezable for PoseRenderTask<K> {}

impl<'cl, K> CuTask<'cl> for PoseRenderTask<K>
where
    K: PoseKernels<HostDevice> + Default + 'static,
{
    type Input = input_msg!('cl, FrameBuffer, KeypointSet, FrameBuffer);
    type Output = output_msg!('cl, PoseOverlay);

    fn new(config: Option<&ComponentConfig>) -> CuResult<Self>
    where
        Self: Sized,
    {
        let render = render_config_from_component(config)?;
        let scale_net_to_output = config
            .and_then(|cfg| cfg.get::<f64>("scale_net_to_output"))
            .map(|scale| scale as f32);
        let heat_map_width = render.heat_map_size.0;

        let device = Arc::new(HostDevice::new());
        let heat_maps = Arc::new(Mutex::new(Vec::new()));
        let source: Arc<dyn HeatMapSource> = heat_maps.clone();
        let stage = PoseRenderer::new("pose_render", render, device.clone(), K::default(), source)?;
        Ok(Self {
            chain: RenderChain::new(device).with_stage(stage),
            heat_maps,
            heat_map_width,
            scale_net_to_output,
            _kernels: PhantomData,
        })
    }

    fn start(&mut self, _clock: &RobotClock) -> CuResult<()> {
        self.chain.initialize_on_thread()?;
        Ok(())
    }

    fn process(
        &mut self,
        _clock: &RobotClock,
        input: Self::Input,
        output: Self::Output,
    ) -> CuResult<()> {
        let (frame_msg, keypoints_msg, heat_maps_msg) = input;
        let (Some(frame), Some(keypoints)) = (frame_msg.payload(), keypoints_msg.payload()) else {
            output.clear_payload();
            return Ok(());
        };

        {
            let mut heat_maps = self
                .heat_maps
                .lock()
                .map_err(|e| RenderError::device("storing the heat maps", e))?;
            heat_maps.clear();
            if let Some(tensor) = heat_maps_msg.payload() {
                heat_maps.extend_from_slice(tensor.as_slice());
            }
        }

        let mut frame = frame.clone();
        let scale = self.scale_for(&frame);
        let selections = self
            .chain
            .render_frame_or_drop(&mut frame, keypoints, Some(scale));
        if selections.iter().all(ElementSelection::is_valid) {
            output.set_payload(PoseOverlay {
                frame,
                elements: selections.iter().map(RenderedElement::from).collect(),
            });
        } else {
            output.clear_payload();
        }
        Ok(())
    }

    fn stop(&mut self, _clock: &RobotClock) -> CuResult<()> {
        self.chain.teardown();
        Ok(())
    }
}
