//! Pose overlay rendering for Copper pipelines.
//!
//! Several [`PoseRenderer`] stages can be chained on one frame: each one picks what to draw
//! from its element index (skeleton, one heat map, all heat maps, all PAFs or one PAF) and
//! draws into a device copy of the frame shared by the whole [`RenderChain`]. The frame goes
//! to the device once, before the first draw, and comes back once, after the tail stage.
//!
//! Inside a Copper graph, [`PoseRenderTask`] runs such a chain as a `CuTask`.
//!
//! ```no_run
//! use cu_pose_render::prelude::*;
//! use std::sync::Arc;
//!
//! struct MyKernels;
//!
//! impl PoseKernels<HostDevice> for MyKernels {
//!     fn draw(
//!         &mut self,
//!         _frame: &mut HostBuffer,
//!         _context: &DrawContext<'_>,
//!         _command: DrawCommand<'_, HostBuffer>,
//!     ) -> RenderResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> RenderResult<()> {
//! let device = Arc::new(HostDevice::new());
//! let config = read_configuration("pose_render.ron")?;
//! let heat_maps: Arc<dyn HeatMapSource> = Arc::new(Vec::<f32>::new());
//! let renderer = PoseRenderer::new("pose", config, device.clone(), MyKernels, heat_maps)?;
//! let mut chain = RenderChain::new(device).with_stage(renderer);
//! chain.initialize_on_thread()?;
//!
//! let mut frame = FrameBuffer::new(3, 368, 656);
//! let keypoints = KeypointSet::new(0, 18);
//! let selections = chain.render_frame_or_drop(&mut frame, &keypoints, Some(1.0));
//! println!("{}", selections[0].name);
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod device;
pub mod element;
pub mod error;
pub mod kernels;
pub mod lifecycle;
pub mod model;
pub mod renderer;
pub mod task;

pub use task::{PoseOverlay, PoseRenderTask, RenderedElement};

pub use cu_pose_payloads as payloads;

pub mod prelude {
    pub use crate::chain::{RenderChain, RenderStage};
    pub use crate::config::{read_configuration, RenderConfig};
    #[cfg(feature = "cuda")]
    pub use crate::device::{CudaBuffer, CudaDevice};
    pub use crate::device::{Device, DeviceBuffer, HostBuffer, HostDevice, TransferStats};
    pub use crate::element::{
        select, Category, Element, ElementCursor, ElementSelection, INVALID_ELEMENT_INDEX,
    };
    pub use crate::error::{RenderError, RenderResult};
    pub use crate::kernels::{DrawCommand, DrawContext, HeatMapSource, PoseKernels};
    pub use crate::lifecycle::{CopyState, FrameContext, FrameMirror};
    pub use crate::model::{ModelDescriptor, PoseModel, POSE_MAX_PEOPLE};
    pub use crate::renderer::{PoseRenderer, RenderState};
    pub use crate::task::{
        render_config_from_component, PoseOverlay, PoseRenderTask, RenderedElement,
    };
    pub use cu_pose_payloads::{FrameBuffer, Keypoint, KeypointSet};
}
