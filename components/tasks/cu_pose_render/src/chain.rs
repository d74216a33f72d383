//! Driver running an ordered list of renderer stages over one frame.

use crate::device::Device;
use crate::element::ElementSelection;
use crate::error::{RenderError, RenderResult};
use crate::lifecycle::{FrameContext, FrameMirror};
use cu_pose_payloads::{FrameBuffer, KeypointSet};
use log::debug;
use std::sync::Arc;

/// A stage of a [`RenderChain`].
pub trait RenderStage<D: Device>: Send {
    fn name(&self) -> &str;

    /// Device allocations, called once from the rendering thread before any frame.
    fn initialize_on_thread(&mut self) -> RenderResult<()>;

    fn render(
        &mut self,
        ctx: &mut FrameContext<'_, D>,
        output: &mut FrameBuffer,
        keypoints: &KeypointSet,
        scale_net_to_output: Option<f32>,
    ) -> RenderResult<ElementSelection>;

    fn teardown(&mut self);
}

/// Owns the device frame shared by its stages and tells the last one it is the tail.
pub struct RenderChain<D: Device> {
    mirror: FrameMirror<D>,
    stages: Vec<Box<dyn RenderStage<D>>>,
}

impl<D: Device> RenderChain<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            mirror: FrameMirror::new(device),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: impl RenderStage<D> + 'static) -> Self {
        self.push(stage);
        self
    }

    pub fn push(&mut self, stage: impl RenderStage<D> + 'static) {
        self.stages.push(Box::new(stage));
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn mirror(&self) -> &FrameMirror<D> {
        &self.mirror
    }

    pub fn initialize_on_thread(&mut self) -> RenderResult<()> {
        for stage in self.stages.iter_mut() {
            debug!("Initializing render stage {}.", stage.name());
            stage.initialize_on_thread()?;
        }
        Ok(())
    }

    /// Run every stage over `output`, in order. One selection per stage.
    pub fn render_frame(
        &mut self,
        output: &mut FrameBuffer,
        keypoints: &KeypointSet,
        scale_net_to_output: Option<f32>,
    ) -> RenderResult<Vec<ElementSelection>> {
        if output.is_empty() {
            return Err(RenderError::InvalidInput(
                "Empty FrameBuffer output.".to_string(),
            ));
        }
        let Some(last) = self.stages.len().checked_sub(1) else {
            return Ok(Vec::new());
        };
        let mut ctx = FrameContext::new(&mut self.mirror, false);
        let mut selections = Vec::with_capacity(self.stages.len());
        for (index, stage) in self.stages.iter_mut().enumerate() {
            ctx.set_tail(index == last);
            selections.push(stage.render(&mut ctx, output, keypoints, scale_net_to_output)?);
        }
        Ok(selections)
    }

    /// Like [`Self::render_frame`], a failed frame yields one invalid selection per stage.
    pub fn render_frame_or_drop(
        &mut self,
        output: &mut FrameBuffer,
        keypoints: &KeypointSet,
        scale_net_to_output: Option<f32>,
    ) -> Vec<ElementSelection> {
        match self.render_frame(output, keypoints, scale_net_to_output) {
            Ok(selections) => selections,
            Err(_) => vec![ElementSelection::invalid(); self.stages.len()],
        }
    }

    /// Release the device memory of the stages and of the shared frame.
    pub fn teardown(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.teardown();
        }
        self.mirror.release();
    }
}
