//! The pose renderer stage.

use crate::chain::RenderStage;
use crate::config::RenderConfig;
use crate::device::Device;
use crate::element::{select, valid_scale, Element, ElementCursor, ElementSelection};
use crate::error::{RenderError, RenderResult};
use crate::kernels::{DrawCommand, DrawContext, HeatMapSource, PoseKernels};
use crate::lifecycle::FrameContext;
use crate::model::ModelDescriptor;
use cu_pose_payloads::{FrameBuffer, KeypointSet};
use log::{debug, error};
use std::sync::Arc;

/// Progress of a renderer through one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    BufferCopiedIn,
    ElementDrawn,
    /// Final state of the tail stage once the frame is back on the host.
    BufferCopiedOut,
    Done,
}

/// Draws keypoints, heat maps or PAFs, depending on its element cursor, into the device
/// frame of a chain.
pub struct PoseRenderer<D: Device, K: PoseKernels<D>> {
    name: String,
    config: RenderConfig,
    descriptor: ModelDescriptor,
    cursor: ElementCursor,
    device: Arc<D>,
    kernels: K,
    heat_maps: Arc<dyn HeatMapSource>,
    keypoint_capacity: usize,
    device_keypoints: Option<D::Buffer>,
    state: RenderState,
}

impl<D: Device, K: PoseKernels<D>> PoseRenderer<D, K> {
    pub fn new(
        name: &str,
        config: RenderConfig,
        device: Arc<D>,
        kernels: K,
        heat_maps: Arc<dyn HeatMapSource>,
    ) -> RenderResult<Self> {
        let descriptor = config.descriptor();
        Self::with_model(name, config, descriptor, device, kernels, heat_maps)
    }

    /// Render a model described outside of the built-in tables.
    pub fn with_model(
        name: &str,
        config: RenderConfig,
        descriptor: ModelDescriptor,
        device: Arc<D>,
        kernels: K,
        heat_maps: Arc<dyn HeatMapSource>,
    ) -> RenderResult<Self> {
        config.validate_for(&descriptor)?;
        let cursor = ElementCursor::new(config.element_to_render, descriptor.number_elements())?;
        let keypoint_capacity = descriptor.keypoint_capacity();
        Ok(Self {
            name: name.to_string(),
            config,
            descriptor,
            cursor,
            device,
            kernels,
            heat_maps,
            keypoint_capacity,
            device_keypoints: None,
            state: RenderState::Idle,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// Clone it to drive the element from elsewhere.
    pub fn element_cursor(&self) -> &ElementCursor {
        &self.cursor
    }

    pub fn kernels(&self) -> &K {
        &self.kernels
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn keypoint_capacity(&self) -> usize {
        self.keypoint_capacity
    }

    pub fn is_initialized(&self) -> bool {
        self.device_keypoints.is_some()
    }

    /// Allocate the device keypoint buffer. Must run on the thread that renders.
    pub fn initialize_on_thread(&mut self) -> RenderResult<()> {
        debug!("Starting initialization on thread.");
        if self.device_keypoints.is_none() {
            debug!(
                "{}: allocating {} floats for the device keypoints.",
                self.name, self.keypoint_capacity
            );
            let buffer = self.device.alloc(self.keypoint_capacity).map_err(|e| {
                error!("{}: {}", self.name, e);
                e
            })?;
            self.device_keypoints = Some(buffer);
        }
        debug!("Finished initialization on thread.");
        Ok(())
    }

    /// Release the device keypoint buffer. Nothing happens if it was never allocated.
    pub fn teardown(&mut self) {
        if self.device_keypoints.take().is_some() {
            debug!("{}: released the device keypoints.", self.name);
        }
        self.state = RenderState::Idle;
    }

    /// Copy `keypoints` into the device buffer. Empty sets are ignored.
    pub fn upload_keypoints(&mut self, keypoints: &KeypointSet) -> RenderResult<()> {
        if keypoints.is_empty() {
            return Ok(());
        }
        if keypoints.len() > self.keypoint_capacity {
            return Err(RenderError::CapacityExceeded {
                requested: keypoints.len(),
                capacity: self.keypoint_capacity,
            });
        }
        if keypoints.parts() != self.descriptor.number_body_parts() {
            return Err(RenderError::InvalidInput(format!(
                "keypoints have {} parts, model {} has {}",
                keypoints.parts(),
                self.descriptor.name(),
                self.descriptor.number_body_parts()
            )));
        }
        let buffer = self
            .device_keypoints
            .as_mut()
            .ok_or(RenderError::NotInitialized)?;
        self.device.upload(keypoints.as_slice(), buffer)
    }

    /// Render the current element into the chain frame.
    ///
    /// When the call fails the frame must be dropped, `output` may be partially drawn.
    pub fn render(
        &mut self,
        ctx: &mut FrameContext<'_, D>,
        output: &mut FrameBuffer,
        keypoints: &KeypointSet,
        scale_net_to_output: Option<f32>,
    ) -> RenderResult<ElementSelection> {
        let result = self.render_frame(ctx, output, keypoints, scale_net_to_output);
        if let Err(e) = &result {
            error!(
                "{}: rendering element {} failed: {}",
                self.name,
                self.cursor.get(),
                e
            );
            self.state = RenderState::Idle;
        }
        result
    }

    fn render_frame(
        &mut self,
        ctx: &mut FrameContext<'_, D>,
        output: &mut FrameBuffer,
        keypoints: &KeypointSet,
        scale_net_to_output: Option<f32>,
    ) -> RenderResult<ElementSelection> {
        self.state = RenderState::Idle;
        if output.is_empty() {
            return Err(RenderError::InvalidInput("Empty FrameBuffer output.".to_string()));
        }
        if !self.is_initialized() {
            return Err(RenderError::NotInitialized);
        }
        let selection = select(self.cursor.get(), &self.descriptor, scale_net_to_output)?;
        let element = selection
            .element
            .ok_or_else(|| RenderError::InvalidInput("no element selected".to_string()))?;

        // Nothing would show up on a plain background.
        let nothing_to_draw = keypoints.people() == 0
            && element == Element::Keypoints
            && !self.config.blend_original_frame;
        if !nothing_to_draw {
            ctx.copy_in_if_needed(output.as_slice())?;
            self.state = RenderState::BufferCopiedIn;
            self.draw(ctx, output.frame_size(), element, keypoints, scale_net_to_output)?;
            self.state = RenderState::ElementDrawn;
        }

        self.state = if ctx.copy_out_if_last(output.as_mut_slice())? {
            RenderState::BufferCopiedOut
        } else {
            RenderState::Done
        };
        Ok(selection)
    }

    fn draw(
        &mut self,
        ctx: &mut FrameContext<'_, D>,
        frame_size: (usize, usize),
        element: Element,
        keypoints: &KeypointSet,
        scale_net_to_output: Option<f32>,
    ) -> RenderResult<()> {
        if element == Element::Keypoints {
            self.upload_keypoints(keypoints)?;
        }
        let draw_ctx = DrawContext {
            model: self.config.model,
            descriptor: &self.descriptor,
            frame_size,
            heat_map_size: self.config.heat_map_size,
        };
        let frame = ctx.device_frame()?;

        if element == Element::Keypoints {
            let device_keypoints = self
                .device_keypoints
                .as_ref()
                .ok_or(RenderError::NotInitialized)?;
            return self.kernels.draw(
                frame,
                &draw_ctx,
                DrawCommand::Keypoints {
                    keypoints: device_keypoints,
                    people: keypoints.people(),
                    render_threshold: self.config.render_threshold,
                    show_googly_eyes: self.config.show_googly_eyes,
                    blend_original_frame: self.config.blend_original_frame,
                    alpha: self.config.alpha_keypoint,
                },
            );
        }

        let scale = valid_scale(scale_net_to_output).ok_or_else(|| {
            RenderError::InvalidConfiguration("Non valid scale_net_to_output.".to_string())
        })?;
        let alpha = self.config.heat_map_alpha();
        let kernels = &mut self.kernels;
        self.heat_maps.with_heat_maps(&mut |heat_maps| {
            let command = heat_map_command(element, heat_maps, scale, alpha).ok_or_else(|| {
                RenderError::InvalidInput(format!("{element:?} is not drawn from heat maps"))
            })?;
            kernels.draw(&mut *frame, &draw_ctx, command)
        })
    }
}

fn heat_map_command<B>(
    element: Element,
    heat_maps: &[f32],
    scale_net_to_output: f32,
    alpha: f32,
) -> Option<DrawCommand<'_, B>> {
    match element {
        Element::Keypoints => None,
        Element::HeatMap { part } => Some(DrawCommand::HeatMap {
            heat_maps,
            part,
            scale_net_to_output,
            alpha,
        }),
        Element::HeatMaps => Some(DrawCommand::HeatMaps {
            heat_maps,
            scale_net_to_output,
            alpha,
        }),
        Element::Pafs => Some(DrawCommand::Pafs {
            heat_maps,
            scale_net_to_output,
            alpha,
        }),
        Element::Paf { channel, .. } => Some(DrawCommand::Paf {
            heat_maps,
            channel,
            scale_net_to_output,
            alpha,
        }),
    }
}

impl<D: Device, K: PoseKernels<D>> RenderStage<D> for PoseRenderer<D, K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize_on_thread(&mut self) -> RenderResult<()> {
        PoseRenderer::initialize_on_thread(self)
    }

    fn render(
        &mut self,
        ctx: &mut FrameContext<'_, D>,
        output: &mut FrameBuffer,
        keypoints: &KeypointSet,
        scale_net_to_output: Option<f32>,
    ) -> RenderResult<ElementSelection> {
        PoseRenderer::render(self, ctx, output, keypoints, scale_net_to_output)
    }

    fn teardown(&mut self) {
        PoseRenderer::teardown(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{HostBuffer, HostDevice};
    use crate::lifecycle::FrameMirror;
    use crate::model::PoseModel;

    #[derive(Default)]
    struct NoopKernels {
        draws: usize,
    }

    impl PoseKernels<HostDevice> for NoopKernels {
        fn draw(
            &mut self,
            _frame: &mut HostBuffer,
            _context: &DrawContext<'_>,
            _command: DrawCommand<'_, HostBuffer>,
        ) -> RenderResult<()> {
            self.draws += 1;
            Ok(())
        }
    }

    fn renderer(
        device: Arc<HostDevice>,
    ) -> PoseRenderer<HostDevice, NoopKernels> {
        let config = RenderConfig {
            model: PoseModel::Mpi,
            ..Default::default()
        };
        PoseRenderer::new(
            "pose",
            config,
            device,
            NoopKernels::default(),
            Arc::new(Vec::<f32>::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_initialize_and_teardown_are_idempotent() {
        let device = Arc::new(HostDevice::new());
        let mut renderer = renderer(device.clone());
        renderer.teardown();
        renderer.initialize_on_thread().unwrap();
        renderer.initialize_on_thread().unwrap();
        assert_eq!(device.stats().allocations, 1);
        assert!(renderer.is_initialized());
        renderer.teardown();
        renderer.teardown();
        assert!(!renderer.is_initialized());
    }

    #[test]
    fn test_upload_checks_capacity_first() {
        let device = Arc::new(HostDevice::new());
        let mut renderer = renderer(device.clone());
        renderer.initialize_on_thread().unwrap();

        let too_many = KeypointSet::new(crate::model::POSE_MAX_PEOPLE + 1, 15);
        assert_eq!(
            renderer.upload_keypoints(&too_many),
            Err(RenderError::CapacityExceeded {
                requested: (crate::model::POSE_MAX_PEOPLE + 1) * 15 * 3,
                capacity: renderer.keypoint_capacity(),
            })
        );
        assert_eq!(device.stats().uploads, 0);

        renderer.upload_keypoints(&KeypointSet::new(0, 15)).unwrap();
        assert_eq!(device.stats().uploads, 0);
        renderer.upload_keypoints(&KeypointSet::new(2, 15)).unwrap();
        assert_eq!(device.stats().uploads, 1);
        assert!(renderer.upload_keypoints(&KeypointSet::new(2, 18)).is_err());
    }

    #[test]
    fn test_render_requires_initialization() {
        let device = Arc::new(HostDevice::new());
        let mut renderer = renderer(device.clone());
        let mut mirror = FrameMirror::new(device.clone());
        let mut ctx = FrameContext::new(&mut mirror, true);
        let mut frame = FrameBuffer::new(3, 2, 2);
        let result = renderer.render(&mut ctx, &mut frame, &KeypointSet::new(1, 15), None);
        assert_eq!(result, Err(RenderError::NotInitialized));
        assert_eq!(renderer.state(), RenderState::Idle);
        assert_eq!(device.stats(), Default::default());
    }

    #[test]
    fn test_tail_state_ends_copied_out() {
        let device = Arc::new(HostDevice::new());
        let mut renderer = renderer(device.clone());
        renderer.initialize_on_thread().unwrap();
        let mut mirror = FrameMirror::new(device.clone());
        let mut frame = FrameBuffer::new(3, 2, 2);
        let keypoints = KeypointSet::new(1, 15);

        let mut ctx = FrameContext::new(&mut mirror, false);
        renderer.render(&mut ctx, &mut frame, &keypoints, None).unwrap();
        assert_eq!(renderer.state(), RenderState::Done);

        ctx.set_tail(true);
        renderer.render(&mut ctx, &mut frame, &keypoints, None).unwrap();
        assert_eq!(renderer.state(), RenderState::BufferCopiedOut);
        assert_eq!(renderer.kernels().draws, 2);
    }

    struct Capture(std::sync::Mutex<Vec<String>>);

    impl log::Log for Capture {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            if let Ok(mut lines) = self.0.lock() {
                lines.push(format!("{} {}", record.level(), record.args()));
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: Capture = Capture(std::sync::Mutex::new(Vec::new()));

    #[test]
    fn test_dropped_frame_is_logged_once() {
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(log::LevelFilter::Debug);

        let device = Arc::new(HostDevice::new());
        let config = RenderConfig {
            model: PoseModel::Mpi,
            element_to_render: 4,
            ..Default::default()
        };
        let mut renderer = PoseRenderer::new(
            "unscaled_heat_map",
            config,
            device.clone(),
            NoopKernels::default(),
            Arc::new(Vec::<f32>::new()),
        )
        .unwrap();
        renderer.initialize_on_thread().unwrap();
        let mut chain = crate::chain::RenderChain::new(device).with_stage(renderer);

        let mut frame = FrameBuffer::new(3, 2, 2);
        let selections = chain.render_frame_or_drop(&mut frame, &KeypointSet::new(1, 15), None);
        assert_eq!(selections, vec![ElementSelection::invalid()]);

        let lines = CAPTURE.0.lock().unwrap();
        let reports: Vec<&String> = lines
            .iter()
            .filter(|line| line.contains("element 4 needs a valid scale_net_to_output"))
            .collect();
        assert_eq!(reports.len(), 1, "{reports:?}");
        assert!(reports[0].starts_with("ERROR unscaled_heat_map:"));
    }
}
