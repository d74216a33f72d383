//! Renderer configuration, serialized in the RON format.
//!
//! ```ron
//! (
//!     model: Mpi,
//!     heat_map_size: (656, 368),
//!     blend_original_frame: false,
//!     element_to_render: 3,
//! )
//! ```

use crate::error::{RenderError, RenderResult};
use crate::model::{ModelDescriptor, PoseModel};
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;

/// Immutable settings of a pose renderer. Omitted fields take their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub model: PoseModel,
    /// Width and height of the network heat map tensor.
    pub heat_map_size: (u32, u32),
    pub render_threshold: f32,
    pub blend_original_frame: bool,
    pub alpha_keypoint: f32,
    pub alpha_heat_map: f32,
    pub element_to_render: u32,
    pub show_googly_eyes: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            model: PoseModel::Coco,
            heat_map_size: (656, 368),
            render_threshold: 0.05,
            blend_original_frame: true,
            alpha_keypoint: 0.6,
            alpha_heat_map: 0.7,
            element_to_render: 0,
            show_googly_eyes: false,
        }
    }
}

impl RenderConfig {
    pub fn from_ron_str(content: &str) -> RenderResult<Self> {
        let config: RenderConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> RenderResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| RenderError::InvalidConfiguration(e.to_string()))
    }

    pub fn validate(&self) -> RenderResult<()> {
        self.validate_for(&self.descriptor())
    }

    /// Validate against a model other than the built-in tables of `self.model`.
    pub fn validate_for(&self, descriptor: &ModelDescriptor) -> RenderResult<()> {
        for (name, value) in [
            ("render_threshold", self.render_threshold),
            ("alpha_keypoint", self.alpha_keypoint),
            ("alpha_heat_map", self.alpha_heat_map),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RenderError::InvalidConfiguration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.heat_map_size.0 == 0 || self.heat_map_size.1 == 0 {
            return Err(RenderError::InvalidConfiguration(format!(
                "heat_map_size must not be empty, got {:?}",
                self.heat_map_size
            )));
        }
        let total = descriptor.number_elements();
        if self.element_to_render >= total {
            return Err(RenderError::ElementOutOfRange {
                index: self.element_to_render,
                total,
            });
        }
        Ok(())
    }

    pub fn descriptor(&self) -> ModelDescriptor {
        self.model.descriptor()
    }

    /// Number of selectable elements for the configured model.
    pub fn number_elements(&self) -> u32 {
        self.descriptor().number_elements()
    }

    /// Alpha handed to the heat map and PAF kernels.
    pub fn heat_map_alpha(&self) -> f32 {
        if self.blend_original_frame {
            self.alpha_heat_map
        } else {
            1.0
        }
    }
}

/// Read a RON renderer configuration from a file.
pub fn read_configuration<P: AsRef<Path>>(config_filename: P) -> RenderResult<RenderConfig> {
    let path = config_filename.as_ref();
    let config_content = read_to_string(path).map_err(|e| {
        RenderError::InvalidConfiguration(format!(
            "Failed to read configuration file {}: {e}",
            path.display()
        ))
    })?;
    RenderConfig::from_ron_str(&config_content)
}
