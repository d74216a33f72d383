//! Mapping of an element index onto what a pose renderer draws.
//!
//! With `N` heat map channels (body parts plus background) and `P` entries in the flattened
//! part pair table, a model exposes `T = N + P / 2 + 3` elements:
//!
//! | index | element |
//! |---|---|
//! | `0` | keypoints and skeleton |
//! | `1..=N` | one heat map channel, `index - 1` |
//! | `N + 1` | all heat maps |
//! | `N + 2` | all PAFs |
//! | `N + 3..T` | one PAF, pair `index - N - 3` |

use crate::error::{RenderError, RenderResult};
use crate::model::ModelDescriptor;
use compact_str::CompactString;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub const HEAT_MAPS_NAME: &str = "Heatmaps";
pub const PAFS_NAME: &str = "PAFs (Part Affinity Fields)";

/// Index reported for a frame that could not be rendered.
pub const INVALID_ELEMENT_INDEX: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Keypoints,
    SingleHeatMap,
    AllHeatMaps,
    AllPafs,
    SinglePaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Element {
    Keypoints,
    /// `part` is the heat map channel, the last one being the background.
    HeatMap { part: u32 },
    HeatMaps,
    Pafs,
    /// `pair` indexes the model pairs, `channel` is the network channel of its x component.
    Paf { pair: u32, channel: u32 },
}

impl Element {
    pub fn category(&self) -> Category {
        match self {
            Element::Keypoints => Category::Keypoints,
            Element::HeatMap { .. } => Category::SingleHeatMap,
            Element::HeatMaps => Category::AllHeatMaps,
            Element::Pafs => Category::AllPafs,
            Element::Paf { .. } => Category::SinglePaf,
        }
    }
}

/// What was (or is about to be) rendered, reported back to the caller for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSelection {
    pub index: i32,
    pub element: Option<Element>,
    pub name: CompactString,
}

impl ElementSelection {
    /// Sentinel for a dropped frame.
    pub fn invalid() -> Self {
        Self {
            index: INVALID_ELEMENT_INDEX,
            element: None,
            name: CompactString::default(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.element.is_some()
    }

    pub fn category(&self) -> Option<Category> {
        self.element.map(|e| e.category())
    }
}

/// A scale is usable when it is finite and strictly positive.
pub fn valid_scale(scale_net_to_output: Option<f32>) -> Option<f32> {
    scale_net_to_output.filter(|s| s.is_finite() && *s > 0.0)
}

/// Resolve `index` for `model`.
///
/// Every element but the keypoints needs `scale_net_to_output` to align the network output
/// with the frame.
pub fn select(
    index: u32,
    model: &ModelDescriptor,
    scale_net_to_output: Option<f32>,
) -> RenderResult<ElementSelection> {
    let total = model.number_elements();
    if index >= total {
        return Err(RenderError::ElementOutOfRange { index, total });
    }
    if index == 0 {
        return Ok(ElementSelection {
            index: 0,
            element: Some(Element::Keypoints),
            name: CompactString::default(),
        });
    }
    if valid_scale(scale_net_to_output).is_none() {
        return Err(RenderError::InvalidConfiguration(format!(
            "element {index} needs a valid scale_net_to_output, got {scale_net_to_output:?}"
        )));
    }

    let channels = model.heat_map_channels();
    let (element, name) = if index <= channels {
        let part = index - 1;
        (Element::HeatMap { part }, channel_label(model, part)?)
    } else if index == channels + 1 {
        (Element::HeatMaps, CompactString::from(HEAT_MAPS_NAME))
    } else if index == channels + 2 {
        (Element::Pafs, CompactString::from(PAFS_NAME))
    } else {
        let pair = index - channels - 3;
        let channel = *model
            .map_idx()
            .get(2 * pair as usize)
            .ok_or_else(|| {
                RenderError::InvalidConfiguration(format!(
                    "model {} has no PAF channel for pair {pair}",
                    model.name()
                ))
            })?;
        let label = channel_label(model, channel)?;
        let limb = match label.find('(') {
            Some(cut) => CompactString::from(&label[..cut]),
            None => label,
        };
        (Element::Paf { pair, channel }, limb)
    };

    Ok(ElementSelection {
        index: index as i32,
        element: Some(element),
        name,
    })
}

fn channel_label(model: &ModelDescriptor, channel: u32) -> RenderResult<CompactString> {
    model
        .channel_name(channel)
        .map(CompactString::from)
        .ok_or_else(|| {
            RenderError::InvalidConfiguration(format!(
                "model {} has no name for channel {channel}",
                model.name()
            ))
        })
}

/// Element to render, shared between a renderer and whatever drives it (GUI, keyboard...).
/// Values always stay within `0..total`.
#[derive(Debug, Clone)]
pub struct ElementCursor {
    current: Arc<AtomicU32>,
    total: u32,
}

impl ElementCursor {
    pub fn new(initial: u32, total: u32) -> RenderResult<Self> {
        if initial >= total {
            return Err(RenderError::ElementOutOfRange {
                index: initial,
                total,
            });
        }
        Ok(Self {
            current: Arc::new(AtomicU32::new(initial)),
            total,
        })
    }

    pub fn get(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Wraps around `total`.
    pub fn set(&self, index: u32) {
        self.current.store(index % self.total, Ordering::Release);
    }

    /// Move by `increment` elements, wrapping in both directions.
    pub fn increase(&self, increment: i32) -> u32 {
        let total = self.total as i64;
        let step = |current: u32| (current as i64 + increment as i64).rem_euclid(total) as u32;
        match self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(step(current))
            }) {
            Ok(previous) | Err(previous) => step(previous),
        }
    }
}
