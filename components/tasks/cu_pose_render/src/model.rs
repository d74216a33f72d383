//! Static description of the supported pose models.
//!
//! The network output stacks the body-part heat maps (background last) followed by two PAF
//! channels (x, y) per part pair. `map_idx` gives, for every entry of the flattened
//! `body_part_pairs` table, the network channel holding that PAF component.

use crate::error::{RenderError, RenderResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Maximum number of people the device keypoint buffer is sized for.
pub const POSE_MAX_PEOPLE: usize = 96;

const BACKGROUND: &str = "Background";

const COCO_PARTS: [&str; 18] = [
    "Nose", "Neck", "RShoulder", "RElbow", "RWrist", "LShoulder", "LElbow", "LWrist", "RHip",
    "RKnee", "RAnkle", "LHip", "LKnee", "LAnkle", "REye", "LEye", "REar", "LEar",
];

const COCO_PAIRS: [u32; 38] = [
    1, 2, 1, 5, 2, 3, 3, 4, 5, 6, 6, 7, 1, 8, 8, 9, 9, 10, 1, 11, 11, 12, 12, 13, 1, 0, 0, 14,
    14, 16, 0, 15, 15, 17, 2, 16, 5, 17,
];

const COCO_MAP_IDX: [u32; 38] = [
    31, 32, 39, 40, 33, 34, 35, 36, 41, 42, 43, 44, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29,
    30, 47, 48, 49, 50, 53, 54, 51, 52, 55, 56, 37, 38, 45, 46,
];

const MPI_PARTS: [&str; 15] = [
    "Head", "Neck", "RShoulder", "RElbow", "RWrist", "LShoulder", "LElbow", "LWrist", "RHip",
    "RKnee", "RAnkle", "LHip", "LKnee", "LAnkle", "Chest",
];

const MPI_PAIRS: [u32; 28] = [
    0, 1, 1, 2, 2, 3, 3, 4, 1, 5, 5, 6, 6, 7, 1, 14, 14, 8, 8, 9, 9, 10, 14, 11, 11, 12, 12, 13,
];

const MPI_MAP_IDX: [u32; 28] = [
    16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38,
    39, 40, 41, 42, 43,
];

/// Model identifier, fixed at construction of a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PoseModel {
    #[default]
    Coco,
    Mpi,
    /// Faster MPI variant, same topology.
    Mpi4Layers,
}

impl PoseModel {
    pub fn descriptor(&self) -> ModelDescriptor {
        match self {
            PoseModel::Coco => {
                ModelDescriptor::from_static("COCO", &COCO_PARTS, &COCO_PAIRS, &COCO_MAP_IDX)
            }
            PoseModel::Mpi => {
                ModelDescriptor::from_static("MPI", &MPI_PARTS, &MPI_PAIRS, &MPI_MAP_IDX)
            }
            PoseModel::Mpi4Layers => {
                ModelDescriptor::from_static("MPI_4_layers", &MPI_PARTS, &MPI_PAIRS, &MPI_MAP_IDX)
            }
        }
    }
}

/// Accepts both the variant names and the usual model names, `COCO`, `MPI` and `MPI_4_layers`.
impl FromStr for PoseModel {
    type Err = RenderError;

    fn from_str(s: &str) -> RenderResult<Self> {
        match s {
            "Coco" | "COCO" => Ok(PoseModel::Coco),
            "Mpi" | "MPI" => Ok(PoseModel::Mpi),
            "Mpi4Layers" | "MPI_4_layers" => Ok(PoseModel::Mpi4Layers),
            other => Err(RenderError::InvalidConfiguration(format!(
                "unknown pose model {other}"
            ))),
        }
    }
}

/// Model constants consumed by the element selector and the renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    name: String,
    /// Body parts followed by the background channel.
    part_names: Vec<String>,
    body_part_pairs: Vec<u32>,
    map_idx: Vec<u32>,
    part_to_name: BTreeMap<u32, String>,
}

impl ModelDescriptor {
    fn from_static(name: &str, parts: &[&str], pairs: &[u32], map_idx: &[u32]) -> Self {
        let part_names = parts.iter().map(|p| p.to_string()).collect();
        Self::build(name, part_names, pairs.to_vec(), map_idx.to_vec())
    }

    /// Describe a model outside of the built-in table.
    /// `parts` lists the body parts only, the background channel is appended.
    pub fn custom(
        name: &str,
        parts: &[&str],
        body_part_pairs: &[u32],
        map_idx: &[u32],
    ) -> RenderResult<Self> {
        if parts.is_empty() {
            return Err(RenderError::InvalidConfiguration(format!(
                "model {name} has no body parts"
            )));
        }
        if body_part_pairs.len() % 2 != 0 {
            return Err(RenderError::InvalidConfiguration(format!(
                "model {name} has an odd part pair table ({} entries)",
                body_part_pairs.len()
            )));
        }
        if body_part_pairs.len() != map_idx.len() {
            return Err(RenderError::InvalidConfiguration(format!(
                "model {name} has {} pair entries but {} PAF channels",
                body_part_pairs.len(),
                map_idx.len()
            )));
        }
        if let Some(part) = body_part_pairs
            .iter()
            .find(|p| **p as usize >= parts.len())
        {
            return Err(RenderError::InvalidConfiguration(format!(
                "model {name} pairs reference unknown part {part}"
            )));
        }
        let channels = parts.len() as u32 + 1;
        let mut seen = std::collections::BTreeSet::new();
        for channel in map_idx {
            if *channel < channels || !seen.insert(*channel) {
                return Err(RenderError::InvalidConfiguration(format!(
                    "model {name} maps a PAF onto channel {channel} which is a heat map or already used"
                )));
            }
        }
        let part_names = parts.iter().map(|p| p.to_string()).collect();
        Ok(Self::build(
            name,
            part_names,
            body_part_pairs.to_vec(),
            map_idx.to_vec(),
        ))
    }

    fn build(name: &str, mut part_names: Vec<String>, pairs: Vec<u32>, map_idx: Vec<u32>) -> Self {
        part_names.push(BACKGROUND.to_string());
        let mut part_to_name: BTreeMap<u32, String> = part_names
            .iter()
            .enumerate()
            .map(|(i, n)| (i as u32, n.clone()))
            .collect();
        for (pair, channels) in pairs.chunks_exact(2).zip(map_idx.chunks_exact(2)) {
            let limb = format!(
                "{}->{}",
                part_names[pair[0] as usize], part_names[pair[1] as usize]
            );
            part_to_name.insert(channels[0], format!("{limb}(X)"));
            part_to_name.insert(channels[1], format!("{limb}(Y)"));
        }
        Self {
            name: name.to_string(),
            part_names,
            body_part_pairs: pairs,
            map_idx,
            part_to_name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_body_parts(&self) -> usize {
        self.part_names.len() - 1
    }

    /// Body parts plus background.
    pub fn heat_map_channels(&self) -> u32 {
        self.part_names.len() as u32
    }

    pub fn body_part_pairs(&self) -> &[u32] {
        &self.body_part_pairs
    }

    pub fn map_idx(&self) -> &[u32] {
        &self.map_idx
    }

    /// Heat map channels, then one PAF element per pair, plus keypoints, all heat maps and all PAFs.
    pub fn number_elements(&self) -> u32 {
        self.heat_map_channels() + self.body_part_pairs.len() as u32 / 2 + 3
    }

    /// Floats needed to hold the keypoints of [`POSE_MAX_PEOPLE`] people.
    pub fn keypoint_capacity(&self) -> usize {
        POSE_MAX_PEOPLE * self.number_body_parts() * cu_pose_payloads::KEYPOINT_STRIDE
    }

    /// Name of a network channel, heat map or PAF component.
    pub fn channel_name(&self, channel: u32) -> Option<&str> {
        self.part_to_name.get(&channel).map(String::as_str)
    }

    pub fn part_to_name(&self) -> &BTreeMap<u32, String> {
        &self.part_to_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_element_counts() {
        assert_eq!(PoseModel::Coco.descriptor().number_elements(), 19 + 19 + 3);
        assert_eq!(PoseModel::Mpi.descriptor().number_elements(), 16 + 14 + 3);
        assert_eq!(
            PoseModel::Mpi4Layers.descriptor().number_elements(),
            PoseModel::Mpi.descriptor().number_elements()
        );
    }

    #[test]
    fn test_paf_channel_names() {
        let coco = PoseModel::Coco.descriptor();
        assert_eq!(coco.channel_name(18), Some("Background"));
        assert_eq!(coco.channel_name(31), Some("Neck->RShoulder(X)"));
        assert_eq!(coco.channel_name(32), Some("Neck->RShoulder(Y)"));
        assert_eq!(coco.channel_name(46), Some("LShoulder->LEar(Y)"));
        // 19 heat maps and 38 PAF channels, no collisions.
        assert_eq!(coco.part_to_name().len(), 19 + 38);
    }

    #[test]
    fn test_keypoint_capacity() {
        assert_eq!(
            PoseModel::Mpi.descriptor().keypoint_capacity(),
            POSE_MAX_PEOPLE * 15 * 3
        );
    }

    #[test]
    fn test_model_names() {
        assert_eq!("MPI_4_layers".parse::<PoseModel>(), Ok(PoseModel::Mpi4Layers));
        assert_eq!("Coco".parse::<PoseModel>(), Ok(PoseModel::Coco));
        for model in [PoseModel::Coco, PoseModel::Mpi, PoseModel::Mpi4Layers] {
            assert_eq!(model.descriptor().name().parse::<PoseModel>(), Ok(model));
        }
        assert!(matches!(
            "BODY_25".parse::<PoseModel>(),
            Err(RenderError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_custom_model_validation() {
        assert!(ModelDescriptor::custom("odd", &["a", "b"], &[0], &[3]).is_err());
        assert!(ModelDescriptor::custom("len", &["a", "b"], &[0, 1], &[3]).is_err());
        assert!(ModelDescriptor::custom("part", &["a", "b"], &[0, 2], &[3, 4]).is_err());
        assert!(ModelDescriptor::custom("heatmap", &["a", "b"], &[0, 1], &[2, 3]).is_err());
        assert!(ModelDescriptor::custom("dup", &["a", "b"], &[0, 1, 1, 0], &[3, 4, 4, 5]).is_err());
        let ok = ModelDescriptor::custom("ok", &["a", "b"], &[0, 1], &[3, 4]).unwrap();
        assert_eq!(ok.number_elements(), 3 + 1 + 3);
        assert_eq!(ok.channel_name(4), Some("a->b(Y)"));
    }
}
