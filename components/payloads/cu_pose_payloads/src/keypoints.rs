use crate::{PayloadError, PayloadResult};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Number of floats per keypoint: x, y and score.
pub const KEYPOINT_STRIDE: usize = 3;

#[derive(Default, Debug, Clone, Copy, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Detected keypoints for every person of a frame, people × body parts × (x, y, score).
#[derive(Default, Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct KeypointSet {
    people: usize,
    parts: usize,
    data: Vec<f32>,
}

impl KeypointSet {
    pub fn new(people: usize, parts: usize) -> Self {
        Self {
            people,
            parts,
            data: vec![0.0; people * parts * KEYPOINT_STRIDE],
        }
    }

    pub fn from_vec(people: usize, parts: usize, data: Vec<f32>) -> PayloadResult<Self> {
        let expected = people * parts * KEYPOINT_STRIDE;
        if data.len() != expected {
            return Err(PayloadError::ShapeMismatch {
                shape: vec![people, parts, KEYPOINT_STRIDE],
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            people,
            parts,
            data,
        })
    }

    pub fn people(&self) -> usize {
        self.people
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    /// Total number of floats.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, person: usize, part: usize) -> PayloadResult<Keypoint> {
        let offset = self.offset(person, part)?;
        Ok(Keypoint {
            x: self.data[offset],
            y: self.data[offset + 1],
            score: self.data[offset + 2],
        })
    }

    pub fn set(&mut self, person: usize, part: usize, keypoint: Keypoint) -> PayloadResult<()> {
        let offset = self.offset(person, part)?;
        self.data[offset..offset + KEYPOINT_STRIDE]
            .copy_from_slice(&[keypoint.x, keypoint.y, keypoint.score]);
        Ok(())
    }

    fn offset(&self, person: usize, part: usize) -> PayloadResult<usize> {
        if person >= self.people {
            return Err(PayloadError::OutOfBounds {
                dimension: 0,
                index: person,
                size: self.people,
            });
        }
        if part >= self.parts {
            return Err(PayloadError::OutOfBounds {
                dimension: 1,
                index: part,
                size: self.parts,
            });
        }
        Ok((person * self.parts + part) * KEYPOINT_STRIDE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_access() {
        let mut set = KeypointSet::new(2, 18);
        let kp = Keypoint {
            x: 10.0,
            y: 20.0,
            score: 0.9,
        };
        set.set(1, 17, kp).unwrap();
        assert_eq!(set.get(1, 17).unwrap(), kp);
        assert_eq!(set.as_slice()[(18 + 17) * 3 + 1], 20.0);
        assert_eq!(set.len(), 2 * 18 * 3);
    }

    #[test]
    fn test_out_of_bounds() {
        let set = KeypointSet::new(1, 15);
        assert!(matches!(
            set.get(1, 0),
            Err(PayloadError::OutOfBounds { dimension: 0, .. })
        ));
        assert!(matches!(
            set.get(0, 15),
            Err(PayloadError::OutOfBounds { dimension: 1, .. })
        ));
    }

    #[test]
    fn test_no_people_is_empty() {
        let set = KeypointSet::new(0, 18);
        assert!(set.is_empty());
        assert_eq!(set.people(), 0);
    }

    #[test]
    fn test_from_vec_checks_stride() {
        assert!(KeypointSet::from_vec(1, 2, vec![0.0; 6]).is_ok());
        assert!(KeypointSet::from_vec(1, 2, vec![0.0; 4]).is_err());
    }
}
