//! Face landmark sets delivered by an external face-mesh detector.
//!
//! Points are normalized: x and y lie roughly in [0, 1] relative to the frame,
//! z is relative depth. Points are addressed positionally by the anatomical
//! indices in [`crate::constants`].

use crate::{
    constants::{FACE_MESH_LANDMARKS, KEY_LANDMARKS, LEFT_IRIS_CENTER, RIGHT_IRIS_CENTER},
    Error, Result,
};
use nalgebra::Point3;

/// A single normalized 3D landmark
pub type Landmark = Point3<f64>;

/// Axis-aligned bounding box in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl NormalizedBox {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Ordered landmarks for one detected face
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    /// Wrap detector output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LandmarkError`] if fewer than the face-mesh point count
    /// are supplied.
    pub fn new(points: Vec<Landmark>) -> Result<Self> {
        if points.len() < FACE_MESH_LANDMARKS {
            return Err(Error::LandmarkError(format!(
                "Expected at least {} landmarks, got {}",
                FACE_MESH_LANDMARKS,
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// Build from raw `[x, y, z]` triples
    ///
    /// # Errors
    ///
    /// Same as [`LandmarkSet::new`].
    pub fn from_xyz(raw: &[[f64; 3]]) -> Result<Self> {
        Self::new(raw.iter().map(|&[x, y, z]| Landmark::new(x, y, z)).collect())
    }

    /// Number of points
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a constructed set; provided for API symmetry
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at an anatomical index, if present
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    /// Point at an anatomical index
    ///
    /// # Errors
    ///
    /// Returns [`Error::LandmarkError`] if the index is out of range.
    pub fn point(&self, index: usize) -> Result<&Landmark> {
        self.points
            .get(index)
            .ok_or_else(|| Error::LandmarkError(format!("Landmark {index} missing")))
    }

    /// Replace a single point; used by fixtures and calibration tooling
    ///
    /// # Errors
    ///
    /// Returns [`Error::LandmarkError`] if the index is out of range.
    pub fn set(&mut self, index: usize, point: Landmark) -> Result<()> {
        let slot = self
            .points
            .get_mut(index)
            .ok_or_else(|| Error::LandmarkError(format!("Landmark {index} missing")))?;
        *slot = point;
        Ok(())
    }

    /// All points in detector order
    #[must_use]
    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Whether iris-refined points are available
    #[must_use]
    pub fn has_iris(&self) -> bool {
        self.points.len() > RIGHT_IRIS_CENTER.max(LEFT_IRIS_CENTER)
    }

    /// Key points that are non-finite or outside the open unit square
    #[must_use]
    pub fn broken_key_points(&self) -> Vec<usize> {
        KEY_LANDMARKS
            .iter()
            .copied()
            .filter(|&i| match self.points.get(i) {
                Some(p) => !is_in_frame(p),
                None => true,
            })
            .collect()
    }

    /// Bounding box over all finite points, `None` if there are none
    #[must_use]
    pub fn bounding_box(&self) -> Option<NormalizedBox> {
        let mut finite = self
            .points
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .peekable();
        finite.peek()?;

        let mut bbox = NormalizedBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for p in finite {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }
}

fn is_in_frame(p: &Landmark) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite() && p.x > 0.0 && p.x < 1.0 && p.y > 0.0 && p.y < 1.0
}
