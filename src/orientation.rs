//! Orientation targets and the pose classifier.
//!
//! An [`OrientationSequence`] is the ordered list of poses a user must hold in
//! turn. Each [`OrientationTarget`] admits a pose when all three axis ranges
//! contain the corresponding smoothed angle. Only the sequencer's current
//! target is ever evaluated, so ranges of neighbouring targets may overlap.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Names of the built-in sequence profiles
pub const PROFILE_NAMES: [&str; 2] = ["standard", "basic"];

/// One end of an axis range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Unbounded,
    Inclusive(f64),
    Exclusive(f64),
}

impl Default for Bound {
    fn default() -> Self {
        Self::Unbounded
    }
}

/// Admissible interval for one axis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisRange {
    #[serde(default)]
    pub min: Bound,
    #[serde(default)]
    pub max: Bound,
}

impl AxisRange {
    /// Accepts any finite value
    pub const ANY: Self = Self {
        min: Bound::Unbounded,
        max: Bound::Unbounded,
    };

    /// `min < v < max`
    #[must_use]
    pub const fn open(min: f64, max: f64) -> Self {
        Self {
            min: Bound::Exclusive(min),
            max: Bound::Exclusive(max),
        }
    }

    /// `min <= v <= max`
    #[must_use]
    pub const fn closed(min: f64, max: f64) -> Self {
        Self {
            min: Bound::Inclusive(min),
            max: Bound::Inclusive(max),
        }
    }

    /// `v < max`
    #[must_use]
    pub const fn below(max: f64) -> Self {
        Self {
            min: Bound::Unbounded,
            max: Bound::Exclusive(max),
        }
    }

    /// `v > min`
    #[must_use]
    pub const fn above(min: f64) -> Self {
        Self {
            min: Bound::Exclusive(min),
            max: Bound::Unbounded,
        }
    }

    /// `|v| < limit`
    #[must_use]
    pub const fn abs_below(limit: f64) -> Self {
        Self::open(-limit, limit)
    }

    /// Whether the range contains `value`. Non-finite values never match.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        let lower = match self.min {
            Bound::Unbounded => true,
            Bound::Inclusive(min) => value >= min,
            Bound::Exclusive(min) => value > min,
        };
        let upper = match self.max {
            Bound::Unbounded => true,
            Bound::Inclusive(max) => value <= max,
            Bound::Exclusive(max) => value < max,
        };
        lower && upper
    }
}

/// A named target pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationTarget {
    /// Short name, also used as the photo label stem
    pub name: String,
    /// Instruction shown to the user while aligning
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub yaw: AxisRange,
    #[serde(default)]
    pub pitch: AxisRange,
    #[serde(default)]
    pub roll: AxisRange,
}

impl OrientationTarget {
    #[must_use]
    pub fn new(name: &str, prompt: &str, yaw: AxisRange, pitch: AxisRange, roll: AxisRange) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
            yaw,
            pitch,
            roll,
        }
    }

    /// Admission predicate: conjunction of the per-axis range checks
    #[must_use]
    pub fn admits(&self, yaw: f64, pitch: f64, roll: f64) -> bool {
        self.yaw.contains(yaw) && self.pitch.contains(pitch) && self.roll.contains(roll)
    }
}

/// Ordered list of target poses
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationSequence {
    profile: String,
    targets: Vec<OrientationTarget>,
}

impl OrientationSequence {
    /// Build a sequence from explicit targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SequenceError`] if the list is empty, a name is blank,
    /// or two targets share a name.
    pub fn new(profile: &str, targets: Vec<OrientationTarget>) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::SequenceError("Orientation sequence is empty".to_string()));
        }
        for (i, target) in targets.iter().enumerate() {
            if target.name.trim().is_empty() {
                return Err(Error::SequenceError(format!("Target {i} has an empty name")));
            }
            if targets[..i].iter().any(|t| t.name == target.name) {
                return Err(Error::SequenceError(format!("Duplicate target name: {}", target.name)));
            }
        }
        Ok(Self {
            profile: profile.to_string(),
            targets,
        })
    }

    /// Look up a built-in profile by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SequenceError`] for unknown profile names.
    pub fn profile(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "standard" => Ok(Self::standard()),
            "basic" => Ok(Self::basic()),
            _ => Err(Error::SequenceError(format!(
                "Unknown orientation profile: {name} (expected one of {})",
                PROFILE_NAMES.join(", ")
            ))),
        }
    }

    /// Five-pose sequence: straight, left, right, up, down
    #[must_use]
    pub fn standard() -> Self {
        Self {
            profile: "standard".to_string(),
            targets: vec![
                OrientationTarget::new(
                    "straight",
                    "Look straight until the circle turns green",
                    AxisRange::open(-8.0, 8.0),
                    AxisRange::open(-10.0, 14.0),
                    AxisRange::open(-8.0, 8.0),
                ),
                OrientationTarget::new(
                    "left",
                    "Slowly turn left until the circle turns green",
                    AxisRange::open(22.0, 40.0),
                    AxisRange::open(-12.0, 12.0),
                    AxisRange::open(-10.0, 10.0),
                ),
                OrientationTarget::new(
                    "right",
                    "Slowly turn right until the circle turns green",
                    AxisRange::open(-40.0, -20.0),
                    AxisRange::open(-15.0, 10.0),
                    AxisRange::open(-10.0, 10.0),
                ),
                OrientationTarget::new(
                    "up",
                    "Slowly look up until the circle turns green",
                    AxisRange::abs_below(10.0),
                    AxisRange::open(-33.0, -15.0),
                    AxisRange::ANY,
                ),
                OrientationTarget::new(
                    "down",
                    "Slowly look down until the circle turns green",
                    AxisRange::abs_below(5.0),
                    AxisRange::open(25.0, 40.0),
                    AxisRange::ANY,
                ),
            ],
        }
    }

    /// Three-pose pitch-only sequence: straight, up, down
    #[must_use]
    pub fn basic() -> Self {
        Self {
            profile: "basic".to_string(),
            targets: vec![
                OrientationTarget::new(
                    "straight",
                    "Look straight",
                    AxisRange::ANY,
                    AxisRange::abs_below(15.0),
                    AxisRange::ANY,
                ),
                OrientationTarget::new("up", "Look up", AxisRange::ANY, AxisRange::below(-25.0), AxisRange::ANY),
                OrientationTarget::new("down", "Look down", AxisRange::ANY, AxisRange::above(25.0), AxisRange::ANY),
            ],
        }
    }

    /// Profile this sequence was built from
    #[must_use]
    pub fn profile_name(&self) -> &str {
        &self.profile
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false for a constructed sequence
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&OrientationTarget> {
        self.targets.get(index)
    }

    #[must_use]
    pub fn targets(&self) -> &[OrientationTarget] {
        &self.targets
    }

    /// Target names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.name.as_str())
    }

    /// Evaluate the target at `index` against smoothed angles.
    ///
    /// An out-of-range index is a non-match.
    #[must_use]
    pub fn classify(&self, index: usize, yaw: f64, pitch: f64, roll: f64) -> bool {
        self.targets
            .get(index)
            .is_some_and(|target| target.admits(yaw, pitch, roll))
    }

    /// Index of the target a photo label was produced from.
    ///
    /// Labels are either the bare target name or the name followed by an
    /// underscore-separated phase suffix. The longest matching name wins.
    #[must_use]
    pub fn position_for_label(&self, label: &str) -> Option<usize> {
        self.targets
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                label == t.name
                    || label
                        .strip_prefix(t.name.as_str())
                        .is_some_and(|rest| rest.starts_with('_'))
            })
            .max_by_key(|(_, t)| t.name.len())
            .map(|(i, _)| i)
    }
}

impl Default for OrientationSequence {
    fn default() -> Self {
        Self::standard()
    }
}
