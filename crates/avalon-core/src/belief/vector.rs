//! Probability vector over the hidden-state space.

use crate::game::HiddenId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Maximum drift tolerated when checking that a belief sums to one.
pub const BELIEF_TOLERANCE: f64 = 1e-6;

/// A player's distribution over hidden states.
///
/// Entries are non-negative and sum to one. Equality and hashing compare the
/// exact bit pattern of every entry so beliefs can key memo tables. Serialized
/// as a plain list; deserializing goes through [`Belief::from_probs`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Belief {
    probs: Vec<f64>,
}

impl Belief {
    /// Uniform belief over `len` hidden states.
    pub fn uniform(len: usize) -> Self {
        let mass = 1.0 / len.max(1) as f64;
        Self {
            probs: vec![mass; len],
        }
    }

    /// Belief that puts all mass on `hidden`.
    pub fn point(len: usize, hidden: HiddenId) -> Self {
        let mut probs = vec![0.0; len];
        if let Some(slot) = probs.get_mut(hidden) {
            *slot = 1.0;
        }
        Self { probs }
    }

    /// Normalises non-negative weights into a belief.
    pub fn from_weights(weights: Vec<f64>) -> Result<Self, BeliefError> {
        validate_entries(&weights)?;
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) || !total.is_finite() {
            return Err(BeliefError::ZeroMass);
        }
        let probs = weights.into_iter().map(|w| canonical(w / total)).collect();
        Ok(Self { probs })
    }

    /// Wraps probabilities that must already sum to one.
    pub fn from_probs(probs: Vec<f64>) -> Result<Self, BeliefError> {
        validate_entries(&probs)?;
        let sum: f64 = probs.iter().sum();
        if (sum - 1.0).abs() > BELIEF_TOLERANCE {
            return Err(BeliefError::NotNormalized { sum });
        }
        Ok(Self {
            probs: probs.into_iter().map(canonical).collect(),
        })
    }

    // Entries copied out of a tensor were validated when they went in.
    pub(crate) fn from_raw(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// Probability assigned to `hidden` (zero when out of range).
    pub fn prob(&self, hidden: HiddenId) -> f64 {
        self.probs.get(hidden).copied().unwrap_or(0.0)
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    /// Hidden states carrying non-zero mass, in index order.
    pub fn support(&self) -> impl Iterator<Item = HiddenId> + '_ {
        self.probs
            .iter()
            .enumerate()
            .filter(|(_, p)| **p > 0.0)
            .map(|(h, _)| h)
    }

    pub fn sum(&self) -> f64 {
        self.probs.iter().sum()
    }

    /// True when every entry is finite, non-negative and the total is one.
    pub fn is_valid(&self) -> bool {
        validate_entries(&self.probs).is_ok() && (self.sum() - 1.0).abs() <= BELIEF_TOLERANCE
    }

    /// Most likely hidden state; the lowest index wins ties.
    pub fn argmax(&self) -> Option<HiddenId> {
        let mut best: Option<(HiddenId, f64)> = None;
        for (h, &p) in self.probs.iter().enumerate() {
            if best.is_none_or(|(_, top)| p > top) {
                best = Some((h, p));
            }
        }
        best.map(|(h, _)| h)
    }

    /// Shannon entropy in nats.
    pub fn entropy(&self) -> f64 {
        self.probs
            .iter()
            .filter(|p| **p > 0.0)
            .map(|p| -p * p.ln())
            .sum()
    }

    /// Largest absolute entry-wise difference to `other`.
    pub fn max_abs_diff(&self, other: &Belief) -> f64 {
        self.probs
            .iter()
            .zip(other.probs.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl TryFrom<Vec<f64>> for Belief {
    type Error = BeliefError;

    fn try_from(probs: Vec<f64>) -> Result<Self, BeliefError> {
        Self::from_probs(probs)
    }
}

impl From<Belief> for Vec<f64> {
    fn from(belief: Belief) -> Self {
        belief.probs
    }
}

impl PartialEq for Belief {
    fn eq(&self, other: &Self) -> bool {
        self.probs.len() == other.probs.len()
            && self
                .probs
                .iter()
                .zip(other.probs.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for Belief {}

impl Hash for Belief {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.probs.len().hash(state);
        for p in &self.probs {
            p.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Belief {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, p) in self.probs.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p:.3}")?;
        }
        f.write_str("]")
    }
}

/// Errors raised when constructing a [`Belief`].
#[derive(Debug, Clone, PartialEq)]
pub enum BeliefError {
    Empty,
    LengthMismatch { expected: usize, actual: usize },
    NonFinite { index: usize },
    Negative { index: usize, value: f64 },
    ZeroMass,
    NotNormalized { sum: f64 },
}

impl fmt::Display for BeliefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeliefError::Empty => write!(f, "belief has no entries"),
            BeliefError::LengthMismatch { expected, actual } => {
                write!(f, "belief has {actual} entries, expected {expected}")
            }
            BeliefError::NonFinite { index } => {
                write!(f, "belief entry {index} is not finite")
            }
            BeliefError::Negative { index, value } => {
                write!(f, "belief entry {index} is negative ({value})")
            }
            BeliefError::ZeroMass => write!(f, "belief weights carry no mass"),
            BeliefError::NotNormalized { sum } => {
                write!(f, "belief sums to {sum} instead of 1")
            }
        }
    }
}

impl std::error::Error for BeliefError {}

fn validate_entries(values: &[f64]) -> Result<(), BeliefError> {
    if values.is_empty() {
        return Err(BeliefError::Empty);
    }
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            return Err(BeliefError::NonFinite { index });
        }
        if value < 0.0 {
            return Err(BeliefError::Negative { index, value });
        }
    }
    Ok(())
}

// -0.0 and +0.0 must hash identically.
fn canonical(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}
