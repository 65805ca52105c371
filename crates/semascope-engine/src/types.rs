//! Core data types shared by clients and workflows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dimensionality of vectors produced by the default embedding model.
pub const DEFAULT_DIMENSION: usize = 1536;

/// Store identifier of the reference vector (the raw input).
pub const REFERENCE_ID: u32 = 1;

/// Store identifier of the comparison vector (the second input or the
/// generalized text).
pub const COMPARISON_ID: u32 = 2;

/// A fixed-length embedding vector.
///
/// The empty embedding is the error sentinel meaning "no embedding
/// available". Callers must length-check before indexing into the values
/// or plotting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wrap a vector of values.
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// The error sentinel.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the error sentinel.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw values.
    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// Consume into the raw values.
    pub fn into_values(self) -> Vec<f32> {
        self.0
    }

    /// Observed (min, max) range, or None for the empty sentinel.
    ///
    /// Non-finite elements are skipped the way `f32::min`/`f32::max`
    /// skip NaN.
    pub fn range(&self) -> Option<(f32, f32)> {
        if self.0.is_empty() {
            return None;
        }
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in &self.0 {
            min = min.min(v);
            max = max.max(v);
        }
        Some((min, max))
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Space-separated values, the display form the workflows surface to users.
impl fmt::Display for Embedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for v in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{v}")?;
            first = false;
        }
        Ok(())
    }
}

/// A vector record as stored in the external index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record identifier; the store keys on strings.
    pub id: String,
    /// The vector values.
    pub values: Vec<f32>,
}

impl VectorRecord {
    /// Build a record from a numeric slot id and an embedding.
    pub fn new(id: u32, values: &Embedding) -> Self {
        Self {
            id: id.to_string(),
            values: values.values().to_vec(),
        }
    }
}
