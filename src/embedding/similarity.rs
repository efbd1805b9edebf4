// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector math used for scoring and normalization.

use crate::errors::{Error, Result};

/// Tolerance on the L2 norm when deciding a vector is already unit length.
pub const NORMALIZED_TOLERANCE: f64 = 1e-6;

/// Dot product of two vectors. For unit vectors this is cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// L2 norm, accumulated in f64.
pub fn l2_norm(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt()
}

pub fn is_normalized(vector: &[f32]) -> bool {
    (l2_norm(vector) - 1.0).abs() < NORMALIZED_TOLERANCE
}

/// Scales the vector to unit length in place. Zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value = (f64::from(*value) / norm) as f32;
    }
}
