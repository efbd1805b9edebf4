// SPDX-License-Identifier: MIT OR Apache-2.0

//! Length-prefixed binary encoding for embedding vectors.
//!
//! Layout: a 4-byte little-endian element count followed by that many
//! 4-byte little-endian IEEE-754 floats. No checksum, no version tag.

use crate::errors::{Error, Result};

const PREFIX_LEN: usize = 4;
const FLOAT_LEN: usize = 4;

/// Encodes a vector into a compact blob.
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(PREFIX_LEN + vector.len() * FLOAT_LEN);
    blob.extend_from_slice(&(vector.len() as u32).to_le_bytes());
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decodes a blob produced by [`encode`].
///
/// Bytes past the declared length are ignored.
pub fn decode(blob: &[u8]) -> Result<Vec<f32>> {
    let Some((prefix, payload)) = blob.split_first_chunk::<PREFIX_LEN>() else {
        return Err(Error::MalformedBlob {
            declared: 0,
            available: blob.len(),
        });
    };

    let declared = u32::from_le_bytes(*prefix) as usize;
    let needed = declared
        .checked_mul(FLOAT_LEN)
        .filter(|needed| *needed <= payload.len())
        .ok_or(Error::MalformedBlob {
            declared,
            available: payload.len(),
        })?;

    Ok(payload[..needed]
        .chunks_exact(FLOAT_LEN)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
