use crate::error::{Error, Result};

use json_patch::Patch;
use serde::Serialize;
use serde_json::Value;

/// Compute the JSON Patch turning `original` into `mutated`.
///
/// Object keys are compared in sorted order, so identical inputs always produce the same
/// operation sequence.
pub fn create_patch(original: &[u8], mutated: &[u8]) -> Result<Patch> {
    let original: Value = serde_json::from_slice(original).map_err(Error::InvalidDocument)?;
    let mutated: Value = serde_json::from_slice(mutated).map_err(Error::InvalidDocument)?;
    Ok(json_patch::diff(&original, &mutated))
}

/// Serialize `mutated` and diff it against the raw bytes it was decoded from.
pub fn diff_resource<K: Serialize>(original: &[u8], mutated: &K) -> Result<Patch> {
    let target = serde_json::to_vec(mutated)
        .map_err(|e| Error::Serialization("failed to serialize mutated object".to_string(), e))?;
    create_patch(original, &target)
}

pub fn encode_patch(patch: &Patch) -> Result<Vec<u8>> {
    serde_json::to_vec(patch)
        .map_err(|e| Error::Serialization("failed to serialize JSON patch".to_string(), e))
}
