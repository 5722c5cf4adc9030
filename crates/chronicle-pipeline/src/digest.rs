//! State fingerprints for replay equivalence checks.

use chronicle_core::error::DomainError;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Returns the lowercase hex SHA-256 of `state`'s JSON encoding.
///
/// The encoding is canonical as long as the state keeps map-like data in
/// ordered collections (`BTreeMap`, `Vec`): struct fields serialize in
/// declaration order, so equal states always produce equal digests.
///
/// # Errors
///
/// Returns `DomainError::Serialization` if the state cannot be encoded.
pub fn state_digest<T: Serialize>(state: &T) -> Result<String, DomainError> {
    let bytes = serde_json::to_vec(state)?;
    let hash = Sha256::digest(&bytes);
    Ok(hash.iter().map(|b| format!("{b:02x}")).collect())
}
