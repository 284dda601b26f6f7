//! Content fingerprints for change detection.

/// Fingerprint raw file bytes: blake3, rendered as 64 lowercase hex chars.
///
/// Stable across runs and processes. Only used to decide whether a stored
/// embedding is still valid, never for ranking.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
