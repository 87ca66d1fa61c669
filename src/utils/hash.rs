use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `text`.
pub fn compute_sha256(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
