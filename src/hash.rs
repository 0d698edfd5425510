use sha2::Digest as _;

/// Hex digits of a digest shown to humans or embedded in patch ids.
pub const SHORT_DIGEST_LEN: usize = 12;

/// Lowercase hex SHA-256 of `bytes`; patch results record one before and after every write.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha2::Sha256::digest(bytes))
}

/// Leading `SHORT_DIGEST_LEN` characters of a hex digest (all of it when shorter).
pub fn short_digest(hex_digest: &str) -> &str {
    hex_digest.get(..SHORT_DIGEST_LEN).unwrap_or(hex_digest)
}
