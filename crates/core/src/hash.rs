//! SHA-512 digests used for address segments

use sha2::{Digest, Sha512};

/// Full lowercase hex SHA-512 digest of `data` (128 chars)
pub fn sha512_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha512::digest(data.as_ref()))
}

/// The first `width` hex chars of the SHA-512 digest of `data`
pub fn truncated_hex(data: impl AsRef<[u8]>, width: usize) -> String {
    let mut digest = sha512_hex(data);
    digest.truncate(width);
    digest
}

/// True when `s` is non-empty lowercase hex
pub fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
