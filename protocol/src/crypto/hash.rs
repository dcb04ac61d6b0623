//! # Hashing Utilities
//!
//! BLAKE3 is the only hash the engine needs. It derives asset identifiers
//! and the digests that voucher signatures cover.
//!
//! Multi-field inputs go through [`hash_fields`], which length-prefixes
//! every field so that `("ab", "c")` and `("a", "bc")` never collide.

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash a domain tag followed by an ordered list of fields.
///
/// Each field is written as `len (u64 big-endian) || bytes`. The domain tag
/// is written first under the same framing, so digests from different
/// domains cannot be confused.
pub fn hash_fields(domain: &str, fields: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    write_field(&mut hasher, domain.as_bytes());
    for field in fields {
        write_field(&mut hasher, field);
    }
    *hasher.finalize().as_bytes()
}

fn write_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_is_deterministic() {
        assert_eq!(blake3_hash(b"credit"), blake3_hash(b"credit"));
        assert_ne!(blake3_hash(b"credit"), blake3_hash(b"credits"));
    }

    #[test]
    fn field_framing_prevents_ambiguity() {
        let a = hash_fields("d", &[b"ab", b"c"]);
        let b = hash_fields("d", &[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn domain_separates_digests() {
        let a = hash_fields("redeem", &[b"x"]);
        let b = hash_fields("consume", &[b"x"]);
        assert_ne!(a, b);
    }
}
