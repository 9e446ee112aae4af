//! Hashing System - SHA-256 fingerprints for rendered output
//!
//! A fingerprint is a pure function of the rendered bytes and their order.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Fingerprint of a single rendered document.
pub fn fingerprint_document(rendered: &str) -> String {
    sha256_hex(rendered.as_bytes())
}

/// Fingerprint of several rendered documents, joined by `\n` in order.
///
/// The joined text exists only to be hashed.
pub fn fingerprint_documents<S: AsRef<str>>(rendered: &[S]) -> String {
    let mut hasher = Sha256::new();
    for (i, doc) in rendered.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(doc.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_deterministic() {
        let data = b"test data";
        let h1 = sha256_hex(data);
        let h2 = sha256_hex(data);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_documents_hash_joined_text() {
        let docs = ["{\"a\":1}", "{\"b\":2}"];
        assert_eq!(
            fingerprint_documents(&docs),
            sha256_hex(docs.join("\n").as_bytes())
        );
    }

    #[test]
    fn test_single_document_matches_direct_hash() {
        let doc = "{\"foo\":\"hello\"}";
        assert_eq!(fingerprint_document(doc), fingerprint_documents(&[doc]));
    }

    #[test]
    fn test_order_matters() {
        assert_ne!(
            fingerprint_documents(&["a", "b"]),
            fingerprint_documents(&["b", "a"])
        );
        assert_ne!(fingerprint_documents(&["ab"]), fingerprint_documents(&["a", "b"]));
    }
}
