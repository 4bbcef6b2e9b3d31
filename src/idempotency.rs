use sha2::{Digest, Sha256};

/// Hex SHA-256 of a complaint file's bytes, recorded with each run for provenance
pub fn batch_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            batch_fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_sensitive() {
        let a = batch_fingerprint(b"SN,machine_model\n2308A01,MG800\n");
        let b = batch_fingerprint(b"SN,machine_model\n2308A01,MG600\n");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
