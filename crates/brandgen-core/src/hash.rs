//! Content hashing for generated outputs

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// A SHA-256 digest of a generated file.
///
/// Recorded in the generation manifest so an output on disk can be matched
/// back to the run that produced it.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[cfg(test)]
    fn from_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash everything a reader yields without buffering it whole
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut hasher = Sha256::new();
        std::io::copy(&mut reader, &mut hasher)?;
        Ok(Self(hasher.finalize().into()))
    }

    /// Compute a hash from a file's contents
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Get the hash as a hex string
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Get the hash as a prefixed hex string (e.g., "sha256:abcdef...")
    pub fn to_prefixed_hex(&self) -> String {
        format!("sha256:{}", self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_matches_bytes() {
        let data = vec![7u8; 100_000];
        let streamed = ContentHash::from_reader(&data[..]).unwrap();
        assert_eq!(streamed, ContentHash::from_bytes(&data));
    }

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        let h = ContentHash::from_bytes(b"abc");
        assert_eq!(
            h.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(h.to_string(), "ba7816bf8f01");
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!(
            "brandgen_hash_test_{}.bin",
            std::process::id()
        ));
        std::fs::write(&path, b"abc").unwrap();
        let h = ContentHash::from_file(&path).unwrap();
        assert_eq!(h, ContentHash::from_bytes(b"abc"));
        std::fs::remove_file(&path).ok();
    }
}
