//! BLAKE3 content hashing

use crate::error::{IoContext, Result};
use std::path::Path;

/// A BLAKE3 digest of file contents
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    /// Lowercase hex form, as stored in history records
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    ContentHash(blake3::hash(data))
}

/// Hash a file using BLAKE3 (streaming for large files)
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    use std::fs::File;
    use std::io::{BufReader, Read};

    let file = File::open(path).io_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .io_context(|| format!("Failed to read {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentHash(hasher.finalize()))
}
