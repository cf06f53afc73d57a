//! The immutable file being disassembled.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImage {
    data: Vec<u8>,
    pub name: String,
}

impl FileImage {
    pub fn new(data: Vec<u8>, name: &str) -> Self {
        Self {
            data,
            name: name.to_string(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// SHA-256 of the contents, lower-case hex. Lets a persistence layer
    /// confirm it's pairing a project with the right file.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        format!("{:x}", hasher.finalize())
    }
}
