//! Cheap identity of a file set, used to skip rescans of an unchanged code base.

use std::{fs::Metadata, path::Path, time::UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tally_cbor::Hash;

/// Aggregate identity of a set of files. Two fingerprints are equal only if all
/// four fields are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub count: u64,
    pub total_size: u64,
    pub max_modified_millis: u64,
    pub combined_hash: Hash,
}

impl Fingerprint {
    /// Single digest standing for the whole fingerprint, carried in publications.
    pub fn content_hash(&self) -> Hash {
        let mut bytes = Vec::with_capacity(24 + 32);
        bytes.extend_from_slice(&self.count.to_le_bytes());
        bytes.extend_from_slice(&self.total_size.to_le_bytes());
        bytes.extend_from_slice(&self.max_modified_millis.to_le_bytes());
        bytes.extend_from_slice(self.combined_hash.as_bytes());
        Hash::of_bytes(&bytes)
    }
}

/// Running aggregate; see [`Fingerprint`].
#[derive(Debug, Default)]
pub struct FingerprintBuilder {
    acc: Fingerprint,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one file into the aggregate. `relative_path` should be stable
    /// across runs, i.e. relative to the code-base root the file was found under.
    pub fn record(&mut self, relative_path: &str, size: u64, modified_millis: u64) {
        let mut bytes = Vec::with_capacity(relative_path.len() + 17);
        bytes.extend_from_slice(relative_path.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&size.to_le_bytes());
        bytes.extend_from_slice(&modified_millis.to_le_bytes());

        let acc = &mut self.acc;
        acc.count += 1;
        acc.total_size += size;
        acc.max_modified_millis = acc.max_modified_millis.max(modified_millis);
        acc.combined_hash = acc.combined_hash.fold(Hash::of_bytes(&bytes));
    }

    /// Records a file from its metadata. Returns false for anything that is
    /// not a regular file.
    pub fn record_metadata(&mut self, relative_path: &Path, metadata: &Metadata) -> bool {
        if !metadata.is_file() {
            return false;
        }
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        // Separators are normalized so the same tree fingerprints alike everywhere.
        let path = relative_path.to_string_lossy().replace('\\', "/");
        self.record(&path, metadata.len(), modified);
        true
    }

    pub fn count(&self) -> u64 {
        self.acc.count
    }

    pub fn build(self) -> Fingerprint {
        self.acc
    }
}
