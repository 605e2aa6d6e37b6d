//! Content-addressed file sets.

use camino::{Utf8Path, Utf8PathBuf};
use fmtchain_hash::ChunkHasher;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Path to bytes, ordered by path so the encoding is canonical.
pub type FileSet = BTreeMap<Utf8PathBuf, Vec<u8>>;

/// Identifier of an immutable file set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest {
    pub fingerprint: String,
    pub serialized_bytes_length: usize,
}

impl Digest {
    pub fn of_files(files: &FileSet) -> Self {
        let mut hasher = ChunkHasher::new();
        for (path, contents) in files {
            hasher.chunk(path.as_str().as_bytes()).chunk(contents);
        }
        let serialized_bytes_length = hasher.len();
        Self {
            fingerprint: hasher.finish_hex(),
            serialized_bytes_length,
        }
    }

    pub fn empty() -> Self {
        Self::of_files(&FileSet::new())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.fingerprint.get(..12).unwrap_or(&self.fingerprint);
        write!(f, "{}/{}", short, self.serialized_bytes_length)
    }
}

/// A digest plus the listing of what it contains.
///
/// Equality and hashing only look at the digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub digest: Digest,
    pub files: Vec<Utf8PathBuf>,
    pub dirs: Vec<Utf8PathBuf>,
}

impl Snapshot {
    pub fn from_files(files: &FileSet) -> Self {
        let mut dirs = BTreeSet::new();
        for path in files.keys() {
            let mut parent = path.parent();
            while let Some(dir) = parent {
                if dir.as_str().is_empty() {
                    break;
                }
                dirs.insert(dir.to_path_buf());
                parent = dir.parent();
            }
        }
        Self {
            digest: Digest::of_files(files),
            files: files.keys().cloned().collect(),
            dirs: dirs.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::from_files(&FileSet::new())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.files.binary_search_by(|p| p.as_path().cmp(path)).is_ok()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for Snapshot {}

impl Hash for Snapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}
