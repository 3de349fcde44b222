//! Fingerprint cache: one content hash per (resource file, key), kept across
//! runs to decide which source values changed since the last translation.
//!
//! The cache is a small JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "files": { "events/foo_l_english.yml": { "foo.t": "9f86d0…" } },
//!   "workshop": { "description_hash": "…", "translations": { "french": { … } } }
//! }
//! ```
//!
//! A missing, unreadable, or foreign-version file loads as an empty cache.
//! The worst outcome of losing the cache is one full re-translation.

use crate::entry::ResourceFile;
use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

pub const CACHE_VERSION: u32 = 1;

/// key -> hash for one resource file
pub type FileHashes = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintCache {
    pub version: u32,
    /// Source-relative path (forward slashes) -> key hashes
    #[serde(default)]
    pub files: BTreeMap<String, FileHashes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workshop: Option<WorkshopCache>,
}

/// Cached state of the singleton title/description translations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopCache {
    #[serde(default)]
    pub description_hash: String,
    #[serde(default)]
    pub title_hash: String,
    #[serde(default)]
    pub description_translator: String,
    #[serde(default)]
    pub title_translator: String,
    #[serde(default)]
    pub template_hash: String,
    /// Target language name -> translated assets
    #[serde(default)]
    pub translations: BTreeMap<String, AssetTranslation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTranslation {
    /// `None` until a translation succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for FingerprintCache {
    fn default() -> Self {
        FingerprintCache {
            version: CACHE_VERSION,
            files: BTreeMap::new(),
            workshop: None,
        }
    }
}

impl FingerprintCache {
    /// Read the cache at `path`, falling back to an empty cache on any anomaly
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No translation cache at {}, starting fresh", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Could not read translation cache {}: {}; starting fresh", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<FingerprintCache>(&contents) {
            Ok(cache) if cache.version == CACHE_VERSION => cache,
            Ok(cache) => {
                warn!(
                    "Translation cache {} has version {}, expected {}; starting fresh",
                    path.display(),
                    cache.version,
                    CACHE_VERSION
                );
                Self::default()
            }
            Err(e) => {
                warn!("Translation cache {} is malformed: {}; starting fresh", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the cache atomically: a temporary file in the same directory is
    /// renamed over `path`.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let json = format!("{}\n", serde_json::to_string_pretty(self)?);
        write_atomic(path, json.as_bytes())
            .map_err(|e| SyncError::Cache(format!("could not save {}: {}", path.display(), e)))
    }

    /// Keys of `current` whose hash differs from, or is absent in, the cached file
    pub fn changed_keys(&self, file_key: &str, current: &FileHashes) -> HashSet<String> {
        let cached = self.files.get(file_key);
        current
            .iter()
            .filter(|(key, hash)| cached.and_then(|c| c.get(*key)) != Some(*hash))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn file(&self, file_key: &str) -> Option<&FileHashes> {
        self.files.get(file_key)
    }

    /// Replace the stored hashes for one file
    pub fn record_file(&mut self, file_key: &str, hashes: FileHashes) {
        self.files.insert(file_key.to_string(), hashes);
    }

    /// Drop entries for files not in `present`; returns how many were dropped
    pub fn retain_files(&mut self, present: &HashSet<String>) -> usize {
        let before = self.files.len();
        self.files.retain(|file, _| present.contains(file));
        before - self.files.len()
    }
}

/// Write `contents` to a temporary file next to `path`, then rename it over
/// `path`. Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> SyncResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| SyncError::io(dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SyncError::io(dir, e))?;
    temp.write_all(contents).map_err(|e| SyncError::io(dir, e))?;
    temp.persist(path).map_err(|e| SyncError::io(path, e.error))?;
    Ok(())
}

/// Hex SHA-256 of the UTF-8 bytes of `value`
pub fn hash_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Current hash of every entry in a source file; on duplicate keys the last one wins
pub fn file_hashes(file: &ResourceFile) -> FileHashes {
    file.entries()
        .map(|entry| (entry.key.clone(), hash_value(&entry.value)))
        .collect()
}
