//! Upload ledger
//!
//! ファイル内容の SHA-256 をキーにアップロード済みのキャプチャを記録し、
//! 同じフォルダを再度取り込んだときの重複アップロードを防ぐ。

use super::scan::MediaFile;
use crate::error::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tracing::warn;

const LEDGER_FILE_NAME: &str = ".roofdesk-capture.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    /// バージョン（互換性チェック用）
    version: u32,
    /// content hash → uploaded capture
    entries: HashMap<String, LedgerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub file_name: String,
    pub file_size: u64,
    pub capture_id: String,
    pub client_id: String,
}

impl Ledger {
    const CURRENT_VERSION: u32 = 1;

    pub fn ledger_path(folder: &Path) -> PathBuf {
        folder.join(LEDGER_FILE_NAME)
    }

    /// Missing or unreadable ledgers load as empty
    pub fn load(folder: &Path) -> Self {
        let path = Self::ledger_path(folder);
        if !path.exists() {
            return Self::default();
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        match serde_json::from_reader::<_, Ledger>(BufReader::new(file)) {
            Ok(ledger) if ledger.version == Self::CURRENT_VERSION => ledger,
            Ok(_) => {
                warn!(path = %path.display(), "capture ledger version mismatch, starting fresh");
                Self::default()
            }
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::ledger_path(folder))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn get(&self, hash: &str) -> Option<&LedgerEntry> {
        self.entries.get(hash)
    }

    pub fn insert(&mut self, hash: String, entry: LedgerEntry) {
        self.entries.insert(hash, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delete the ledger file. Returns false when there was none.
    pub fn clear(folder: &Path) -> Result<bool> {
        let path = Self::ledger_path(folder);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// SHA-256 of the file contents, lowercase hex
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Result of checking a batch against the ledger
#[derive(Debug, Default)]
pub struct Partition {
    /// New files with their content hash
    pub fresh: Vec<(MediaFile, String)>,
    /// Already uploaded, or a duplicate of another file in the batch
    pub known: Vec<MediaFile>,
    /// Files that could not be read, with the reason
    pub failed: Vec<(MediaFile, String)>,
}

/// Split media into already-uploaded and new files.
/// Hashing runs in parallel.
pub fn partition_new(media: &[MediaFile], ledger: &Ledger) -> Partition {
    let hashed: Vec<(MediaFile, Result<String>)> = media
        .par_iter()
        .map(|m| (m.clone(), compute_file_hash(&m.path)))
        .collect();

    let mut partition = Partition::default();
    let mut seen = std::collections::HashSet::new();

    for (file, hash) in hashed {
        match hash {
            Ok(hash) if ledger.get(&hash).is_some() || !seen.insert(hash.clone()) => {
                partition.known.push(file)
            }
            Ok(hash) => partition.fresh.push((file, hash)),
            Err(e) => partition.failed.push((file, e.to_string())),
        }
    }

    partition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_known_value() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_file_hash_matches_bytes_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"shingle photo").unwrap();
        assert_eq!(compute_file_hash(&path).unwrap(), hash_bytes(b"shingle photo"));
    }
}
