use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GroveError, IoContext, Result};
use crate::graph::DependencyGraph;
use crate::types::{ParsedDocument, RawDocument};

const CONTENT_CACHE_DIR_NAME: &str = "content-cache";
const STATE_FILE_NAME: &str = "build-state.json";

/// Record of the last successful build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildState {
    pub config_fingerprint: String,
    pub content_hashes: BTreeMap<String, String>,
    #[serde(default)]
    pub graph: DependencyGraph,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeClassification {
    Full,
    Targeted { changed_files: Vec<String> },
}

impl ChangeClassification {
    pub fn is_full(&self) -> bool {
        matches!(self, ChangeClassification::Full)
    }
}

pub fn load_state(cache_dir: &Path) -> Option<BuildState> {
    let state_path = cache_dir.join(STATE_FILE_NAME);
    let content = fs::read_to_string(&state_path).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(error) => {
            tracing::warn!(path = %state_path.display(), %error, "ignoring unreadable build state");
            None
        }
    }
}

pub fn save_state(cache_dir: &Path, state: &BuildState) -> Result<()> {
    fs::create_dir_all(cache_dir).io_context("creating cache directory", cache_dir)?;
    let state_path = cache_dir.join(STATE_FILE_NAME);
    let content = serde_json::to_vec_pretty(state).map_err(|error| GroveError::Json {
        path: state_path.clone(),
        message: error.to_string(),
    })?;
    write_atomic(&state_path, &content)
}

/// Writes through a sibling temp file so readers never observe a partial file.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    fs::write(&temp_path, content).io_context("writing", &temp_path)?;
    fs::rename(&temp_path, path).io_context("renaming", path)?;
    Ok(())
}

pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Content hash per source, keyed the way graph source nodes are.
pub fn compute_content_hashes(documents: &[RawDocument]) -> BTreeMap<String, String> {
    documents
        .iter()
        .map(|document| (source_id(&document.file_path), hash_content(&document.content)))
        .collect()
}

pub fn source_id(file_path: &Path) -> String {
    file_path.to_string_lossy().replace('\\', "/")
}

pub fn fingerprint(file_path: &Path, content_hash: &str, parser_version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id(file_path).as_bytes());
    hasher.update([0]);
    hasher.update(content_hash.as_bytes());
    hasher.update([0]);
    hasher.update(parser_version.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A missing state or a configuration change forces a full build; otherwise
/// every added, modified or deleted source is listed.
pub fn classify_changes(
    previous: Option<&BuildState>,
    config_fingerprint: &str,
    new_hashes: &BTreeMap<String, String>,
) -> ChangeClassification {
    let Some(previous) = previous else {
        return ChangeClassification::Full;
    };
    if previous.config_fingerprint != config_fingerprint {
        return ChangeClassification::Full;
    }

    let old_hashes = &previous.content_hashes;
    let mut changed_files: Vec<String> = new_hashes
        .iter()
        .filter(|(path, new_hash)| old_hashes.get(*path) != Some(*new_hash))
        .map(|(path, _)| path.clone())
        .collect();

    changed_files.extend(
        old_hashes
            .keys()
            .filter(|path| !new_hashes.contains_key(*path))
            .cloned(),
    );
    changed_files.sort();

    ChangeClassification::Targeted { changed_files }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    fingerprint: String,
    document: ParsedDocument,
}

/// Parsed documents on disk, one JSON file per fingerprint.
#[derive(Debug, Clone)]
pub struct ParseCache {
    dir: PathBuf,
}

impl ParseCache {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join(CONTENT_CACHE_DIR_NAME),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }

    /// Unreadable or mismatched entries count as a miss.
    pub fn get(&self, fingerprint: &str) -> Option<ParsedDocument> {
        let entry_path = self.entry_path(fingerprint);
        let content = fs::read(&entry_path).ok()?;
        match serde_json::from_slice::<CacheEntry>(&content) {
            Ok(entry) if entry.fingerprint == fingerprint => Some(entry.document),
            Ok(_) => {
                tracing::warn!(path = %entry_path.display(), "cache entry fingerprint mismatch");
                None
            }
            Err(error) => {
                tracing::warn!(path = %entry_path.display(), %error, "corrupt cache entry");
                None
            }
        }
    }

    pub fn put(&self, fingerprint: &str, document: &ParsedDocument) -> Result<()> {
        fs::create_dir_all(&self.dir).io_context("creating cache directory", &self.dir)?;
        let entry_path = self.entry_path(fingerprint);
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            document: document.clone(),
        };
        let content = serde_json::to_vec(&entry).map_err(|error| GroveError::Json {
            path: entry_path.clone(),
            message: error.to_string(),
        })?;
        write_atomic(&entry_path, &content)
    }
}
