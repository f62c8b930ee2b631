use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{IoContext, Result};

/// Destination for emitted artifacts. Paths are output-relative with `/`
/// separators. Writes to distinct paths may run concurrently.
pub trait OutputSink: Sync {
    fn write(&self, output_path: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Removes a previously written artifact; missing paths are not an error.
    fn remove(&self, output_path: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FsSink {
    output_dir: PathBuf,
}

impl FsSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn resolve(&self, output_path: &str) -> PathBuf {
        output_path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
            .fold(self.output_dir.clone(), |path, segment| path.join(segment))
    }
}

impl OutputSink for FsSink {
    fn write(&self, output_path: &str, bytes: &[u8]) -> Result<PathBuf> {
        let final_path = self.resolve(output_path);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).io_context("creating output directory", parent)?;
        }
        fs::write(&final_path, bytes).io_context("writing output", &final_path)?;
        Ok(final_path)
    }

    fn remove(&self, output_path: &str) -> Result<()> {
        let final_path = self.resolve(output_path);
        match fs::remove_file(&final_path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error).io_context("removing output", &final_path),
        }
    }
}

/// Keeps artifacts in memory; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, output_path: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(output_path)
            .cloned()
    }

    pub fn get_string(&self, output_path: &str) -> Option<String> {
        self.get(output_path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl OutputSink for MemorySink {
    fn write(&self, output_path: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(output_path.to_string(), bytes.to_vec());
        Ok(PathBuf::from(output_path))
    }

    fn remove(&self, output_path: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(output_path);
        Ok(())
    }
}
