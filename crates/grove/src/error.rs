use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {action} {path}: {source}")]
    IoContext {
        action: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {message}")]
    TomlParse { path: PathBuf, message: String },

    #[error("YAML parse error in {path}: {message}")]
    YamlParse { path: PathBuf, message: String },

    #[error("JSON error in {path}: {message}")]
    Json { path: PathBuf, message: String },

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Invalid frontmatter in file: {path}")]
    InvalidFrontmatter { path: PathBuf },

    #[error("Missing required field '{field}' in document: {path}")]
    MissingField { field: String, path: PathBuf },

    #[error("Duplicate document slug '{slug}' in {path} conflicts with {existing_path}")]
    DuplicateSlug {
        slug: String,
        path: PathBuf,
        existing_path: PathBuf,
    },

    #[error("Directory walk error in {path}: {message}")]
    WalkDir { path: PathBuf, message: String },

    #[error("Failed to start worker pool: {message}")]
    ThreadPool { message: String },

    #[error("Parse chunk {chunk} failed after {attempts} attempts: {message}")]
    WorkerFailed {
        chunk: usize,
        attempts: usize,
        message: String,
    },

    #[error("No emit unit declares output {path}")]
    UnknownOutput { path: String },

    #[error("Build cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, GroveError>;

pub trait IoContext<T> {
    fn io_context(self, action: &str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, action: &str, path: &Path) -> Result<T> {
        self.map_err(|source| GroveError::IoContext {
            action: action.to_string(),
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_context_keeps_action_and_path() {
        let failure: std::io::Result<()> = Err(std::io::Error::other("disk full"));
        let error = failure
            .io_context("writing cache entry", Path::new("cache/abc.json"))
            .unwrap_err();

        let message = error.to_string();
        assert!(message.contains("writing cache entry"));
        assert!(message.contains("cache/abc.json"));
        assert!(message.contains("disk full"));
    }
}
