use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::cache::ChangeClassification;
use crate::slug::{FullSlug, SimpleSlug};

/// Soft inconsistencies. The build continues with a deterministic tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Warning {
    AliasCollision {
        alias: SimpleSlug,
        kept: SimpleSlug,
        ignored: SimpleSlug,
    },
    AliasShadowsDocument {
        alias: SimpleSlug,
        declared_by: FullSlug,
    },
    DuplicateTag {
        slug: FullSlug,
        tag: String,
    },
    DuplicateOutput {
        path: String,
        kept: String,
        ignored: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::AliasCollision {
                alias,
                kept,
                ignored,
            } => write!(
                formatter,
                "alias '{}' is declared by both '{}' and '{}'; keeping '{}'",
                alias, kept, ignored, kept
            ),
            Warning::AliasShadowsDocument { alias, declared_by } => write!(
                formatter,
                "alias '{}' declared by '{}' names an existing document and is ignored",
                alias, declared_by
            ),
            Warning::DuplicateTag { slug, tag } => {
                write!(formatter, "tag '{}' is declared more than once in '{}'", tag, slug)
            }
            Warning::DuplicateOutput {
                path,
                kept,
                ignored,
            } => write!(
                formatter,
                "output '{}' is declared by both {} and {}; keeping {}",
                path, kept, ignored, kept
            ),
        }
    }
}

/// A per-document parse failure. The document is left out of the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file_path: PathBuf,
    pub slug: Option<FullSlug>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slug {
            Some(slug) => write!(
                formatter,
                "{} ({}): {}",
                self.file_path.display(),
                slug,
                self.message
            ),
            None => write!(formatter, "{}: {}", self.file_path.display(), self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub classification: ChangeClassification,
    pub documents: usize,
    pub emitted: Vec<PathBuf>,
    pub removed: Vec<String>,
    pub skipped: usize,
    pub warnings: Vec<Warning>,
    pub diagnostics: Vec<Diagnostic>,
    pub cache: CacheStats,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.diagnostics.is_empty()
    }
}
