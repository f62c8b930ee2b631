use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::error::{GroveError, IoContext, Result};
use crate::listing::SortOrder;
use crate::types::DateType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub default_date_type: DateType,
    #[serde(default)]
    pub parse: ParseConfig,
    #[serde(default)]
    pub tags: TagConfig,
    #[serde(default)]
    pub aliases: AliasConfig,
    #[serde(default)]
    pub folders: FolderConfig,
    #[serde(default)]
    pub tag_pages: ListingConfig,
    #[serde(default)]
    pub feeds: FeedConfig,
    #[serde(default)]
    pub backlinks: BacklinksConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Worker count; 0 uses the available parallelism.
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Bumping this invalidates every parse-cache entry.
    #[serde(default = "default_parser_version")]
    pub parser_version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagCase {
    #[default]
    Lowercase,
    Preserve,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfig {
    #[serde(default)]
    pub case: TagCase,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    #[default]
    FirstWins,
    LastWins,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasConfig {
    #[serde(default)]
    pub collision: CollisionPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    #[serde(default = "default_true")]
    pub show_folder_count: bool,
    #[serde(default = "default_true")]
    pub show_subfolders: bool,
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingConfig {
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_rss_limit")]
    pub rss_limit: usize,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklinksConfig {
    /// Omit the backlinks section on pages nothing links to.
    #[serde(default = "default_true")]
    pub hide_when_empty: bool,
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_chunk_size() -> usize {
    32
}

fn default_parser_version() -> String {
    "1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rss_limit() -> usize {
    10
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            locale: default_locale(),
            default_date_type: DateType::default(),
            parse: ParseConfig::default(),
            tags: TagConfig::default(),
            aliases: AliasConfig::default(),
            folders: FolderConfig::default(),
            tag_pages: ListingConfig::default(),
            feeds: FeedConfig::default(),
            backlinks: BacklinksConfig::default(),
        }
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            chunk_size: default_chunk_size(),
            parser_version: default_parser_version(),
        }
    }
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            show_folder_count: true,
            show_subfolders: true,
            sort: SortOrder::default(),
        }
    }
}

impl Default for BacklinksConfig {
    fn default() -> Self {
        Self {
            hide_when_empty: true,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            rss_limit: default_rss_limit(),
            title: None,
            description: None,
        }
    }
}

impl BuildConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).io_context("reading config", path)?;
        let mut config: BuildConfig =
            toml::from_str(&content).map_err(|error| GroveError::TomlParse {
                path: path.to_path_buf(),
                message: error.to_string(),
            })?;
        config.normalize();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: BuildConfig =
            toml::from_str(content).map_err(|error| GroveError::TomlParse {
                path: "<inline>".into(),
                message: error.to_string(),
            })?;
        config.normalize();
        Ok(config)
    }

    fn normalize(&mut self) {
        if let Some(base_url) = self.base_url.as_mut() {
            *base_url = base_url.trim_end_matches('/').to_string();
        }
        if self.parse.chunk_size == 0 {
            self.parse.chunk_size = default_chunk_size();
        }
    }

    /// Stable hash of every setting; a change forces a full rebuild.
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        format!("{:x}", hasher.finalize())
    }
}
