use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::slug::{FullSlug, SimpleSlug};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub file_path: PathBuf,
    pub relative_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateType {
    #[default]
    Created,
    Modified,
    Published,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dates {
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
}

impl Dates {
    pub fn get(&self, date_type: DateType) -> Option<DateTime<Utc>> {
        match date_type {
            DateType::Created => self.created,
            DateType::Modified => self.modified,
            DateType::Published => self.published,
        }
    }

}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub css_classes: Vec<String>,
    #[serde(default)]
    pub dates: Dates,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl Frontmatter {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.extra
            .get(key)
            .and_then(|value| value.as_str().map(String::from))
    }
}

/// Parser-owned document body. The engine only hands it to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupTree {
    html: String,
}

impl MarkupTree {
    pub fn from_html(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn as_html(&self) -> &str {
        &self.html
    }

    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub slug: FullSlug,
    pub file_path: PathBuf,
    pub relative_path: String,
    pub frontmatter: Frontmatter,
    #[serde(default)]
    pub links: Vec<SimpleSlug>,
    #[serde(default)]
    pub markup_tree: MarkupTree,
}

impl ParsedDocument {
    /// A page with no backing source file.
    pub fn placeholder(slug: FullSlug, frontmatter: Frontmatter) -> Self {
        Self {
            relative_path: format!("{}.md", slug),
            slug,
            file_path: PathBuf::new(),
            frontmatter,
            links: Vec::new(),
            markup_tree: MarkupTree::default(),
        }
    }

    pub fn title(&self) -> String {
        self.frontmatter.title.clone().unwrap_or_else(|| {
            let slug = self.slug.as_str();
            slug.rsplit('/').next().unwrap_or(slug).to_string()
        })
    }

    /// The dependency-graph node naming this document's source file.
    pub fn source_id(&self) -> String {
        self.file_path.to_string_lossy().replace('\\', "/")
    }

    pub fn is_placeholder(&self) -> bool {
        self.file_path.as_os_str().is_empty()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    pub fn document(slug: &str) -> ParsedDocument {
        ParsedDocument {
            slug: FullSlug::new(slug),
            file_path: PathBuf::from(format!("content/{}.md", slug)),
            relative_path: format!("{}.md", slug),
            frontmatter: Frontmatter::titled(slug.rsplit('/').next().unwrap_or(slug)),
            links: Vec::new(),
            markup_tree: MarkupTree::from_html(format!("<p>{}</p>", slug)),
        }
    }

    pub fn date(value: &str) -> DateTime<Utc> {
        let naive = NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap();
        Utc.from_utc_datetime(&naive.and_hms_opt(0, 0, 0).unwrap())
    }

    pub trait DocumentExt {
        fn titled(self, title: &str) -> Self;
        fn tagged(self, tags: &[&str]) -> Self;
        fn aliased(self, aliases: &[&str]) -> Self;
        fn linking(self, links: &[&str]) -> Self;
        fn created(self, value: &str) -> Self;
    }

    impl DocumentExt for ParsedDocument {
        fn titled(mut self, title: &str) -> Self {
            self.frontmatter.title = Some(title.to_string());
            self
        }

        fn tagged(mut self, tags: &[&str]) -> Self {
            self.frontmatter.tags = tags.iter().map(|tag| tag.to_string()).collect();
            self
        }

        fn aliased(mut self, aliases: &[&str]) -> Self {
            self.frontmatter.aliases = aliases.iter().map(|alias| alias.to_string()).collect();
            self
        }

        fn linking(mut self, links: &[&str]) -> Self {
            self.links = links.iter().map(|link| SimpleSlug::new(link)).collect();
            self
        }

        fn created(mut self, value: &str) -> Self {
            self.frontmatter.dates.created = Some(date(value));
            self
        }
    }
}
