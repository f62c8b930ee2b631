use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};

use crate::error::Result;
use crate::i18n::Labels;

const BASE_TEMPLATE: &str = include_str!("../templates/base.html");
const CONTENT_TEMPLATE: &str = include_str!("../templates/content.html");
const LISTING_TEMPLATE: &str = include_str!("../templates/listing.html");
const TAG_INDEX_TEMPLATE: &str = include_str!("../templates/tag_index.html");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Content,
    TagListing,
    TagIndex,
    FolderListing,
}

impl Layout {
    pub fn template_name(&self) -> &'static str {
        match self {
            Layout::Content => "content.html",
            Layout::TagListing | Layout::FolderListing => "listing.html",
            Layout::TagIndex => "tag_index.html",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub title: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub title: String,
    pub href: String,
    pub description: Option<String>,
    pub date: Option<String>,
    pub tags: Vec<PageLink>,
    pub folder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingGroup {
    pub tag: PageLink,
    pub count_label: String,
    pub pages: Vec<ListingEntry>,
    pub more_label: Option<String>,
}

/// Everything a layout can show. Fields a layout does not use stay empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageData {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub locale: String,
    pub path_to_root: String,
    pub stylesheet: String,
    pub css_classes: Vec<String>,
    pub date: Option<String>,
    pub body: String,
    pub tags: Vec<PageLink>,
    pub backlinks: Vec<PageLink>,
    pub show_backlinks: bool,
    pub listing: Vec<ListingEntry>,
    pub groups: Vec<ListingGroup>,
    pub count_label: Option<String>,
    pub labels: Labels,
}

/// Turns page data into bytes. Must be deterministic for equal input.
pub trait Renderer: Send + Sync {
    fn render(&self, layout: Layout, data: &PageData) -> Result<Vec<u8>>;
}

pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template("base.html", BASE_TEMPLATE)?;
        tera.add_raw_template("content.html", CONTENT_TEMPLATE)?;
        tera.add_raw_template("listing.html", LISTING_TEMPLATE)?;
        tera.add_raw_template("tag_index.html", TAG_INDEX_TEMPLATE)?;

        Ok(Self { tera })
    }

    /// Loads every `*.html` under `templates_dir`, which must provide the
    /// same template names as the built-in set.
    pub fn from_directory(templates_dir: &Path) -> Result<Self> {
        let pattern = templates_dir.join("**").join("*.html");
        let pattern_str = pattern.to_string_lossy();
        let tera = Tera::new(&pattern_str)?;
        Ok(Self { tera })
    }
}

impl Renderer for TeraRenderer {
    fn render(&self, layout: Layout, data: &PageData) -> Result<Vec<u8>> {
        let mut context = Context::new();
        context.insert("page", data);
        context.insert("layout", &layout);

        let rendered = self.tera.render(layout.template_name(), &context)?;
        Ok(rendered.into_bytes())
    }
}
