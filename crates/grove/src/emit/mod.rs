//! Output-producing units.
//!
//! Each [`EmitUnit`] declares, from the parsed documents alone, which outputs
//! it produces and which sources feed each one. The builder merges those
//! declarations into the dependency graph and later asks the owning unit to
//! emit only the outputs a change reaches.

mod content;
mod feeds;
mod folders;
mod redirects;
mod tags;

use serde::Serialize;
use std::path::PathBuf;

use crate::config::BuildConfig;
use crate::error::{GroveError, Result};
use crate::graph::DependencyGraph;
use crate::i18n::Labels;
use crate::index::{ContentIndex, normalize_tag};
use crate::listing::{ListedPage, SortOrder};
use crate::render::{ListingEntry, PageData, PageLink, Renderer};
use crate::sink::OutputSink;
use crate::slug::{FullSlug, SimpleSlug, href_to, path_to_root, slug_tag};
use crate::types::{Dates, Frontmatter, ParsedDocument};
use crate::xml::{encode_path, escape};

pub use feeds::{RSS_OUTPUT, SITEMAP_OUTPUT};
pub use tags::TAG_INDEX_OUTPUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    ArticleTitle,
    ContentMeta,
    TagList,
    Backlinks,
    PageList,
}

impl Component {
    pub fn stylesheet(&self) -> &'static str {
        match self {
            Component::ArticleTitle => ".article-title{margin:2rem 0 0 0}",
            Component::ContentMeta => ".content-meta{margin-top:0;color:var(--gray)}",
            Component::TagList => {
                ".tags{list-style:none;display:flex;padding-left:0;gap:0.4rem;flex-wrap:wrap}"
            }
            Component::Backlinks => ".backlinks{flex-direction:column}.backlinks>ul{padding:0}",
            Component::PageList => {
                ".section-ul{list-style:none;padding-left:0}.section-li>.meta{opacity:0.6}"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EmitUnit {
    ContentPage,
    TagPage,
    FolderPage,
    AliasRedirects,
    Feeds,
}

impl EmitUnit {
    /// Every unit, in output-ownership order.
    pub const ALL: [EmitUnit; 5] = [
        EmitUnit::ContentPage,
        EmitUnit::TagPage,
        EmitUnit::FolderPage,
        EmitUnit::AliasRedirects,
        EmitUnit::Feeds,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EmitUnit::ContentPage => "ContentPage",
            EmitUnit::TagPage => "TagPage",
            EmitUnit::FolderPage => "FolderPage",
            EmitUnit::AliasRedirects => "AliasRedirects",
            EmitUnit::Feeds => "Feeds",
        }
    }

    pub fn components(&self) -> &'static [Component] {
        match self {
            EmitUnit::ContentPage => &[
                Component::ArticleTitle,
                Component::ContentMeta,
                Component::TagList,
                Component::Backlinks,
            ],
            EmitUnit::TagPage | EmitUnit::FolderPage => &[
                Component::ArticleTitle,
                Component::TagList,
                Component::PageList,
            ],
            EmitUnit::AliasRedirects | EmitUnit::Feeds => &[],
        }
    }

    /// Pure: depends on `documents` and configuration only.
    pub fn declare_outputs(
        &self,
        context: &EmitContext<'_>,
        documents: &[ParsedDocument],
    ) -> DependencyGraph {
        match self {
            EmitUnit::ContentPage => content::declare_outputs(context, documents),
            EmitUnit::TagPage => tags::declare_outputs(context, documents),
            EmitUnit::FolderPage => folders::declare_outputs(documents),
            EmitUnit::AliasRedirects => redirects::declare_outputs(context, documents),
            EmitUnit::Feeds => feeds::declare_outputs(context, documents),
        }
    }

    /// Produces the bytes for one declared output. Equal inputs give equal
    /// bytes.
    pub fn emit(
        &self,
        context: &EmitContext<'_>,
        output: &str,
        index: &ContentIndex,
        documents: &[ParsedDocument],
    ) -> Result<Vec<u8>> {
        match self {
            EmitUnit::ContentPage => content::emit(context, output, index, documents),
            EmitUnit::TagPage => tags::emit(context, output, index, documents),
            EmitUnit::FolderPage => folders::emit(context, output, index, documents),
            EmitUnit::AliasRedirects => redirects::emit(context, output, index),
            EmitUnit::Feeds => feeds::emit(context, output, documents),
        }
    }

    pub fn write(&self, sink: &dyn OutputSink, output: &str, bytes: &[u8]) -> Result<PathBuf> {
        let final_path = sink.write(output, bytes)?;
        tracing::debug!(unit = self.name(), output, "wrote output");
        Ok(final_path)
    }
}

/// Shared, read-only state for one build's emit phase.
pub struct EmitContext<'a> {
    pub config: &'a BuildConfig,
    pub renderer: &'a dyn Renderer,
    pub labels: &'static Labels,
    pub stylesheet: String,
}

impl<'a> EmitContext<'a> {
    /// Collects each component's stylesheet once, in first-use order.
    pub fn new(config: &'a BuildConfig, renderer: &'a dyn Renderer, units: &[EmitUnit]) -> Self {
        let mut components: Vec<Component> = Vec::new();
        for unit in units {
            for component in unit.components() {
                if !components.contains(component) {
                    components.push(*component);
                }
            }
        }
        let stylesheet = components
            .iter()
            .map(Component::stylesheet)
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            config,
            renderer,
            labels: Labels::for_locale(&config.locale),
            stylesheet,
        }
    }

    fn page_data(&self, slug: &FullSlug, title: String) -> PageData {
        PageData {
            slug: slug.to_string(),
            title,
            description: None,
            locale: self.labels.locale.to_string(),
            path_to_root: path_to_root(slug),
            stylesheet: self.stylesheet.clone(),
            css_classes: Vec::new(),
            date: None,
            body: String::new(),
            tags: Vec::new(),
            backlinks: Vec::new(),
            show_backlinks: false,
            listing: Vec::new(),
            groups: Vec::new(),
            count_label: None,
            labels: self.labels.clone(),
        }
    }

    /// Page data for a listing page rendered from `document`. A document
    /// without body text shows its description instead.
    fn listing_page_data(
        &self,
        slug: &FullSlug,
        title: String,
        document: &ParsedDocument,
    ) -> PageData {
        let mut data = self.page_data(slug, title);
        data.description = document.frontmatter.description.clone();
        data.css_classes = document.frontmatter.css_classes.clone();
        data.body = if document.markup_tree.is_empty() {
            document
                .frontmatter
                .description
                .as_deref()
                .map(|description| format!("<p>{}</p>", escape(description)))
                .unwrap_or_default()
        } else {
            document.markup_tree.as_html().to_string()
        };
        data
    }

    fn format_date(&self, dates: &Dates) -> Option<String> {
        dates
            .get(self.config.default_date_type)
            .map(|date| date.format("%b %d, %Y").to_string())
    }

    fn page_link(&self, current: &FullSlug, target: &SimpleSlug, title: &str) -> PageLink {
        PageLink {
            title: title.to_string(),
            href: encode_path(&href_to(current, target)),
        }
    }

    fn tag_link(&self, current: &FullSlug, tag: &str) -> PageLink {
        let target = SimpleSlug::new(format!("tags/{}", slug_tag(tag)));
        self.page_link(current, &target, tag)
    }

    fn listing_entry(&self, current: &FullSlug, page: &ListedPage) -> ListingEntry {
        let link = self.page_link(current, &page.slug.simplify(), &page.title);
        ListingEntry {
            title: link.title,
            href: link.href,
            description: page.description.clone(),
            date: self.format_date(&page.dates),
            tags: page
                .tags
                .iter()
                .filter_map(|tag| normalize_tag(tag, self.config.tags.case))
                .map(|tag| self.tag_link(current, &tag))
                .collect(),
            folder: page.placeholder || page.slug.ends_with("/index"),
        }
    }
}

/// The slug an output path stands for: the path without its extension.
pub fn output_slug(output: &str) -> FullSlug {
    let stem = match output.rfind('.') {
        Some(position) if !output[position..].contains('/') => &output[..position],
        _ => output,
    };
    FullSlug::new(stem)
}

pub fn page_output_path(slug: &FullSlug) -> String {
    format!("{}.html", slug)
}

fn unknown_output(output: &str) -> GroveError {
    GroveError::UnknownOutput {
        path: output.to_string(),
    }
}

/// The document behind a listing page: its backing source when one exists,
/// otherwise a placeholder carrying the default title.
fn page_document(
    backing: Option<&ParsedDocument>,
    slug: &FullSlug,
    default_title: impl FnOnce() -> String,
) -> ParsedDocument {
    match backing {
        Some(document) => document.clone(),
        None => ParsedDocument::placeholder(slug.clone(), Frontmatter::titled(default_title())),
    }
}

fn listed_pages(
    index: &ContentIndex,
    documents: &[ParsedDocument],
    slugs: &[FullSlug],
    sort: SortOrder,
    context: &EmitContext<'_>,
) -> Vec<ListedPage> {
    let mut pages: Vec<ListedPage> = slugs
        .iter()
        .filter_map(|slug| index.document(documents, slug))
        .map(ListedPage::from)
        .collect();
    sort.sort(context.config.default_date_type, &mut pages);
    pages
}
