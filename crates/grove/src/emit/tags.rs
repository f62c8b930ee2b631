use super::{EmitContext, listed_pages, output_slug, page_document, unknown_output};
use crate::config::TagCase;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::index::{ContentIndex, ROOT_TAG, expanded_tags, normalize_tag};
use crate::render::{Layout, ListingGroup};
use crate::slug::{FullSlug, slug_tag};
use crate::types::ParsedDocument;

pub const TAG_INDEX_OUTPUT: &str = "tags/index.html";
const TAG_INDEX_SLUG: &str = "tags/index";
const TAG_INDEX_PREVIEW: usize = 10;

fn tag_output_path(tag: &str) -> String {
    format!("tags/{}.html", slug_tag(tag))
}

/// The tag whose page a document under `tags/` supplies the title and body
/// for, normalized like declared tags.
fn backed_tag(slug: &FullSlug, case: TagCase) -> Option<String> {
    if slug.ends_with("/index") {
        return None;
    }
    slug.as_str()
        .strip_prefix("tags/")
        .and_then(|tag| normalize_tag(tag, case))
}

pub(super) fn declare_outputs(
    context: &EmitContext<'_>,
    documents: &[ParsedDocument],
) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for document in documents {
        let source = document.source_id();
        let tags = expanded_tags(document, context.config.tags.case);
        for tag in &tags {
            graph.add_path_edge(source.clone(), tag_output_path(tag));
        }
        if !tags.is_empty() {
            graph.add_path_edge(source.clone(), TAG_INDEX_OUTPUT);
        }
        if document.slug.as_str() == TAG_INDEX_SLUG {
            graph.add_path_edge(source, TAG_INDEX_OUTPUT);
        } else if let Some(tag) = backed_tag(&document.slug, context.config.tags.case) {
            graph.add_path_edge(source, tag_output_path(&tag));
        }
    }

    graph
}

pub(super) fn emit(
    context: &EmitContext<'_>,
    output: &str,
    index: &ContentIndex,
    documents: &[ParsedDocument],
) -> Result<Vec<u8>> {
    let slug = output_slug(output);
    if slug.as_str() == TAG_INDEX_SLUG {
        return emit_tag_index(context, &slug, index, documents);
    }

    let slugged = slug
        .as_str()
        .strip_prefix("tags/")
        .ok_or_else(|| unknown_output(output))?;
    let case = context.config.tags.case;

    // Distinct tags can share a page once slugged; the page lists them all.
    let matching: Vec<&str> = index
        .tags()
        .tags()
        .filter(|tag| slug_tag(tag) == slugged)
        .collect();
    let mut members: Vec<FullSlug> = Vec::new();
    for tag in &matching {
        for member in index.tags().members(tag) {
            if !members.contains(member) {
                members.push(member.clone());
            }
        }
    }

    let backing = documents.iter().find(|document| {
        backed_tag(&document.slug, case).is_some_and(|tag| slug_tag(&tag) == slugged)
    });
    if members.is_empty() && backing.is_none() {
        return Err(unknown_output(output));
    }

    let tag = matching
        .first()
        .map(|tag| tag.to_string())
        .or_else(|| backing.and_then(|document| backed_tag(&document.slug, case)))
        .unwrap_or_else(|| slugged.to_string());
    let default_title = || context.labels.tag_title(&tag);
    let page = page_document(backing, &slug, default_title);
    let title = match backing.map(ParsedDocument::title) {
        Some(title) if normalize_tag(&title, case).as_deref() != Some(tag.as_str()) => title,
        _ => default_title(),
    };

    let mut data = context.listing_page_data(&slug, title, &page);

    let pages = listed_pages(index, documents, &members, context.config.tag_pages.sort, context);
    data.count_label = Some(context.labels.items_under_tag(pages.len()));
    data.listing = pages
        .iter()
        .map(|page| context.listing_entry(&slug, page))
        .collect();

    context.renderer.render(Layout::TagListing, &data)
}

fn emit_tag_index(
    context: &EmitContext<'_>,
    slug: &FullSlug,
    index: &ContentIndex,
    documents: &[ParsedDocument],
) -> Result<Vec<u8>> {
    let default_title = || context.labels.tag_index.to_string();
    let page = page_document(index.document(documents, slug), slug, default_title);
    let title = page.frontmatter.title.clone().unwrap_or_else(default_title);

    let mut data = context.listing_page_data(slug, title, &page);

    data.count_label = Some(
        context
            .labels
            .items_under_tag(index.tags().members(ROOT_TAG).len()),
    );
    data.groups = index
        .tags()
        .tags()
        .map(|tag| {
            let pages = listed_pages(
                index,
                documents,
                index.tags().members(tag),
                context.config.tag_pages.sort,
                context,
            );
            let hidden = pages.len().saturating_sub(TAG_INDEX_PREVIEW);
            ListingGroup {
                tag: context.tag_link(slug, tag),
                count_label: context.labels.items_under_tag(pages.len()),
                pages: pages
                    .iter()
                    .take(TAG_INDEX_PREVIEW)
                    .map(|page| context.listing_entry(slug, page))
                    .collect(),
                more_label: (hidden > 0).then(|| context.labels.show_more(hidden)),
            }
        })
        .collect();

    context.renderer.render(Layout::TagIndex, &data)
}
