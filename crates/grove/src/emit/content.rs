use std::collections::{BTreeMap, HashMap};

use super::{EmitContext, output_slug, page_output_path, unknown_output};
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::index::{AliasMap, ContentIndex, declared_aliases, declared_tags};
use crate::render::Layout;
use crate::slug::{FullSlug, SimpleSlug};
use crate::types::ParsedDocument;

/// Folder indices and tag documents are rendered by their listing units.
pub(super) fn has_page(slug: &FullSlug) -> bool {
    !slug.ends_with("/index") && !slug.starts_with("tags/")
}

/// Documents competing for one simple slug, by path or by alias, in
/// document order.
fn claimants(documents: &[ParsedDocument]) -> BTreeMap<SimpleSlug, Vec<&ParsedDocument>> {
    let mut claims: BTreeMap<SimpleSlug, Vec<&ParsedDocument>> = BTreeMap::new();
    for document in documents {
        claims.entry(document.slug.simplify()).or_default().push(document);
        for alias in declared_aliases(document) {
            claims.entry(alias).or_default().push(document);
        }
    }
    claims.retain(|_, claimants| claimants.len() > 1);
    claims
}

/// Each page depends on its own source and on every document linking to
/// it, since those appear as backlinks. Documents claiming the same slug
/// feed each other's pages: a change to one can move links that resolve
/// through that slug onto another.
pub(super) fn declare_outputs(
    context: &EmitContext<'_>,
    documents: &[ParsedDocument],
) -> DependencyGraph {
    let (aliases, _) = AliasMap::build(documents, context.config.aliases.collision);
    let pages: HashMap<SimpleSlug, String> = documents
        .iter()
        .filter(|document| has_page(&document.slug))
        .map(|document| (document.slug.simplify(), page_output_path(&document.slug)))
        .collect();

    let mut graph = DependencyGraph::new();
    for document in documents {
        let source = document.source_id();
        if has_page(&document.slug) {
            graph.add_path_edge(source.clone(), page_output_path(&document.slug));
        }
        for link in &document.links {
            if let Some(output) = pages.get(&aliases.resolve(link)) {
                graph.add_path_edge(source.clone(), output.clone());
            }
        }
    }

    for claimants in claimants(documents).values() {
        for claimant in claimants {
            for other in claimants {
                if claimant.slug != other.slug && has_page(&other.slug) {
                    graph.add_path_edge(claimant.source_id(), page_output_path(&other.slug));
                }
            }
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
    let document = index
        .document(documents, &slug)
        .filter(|document| has_page(&document.slug))
        .ok_or_else(|| unknown_output(output))?;

    let mut data = context.page_data(&slug, document.title());
    data.description = document.frontmatter.description.clone();
    data.css_classes = document.frontmatter.css_classes.clone();
    data.date = context.format_date(&document.frontmatter.dates);
    data.body = document.markup_tree.as_html().to_string();

    let (tags, _) = declared_tags(document, context.config.tags.case);
    data.tags = tags
        .iter()
        .map(|tag| context.tag_link(&slug, tag))
        .collect();
    data.backlinks = index
        .backlinks_for(&slug)
        .iter()
        .map(|backlink| context.page_link(&slug, &backlink.slug.simplify(), &backlink.title))
        .collect();
    data.show_backlinks = !(context.config.backlinks.hide_when_empty && data.backlinks.is_empty());

    context.renderer.render(Layout::Content, &data)
}

#[cfg(test)]
mod tests {
    use crate::config::BuildConfig;
    use crate::emit::EmitUnit;
    use crate::emit::testing::*;
    use crate::types::fixtures::*;

    #[test]
    fn test_declares_pages_except_folder_indices_and_tag_documents() {
        let documents = vec![
            document("index"),
            document("notes/index"),
            document("notes/a"),
            document("tags/rust"),
        ];
        let graph = declared(EmitUnit::ContentPage, &BuildConfig::default(), &documents);

        let outputs: Vec<String> = graph.all_outputs().into_iter().collect();
        assert_eq!(outputs, vec!["index.html", "notes/a.html"]);
    }

    #[test]
    fn test_referrer_feeds_target_page_through_alias() {
        let documents = vec![
            document("note").aliased(&["old-note"]),
            document("ref").linking(&["old-note"]),
        ];
        let graph = declared(EmitUnit::ContentPage, &BuildConfig::default(), &documents);

        assert!(edge(&graph, "content/note.md", "note.html"));
        assert!(edge(&graph, "content/ref.md", "note.html"));
        assert!(edge(&graph, "content/ref.md", "ref.html"));
        assert!(!edge(&graph, "content/note.md", "ref.html"));
    }

    #[test]
    fn test_alias_claimants_feed_each_other() {
        let documents = vec![
            document("new").aliased(&["old-note"]),
            document("note").aliased(&["old-note"]),
            document("old-page"),
            document("shadow").aliased(&["old-page"]),
        ];
        let graph = declared(EmitUnit::ContentPage, &BuildConfig::default(), &documents);

        assert!(edge(&graph, "content/new.md", "note.html"));
        assert!(edge(&graph, "content/note.md", "new.html"));
        assert!(edge(&graph, "content/old-page.md", "shadow.html"));
        assert!(edge(&graph, "content/shadow.md", "old-page.html"));
    }

    #[test]
    fn test_page_shows_tags_and_backlinks() {
        let documents = vec![
            document("notes/target").tagged(&["Lang/Rust"]).created("2024-01-15"),
            document("notes/deep/referrer").titled("Referrer").linking(&["notes/target"]),
        ];
        let page = render_json(
            EmitUnit::ContentPage,
            &BuildConfig::default(),
            "notes/target.html",
            &documents,
        );

        assert_eq!(page["layout"], "content");
        assert_eq!(page["title"], "target");
        assert_eq!(page["date"], "Jan 15, 2024");
        assert_eq!(page["tags"][0]["title"], "lang/rust");
        assert_eq!(page["tags"][0]["href"], "../tags/lang/rust");
        assert_eq!(page["backlinks"][0]["title"], "Referrer");
        assert_eq!(page["backlinks"][0]["href"], "../notes/deep/referrer");
        assert_eq!(page["body"], "<p>notes/target</p>");
        assert_eq!(page["show_backlinks"], true);
    }

    #[test]
    fn test_empty_backlinks_section_is_hidden_by_default() {
        let documents = vec![document("lonely")];
        let config = BuildConfig::default();

        let page = render_json(EmitUnit::ContentPage, &config, "lonely.html", &documents);
        assert_eq!(page["show_backlinks"], false);

        let html = render_html(EmitUnit::ContentPage, &config, "lonely.html", &documents);
        assert!(!html.contains(r#"class="backlinks""#));
        assert!(!html.contains("No backlinks found"));
    }

    #[test]
    fn test_empty_backlinks_section_can_be_shown() {
        let documents = vec![document("lonely")];
        let mut config = BuildConfig::default();
        config.backlinks.hide_when_empty = false;

        let page = render_json(EmitUnit::ContentPage, &config, "lonely.html", &documents);
        assert_eq!(page["show_backlinks"], true);

        let html = render_html(EmitUnit::ContentPage, &config, "lonely.html", &documents);
        assert!(html.contains(r#"class="backlinks""#));
        assert!(html.contains("No backlinks found"));
    }
}
