use super::{EmitContext, output_slug, page_document, unknown_output};
use crate::error::Result;
use crate::folder::FolderQuery;
use crate::graph::DependencyGraph;
use crate::index::ContentIndex;
use crate::render::Layout;
use crate::types::ParsedDocument;

const EXCLUDED_FOLDERS: &[&str] = &["tags"];

fn folder_output_path(folder: &str) -> String {
    format!("{}/index.html", folder)
}

/// A document feeds every folder page above it: the nearest lists it
/// directly, further ones may list a placeholder dated from it.
pub(super) fn declare_outputs(documents: &[ParsedDocument]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for document in documents {
        let source = document.source_id();
        for folder in document.slug.ancestors() {
            if EXCLUDED_FOLDERS.contains(&folder) {
                continue;
            }
            graph.add_path_edge(source.clone(), folder_output_path(folder));
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
    let folder = slug
        .as_str()
        .strip_suffix("/index")
        .filter(|folder| !folder.is_empty() && !EXCLUDED_FOLDERS.contains(folder))
        .ok_or_else(|| unknown_output(output))?;

    let query = FolderQuery {
        show_subfolders: context.config.folders.show_subfolders,
        sort: context.config.folders.sort,
        date_type: context.config.default_date_type,
    };
    let listing = index.folder_listing(folder, documents, query);
    let backing = index.document(documents, &slug);
    if listing.pages.is_empty() && backing.is_none() {
        return Err(unknown_output(output));
    }

    let default_title = || context.labels.folder_title(folder);
    let page = page_document(backing, &slug, default_title);
    let title = page.frontmatter.title.clone().unwrap_or_else(default_title);

    let mut data = context.listing_page_data(&slug, title, &page);
    data.date = context.format_date(&page.frontmatter.dates);

    if context.config.folders.show_folder_count {
        data.count_label = Some(context.labels.items_under_folder(listing.pages.len()));
    }
    data.listing = listing
        .pages
        .iter()
        .map(|page| context.listing_entry(&slug, page))
        .collect();

    context.renderer.render(Layout::FolderListing, &data)
}

#[cfg(test)]
mod tests {
    use crate::config::BuildConfig;
    use crate::emit::EmitUnit;
    use crate::emit::testing::*;
    use crate::types::MarkupTree;
    use crate::types::fixtures::*;

    #[test]
    fn test_declares_every_ancestor_folder() {
        let documents = vec![
            document("projects/alpha/one"),
            document("tags/rust"),
            document("top"),
        ];
        let graph = declared(EmitUnit::FolderPage, &BuildConfig::default(), &documents);

        let outputs: Vec<String> = graph.all_outputs().into_iter().collect();
        assert_eq!(outputs, vec!["projects/alpha/index.html", "projects/index.html"]);
        assert!(edge(&graph, "content/projects/alpha/one.md", "projects/alpha/index.html"));
        assert!(edge(&graph, "content/projects/alpha/one.md", "projects/index.html"));
    }

    #[test]
    fn test_folder_placeholder_scenario() {
        let documents = vec![
            document("projects/alpha/one").created("2023-01-01"),
            document("projects/alpha/two").created("2024-01-01"),
        ];
        let page = render_json(
            EmitUnit::FolderPage,
            &BuildConfig::default(),
            "projects/index.html",
            &documents,
        );

        assert_eq!(page["layout"], "folder_listing");
        assert_eq!(page["title"], "Folder: projects");
        assert_eq!(page["count_label"], "1 item under this folder.");
        let alpha = &page["listing"][0];
        assert_eq!(alpha["title"], "alpha");
        assert_eq!(alpha["date"], "Jan 01, 2024");
        assert_eq!(alpha["folder"], true);
        assert_eq!(alpha["href"], "../projects/alpha/");
        assert_eq!(alpha["tags"][0]["title"], "folder");
    }

    #[test]
    fn test_backing_index_supplies_title_and_body() {
        let documents = vec![
            document("notes/index").titled("My Notes"),
            document("notes/a"),
        ];
        let mut config = BuildConfig::default();
        config.folders.show_folder_count = false;

        let page = render_json(EmitUnit::FolderPage, &config, "notes/index.html", &documents);
        assert_eq!(page["title"], "My Notes");
        assert_eq!(page["body"], "<p>notes/index</p>");
        assert!(page["count_label"].is_null());
        assert_eq!(page["listing"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_description_stands_in_for_empty_body() {
        let mut index = document("notes/index").titled("Notes");
        index.frontmatter.description = Some("Field notes & sketches".to_string());
        index.markup_tree = MarkupTree::default();
        let documents = vec![index, document("notes/a")];

        let page = render_json(
            EmitUnit::FolderPage,
            &BuildConfig::default(),
            "notes/index.html",
            &documents,
        );
        assert_eq!(page["description"], "Field notes & sketches");
        assert_eq!(page["body"], "<p>Field notes &amp; sketches</p>");
    }

    #[test]
    fn test_unbacked_folder_has_empty_body() {
        let documents = vec![document("notes/a")];
        let page = render_json(
            EmitUnit::FolderPage,
            &BuildConfig::default(),
            "notes/index.html",
            &documents,
        );
        assert_eq!(page["title"], "Folder: notes");
        assert_eq!(page["body"], "");
        assert!(page["description"].is_null());
    }
}
