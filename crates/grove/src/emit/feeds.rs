use super::{EmitContext, unknown_output};
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::listing::{ListedPage, SortOrder};
use crate::types::ParsedDocument;
use crate::xml::{encode_path, escape};

pub const SITEMAP_OUTPUT: &str = "sitemap.xml";
pub const RSS_OUTPUT: &str = "index.xml";

fn base_url(context: &EmitContext<'_>) -> Option<String> {
    context.config.base_url.as_ref().map(|base_url| {
        if base_url.contains("://") {
            base_url.clone()
        } else {
            format!("https://{}", base_url)
        }
    })
}

fn page_url(base_url: &str, page: &ListedPage) -> String {
    let simple = page.slug.simplify();
    format!("{}/{}", base_url, encode_path(simple.as_str()))
}

/// Feeds need absolute URLs, so nothing is declared without a base URL.
pub(super) fn declare_outputs(
    context: &EmitContext<'_>,
    documents: &[ParsedDocument],
) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    if context.config.base_url.is_none() {
        tracing::debug!("no base_url configured, skipping sitemap and RSS feed");
        return graph;
    }

    for document in documents {
        let source = document.source_id();
        graph.add_path_edge(source.clone(), SITEMAP_OUTPUT);
        graph.add_path_edge(source, RSS_OUTPUT);
    }
    graph
}

pub(super) fn emit(
    context: &EmitContext<'_>,
    output: &str,
    documents: &[ParsedDocument],
) -> Result<Vec<u8>> {
    let base_url = base_url(context).ok_or_else(|| unknown_output(output))?;
    match output {
        SITEMAP_OUTPUT => Ok(generate_sitemap(context, &base_url, documents).into_bytes()),
        RSS_OUTPUT => Ok(generate_rss(context, &base_url, documents).into_bytes()),
        _ => Err(unknown_output(output)),
    }
}

fn generate_sitemap(context: &EmitContext<'_>, base_url: &str, documents: &[ParsedDocument]) -> String {
    let mut pages: Vec<ListedPage> = documents.iter().map(ListedPage::from).collect();
    pages.sort_by(|left, right| left.slug.cmp(&right.slug));

    let mut urls = String::new();
    for page in &pages {
        let lastmod = page
            .dates
            .get(context.config.default_date_type)
            .map(|date| format!("\n    <lastmod>{}</lastmod>", date.format("%Y-%m-%d")))
            .unwrap_or_default();
        urls.push_str(&format!(
            "  <url>\n    <loc>{}</loc>{}\n  </url>\n",
            escape(&page_url(base_url, page)),
            lastmod
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}</urlset>
"#,
        urls
    )
}

fn generate_rss(context: &EmitContext<'_>, base_url: &str, documents: &[ParsedDocument]) -> String {
    let mut pages: Vec<ListedPage> = documents.iter().map(ListedPage::from).collect();
    SortOrder::DateThenAlphabetical.sort(context.config.default_date_type, &mut pages);
    let limit = context.config.feeds.rss_limit;

    let mut items = String::new();
    for page in pages.iter().take(limit) {
        let url = page_url(base_url, page);
        let pub_date = page
            .dates
            .get(context.config.default_date_type)
            .map(|date| {
                format!(
                    "\n      <pubDate>{}</pubDate>",
                    date.format("%a, %d %b %Y %H:%M:%S +0000")
                )
            })
            .unwrap_or_default();

        items.push_str(&format!(
            r#"    <item>
      <title>{}</title>
      <link>{}</link>
      <guid>{}</guid>{}
      <description>{}</description>
    </item>
"#,
            escape(&page.title),
            escape(&url),
            escape(&url),
            pub_date,
            escape(page.description.as_deref().unwrap_or("")),
        ));
    }

    let title = context
        .config
        .feeds
        .title
        .clone()
        .unwrap_or_else(|| base_url.to_string());
    let description = context
        .config
        .feeds
        .description
        .clone()
        .unwrap_or_else(|| context.labels.last_notes(limit.min(pages.len())));

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{}</title>
    <link>{}</link>
    <description>{}</description>
    <language>{}</language>
    <atom:link href="{}/{}" rel="self" type="application/rss+xml"/>
{}  </channel>
</rss>
"#,
        escape(&title),
        escape(base_url),
        escape(&description),
        escape(context.labels.locale),
        escape(base_url),
        RSS_OUTPUT,
        items
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::emit::EmitUnit;
    use crate::emit::testing::*;
    use crate::index::ContentIndex;
    use crate::types::fixtures::*;

    fn config() -> BuildConfig {
        let mut config = BuildConfig {
            base_url: Some("https://example.com".to_string()),
            ..BuildConfig::default()
        };
        config.feeds.title = Some("Test Garden".to_string());
        config.feeds.rss_limit = 2;
        config
    }

    fn emit_feed(config: &BuildConfig, output: &str, documents: &[ParsedDocument]) -> String {
        let renderer = JsonRenderer;
        let context = EmitContext::new(config, &renderer, &EmitUnit::ALL);
        let (index, _) = ContentIndex::build(documents, config).unwrap();
        String::from_utf8(EmitUnit::Feeds.emit(&context, output, &index, documents).unwrap()).unwrap()
    }

    fn documents() -> Vec<ParsedDocument> {
        vec![
            document("index").titled("Home"),
            document("notes/old").titled("Old & Busted").created("2020-05-01"),
            document("notes/new").titled("New Hotness").created("2024-06-15"),
            document("notes/Rust Lang").titled("Rust"),
        ]
    }

    #[test]
    fn test_nothing_declared_without_base_url() {
        let graph = declared(EmitUnit::Feeds, &BuildConfig::default(), &documents());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_every_document_feeds_both_outputs() {
        let graph = declared(EmitUnit::Feeds, &config(), &documents());
        assert!(edge(&graph, "content/notes/old.md", SITEMAP_OUTPUT));
        assert!(edge(&graph, "content/notes/old.md", RSS_OUTPUT));
        assert_eq!(graph.all_outputs().len(), 2);
    }

    #[test]
    fn test_sitemap_lists_every_page_sorted() {
        let sitemap = emit_feed(&config(), SITEMAP_OUTPUT, &documents());

        assert!(sitemap.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
        assert!(sitemap.contains("<loc>https://example.com/</loc>"));
        assert!(sitemap.contains("<loc>https://example.com/notes/Rust%20Lang</loc>"));
        assert!(sitemap.contains("<lastmod>2024-06-15</lastmod>"));
        let new_position = sitemap.find("notes/new").unwrap();
        let old_position = sitemap.find("notes/old").unwrap();
        assert!(new_position < old_position);
    }

    #[test]
    fn test_rss_is_newest_first_and_limited() {
        let rss = emit_feed(&config(), RSS_OUTPUT, &documents());

        assert!(rss.contains("<rss version=\"2.0\""));
        assert!(rss.contains("<title>Test Garden</title>"));
        assert!(rss.contains("<title>New Hotness</title>"));
        assert!(rss.contains("<title>Old &amp; Busted</title>"));
        assert!(!rss.contains("<title>Home</title>"));
        assert!(rss.contains("<pubDate>Sat, 15 Jun 2024 00:00:00 +0000</pubDate>"));
        assert!(rss.find("New Hotness").unwrap() < rss.find("Old &amp; Busted").unwrap());
        assert!(rss.contains("<description>Last 2 notes</description>"));
    }
}
