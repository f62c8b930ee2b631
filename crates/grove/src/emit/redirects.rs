use std::path::Path;

use super::{EmitContext, unknown_output};
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::index::{AliasMap, ContentIndex, declared_aliases};
use crate::slug::{FullSlug, SimpleSlug, href_to};
use crate::types::ParsedDocument;
use crate::xml::{encode_path, escape};

const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

fn has_reserved_component(path_str: &str) -> bool {
    path_str.split('/').any(|component| {
        let name = component.split('.').next().unwrap_or(component);
        WINDOWS_RESERVED_NAMES.contains(&name.to_lowercase().as_str())
    })
}

fn is_safe_redirect_path(clean_path: &str) -> bool {
    !clean_path.is_empty()
        && !clean_path.contains("..")
        && !clean_path.contains(':')
        && !clean_path.starts_with('\\')
        && !Path::new(clean_path).is_absolute()
        && !has_reserved_component(clean_path)
        && !clean_path.bytes().any(|byte| byte < 0x20)
}

fn redirect_output_path(alias: &SimpleSlug) -> Option<String> {
    let clean_path = alias.trimmed();
    is_safe_redirect_path(clean_path).then(|| format!("{}.html", clean_path))
}

/// One redirect page per effective alias. Every document declaring the
/// alias feeds it, since a change to any of them can move the target.
pub(super) fn declare_outputs(
    context: &EmitContext<'_>,
    documents: &[ParsedDocument],
) -> DependencyGraph {
    let (aliases, _) = AliasMap::build(documents, context.config.aliases.collision);

    let mut graph = DependencyGraph::new();
    for document in documents {
        for alias in declared_aliases(document) {
            if aliases.get(&alias).is_none() {
                continue;
            }
            let Some(output) = redirect_output_path(&alias) else {
                tracing::warn!(%alias, "skipping unsafe alias path");
                continue;
            };
            graph.add_path_edge(document.source_id(), output);
        }
    }
    graph
}

pub(super) fn emit(context: &EmitContext<'_>, output: &str, index: &ContentIndex) -> Result<Vec<u8>> {
    let alias_path = output
        .strip_suffix(".html")
        .ok_or_else(|| unknown_output(output))?;
    let alias = SimpleSlug::new(alias_path);
    let folder_alias = SimpleSlug::new(format!("{}/", alias_path));
    let target = index
        .aliases()
        .get(&alias)
        .or_else(|| index.aliases().get(&folder_alias))
        .ok_or_else(|| unknown_output(output))?;

    let target_url = match &context.config.base_url {
        Some(base_url) => format!("{}/{}", base_url, encode_path(target.as_str())),
        None => encode_path(&href_to(&FullSlug::new(alias_path), target)),
    };

    let redirect_html = format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="UTF-8">
<meta name="robots" content="noindex">
<meta http-equiv="refresh" content="0; url={url}">
<link rel="canonical" href="{url}">
<title>{title}</title>
</head>
<body>
<p>Redirecting to <a href="{url}">{url}</a></p>
</body>
</html>
"#,
        lang = escape(context.labels.locale),
        url = escape(&target_url),
        title = escape(alias.as_str()),
    );

    Ok(redirect_html.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildConfig, CollisionPolicy};
    use crate::emit::EmitUnit;
    use crate::emit::testing::*;
    use crate::types::fixtures::*;

    fn emit_redirect(config: &BuildConfig, output: &str, documents: &[ParsedDocument]) -> String {
        let renderer = JsonRenderer;
        let context = EmitContext::new(config, &renderer, &EmitUnit::ALL);
        let (index, _) = ContentIndex::build(documents, config).unwrap();
        let bytes = EmitUnit::AliasRedirects
            .emit(&context, output, &index, documents)
            .unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_alias_redirect_points_at_canonical_page() {
        let documents = vec![document("notes/note").aliased(&["old-note"])];
        let config = BuildConfig::default();

        let graph = declared(EmitUnit::AliasRedirects, &config, &documents);
        assert!(edge(&graph, "content/notes/note.md", "old-note.html"));

        let html = emit_redirect(&config, "old-note.html", &documents);
        assert!(html.contains(r#"content="0; url=./notes/note""#));
        assert!(html.contains(r#"<link rel="canonical" href="./notes/note">"#));
    }

    #[test]
    fn test_absolute_redirect_with_base_url() {
        let documents = vec![document("note").aliased(&["legacy/page"])];
        let config = BuildConfig {
            base_url: Some("https://example.com".to_string()),
            ..BuildConfig::default()
        };

        let html = emit_redirect(&config, "legacy/page.html", &documents);
        assert!(html.contains("url=https://example.com/note"));
    }

    #[test]
    fn test_collision_follows_policy() {
        let documents = vec![
            document("first").aliased(&["shared"]),
            document("second").aliased(&["shared"]),
        ];
        let mut config = BuildConfig::default();

        let graph = declared(EmitUnit::AliasRedirects, &config, &documents);
        assert!(edge(&graph, "content/first.md", "shared.html"));
        assert!(edge(&graph, "content/second.md", "shared.html"));
        assert!(emit_redirect(&config, "shared.html", &documents).contains("url=./first"));

        config.aliases.collision = CollisionPolicy::LastWins;
        assert!(emit_redirect(&config, "shared.html", &documents).contains("url=./second"));
    }

    #[test]
    fn test_shadowed_alias_has_no_redirect() {
        let documents = vec![document("taken"), document("other").aliased(&["taken"])];
        let graph = declared(EmitUnit::AliasRedirects, &BuildConfig::default(), &documents);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_folder_alias_redirect() {
        let documents = vec![document("guide").aliased(&["old-guide/index"])];
        let config = BuildConfig::default();

        let graph = declared(EmitUnit::AliasRedirects, &config, &documents);
        assert!(edge(&graph, "content/guide.md", "old-guide.html"));
        let html = emit_redirect(&config, "old-guide.html", &documents);
        assert!(html.contains("url=./guide"));
    }

    #[test]
    fn test_safe_redirect_paths() {
        assert!(is_safe_redirect_path("old/path"));
        assert!(!is_safe_redirect_path(""));
        assert!(!is_safe_redirect_path("c:/windows"));
        assert!(!is_safe_redirect_path("con"));
        assert!(!is_safe_redirect_path("docs/aux.txt"));
        assert!(!is_safe_redirect_path("bad\u{7}bell"));
    }
}
