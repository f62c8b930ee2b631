//! Build orchestration: parse, index, declare, classify, emit.
//!
//! A build emits every output into memory before touching the sink, so a
//! fatal error leaves previously written outputs and the persisted build
//! state exactly as they were.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::cache::{self, BuildState, ChangeClassification, ParseCache};
use crate::config::BuildConfig;
use crate::emit::{EmitContext, EmitUnit};
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::index::ContentIndex;
use crate::parsing::{DocumentParser, MarkdownParser, collect_sources};
use crate::pool::{CancellationToken, ParsePool};
use crate::render::{Renderer, TeraRenderer};
use crate::report::{BuildReport, Warning};
use crate::sink::OutputSink;
use crate::types::{ParsedDocument, RawDocument};

/// Every unit's declarations merged into one graph, plus which unit owns
/// each output.
struct Declarations {
    graph: DependencyGraph,
    owners: BTreeMap<String, EmitUnit>,
    warnings: Vec<Warning>,
}

pub struct Builder {
    config: BuildConfig,
    parser: Box<dyn DocumentParser>,
    renderer: Box<dyn Renderer>,
    cache_dir: Option<PathBuf>,
    include_drafts: bool,
    token: CancellationToken,
}

impl Builder {
    /// A builder with the markdown parser and built-in templates. Without a
    /// cache directory every build is a full build.
    pub fn new(config: BuildConfig) -> Result<Self> {
        Ok(Self {
            config,
            parser: Box::new(MarkdownParser::new()),
            renderer: Box::new(TeraRenderer::new()?),
            cache_dir: None,
            include_drafts: false,
            token: CancellationToken::new(),
        })
    }

    pub fn parser(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn include_drafts(mut self, include: bool) -> Self {
        self.include_drafts = include;
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Collects every markdown file under `content_dir` and builds it.
    pub fn build_dir(&self, content_dir: &Path, sink: &dyn OutputSink) -> Result<BuildReport> {
        let sources = collect_sources(content_dir)?;
        self.build(&sources, sink)
    }

    pub fn build(&self, sources: &[RawDocument], sink: &dyn OutputSink) -> Result<BuildReport> {
        let token = &self.token;
        token.check()?;

        let parser_version = format!("{}+{}", self.parser.version(), self.config.parse.parser_version);
        let config_fingerprint = cache::hash_content(&format!(
            "{}\0{}\0{}",
            self.config.fingerprint(),
            parser_version,
            self.include_drafts
        ));
        let content_hashes = cache::compute_content_hashes(sources);
        let previous = self.cache_dir.as_deref().and_then(cache::load_state);
        let parse_cache = self.cache_dir.as_deref().map(ParseCache::new);

        let pool = ParsePool::new(&self.config.parse)?;
        let outcome = pool.parse_all(
            sources,
            self.parser.as_ref(),
            parse_cache.as_ref(),
            &parser_version,
            token,
        )?;
        for diagnostic in &outcome.diagnostics {
            tracing::warn!(%diagnostic, "document excluded from build");
        }

        let documents = self.publishable(outcome.documents);
        token.check()?;

        let (index, mut warnings) = ContentIndex::build(&documents, &self.config)?;
        tracing::info!(
            documents = documents.len(),
            aliases = index.aliases().len(),
            tags = index.tags().tags().count(),
            "built content index"
        );
        token.check()?;

        let context = EmitContext::new(&self.config, self.renderer.as_ref(), &EmitUnit::ALL);
        let declarations = declare_outputs(&context, &documents);
        warnings.extend(declarations.warnings);
        let current_outputs = declarations.graph.all_outputs();
        tracing::info!(
            outputs = current_outputs.len(),
            edges = declarations.graph.edge_count(),
            "declared outputs"
        );

        let classification =
            cache::classify_changes(previous.as_ref(), &config_fingerprint, &content_hashes);
        let affected = match &classification {
            ChangeClassification::Full => current_outputs.clone(),
            ChangeClassification::Targeted { changed_files } => {
                let mut merged = declarations.graph.clone();
                if let Some(previous) = &previous {
                    merged.merge_from(&previous.graph);
                }
                merged
                    .affected_outputs(changed_files)
                    .into_iter()
                    .filter(|output| current_outputs.contains(output))
                    .collect()
            }
        };
        let stale: Vec<String> = previous
            .as_ref()
            .map(|previous| {
                previous
                    .graph
                    .all_outputs()
                    .into_iter()
                    .filter(|output| !current_outputs.contains(output))
                    .collect()
            })
            .unwrap_or_default();
        tracing::info!(
            full = classification.is_full(),
            affected = affected.len(),
            stale = stale.len(),
            "classified changes"
        );
        token.check()?;

        let rendered = emit_outputs(&pool, &context, &declarations.owners, &affected, &index, &documents)?;
        token.check()?;

        for output in &stale {
            sink.remove(output)?;
            tracing::debug!(output = %output, "removed stale output");
        }
        let mut emitted = pool.install(|| {
            rendered
                .par_iter()
                .map(|(output, unit, bytes)| unit.write(sink, output, bytes))
                .collect::<Result<Vec<PathBuf>>>()
        })?;
        emitted.sort();

        if let Some(cache_dir) = &self.cache_dir {
            let state = BuildState {
                config_fingerprint,
                content_hashes,
                graph: declarations.graph,
            };
            cache::save_state(cache_dir, &state)?;
        }

        for warning in &warnings {
            tracing::warn!(%warning, "build warning");
        }

        let report = BuildReport {
            classification,
            documents: documents.len(),
            skipped: current_outputs.len().saturating_sub(emitted.len()),
            emitted,
            removed: stale,
            warnings,
            diagnostics: outcome.diagnostics,
            cache: outcome.cache,
        };
        tracing::info!(
            emitted = report.emitted.len(),
            skipped = report.skipped,
            removed = report.removed.len(),
            warnings = report.warnings.len(),
            "build finished"
        );
        Ok(report)
    }

    fn publishable(&self, documents: Vec<ParsedDocument>) -> Vec<ParsedDocument> {
        if self.include_drafts {
            return documents;
        }
        documents
            .into_iter()
            .filter(|document| {
                if document.frontmatter.draft {
                    tracing::debug!(slug = %document.slug, "skipping draft");
                }
                !document.frontmatter.draft
            })
            .collect()
    }
}

/// The first unit in [`EmitUnit::ALL`] order to declare an output owns it.
fn declare_outputs(context: &EmitContext<'_>, documents: &[ParsedDocument]) -> Declarations {
    let mut declarations = Declarations {
        graph: DependencyGraph::new(),
        owners: BTreeMap::new(),
        warnings: Vec::new(),
    };

    for unit in EmitUnit::ALL {
        let graph = unit.declare_outputs(context, documents);
        for output in graph.all_outputs() {
            match declarations.owners.get(&output) {
                Some(owner) => declarations.warnings.push(Warning::DuplicateOutput {
                    path: output,
                    kept: owner.name().to_string(),
                    ignored: unit.name().to_string(),
                }),
                None => {
                    declarations.owners.insert(output, unit);
                }
            }
        }
        tracing::debug!(unit = unit.name(), outputs = graph.all_outputs().len(), "unit declared outputs");
        declarations.graph.merge_from(&graph);
    }

    declarations
}

fn emit_outputs(
    pool: &ParsePool,
    context: &EmitContext<'_>,
    owners: &BTreeMap<String, EmitUnit>,
    affected: &BTreeSet<String>,
    index: &ContentIndex,
    documents: &[ParsedDocument],
) -> Result<Vec<(String, EmitUnit, Vec<u8>)>> {
    let jobs: Vec<(&String, EmitUnit)> = affected
        .iter()
        .filter_map(|output| owners.get(output).map(|unit| (output, *unit)))
        .collect();

    pool.install(|| {
        jobs.par_iter()
            .map(|(output, unit)| -> Result<(String, EmitUnit, Vec<u8>)> {
                let bytes = unit.emit(context, output, index, documents)?;
                Ok(((*output).clone(), *unit, bytes))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::{RSS_OUTPUT, SITEMAP_OUTPUT};
    use crate::error::GroveError;
    use crate::sink::MemorySink;
    use tempfile::TempDir;

    fn source(relative_path: &str, content: &str) -> RawDocument {
        RawDocument {
            file_path: PathBuf::from(format!("content/{}", relative_path)),
            relative_path: relative_path.to_string(),
            content: content.to_string(),
        }
    }

    fn sources() -> Vec<RawDocument> {
        vec![
            source("index.md", "---\ntitle: Home\n---\nWelcome to [[notes/a|the notes]]."),
            source("notes/a.md", "---\ntitle: A\ntags: [rust]\n---\nSee [[notes/b]]."),
            source("notes/b.md", "---\ntitle: B\naliases: [bee]\n---\nPlain."),
            source("notes/c.md", "---\ntitle: C\n---\nUnrelated."),
        ]
    }

    fn builder(cache_dir: &Path) -> Builder {
        Builder::new(BuildConfig::default()).unwrap().cache_dir(cache_dir)
    }

    fn emitted(report: &BuildReport) -> Vec<String> {
        report
            .emitted
            .iter()
            .map(|path| path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_first_build_is_full() {
        let dir = TempDir::new().unwrap();
        let sink = MemorySink::new();

        let report = builder(dir.path()).build(&sources(), &sink).unwrap();

        assert!(report.classification.is_full());
        assert_eq!(report.documents, 4);
        assert_eq!(report.skipped, 0);
        assert_eq!(
            sink.paths(),
            vec![
                "bee.html",
                "index.html",
                "notes/a.html",
                "notes/b.html",
                "notes/c.html",
                "notes/index.html",
                "tags/index.html",
                "tags/rust.html",
            ]
        );
        assert!(sink.get_string("notes/b.html").unwrap().contains(">A</a>"));
        assert!(sink.get_string("notes/a.html").unwrap().contains(r#"<a class="internal" href="../">Home</a>"#));
    }

    #[test]
    fn test_unchanged_rebuild_emits_nothing() {
        let dir = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let builder = builder(dir.path());

        builder.build(&sources(), &sink).unwrap();
        let report = builder.build(&sources(), &sink).unwrap();

        assert_eq!(
            report.classification,
            ChangeClassification::Targeted { changed_files: Vec::new() }
        );
        assert!(report.emitted.is_empty());
        assert_eq!(report.skipped, 8);
        assert_eq!(report.cache.hits, 4);
    }

    #[test]
    fn test_targeted_rebuild_reaches_backlinked_page() {
        let dir = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let builder = builder(dir.path());
        builder.build(&sources(), &sink).unwrap();

        let mut changed = sources();
        changed[1] = source("notes/a.md", "---\ntitle: A Renamed\ntags: [rust]\n---\nSee [[notes/b]].");
        let report = builder.build(&changed, &sink).unwrap();

        assert_eq!(
            report.classification,
            ChangeClassification::Targeted {
                changed_files: vec!["content/notes/a.md".to_string()]
            }
        );
        assert_eq!(
            emitted(&report),
            vec!["notes/a.html", "notes/b.html", "notes/index.html", "tags/index.html", "tags/rust.html"]
        );
        assert!(sink.get_string("notes/b.html").unwrap().contains("A Renamed"));
    }

    #[test]
    fn test_removed_alias_deletes_redirect() {
        let dir = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let builder = builder(dir.path());
        builder.build(&sources(), &sink).unwrap();

        let mut changed = sources();
        changed[2] = source("notes/b.md", "---\ntitle: B\n---\nPlain.");
        let report = builder.build(&changed, &sink).unwrap();

        assert_eq!(report.removed, vec!["bee.html"]);
        assert!(sink.get("bee.html").is_none());
        assert!(emitted(&report).contains(&"notes/b.html".to_string()));
    }

    #[test]
    fn test_config_change_forces_full_build() {
        let dir = TempDir::new().unwrap();
        let sink = MemorySink::new();
        builder(dir.path()).build(&sources(), &sink).unwrap();

        let config = BuildConfig {
            locale: "de-DE".to_string(),
            ..BuildConfig::default()
        };
        let report = Builder::new(config)
            .unwrap()
            .cache_dir(dir.path())
            .build(&sources(), &sink)
            .unwrap();
        assert!(report.classification.is_full());
        assert_eq!(report.emitted.len(), 8);
    }

    #[test]
    fn test_feeds_follow_base_url() {
        let dir = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let config = BuildConfig {
            base_url: Some("https://example.com".to_string()),
            ..BuildConfig::default()
        };

        Builder::new(config)
            .unwrap()
            .cache_dir(dir.path())
            .build(&sources(), &sink)
            .unwrap();
        assert!(sink.get_string(SITEMAP_OUTPUT).unwrap().contains("https://example.com/notes/a"));
        assert!(sink.get_string(RSS_OUTPUT).unwrap().contains("<title>A</title>"));
    }

    #[test]
    fn test_drafts_are_skipped_unless_included() {
        let sink = MemorySink::new();
        let mut drafts = sources();
        drafts.push(source("notes/wip.md", "---\ntitle: WIP\ndraft: true\n---\nSoon."));

        let report = Builder::new(BuildConfig::default())
            .unwrap()
            .build(&drafts, &sink)
            .unwrap();
        assert_eq!(report.documents, 4);
        assert!(sink.get("notes/wip.html").is_none());

        let report = Builder::new(BuildConfig::default())
            .unwrap()
            .include_drafts(true)
            .build(&drafts, &sink)
            .unwrap();
        assert_eq!(report.documents, 5);
        assert!(sink.get("notes/wip.html").is_some());
    }

    #[test]
    fn test_diagnostics_and_warnings_are_reported() {
        let sink = MemorySink::new();
        let mut broken = sources();
        broken.push(source("broken.md", "---\ntitle: [unclosed\n---\n"));
        broken.push(source("shadow.md", "---\naliases: [notes/c]\n---\n"));

        let report = Builder::new(BuildConfig::default())
            .unwrap()
            .build(&broken, &sink)
            .unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].file_path, PathBuf::from("content/broken.md"));
        assert!(report
            .warnings
            .iter()
            .any(|warning| matches!(warning, Warning::AliasShadowsDocument { .. })));
    }

    #[test]
    fn test_duplicate_slug_aborts_without_writing() {
        let dir = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let mut duplicated = sources();
        duplicated.push(RawDocument {
            file_path: PathBuf::from("mirror/notes/a.md"),
            relative_path: "notes/a.md".to_string(),
            content: "duplicate".to_string(),
        });

        let error = builder(dir.path()).build(&duplicated, &sink).unwrap_err();
        assert!(matches!(error, GroveError::DuplicateSlug { .. }));
        assert!(sink.paths().is_empty());
        assert!(cache::load_state(dir.path()).is_none());
    }

    #[test]
    fn test_cancelled_build_writes_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let sink = MemorySink::new();

        let error = Builder::new(BuildConfig::default())
            .unwrap()
            .cancellation_token(token)
            .build(&sources(), &sink)
            .unwrap_err();
        assert!(matches!(error, GroveError::Cancelled));
        assert!(sink.paths().is_empty());
    }

    #[test]
    fn test_build_dir_reads_content_tree() {
        let content = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::create_dir_all(content.path().join("notes")).unwrap();
        std::fs::write(content.path().join("index.md"), "# Home").unwrap();
        std::fs::write(content.path().join("notes/a.md"), "---\ntitle: A\n---\nBody").unwrap();

        let sink = crate::sink::FsSink::new(output.path());
        let report = Builder::new(BuildConfig::default())
            .unwrap()
            .build_dir(content.path(), &sink)
            .unwrap();

        assert_eq!(report.documents, 2);
        assert!(output.path().join("index.html").exists());
        assert!(output.path().join("notes/a.html").exists());
        assert!(output.path().join("notes/index.html").exists());
    }
}
