pub mod build;
pub mod cache;
pub mod config;
pub mod emit;
pub mod error;
pub mod folder;
pub mod graph;
pub mod i18n;
pub mod index;
pub mod listing;
pub mod parsing;
pub mod pool;
pub mod render;
pub mod report;
pub mod sink;
pub mod slug;
pub mod types;
pub mod xml;

pub use build::Builder;
pub use cache::{BuildState, ChangeClassification, ParseCache};
pub use config::{BuildConfig, CollisionPolicy, TagCase};
pub use emit::{EmitContext, EmitUnit};
pub use error::{GroveError, IoContext, Result};
pub use folder::{FolderListing, FolderQuery};
pub use graph::DependencyGraph;
pub use index::{AliasMap, Backlink, BacklinkIndex, ContentIndex, TagTaxonomy};
pub use listing::{ListedPage, SortOrder};
pub use parsing::{DocumentParser, MarkdownParser, collect_sources};
pub use pool::{CancellationToken, ParsePool};
pub use render::{Layout, PageData, Renderer, TeraRenderer};
pub use report::{BuildReport, CacheStats, Diagnostic, Warning};
pub use sink::{FsSink, MemorySink, OutputSink};
pub use slug::{FullSlug, SimpleSlug};
pub use types::{DateType, Dates, Frontmatter, MarkupTree, ParsedDocument, RawDocument};
