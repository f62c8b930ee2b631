use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use crate::cache::{ParseCache, fingerprint, hash_content};
use crate::config::ParseConfig;
use crate::error::{GroveError, Result};
use crate::parsing::DocumentParser;
use crate::report::{CacheStats, Diagnostic};
use crate::slug::slugify_path;
use crate::types::{ParsedDocument, RawDocument};

const MAX_ATTEMPTS: usize = 2;

/// Cooperative cancellation, checked between build phases and before each
/// parse chunk starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GroveError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub documents: Vec<ParsedDocument>,
    pub diagnostics: Vec<Diagnostic>,
    pub cache: CacheStats,
}

#[derive(Debug, Default)]
struct ChunkOutput {
    documents: Vec<ParsedDocument>,
    diagnostics: Vec<Diagnostic>,
    hits: usize,
    misses: usize,
}

enum ChunkResult {
    Done(ChunkOutput),
    Failed(String),
    Skipped,
}

pub struct ParsePool {
    pool: ThreadPool,
    chunk_size: usize,
}

impl ParsePool {
    pub fn new(config: &ParseConfig) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|index| format!("grove-parse-{}", index))
            .build()
            .map_err(|error| GroveError::ThreadPool {
                message: error.to_string(),
            })?;

        Ok(Self {
            pool,
            chunk_size: config.chunk_size.max(1),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `operation` inside the pool so nested rayon iterators use its
    /// workers.
    pub fn install<R: Send>(&self, operation: impl FnOnce() -> R + Send) -> R {
        self.pool.install(operation)
    }

    /// Parses every source, reusing cached results where the fingerprint
    /// matches. Output order follows input order. A chunk that panics or
    /// fails to write its cache entries is retried once before the whole
    /// parse fails.
    pub fn parse_all(
        &self,
        sources: &[RawDocument],
        parser: &dyn DocumentParser,
        cache: Option<&ParseCache>,
        parser_version: &str,
        token: &CancellationToken,
    ) -> Result<ParseOutcome> {
        let chunks: Vec<&[RawDocument]> = sources.chunks(self.chunk_size).collect();
        let mut outputs: Vec<Option<ChunkOutput>> = (0..chunks.len()).map(|_| None).collect();
        let mut pending: Vec<usize> = (0..chunks.len()).collect();

        for attempt in 1..=MAX_ATTEMPTS {
            if pending.is_empty() {
                break;
            }
            token.check()?;

            let (sender, receiver) = mpsc::channel();
            self.pool.scope(|scope| {
                for &chunk_index in &pending {
                    let sender = sender.clone();
                    let chunk = chunks[chunk_index];
                    scope.spawn(move |_| {
                        let result = if token.is_cancelled() {
                            ChunkResult::Skipped
                        } else {
                            run_chunk(chunk, parser, cache, parser_version)
                        };
                        let _ = sender.send((chunk_index, result));
                    });
                }
            });
            drop(sender);

            let mut failed = Vec::new();
            let mut skipped = false;
            for (chunk_index, result) in receiver {
                match result {
                    ChunkResult::Done(output) => outputs[chunk_index] = Some(output),
                    ChunkResult::Skipped => skipped = true,
                    ChunkResult::Failed(message) => {
                        if attempt == MAX_ATTEMPTS {
                            return Err(GroveError::WorkerFailed {
                                chunk: chunk_index,
                                attempts: attempt,
                                message,
                            });
                        }
                        tracing::warn!(chunk = chunk_index, attempt, %message, "parse chunk failed, retrying");
                        failed.push(chunk_index);
                    }
                }
            }

            if skipped {
                return Err(GroveError::Cancelled);
            }
            failed.sort_unstable();
            pending = failed;
        }

        let mut outcome = ParseOutcome::default();
        for output in outputs.into_iter().flatten() {
            outcome.documents.extend(output.documents);
            outcome.diagnostics.extend(output.diagnostics);
            outcome.cache.hits += output.hits;
            outcome.cache.misses += output.misses;
        }

        tracing::info!(
            documents = outcome.documents.len(),
            diagnostics = outcome.diagnostics.len(),
            cache_hits = outcome.cache.hits,
            cache_misses = outcome.cache.misses,
            threads = self.threads(),
            "parsed sources"
        );
        Ok(outcome)
    }
}

fn run_chunk(
    chunk: &[RawDocument],
    parser: &dyn DocumentParser,
    cache: Option<&ParseCache>,
    parser_version: &str,
) -> ChunkResult {
    match catch_unwind(AssertUnwindSafe(|| parse_chunk(chunk, parser, cache, parser_version))) {
        Ok(Ok(output)) => ChunkResult::Done(output),
        Ok(Err(error)) => ChunkResult::Failed(error.to_string()),
        Err(payload) => ChunkResult::Failed(panic_message(payload.as_ref())),
    }
}

fn parse_chunk(
    chunk: &[RawDocument],
    parser: &dyn DocumentParser,
    cache: Option<&ParseCache>,
    parser_version: &str,
) -> Result<ChunkOutput> {
    let mut output = ChunkOutput::default();

    for source in chunk {
        let key = fingerprint(&source.file_path, &hash_content(&source.content), parser_version);

        if let Some(cached) = cache.and_then(|cache| cache.get(&key)) {
            tracing::debug!(path = %source.file_path.display(), "parse cache hit");
            output.hits += 1;
            output.documents.push(cached);
            continue;
        }

        output.misses += 1;
        match parser.parse(source) {
            Ok(document) => {
                if let Some(cache) = cache {
                    cache.put(&key, &document)?;
                }
                tracing::debug!(path = %source.file_path.display(), "parsed");
                output.documents.push(document);
            }
            Err(error) => {
                let slug = slugify_path(&source.relative_path);
                output.diagnostics.push(Diagnostic {
                    file_path: source.file_path.clone(),
                    slug: (!slug.is_empty()).then_some(slug),
                    message: error.to_string(),
                });
            }
        }
    }

    Ok(output)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}
