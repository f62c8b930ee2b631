//! Derived, read-only indices built once per build.
//!
//! [`ContentIndex::build`] runs a single pass over the full document set:
//! aliases first, then backlinks resolved through them, then the tag
//! taxonomy. Folder listings are computed on demand and cached inside the
//! index, so a fresh build always starts with an empty folder cache.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::config::{BuildConfig, CollisionPolicy, TagCase};
use crate::error::{GroveError, Result};
use crate::folder::{FolderListing, FolderQuery, list_folder};
use crate::report::Warning;
use crate::slug::{FullSlug, SimpleSlug, segment_prefixes, slugify_path};
use crate::types::ParsedDocument;

/// Key of the aggregate entry grouping every tagged document.
pub const ROOT_TAG: &str = "index";

/// A document's aliases as simple slugs, minus empty ones and its own slug.
pub fn declared_aliases(document: &ParsedDocument) -> Vec<SimpleSlug> {
    let canonical = document.slug.simplify();
    let mut aliases: Vec<SimpleSlug> = Vec::new();
    for raw_alias in &document.frontmatter.aliases {
        let alias = slugify_path(raw_alias).simplify();
        if !alias.is_empty() && alias != canonical && !aliases.contains(&alias) {
            aliases.push(alias);
        }
    }
    aliases
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AliasMap {
    targets: HashMap<SimpleSlug, SimpleSlug>,
}

impl AliasMap {
    /// Aliases naming a real document are dropped, so every target is a
    /// document slug and never another alias.
    pub fn build(documents: &[ParsedDocument], policy: CollisionPolicy) -> (Self, Vec<Warning>) {
        let document_slugs: HashSet<SimpleSlug> = documents
            .iter()
            .map(|document| document.slug.simplify())
            .collect();

        let mut targets: HashMap<SimpleSlug, SimpleSlug> = HashMap::new();
        let mut warnings = Vec::new();

        for document in documents {
            let canonical = document.slug.simplify();

            for alias in declared_aliases(document) {
                if document_slugs.contains(&alias) {
                    warnings.push(Warning::AliasShadowsDocument {
                        alias,
                        declared_by: document.slug.clone(),
                    });
                    continue;
                }

                match targets.get(&alias) {
                    None => {
                        targets.insert(alias, canonical.clone());
                    }
                    Some(existing) if *existing == canonical => {}
                    Some(existing) => {
                        let existing = existing.clone();
                        match policy {
                            CollisionPolicy::FirstWins => {
                                warnings.push(Warning::AliasCollision {
                                    alias,
                                    kept: existing,
                                    ignored: canonical.clone(),
                                });
                            }
                            CollisionPolicy::LastWins => {
                                warnings.push(Warning::AliasCollision {
                                    alias: alias.clone(),
                                    kept: canonical.clone(),
                                    ignored: existing,
                                });
                                targets.insert(alias, canonical.clone());
                            }
                        }
                    }
                }
            }
        }

        (Self { targets }, warnings)
    }

    /// Single lookup; unknown slugs pass through unchanged.
    pub fn resolve(&self, link: &SimpleSlug) -> SimpleSlug {
        self.targets.get(link).cloned().unwrap_or_else(|| link.clone())
    }

    pub fn get(&self, alias: &SimpleSlug) -> Option<&SimpleSlug> {
        self.targets.get(alias)
    }

    /// Alias and target pairs in alias order.
    pub fn iter(&self) -> impl Iterator<Item = (&SimpleSlug, &SimpleSlug)> {
        let mut pairs: Vec<(&SimpleSlug, &SimpleSlug)> = self.targets.iter().collect();
        pairs.sort();
        pairs.into_iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backlink {
    pub slug: FullSlug,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BacklinkIndex {
    entries: HashMap<SimpleSlug, Vec<Backlink>>,
}

impl BacklinkIndex {
    /// Referrers keep document iteration order; each appears once per target.
    pub fn build(documents: &[ParsedDocument], aliases: &AliasMap) -> Self {
        let mut entries: HashMap<SimpleSlug, Vec<Backlink>> = HashMap::new();

        for document in documents {
            let mut seen = HashSet::new();
            for link in &document.links {
                let target = aliases.resolve(link);
                if !seen.insert(target.clone()) {
                    continue;
                }
                entries.entry(target).or_default().push(Backlink {
                    slug: document.slug.clone(),
                    title: document.title(),
                });
            }
        }

        Self { entries }
    }

    pub fn get(&self, target: &SimpleSlug) -> &[Backlink] {
        self.entries
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn normalize_tag(tag: &str, case: TagCase) -> Option<String> {
    let joined = tag
        .trim()
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        return None;
    }
    Some(match case {
        TagCase::Lowercase => joined.to_lowercase(),
        TagCase::Preserve => joined,
    })
}

/// Declared tags after normalization, first occurrence kept.
pub fn declared_tags(document: &ParsedDocument, case: TagCase) -> (Vec<String>, Vec<String>) {
    let mut declared = Vec::new();
    let mut duplicates = Vec::new();
    let mut seen = HashSet::new();
    for tag in &document.frontmatter.tags {
        let Some(normalized) = normalize_tag(tag, case) else {
            continue;
        };
        if seen.insert(normalized.clone()) {
            declared.push(normalized);
        } else {
            duplicates.push(normalized);
        }
    }
    (declared, duplicates)
}

/// Every tag path a document contributes to, prefixes included, in first
/// appearance order.
pub fn expanded_tags(document: &ParsedDocument, case: TagCase) -> Vec<String> {
    let (declared, _) = declared_tags(document, case);
    let mut seen = HashSet::new();
    let mut expanded = Vec::new();
    for tag in &declared {
        for prefix in segment_prefixes(tag) {
            if seen.insert(prefix.clone()) {
                expanded.push(prefix);
            }
        }
    }
    expanded
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TagTaxonomy {
    tags: BTreeMap<String, Vec<FullSlug>>,
    root: Vec<FullSlug>,
}

impl TagTaxonomy {
    pub fn build(documents: &[ParsedDocument], case: TagCase) -> (Self, Vec<Warning>) {
        let mut tags: BTreeMap<String, Vec<FullSlug>> = BTreeMap::new();
        let mut root = Vec::new();
        let mut warnings = Vec::new();

        for document in documents {
            let (_, duplicates) = declared_tags(document, case);
            for tag in duplicates {
                warnings.push(Warning::DuplicateTag {
                    slug: document.slug.clone(),
                    tag,
                });
            }

            let expanded = expanded_tags(document, case);
            if expanded.is_empty() {
                continue;
            }
            root.push(document.slug.clone());
            for tag in expanded {
                tags.entry(tag).or_default().push(document.slug.clone());
            }
        }

        (Self { tags, root }, warnings)
    }

    /// Documents carrying `tag` or one of its descendants. [`ROOT_TAG`]
    /// returns every tagged document.
    pub fn members(&self, tag: &str) -> &[FullSlug] {
        if tag == ROOT_TAG {
            return &self.root;
        }
        self.tags.get(tag).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, tag: &str) -> bool {
        (tag == ROOT_TAG && !self.root.is_empty()) || self.tags.contains_key(tag)
    }

    /// Tag paths in sorted order, root aggregate excluded.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn root(&self) -> &[FullSlug] {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

#[derive(Debug, Default)]
struct FolderCache {
    listings: RwLock<HashMap<(String, FolderQuery), Arc<FolderListing>>>,
}

#[derive(Debug)]
pub struct ContentIndex {
    positions: HashMap<FullSlug, usize>,
    aliases: AliasMap,
    backlinks: BacklinkIndex,
    tags: TagTaxonomy,
    folders: FolderCache,
}

impl ContentIndex {
    /// Fails on documents without a slug or source path, and on duplicate
    /// slugs, since either would corrupt every downstream index.
    pub fn build(
        documents: &[ParsedDocument],
        config: &BuildConfig,
    ) -> Result<(Self, Vec<Warning>)> {
        let positions = validate(documents)?;

        let (aliases, mut warnings) = AliasMap::build(documents, config.aliases.collision);
        let backlinks = BacklinkIndex::build(documents, &aliases);
        let (tags, tag_warnings) = TagTaxonomy::build(documents, config.tags.case);
        warnings.extend(tag_warnings);

        tracing::debug!(
            documents = documents.len(),
            aliases = aliases.len(),
            link_targets = backlinks.len(),
            tagged = tags.root().len(),
            "built content index"
        );

        Ok((
            Self {
                positions,
                aliases,
                backlinks,
                tags,
                folders: FolderCache::default(),
            },
            warnings,
        ))
    }

    /// Looks a slug up in the document set the index was built from.
    pub fn document<'d>(
        &self,
        documents: &'d [ParsedDocument],
        slug: &FullSlug,
    ) -> Option<&'d ParsedDocument> {
        self.positions
            .get(slug)
            .and_then(|position| documents.get(*position))
            .filter(|document| document.slug == *slug)
    }

    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    pub fn backlinks(&self) -> &BacklinkIndex {
        &self.backlinks
    }

    pub fn backlinks_for(&self, slug: &FullSlug) -> &[Backlink] {
        self.backlinks.get(&slug.simplify())
    }

    pub fn tags(&self) -> &TagTaxonomy {
        &self.tags
    }

    /// `documents` must be the set this index was built from.
    pub fn folder_listing(
        &self,
        folder: &str,
        documents: &[ParsedDocument],
        query: FolderQuery,
    ) -> Arc<FolderListing> {
        let key = (folder.to_string(), query);

        if let Some(listing) = self
            .folders
            .listings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return Arc::clone(listing);
        }

        let listing = Arc::new(list_folder(folder, documents, query));
        let mut listings = self
            .folders
            .listings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(listings.entry(key).or_insert(listing))
    }

    pub fn cached_folder_count(&self) -> usize {
        self.folders
            .listings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn validate(documents: &[ParsedDocument]) -> Result<HashMap<FullSlug, usize>> {
    let mut positions: HashMap<FullSlug, usize> = HashMap::new();
    for (position, document) in documents.iter().enumerate() {
        if document.slug.is_empty() {
            return Err(GroveError::MissingField {
                field: "slug".to_string(),
                path: document.file_path.clone(),
            });
        }
        if document.file_path.as_os_str().is_empty() {
            return Err(GroveError::MissingField {
                field: "file_path".to_string(),
                path: PathBuf::from(document.slug.as_str()),
            });
        }
        if let Some(existing) = positions.insert(document.slug.clone(), position) {
            return Err(GroveError::DuplicateSlug {
                slug: document.slug.to_string(),
                path: document.file_path.clone(),
                existing_path: documents[existing].file_path.clone(),
            });
        }
    }
    Ok(positions)
}
