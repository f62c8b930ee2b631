use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{GroveError, IoContext, Result};
use crate::slug::{FullSlug, SimpleSlug, resolve_relative, slugify_path};
use crate::types::{Dates, Frontmatter, MarkupTree, ParsedDocument, RawDocument};

/// Turns a raw document into its parsed form. Implementations must be pure:
/// the same input and version always produce the same output.
pub trait DocumentParser: Send + Sync {
    /// Part of every cache fingerprint; bump it when output changes.
    fn version(&self) -> &str;

    fn parse(&self, document: &RawDocument) -> Result<ParsedDocument>;
}

/// Markdown with YAML (`---`) or TOML (`+++`) frontmatter, markdown links and
/// `[[wikilinks]]`.
#[derive(Debug, Clone)]
pub struct MarkdownParser {
    version: String,
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownParser {
    pub fn new() -> Self {
        Self {
            version: format!("markdown-{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DocumentParser for MarkdownParser {
    fn version(&self) -> &str {
        &self.version
    }

    fn parse(&self, document: &RawDocument) -> Result<ParsedDocument> {
        let slug = slugify_path(&document.relative_path);
        if slug.is_empty() {
            return Err(GroveError::MissingField {
                field: "slug".to_string(),
                path: document.file_path.clone(),
            });
        }

        let (raw, body) = extract_frontmatter(&document.content, &document.file_path)?;
        let frontmatter = build_frontmatter(raw, &document.file_path)?;
        let (html, links) = render_markdown(&body, &slug);

        Ok(ParsedDocument {
            slug,
            file_path: document.file_path.clone(),
            relative_path: document.relative_path.replace('\\', "/"),
            frontmatter,
            links,
            markup_tree: MarkupTree::from_html(html),
        })
    }
}

pub fn extract_frontmatter(content: &str, path: &Path) -> Result<(BTreeMap<String, Value>, String)> {
    let content = content.replace("\r\n", "\n");
    let content = content.trim_start();

    if content.starts_with("+++") {
        parse_toml_frontmatter(content, path)
    } else if content.starts_with("---") {
        parse_yaml_frontmatter(content, path)
    } else {
        Ok((BTreeMap::new(), content.to_string()))
    }
}

fn parse_toml_frontmatter(content: &str, path: &Path) -> Result<(BTreeMap<String, Value>, String)> {
    let rest = &content[3..];

    let (end_index, body_start) =
        find_closing_delimiter(rest, "+++").ok_or_else(|| GroveError::InvalidFrontmatter {
            path: path.to_path_buf(),
        })?;

    let frontmatter_str = &rest[..end_index];
    let body = &rest[body_start..];

    let raw: BTreeMap<String, Value> =
        toml::from_str(frontmatter_str).map_err(|error| GroveError::TomlParse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;

    Ok((raw, body.trim().to_string()))
}

fn parse_yaml_frontmatter(content: &str, path: &Path) -> Result<(BTreeMap<String, Value>, String)> {
    let rest = &content[3..];

    let (end_index, body_start) =
        find_closing_delimiter(rest, "---").ok_or_else(|| GroveError::InvalidFrontmatter {
            path: path.to_path_buf(),
        })?;

    let frontmatter_str = &rest[..end_index];
    let body = &rest[body_start..];

    if frontmatter_str.trim().is_empty() {
        return Ok((BTreeMap::new(), body.trim().to_string()));
    }

    let raw: BTreeMap<String, Value> =
        serde_yml::from_str(frontmatter_str).map_err(|error| GroveError::YamlParse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;

    Ok((raw, body.trim().to_string()))
}

/// Byte offsets of the start of the closing line and of the first byte
/// after it. The line may be indented.
fn find_closing_delimiter(content: &str, delimiter: &str) -> Option<(usize, usize)> {
    let mut position = 0;

    for line in content.lines() {
        if position > 0 && line.trim() == delimiter {
            return Some((position, position + line.len()));
        }
        position += line.len() + 1;
    }

    None
}

fn take_first(raw: &mut BTreeMap<String, Value>, keys: &[&str]) -> Option<Value> {
    let mut found = None;
    for key in keys {
        if let Some(value) = raw.remove(*key)
            && found.is_none()
            && !value.is_null()
        {
            found = Some(value);
        }
    }
    found
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        // TOML datetimes arrive wrapped in a single-key table.
        Value::Object(map) if map.len() == 1 => map.values().next().and_then(value_to_string),
        _ => None,
    }
}

/// Accepts a list or a comma-separated string.
fn coerce_to_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(value_to_string)
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        Some(value) => value_to_string(&value)
            .map(|text| {
                text.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

fn parse_date(value: &Value, key: &str, path: &Path) -> Option<DateTime<Utc>> {
    let text = value_to_string(value)?;
    let text = text.trim();

    let parsed = DateTime::parse_from_rfc3339(text)
        .map(|date| date.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        });

    if parsed.is_none() {
        tracing::warn!(path = %path.display(), key, value = text, "ignoring unparseable date");
    }
    parsed
}

fn take_date(raw: &mut BTreeMap<String, Value>, keys: &[&str], path: &Path) -> Option<DateTime<Utc>> {
    let mut found = None;
    for key in keys {
        if let Some(value) = raw.get(*key)
            && found.is_none()
        {
            found = parse_date(value, key, path);
        }
    }
    found
}

fn build_frontmatter(mut raw: BTreeMap<String, Value>, path: &Path) -> Result<Frontmatter> {
    let title = match take_first(&mut raw, &["title"]) {
        None => None,
        Some(value) => Some(value_to_string(&value).ok_or_else(|| GroveError::InvalidFrontmatter {
            path: path.to_path_buf(),
        })?),
    };
    let description = take_first(&mut raw, &["description"]).and_then(|value| value_to_string(&value));

    let dates = Dates {
        created: take_date(&mut raw, &["created", "date"], path),
        modified: take_date(&mut raw, &["modified", "lastmod", "updated", "last-modified"], path),
        published: take_date(&mut raw, &["published", "publishDate", "date"], path),
    };
    for key in [
        "created",
        "date",
        "modified",
        "lastmod",
        "updated",
        "last-modified",
        "published",
        "publishDate",
    ] {
        raw.remove(key);
    }

    let draft = match take_first(&mut raw, &["draft"]) {
        Some(Value::Bool(flag)) => flag,
        Some(value) => value_to_string(&value).is_some_and(|text| text == "true"),
        None => false,
    };

    Ok(Frontmatter {
        title: title.filter(|title| !title.trim().is_empty()),
        description,
        tags: coerce_to_list(take_first(&mut raw, &["tags", "tag"])),
        aliases: coerce_to_list(take_first(&mut raw, &["aliases", "alias"])),
        css_classes: coerce_to_list(take_first(&mut raw, &["cssclasses", "cssclass"])),
        dates,
        draft,
        extra: raw,
    })
}

fn is_external(destination: &str) -> bool {
    destination.contains("://")
        || destination.starts_with("mailto:")
        || destination.starts_with("tel:")
        || destination.starts_with("data:")
}

/// Resolves a link destination against the folder of `current`. A leading
/// `/` makes it root-relative.
fn resolve_link(current: &FullSlug, destination: &str) -> Option<(FullSlug, String)> {
    if destination.is_empty() || destination.starts_with('#') || is_external(destination) {
        return None;
    }

    let (path, anchor) = match destination.find(['#', '?']) {
        Some(position) => (&destination[..position], &destination[position..]),
        None => (destination, ""),
    };
    let anchor = if anchor.starts_with('#') { anchor } else { "" };

    let joined = match path.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => match current.parent() {
            Some(folder) => format!("{}/{}", folder, path),
            None => path.to_string(),
        },
    };

    let mut target = slugify_path(&joined);
    if path.ends_with('/') && !target.is_empty() {
        target = FullSlug::new(format!("{}/index", target));
    }
    Some((target, anchor.to_string()))
}

/// Rewrites `[[target#anchor|label]]` into a root-relative markdown link.
/// Fenced code blocks are left untouched.
fn expand_wikilinks(body: &str) -> String {
    let mut output = String::with_capacity(body.len());
    let mut in_fence = false;

    for line in body.split_inclusive('\n') {
        if line.trim_start().starts_with("```") || line.trim_start().starts_with("~~~") {
            in_fence = !in_fence;
        }
        if in_fence || !line.contains("[[") {
            output.push_str(line);
            continue;
        }

        let mut rest = line;
        while let Some(start) = rest.find("[[") {
            let Some(length) = rest[start + 2..].find("]]") else {
                break;
            };
            let inner = &rest[start + 2..start + 2 + length];
            output.push_str(&rest[..start]);

            let (target, label) = match inner.split_once('|') {
                Some((target, label)) => (target.trim(), label.trim()),
                None => (inner.trim(), inner.trim()),
            };
            let label = label.split('#').next().unwrap_or(label);
            output.push_str(&format!("[{}](</{}>)", label, target));

            rest = &rest[start + 2 + length + 2..];
        }
        output.push_str(rest);
    }

    output
}

/// Renders the body and collects every internal link target, in order of
/// first appearance.
fn render_markdown(body: &str, slug: &FullSlug) -> (String, Vec<SimpleSlug>) {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let expanded = expand_wikilinks(body);
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let events = Parser::new_ext(&expanded, options).map(|event| match event {
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => {
            let dest_url = match resolve_link(slug, &dest_url) {
                Some((target, anchor)) => {
                    let simple = target.simplify();
                    if seen.insert(simple.clone()) {
                        links.push(simple);
                    }
                    CowStr::from(format!("{}{}", resolve_relative(slug, &target), anchor))
                }
                None => dest_url,
            };
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            })
        }
        other => other,
    });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, events);
    (html_output, links)
}

/// Every markdown file under `content_dir`, in path order. Hidden files and
/// folders are skipped.
pub fn collect_sources(content_dir: &Path) -> Result<Vec<RawDocument>> {
    let mut documents = Vec::new();

    let walker = WalkDir::new(content_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    for entry in walker {
        let entry = entry.map_err(|error| GroveError::WalkDir {
            path: content_dir.to_path_buf(),
            message: error.to_string(),
        })?;

        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|extension| extension.to_str()) != Some("md")
        {
            continue;
        }

        let content = std::fs::read_to_string(path).io_context("reading", path)?;
        let relative_path = path
            .strip_prefix(content_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        documents.push(RawDocument {
            file_path: path.to_path_buf(),
            relative_path,
            content,
        });
    }

    tracing::debug!(directory = %content_dir.display(), count = documents.len(), "collected sources");
    Ok(documents)
}
