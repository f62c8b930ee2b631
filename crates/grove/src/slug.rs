//! Slug handling.
//!
//! A [`FullSlug`] names a document or output exactly (`notes/index`); a
//! [`SimpleSlug`] is the form links and indices use, with the trailing
//! `index` segment and page extension removed (`notes/`). Neither carries a
//! leading slash. The root simplifies to the empty slug.

use serde::{Deserialize, Serialize};
use std::fmt;

const PAGE_EXTENSIONS: &[&str] = &[".md", ".html"];

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullSlug(String);

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimpleSlug(String);

impl FullSlug {
    pub fn new(slug: impl AsRef<str>) -> Self {
        Self(normalize_segments(slug.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn simplify(&self) -> SimpleSlug {
        simplify(&self.0)
    }

    /// The folder containing this slug, or `None` at the top level.
    pub fn parent(&self) -> Option<&str> {
        self.0.rfind('/').map(|position| &self.0[..position])
    }

    /// Every folder above this slug, nearest first.
    pub fn ancestors(&self) -> Vec<&str> {
        let mut folders = Vec::new();
        let mut current = self.parent();
        while let Some(folder) = current {
            folders.push(folder);
            current = folder.rfind('/').map(|position| &folder[..position]);
        }
        folders
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }
}

impl SimpleSlug {
    pub fn new(slug: impl AsRef<str>) -> Self {
        simplify(slug.as_ref())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The slug without its trailing folder marker.
    pub fn trimmed(&self) -> &str {
        self.0.trim_end_matches('/')
    }
}

impl fmt::Display for FullSlug {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl fmt::Display for SimpleSlug {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for FullSlug {
    fn from(slug: &str) -> Self {
        Self::new(slug)
    }
}

impl From<&str> for SimpleSlug {
    fn from(slug: &str) -> Self {
        Self::new(slug)
    }
}

fn normalize_segments(input: &str) -> String {
    let normalized = input.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn strip_page_extension(slug: &str) -> Option<String> {
    let name_start = slug.rfind('/').map(|position| position + 1).unwrap_or(0);
    let name = &slug[name_start..];
    PAGE_EXTENSIONS.iter().find_map(|extension| {
        name.strip_suffix(extension)
            .filter(|stem| !stem.is_empty())
            .map(|stem| format!("{}{}", &slug[..name_start], stem))
    })
}

/// Removes the trailing `index` segment and page extension until neither
/// remains, so the result is a fixed point.
pub fn simplify(slug: &str) -> SimpleSlug {
    let mut current = normalize_segments(slug);
    let mut is_folder = !current.is_empty() && slug.replace('\\', "/").ends_with('/');

    loop {
        let before = current.len();

        if let Some(stripped) = strip_page_extension(&current) {
            current = stripped;
        }

        if current == "index" {
            current.clear();
            is_folder = false;
        } else if let Some(parent) = current.strip_suffix("/index") {
            current = parent.to_string();
            is_folder = true;
        }

        if current.len() == before {
            break;
        }
    }

    if is_folder && !current.is_empty() {
        SimpleSlug(format!("{}/", current))
    } else {
        SimpleSlug(current)
    }
}

fn sluggify_segment(segment: &str) -> String {
    let mut output = String::with_capacity(segment.len());
    for character in segment.chars() {
        match character {
            '&' => output.push_str("-and-"),
            '%' => output.push_str("-percent"),
            '?' | '#' => {}
            character if character.is_whitespace() => output.push('-'),
            character => output.push(character),
        }
    }
    output
}

/// Turns a content-relative file path into the document's full slug.
pub fn slugify_path(relative_path: &str) -> FullSlug {
    let normalized = normalize_segments(relative_path);
    let mut segments: Vec<String> = normalized.split('/').map(sluggify_segment).collect();

    if let Some(last) = segments.last_mut() {
        let extension = last.rfind('.').map(|position| last[position..].to_string());
        if let Some(extension) = extension
            && PAGE_EXTENSIONS.contains(&extension.as_str())
            && last.len() > extension.len()
        {
            last.truncate(last.len() - extension.len());
        }
        if *last == "_index" {
            *last = "index".to_string();
        }
    }

    FullSlug(segments.join("/").trim_end_matches('/').to_string())
}

pub fn slug_tag(tag: &str) -> String {
    tag.split('/')
        .filter(|segment| !segment.is_empty())
        .map(sluggify_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// `a/b/c` yields `a`, `a/b`, `a/b/c`.
pub fn segment_prefixes(path: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        prefixes.push(current.clone());
    }
    prefixes
}

pub fn path_to_root(slug: &FullSlug) -> String {
    let depth = slug.as_str().split('/').filter(|segment| !segment.is_empty()).count();
    if depth <= 1 {
        ".".to_string()
    } else {
        vec![".."; depth - 1].join("/")
    }
}

/// Relative href from the page at `current` to the page at `target`.
pub fn resolve_relative(current: &FullSlug, target: &FullSlug) -> String {
    href_to(current, &target.simplify())
}

pub fn href_to(current: &FullSlug, target: &SimpleSlug) -> String {
    let root = path_to_root(current);
    if target.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_strips_index_and_extension() {
        assert_eq!(simplify("notes/index").as_str(), "notes/");
        assert_eq!(simplify("index").as_str(), "");
        assert_eq!(simplify("a/b.md").as_str(), "a/b");
        assert_eq!(simplify("a/index.md").as_str(), "a/");
        assert_eq!(simplify("/a/./b").as_str(), "a/b");
    }

    #[test]
    fn test_simplify_only_strips_whole_index_segment() {
        assert_eq!(simplify("notes/myindex").as_str(), "notes/myindex");
        assert_eq!(simplify("reindex").as_str(), "reindex");
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let inputs = [
            "",
            "index",
            "notes/index",
            "notes/",
            "a/b/c",
            "a/index.md",
            "foo.html.md",
            "x/index/index",
            "index/",
            "./a/../b/index.html",
            "Case/Preserved",
            "a/.md",
        ];
        for input in inputs {
            let once = simplify(input);
            let twice = simplify(once.as_str());
            assert_eq!(once, twice, "simplify was not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_simplify_preserves_case() {
        assert_eq!(simplify("Projects/Alpha").as_str(), "Projects/Alpha");
    }

    #[test]
    fn test_slugify_path() {
        assert_eq!(slugify_path("notes/hello world.md").as_str(), "notes/hello-world");
        assert_eq!(slugify_path("a & b.md").as_str(), "a--and--b");
        assert_eq!(slugify_path("100%.md").as_str(), "100-percent");
        assert_eq!(slugify_path("what?#.md").as_str(), "what");
        assert_eq!(slugify_path("docs/_index.md").as_str(), "docs/index");
        assert_eq!(slugify_path("./img/photo.png").as_str(), "img/photo.png");
        assert_eq!(slugify_path("win\\path\\note.md").as_str(), "win/path/note");
    }

    #[test]
    fn test_full_slug_ancestors() {
        let slug = FullSlug::new("projects/alpha/one");
        assert_eq!(slug.parent(), Some("projects/alpha"));
        assert_eq!(slug.ancestors(), vec!["projects/alpha", "projects"]);
        assert!(FullSlug::new("top").ancestors().is_empty());
    }

    #[test]
    fn test_segment_prefixes() {
        assert_eq!(segment_prefixes("a/b/c"), vec!["a", "a/b", "a/b/c"]);
        assert_eq!(segment_prefixes("solo"), vec!["solo"]);
        assert!(segment_prefixes("").is_empty());
    }

    #[test]
    fn test_slug_tag() {
        assert_eq!(slug_tag("rust lang/async io"), "rust-lang/async-io");
        assert_eq!(slug_tag("c#"), "c");
    }

    #[test]
    fn test_resolve_relative() {
        let current = FullSlug::new("notes/deep/page");
        assert_eq!(path_to_root(&current), "../..");
        assert_eq!(
            resolve_relative(&current, &FullSlug::new("other/index")),
            "../../other/"
        );
        assert_eq!(resolve_relative(&FullSlug::new("top"), &FullSlug::new("index")), "./");
        assert_eq!(resolve_relative(&FullSlug::new("top"), &FullSlug::new("b")), "./b");
        assert_eq!(href_to(&FullSlug::new("a/b"), &SimpleSlug::new("notes/index")), "../notes/");
    }
}
