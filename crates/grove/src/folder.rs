use serde::Serialize;
use std::collections::BTreeMap;

use crate::listing::{ListedPage, SortOrder};
use crate::slug::FullSlug;
use crate::types::{DateType, ParsedDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FolderQuery {
    pub show_subfolders: bool,
    pub sort: SortOrder,
    pub date_type: DateType,
}

impl Default for FolderQuery {
    fn default() -> Self {
        Self {
            show_subfolders: true,
            sort: SortOrder::default(),
            date_type: DateType::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderListing {
    pub folder: String,
    pub pages: Vec<ListedPage>,
}

fn folder_key(slug: &FullSlug) -> String {
    slug.simplify().trimmed().to_string()
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Direct children of `folder`, plus one placeholder per subfolder that has
/// descendants but no index document of its own.
pub fn list_folder(folder: &str, documents: &[ParsedDocument], query: FolderQuery) -> FolderListing {
    let folder = folder.trim_matches('/');
    let folder_depth = segments(folder).len();

    let mut pages: Vec<ListedPage> = Vec::new();
    let mut subfolders: BTreeMap<String, Vec<&ParsedDocument>> = BTreeMap::new();

    for document in documents {
        let key = folder_key(&document.slug);
        let inside = if folder.is_empty() {
            !key.is_empty()
        } else {
            key.strip_prefix(folder)
                .is_some_and(|rest| rest.starts_with('/'))
        };
        if !inside {
            continue;
        }

        let parts = segments(&key);
        if parts.len() == folder_depth + 1 {
            pages.push(ListedPage::from(document));
        } else if query.show_subfolders {
            let subfolder = parts[..=folder_depth].join("/");
            subfolders.entry(subfolder).or_default().push(document);
        }
    }

    for (subfolder, children) in subfolders {
        let has_index = pages
            .iter()
            .any(|page| folder_key(&page.slug) == subfolder);
        if has_index {
            continue;
        }
        pages.push(placeholder(&subfolder, folder_depth, &children, query));
    }

    query.sort.sort(query.date_type, &mut pages);

    FolderListing {
        folder: folder.to_string(),
        pages,
    }
}

fn placeholder(
    subfolder: &str,
    folder_depth: usize,
    children: &[&ParsedDocument],
    query: FolderQuery,
) -> ListedPage {
    let mut sorted: Vec<ListedPage> = children.iter().map(|child| ListedPage::from(*child)).collect();
    query.sort.sort(query.date_type, &mut sorted);
    let dates = sorted.first().map(|page| page.dates.clone()).unwrap_or_default();

    let title = children
        .first()
        .and_then(|child| segments(&child.relative_path).get(folder_depth).map(|name| name.to_string()))
        .or_else(|| subfolder.rsplit('/').next().map(str::to_string))
        .unwrap_or_default();

    ListedPage {
        slug: FullSlug::new(format!("{}/index", subfolder)),
        title,
        description: None,
        dates,
        tags: vec!["folder".to_string()],
        placeholder: true,
    }
}
