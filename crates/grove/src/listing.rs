use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::slug::FullSlug;
use crate::types::{DateType, Dates, ParsedDocument};

/// One entry in a tag or folder listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedPage {
    pub slug: FullSlug,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dates: Dates,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub placeholder: bool,
}

impl From<&ParsedDocument> for ListedPage {
    fn from(document: &ParsedDocument) -> Self {
        Self {
            slug: document.slug.clone(),
            title: document.title(),
            description: document.frontmatter.description.clone(),
            dates: document.frontmatter.dates.clone(),
            tags: document.frontmatter.tags.clone(),
            placeholder: document.is_placeholder(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Newest first, undated pages after dated ones, then by title.
    #[default]
    DateThenAlphabetical,
    Alphabetical,
    OldestFirst,
}

impl SortOrder {
    pub fn compare(&self, date_type: DateType, left: &ListedPage, right: &ListedPage) -> Ordering {
        let left_date = left.dates.get(date_type);
        let right_date = right.dates.get(date_type);

        let by_date = match self {
            SortOrder::DateThenAlphabetical => compare_dates(left_date, right_date, true),
            SortOrder::OldestFirst => compare_dates(left_date, right_date, false),
            SortOrder::Alphabetical => Ordering::Equal,
        };

        by_date
            .then_with(|| left.title.to_lowercase().cmp(&right.title.to_lowercase()))
            .then_with(|| left.slug.cmp(&right.slug))
    }

    pub fn sort(&self, date_type: DateType, pages: &mut [ListedPage]) {
        pages.sort_by(|left, right| self.compare(date_type, left, right));
    }
}

fn compare_dates(
    left: Option<DateTime<Utc>>,
    right: Option<DateTime<Utc>>,
    newest_first: bool,
) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) if newest_first => right.cmp(&left),
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::*;

    fn page(slug: &str, title: &str, created: Option<&str>) -> ListedPage {
        let mut document = document(slug).titled(title);
        if let Some(created) = created {
            document = document.created(created);
        }
        ListedPage::from(&document)
    }

    fn titles(pages: &[ListedPage]) -> Vec<&str> {
        pages.iter().map(|page| page.title.as_str()).collect()
    }

    #[test]
    fn test_default_sort_is_newest_first_then_alphabetical() {
        let mut pages = vec![
            page("c", "Charlie", None),
            page("a", "alpha", Some("2023-01-01")),
            page("b", "Bravo", Some("2024-06-01")),
            page("d", "Delta", None),
        ];
        SortOrder::default().sort(DateType::Created, &mut pages);
        assert_eq!(titles(&pages), vec!["Bravo", "alpha", "Charlie", "Delta"]);
    }

    #[test]
    fn test_alphabetical_ignores_dates_and_case() {
        let mut pages = vec![
            page("b", "bravo", Some("2024-06-01")),
            page("a", "Alpha", Some("2020-01-01")),
        ];
        SortOrder::Alphabetical.sort(DateType::Created, &mut pages);
        assert_eq!(titles(&pages), vec!["Alpha", "bravo"]);
    }

    #[test]
    fn test_oldest_first() {
        let mut pages = vec![
            page("b", "Bravo", Some("2024-06-01")),
            page("c", "Charlie", None),
            page("a", "Alpha", Some("2020-01-01")),
        ];
        SortOrder::OldestFirst.sort(DateType::Created, &mut pages);
        assert_eq!(titles(&pages), vec!["Alpha", "Bravo", "Charlie"]);
    }

    #[test]
    fn test_sort_order_from_config_string() {
        let order: SortOrder = serde_json::from_str("\"oldest-first\"").unwrap();
        assert_eq!(order, SortOrder::OldestFirst);
    }
}
