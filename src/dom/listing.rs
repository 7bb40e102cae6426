use serde::{Deserialize, Serialize};

/// Where the fields of a history listing live in the rendered page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingSelectors {
    /// Element that wraps the list; its presence proves the page has the expected shape
    pub container: Option<String>,

    /// One match per history entry (CSS only)
    pub item: String,

    /// Relative to an item
    pub title: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,

    /// Present when there are no (more) results
    pub no_more: Option<String>,

    /// Link to the next page; its absence ends pagination
    pub next: Option<String>,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            container: Some(".cp-batch-actions-list".to_string()),
            item: ".cp-batch-actions-list-item".to_string(),
            title: Some("h2.cp-title .title-content".to_string()),
            author: Some(".cp-by-author-block .author-link".to_string()),
            status: None,
            no_more: Some(".cp-empty-state, .cp-no-results".to_string()),
            next: Some(".cp-pagination .pagination-item--next a".to_string()),
        }
    }
}

/// Raw fields of one listed entry, as read from the page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListingItem {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    /// Full visible text of the entry; dates are parsed out of it
    #[serde(default)]
    pub text: String,
}

impl ListingItem {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self { title: Some(title.into()), text: text.into(), ..Default::default() }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// One rendered page of history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListingPage {
    /// The page had the expected structure
    pub matched: bool,

    /// The page says nothing follows it
    #[serde(default)]
    pub end_of_results: bool,

    #[serde(default)]
    pub items: Vec<ListingItem>,
}

impl ListingPage {
    pub fn new(items: Vec<ListingItem>) -> Self {
        Self { matched: true, end_of_results: false, items }
    }

    pub fn last(items: Vec<ListingItem>) -> Self {
        Self { matched: true, end_of_results: true, items }
    }

    /// A page whose structure did not match the selectors
    pub fn unmatched() -> Self {
        Self::default()
    }
}
