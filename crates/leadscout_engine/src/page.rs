use std::sync::Arc;

use url::Url;

use crate::PageError;

/// How to locate the reveal control inside a contact row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealControl {
    /// A CSS selector resolved inside the row.
    Selector(String),
    /// The first element matching `candidates` whose trimmed, lowercased text
    /// contains one of `labels` (or equals it, for single-word labels).
    Labelled {
        candidates: String,
        labels: Vec<String>,
    },
}

/// One reveal action: click the control in the `row_index`-th match of `row_selector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealTarget {
    pub row_selector: String,
    pub row_index: usize,
    pub control: RevealControl,
}

/// A rendered search-results page the extractor can read and poke.
#[async_trait::async_trait]
pub trait SearchPage: Send + Sync {
    async fn current_url(&self) -> Result<String, PageError>;

    /// Serialized DOM as currently rendered.
    async fn snapshot_html(&self) -> Result<String, PageError>;

    /// Triggers a reveal action. `Ok(false)` when the row or control is absent.
    async fn reveal(&self, target: &RevealTarget) -> Result<bool, PageError>;
}

/// Opens search URLs in a new foreground tab.
#[async_trait::async_trait]
pub trait Navigator: Send + Sync {
    async fn open_tab(&self, url: &Url) -> Result<Arc<dyn SearchPage>, PageError>;
}
