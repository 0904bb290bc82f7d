//! Knowledge-base service adapter: search, entity neighborhoods, frequencies,
//! types and labels.
//!
//! The annotators only talk to the KB through [`KbService`]. [`HttpKb`] is the
//! network client, [`StaticKb`] an in-memory KB for fixtures and offline runs.

mod cache;
mod http;
mod static_kb;

pub use cache::KbCache;
pub use http::HttpKb;
pub use static_kb::StaticKb;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A KB item (entity, predicate or literal) with its label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KbItem {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl KbItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// One KB statement: subject, predicate, object, qualifiers...
pub type Fact = Vec<KbItem>;

/// A question word linked to a KB item by the search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disambiguation {
    pub item: KbItem,
    pub question_word: String,
}

/// Result of a KB search: ranked disambiguations plus their local fact neighborhood.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    #[serde(rename = "kb_item_tuple", default)]
    pub disambiguations: Vec<Disambiguation>,
    #[serde(rename = "search_space", default)]
    pub facts: Vec<Fact>,
}

impl SearchSpace {
    /// Ids of all disambiguated items, in rank order.
    pub fn disambiguated_ids(&self) -> Vec<String> {
        self.disambiguations.iter().map(|d| d.item.id.clone()).collect()
    }
}

/// Type of a KB entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbType {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

/// Opaque search parameters forwarded to the KB service.
pub type SearchParams = serde_json::Map<String, serde_json::Value>;

/// Contract of the KB service. All calls are lookups; caching and retries
/// belong to the implementation.
#[allow(async_fn_in_trait)]
pub trait KbService {
    async fn search(&self, text: &str, params: &SearchParams) -> Result<SearchSpace>;

    async fn neighborhood(&self, item_id: &str, max_facts: usize) -> Result<Vec<Fact>>;

    async fn frequency(&self, item_id: &str) -> Result<(u64, u64)>;

    /// Types of the item; empty when unknown.
    async fn types(&self, item_id: &str) -> Result<Vec<KbType>>;

    async fn label(&self, item_id: &str) -> Result<String>;
}

impl<K: KbService> KbService for &K {
    async fn search(&self, text: &str, params: &SearchParams) -> Result<SearchSpace> {
        (**self).search(text, params).await
    }

    async fn neighborhood(&self, item_id: &str, max_facts: usize) -> Result<Vec<Fact>> {
        (**self).neighborhood(item_id, max_facts).await
    }

    async fn frequency(&self, item_id: &str) -> Result<(u64, u64)> {
        (**self).frequency(item_id).await
    }

    async fn types(&self, item_id: &str) -> Result<Vec<KbType>> {
        (**self).types(item_id).await
    }

    async fn label(&self, item_id: &str) -> Result<String> {
        (**self).label(item_id).await
    }
}
