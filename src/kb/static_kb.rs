use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::{Fact, KbItem, KbService, KbType, SearchParams, SearchSpace};
use crate::error::{ConvflowError, Result};

/// In-memory KB backed by fixed lookup tables.
///
/// Loadable from a JSON dump for offline runs; unknown lookups fall back to an
/// empty search space, no neighborhood, `(0, 0)` frequency, no types and the
/// id as label. Every call is recorded so callers can inspect KB traffic.
#[derive(Debug, Default, Deserialize)]
pub struct StaticKb {
    #[serde(default)]
    searches: HashMap<String, SearchSpace>,
    #[serde(default)]
    neighborhoods: HashMap<String, Vec<Fact>>,
    #[serde(default)]
    frequencies: HashMap<String, (u64, u64)>,
    #[serde(default)]
    types: HashMap<String, Vec<KbType>>,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(skip)]
    requests: Mutex<Vec<(&'static str, String)>>,
}

impl StaticKb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            ConvflowError::Parse(format!("KB fixture parse error in {}: {}", path.display(), e))
        })
    }

    /// Register the search result for `text`; disambiguations are
    /// `(item_id, label, question_word)`.
    pub fn with_search(
        mut self,
        text: &str,
        disambiguations: &[(&str, &str, &str)],
        facts: Vec<Fact>,
    ) -> Self {
        let disambiguations = disambiguations
            .iter()
            .map(|(id, label, word)| super::Disambiguation {
                item: KbItem::new(*id, *label),
                question_word: word.to_string(),
            })
            .collect();
        self.searches.insert(
            text.to_string(),
            SearchSpace {
                disambiguations,
                facts,
            },
        );
        self
    }

    pub fn with_neighborhood(mut self, item_id: &str, facts: Vec<Fact>) -> Self {
        self.neighborhoods.insert(item_id.to_string(), facts);
        self
    }

    pub fn with_frequency(mut self, item_id: &str, freq1: u64, freq2: u64) -> Self {
        self.frequencies.insert(item_id.to_string(), (freq1, freq2));
        self
    }

    pub fn with_types(mut self, item_id: &str, types: Vec<KbType>) -> Self {
        self.types.insert(item_id.to_string(), types);
        self
    }

    pub fn with_label(mut self, item_id: &str, label: &str) -> Self {
        self.labels.insert(item_id.to_string(), label.to_string());
        self
    }

    /// Number of calls of one kind (`search`, `neighborhood`, `frequency`, `types`, `label`).
    pub fn request_count(&self, kind: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Items whose neighborhood was requested, in call order.
    pub fn neighborhood_requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == "neighborhood")
            .map(|(_, item)| item.clone())
            .collect()
    }

    fn record(&self, kind: &'static str, item: &str) {
        self.requests.lock().unwrap().push((kind, item.to_string()));
    }
}

impl KbService for StaticKb {
    async fn search(&self, text: &str, _params: &SearchParams) -> Result<SearchSpace> {
        self.record("search", text);
        Ok(self.searches.get(text).cloned().unwrap_or_default())
    }

    async fn neighborhood(&self, item_id: &str, max_facts: usize) -> Result<Vec<Fact>> {
        self.record("neighborhood", item_id);
        Ok(self
            .neighborhoods
            .get(item_id)
            .map(|facts| facts.iter().take(max_facts).cloned().collect())
            .unwrap_or_default())
    }

    async fn frequency(&self, item_id: &str) -> Result<(u64, u64)> {
        self.record("frequency", item_id);
        Ok(self.frequencies.get(item_id).copied().unwrap_or((0, 0)))
    }

    async fn types(&self, item_id: &str) -> Result<Vec<KbType>> {
        self.record("types", item_id);
        Ok(self.types.get(item_id).cloned().unwrap_or_default())
    }

    async fn label(&self, item_id: &str) -> Result<String> {
        self.record("label", item_id);
        Ok(self
            .labels
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| item_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_static_kb_defaults() {
        let kb = StaticKb::new();
        let params = SearchParams::new();
        assert!(kb.search("anything", &params).await.unwrap().facts.is_empty());
        assert!(kb.neighborhood("Q1", 10).await.unwrap().is_empty());
        assert_eq!(kb.frequency("Q1").await.unwrap(), (0, 0));
        assert_eq!(kb.label("Q1").await.unwrap(), "Q1");
        assert_eq!(kb.request_count("search"), 1);
    }

    #[tokio::test]
    async fn test_static_kb_neighborhood_bound() {
        let fact = vec![KbItem::new("Q1", "a"), KbItem::new("P1", "p"), KbItem::new("Q2", "b")];
        let kb = StaticKb::new().with_neighborhood("Q1", vec![fact.clone(), fact.clone(), fact]);
        assert_eq!(kb.neighborhood("Q1", 2).await.unwrap().len(), 2);
        assert_eq!(kb.neighborhood_requests(), vec!["Q1".to_string()]);
    }

    #[tokio::test]
    async fn test_static_kb_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "searches": {{
                    "Who directed Inception?": {{
                        "kb_item_tuple": [{{"item": {{"id": "Q25188", "label": "Inception"}}, "question_word": "Inception"}}],
                        "search_space": [[{{"id": "Q25188", "label": "Inception"}}, {{"id": "P57", "label": "director"}}, {{"id": "Q25191", "label": "Christopher Nolan"}}]]
                    }}
                }},
                "frequencies": {{"Q25188": [120, 30]}},
                "labels": {{"Q25191": "Christopher Nolan"}}
            }}"#
        )
        .unwrap();

        let kb = StaticKb::from_json_file(file.path()).unwrap();
        let result = kb
            .search("Who directed Inception?", &SearchParams::new())
            .await
            .unwrap();
        assert_eq!(result.disambiguated_ids(), vec!["Q25188".to_string()]);
        assert_eq!(result.facts[0][2].id, "Q25191");
        assert_eq!(kb.frequency("Q25188").await.unwrap(), (120, 30));
        assert_eq!(kb.label("Q25191").await.unwrap(), "Christopher Nolan");
    }

    #[test]
    fn test_static_kb_bad_fixture() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[1, 2").unwrap();
        let err = StaticKb::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ConvflowError::Parse(_)));
    }
}
