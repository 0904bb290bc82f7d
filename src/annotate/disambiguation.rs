//! Disambiguation triples: which question words led the KB to an answering
//! fact, the validity filter on those items, and the entity/common/context
//! partition of surface forms.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::matcher;
use crate::kb::{Disambiguation, Fact, KbCache, KbItem, KbService};
use crate::literals::is_entity;
use crate::Result;

/// Items at least this frequent in the KB are too common to explain an answer.
pub const FREQUENCY_THRESHOLD: u64 = 100_000;

/// KB type id of "country".
pub const COUNTRY_TYPE: &str = "Q6256";

/// `(item_id, surface_forms, label)`: a KB item and the question words it was
/// disambiguated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisambiguationTriple {
    pub item_id: String,
    pub surface_forms: Vec<String>,
    pub label: String,
}

impl DisambiguationTriple {
    pub fn new(item_id: impl Into<String>, surface_forms: Vec<String>, label: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            surface_forms,
            label: label.into(),
        }
    }

    /// Back into KB search format, one record per triple with its first surface form.
    pub fn to_disambiguation(&self) -> Option<Disambiguation> {
        self.surface_forms.first().map(|word| Disambiguation {
            item: KbItem::new(self.item_id.clone(), self.label.clone()),
            question_word: word.clone(),
        })
    }
}

/// Facts that contain a gold answer.
///
/// Empty when a gold answer is itself among `disambiguated_ids`: the question
/// names its own answer, so any path found would be spurious.
pub fn extract_answering_facts(
    facts: &[Fact],
    gold_answers: &[String],
    disambiguated_ids: &[String],
) -> Vec<Fact> {
    if gold_answers
        .iter()
        .any(|answer| disambiguated_ids.contains(answer))
    {
        return Vec::new();
    }
    matcher::answering_facts(facts, gold_answers)
}

/// Decides whether a KB item may fill an entity slot.
pub struct ItemFilter<'a, K> {
    kb: &'a K,
    cache: &'a KbCache,
}

impl<'a, K: KbService> ItemFilter<'a, K> {
    pub fn new(kb: &'a K, cache: &'a KbCache) -> Self {
        Self { kb, cache }
    }

    /// Predicates, countries and items with a KB frequency of
    /// [`FREQUENCY_THRESHOLD`] or more are rejected.
    pub async fn is_valid(&self, item_id: &str) -> Result<bool> {
        if item_id.starts_with('P') {
            return Ok(false);
        }
        if self.is_country(item_id).await? {
            return Ok(false);
        }
        let frequency = self.cache.frequency(self.kb, item_id).await?;
        Ok(frequency < FREQUENCY_THRESHOLD)
    }

    pub async fn is_country(&self, item_id: &str) -> Result<bool> {
        if !item_id.starts_with('Q') {
            return Ok(false);
        }
        let types = self.cache.types(self.kb, item_id).await?;
        Ok(types.iter().any(|t| t.id == COUNTRY_TYPE))
    }
}

/// The disambiguated items that appear in an answering fact, i.e. the items
/// whose lookup brought that fact into the search space.
///
/// Items that are themselves gold answers are never returned. Surface forms of
/// the same item accumulate in first-seen order.
pub async fn answer_connecting_disambiguations<K: KbService>(
    disambiguations: &[Disambiguation],
    answering_facts: &[Fact],
    gold_answers: &[String],
    filter: &ItemFilter<'_, K>,
) -> Result<Vec<DisambiguationTriple>> {
    let mut inverse: IndexMap<&str, (IndexSet<&str>, &str)> = IndexMap::new();
    for disambiguation in disambiguations {
        let item_id = disambiguation.item.id.as_str();
        if gold_answers.iter().any(|answer| answer == item_id) {
            continue;
        }
        let entry = inverse
            .entry(item_id)
            .or_insert_with(|| (IndexSet::new(), ""));
        entry.0.insert(disambiguation.question_word.as_str());
        entry.1 = disambiguation.item.label.as_str();
    }

    let mut triples: Vec<DisambiguationTriple> = Vec::new();
    for fact in answering_facts {
        for item in fact {
            let Some((surface_forms, label)) = inverse.get(item.id.as_str()) else {
                continue;
            };
            if triples.iter().any(|t| t.item_id == item.id) {
                continue;
            }
            if !filter.is_valid(&item.id).await? {
                continue;
            }
            triples.push(DisambiguationTriple::new(
                item.id.clone(),
                surface_forms.iter().map(|s| s.to_string()).collect(),
                *label,
            ));
        }
    }
    Ok(triples)
}

/// Surface forms of a question node split by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Mentioned in the current question only.
    pub entities: Vec<String>,
    /// Mentioned implicitly in history and explicitly in the current question.
    pub common: Vec<String>,
    /// Coming from history only.
    pub context: Vec<String>,
}

/// Partition context and current disambiguations into entity, common and
/// context surface forms. An item in both lists lands in `common` only.
pub fn partition(
    context_triples: &[DisambiguationTriple],
    current_triples: &[DisambiguationTriple],
) -> Partition {
    let question_item_ids: IndexSet<&str> = current_triples
        .iter()
        .map(|t| t.item_id.as_str())
        .collect();

    let mut common_items: IndexSet<&str> = IndexSet::new();
    let mut common: IndexSet<&str> = IndexSet::new();
    let mut context: IndexSet<&str> = IndexSet::new();
    for triple in context_triples {
        if question_item_ids.contains(triple.item_id.as_str()) {
            common.extend(triple.surface_forms.iter().map(String::as_str));
            common_items.insert(triple.item_id.as_str());
        } else {
            context.extend(triple.surface_forms.iter().map(String::as_str));
        }
    }

    let mut entities: IndexSet<&str> = IndexSet::new();
    for triple in current_triples {
        if !common_items.contains(triple.item_id.as_str()) {
            entities.extend(triple.surface_forms.iter().map(String::as_str));
        }
    }

    let owned = |set: IndexSet<&str>| set.into_iter().map(str::to_string).collect();
    Partition {
        entities: owned(entities),
        common: owned(common),
        context: owned(context),
    }
}

/// Answer triples `(answer_id, [label], label)`; entity labels come from the KB.
pub async fn answer_disambiguations<K: KbService>(
    kb: &K,
    cache: &KbCache,
    gold_answers: &[String],
) -> Result<Vec<DisambiguationTriple>> {
    let mut triples = Vec::with_capacity(gold_answers.len());
    for answer in gold_answers {
        let label = if is_entity(answer) {
            cache.label(kb, answer).await?
        } else {
            answer.clone()
        };
        triples.push(DisambiguationTriple::new(answer.clone(), vec![label.clone()], label));
    }
    Ok(triples)
}
