//! Silver structured representations `(context, entities, relation, answer_type)`
//! for every question node of a flow graph.

use indexmap::IndexSet;
use std::collections::HashMap;
use std::path::Path;

use super::disambiguation::{partition, DisambiguationTriple, Partition};
use super::flow_graph::{FlowGraph, NodeKind};
use crate::conversation::{Answer, Conversation, StructuredRepresentation};
use crate::kb::{KbCache, KbService, KbType};
use crate::literals::{is_entity, is_number, is_timestamp, is_year};
use crate::Result;

/// Stopword list, one word per line.
#[derive(Debug, Clone, Default)]
pub struct Stopwords(Vec<String>);

impl Stopwords {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_lines(&content))
    }

    pub fn from_lines(content: &str) -> Self {
        Self(
            content
                .lines()
                .map(|line| line.trim().to_lowercase())
                .filter(|line| !line.is_empty())
                .collect(),
        )
    }

    /// Lower-cased content words of `question`, symbols and stopwords removed.
    pub fn question_words(&self, question: &str) -> Vec<String> {
        let mut text = format!(" {} ", strip_symbols(question).to_lowercase());
        for stopword in &self.0 {
            let pattern = format!(" {} ", stopword);
            while text.contains(&pattern) {
                text = text.replace(&pattern, " ");
            }
        }
        text.replace(" s ", " ")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

fn strip_symbols(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ',' | '!' | '?' | '.' | '\'' | '"' | ':' | '’' | '{' | '}'))
        .collect()
}

/// Punctuation-free, lower-cased, trimmed relation string.
pub fn normalize_relation(relation: &str) -> String {
    strip_symbols(relation)
        .replace(" s ", " ")
        .to_lowercase()
        .trim()
        .to_string()
}

/// Byte range of the first case-insensitive occurrence of `needle`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    for (start, _) in haystack.char_indices() {
        let mut rest = haystack[start..].char_indices();
        let mut end = start;
        let mut matched = true;
        for expected in needle.chars() {
            match rest.next() {
                Some((offset, actual))
                    if actual.to_lowercase().eq(expected.to_lowercase()) =>
                {
                    end = start + offset + actual.len_utf8();
                }
                _ => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return Some((start, end));
        }
    }
    None
}

/// Cut the question's own surface forms out of it, longest first so that a
/// short form never splits a longer one.
pub fn remove_surface_forms(question: &str, triples: &[DisambiguationTriple]) -> String {
    let mut forms: Vec<&str> = triples
        .iter()
        .flat_map(|t| t.surface_forms.iter().map(String::as_str))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect();
    forms.sort_by_key(|form| std::cmp::Reverse(form.chars().count()));

    let mut question = question.to_string();
    for form in forms {
        if let Some((start, end)) = find_case_insensitive(&question, form) {
            question.replace_range(start..end, "");
        }
    }
    question
}

/// Context slot: what the history adds beyond the question's own entities.
fn sr_context(parts: &Partition) -> Vec<String> {
    if !parts.entities.is_empty() {
        parts.common.iter().chain(&parts.context).cloned().collect()
    } else if !parts.common.is_empty() {
        parts.context.clone()
    } else {
        Vec::new()
    }
}

/// Entity slot: the mentions most relevant to the information need.
fn sr_entities(parts: &Partition) -> Vec<String> {
    if !parts.entities.is_empty() {
        parts.entities.clone()
    } else if !parts.common.is_empty() {
        parts.common.clone()
    } else {
        parts.context.clone()
    }
}

pub struct StructuredRepresentationAnnotator<'a, K> {
    kb: &'a K,
    cache: &'a KbCache,
    relation_shared_active: bool,
    stopwords: Option<Stopwords>,
}

impl<'a, K: KbService> StructuredRepresentationAnnotator<'a, K> {
    pub fn new(
        kb: &'a K,
        cache: &'a KbCache,
        relation_shared_active: bool,
        stopwords: Option<Stopwords>,
    ) -> Self {
        Self {
            kb,
            cache,
            relation_shared_active,
            stopwords,
        }
    }

    /// Append one structured representation to `silver_SR` of every turn with
    /// a question node. Turns are processed in order so a shared relation can
    /// reuse the earlier turn's representation.
    pub async fn annotate(&self, graph: &FlowGraph, conversation: &mut Conversation) -> Result<()> {
        let mut question_ids: Vec<_> = graph
            .upward_walk()
            .into_iter()
            .filter(|&id| graph.node(id).kind() == NodeKind::Question)
            .collect();
        question_ids.sort_by_key(|&id| graph.node(id).turn());

        let mut relations: HashMap<usize, String> = HashMap::new();
        for id in question_ids {
            let Some(node) = graph.node(id).as_question() else {
                continue;
            };
            let Some(turn) = conversation.questions.get(node.turn) else {
                continue;
            };

            let parts = partition(&node.relevant_context, &node.relevant_disambiguations);
            let question = remove_surface_forms(&node.question, &node.relevant_disambiguations);

            let own_relation = match &self.stopwords {
                Some(stopwords) => stopwords.question_words(&question).join(" "),
                None => normalize_relation(&question),
            };
            let mut relation = vec![own_relation.clone()];
            if self.relation_shared_active {
                if let Some(shared) = node.relation_shared_with {
                    if let Some(previous) = relations.get(&graph.node(shared).turn()) {
                        relation.push(previous.clone());
                    }
                }
            }
            relations.insert(node.turn, relation.last().cloned().unwrap_or(own_relation));

            let answer_type = self.answer_type(&turn.answers).await?;
            let sr = StructuredRepresentation {
                context: sr_context(&parts),
                entities: sr_entities(&parts),
                relation,
                answer_type,
            };
            log::debug!("SR for turn {}: {:?}", node.turn, sr);
            conversation.questions[node.turn].silver_sr.push(sr);
        }
        Ok(())
    }

    async fn answer_type(&self, answers: &[Answer]) -> Result<String> {
        let Some(first) = answers.first() else {
            return Ok(String::new());
        };
        if is_year(&first.label) {
            Ok("year".to_string())
        } else if is_timestamp(&first.id) {
            Ok("date".to_string())
        } else if is_number(&first.id) {
            Ok("number".to_string())
        } else if is_entity(&first.id) {
            Ok(self
                .most_relevant_type(answers)
                .await?
                .map(|t| t.label)
                .unwrap_or_default())
        } else {
            Ok("string".to_string())
        }
    }

    /// The answers' type with the highest KB frequency.
    async fn most_relevant_type(&self, answers: &[Answer]) -> Result<Option<KbType>> {
        let mut scored: Vec<(KbType, u64)> = Vec::new();
        for answer in answers {
            for kb_type in self.cache.types(self.kb, &answer.id).await? {
                if kb_type.id == "None" {
                    continue;
                }
                let relevance = self.cache.frequency(self.kb, &kb_type.id).await?;
                scored.push((kb_type, relevance));
            }
        }
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(scored.into_iter().next().map(|(kb_type, _)| kb_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::fixtures::{inception_conversation, inception_kb};
    use crate::annotate::flow_graph::{FlowGraphBuilder, TraversalOptions};

    fn triple(id: &str, forms: &[&str]) -> DisambiguationTriple {
        DisambiguationTriple::new(id, forms.iter().map(|s| s.to_string()).collect(), id)
    }

    #[test]
    fn test_remove_surface_forms_longest_first() {
        let triples = vec![triple("Q1", &["unicorn"]), triple("Q2", &["Last Unicorn"])];
        assert_eq!(
            remove_surface_forms("Who wrote The last unicorn?", &triples),
            "Who wrote The ?"
        );
    }

    #[test]
    fn test_normalize_relation() {
        assert_eq!(normalize_relation("Where was he born?"), "where was he born");
        assert_eq!(normalize_relation(" Nolan' s \"films\": "), "nolan films");
    }

    #[test]
    fn test_question_words() {
        let stopwords = Stopwords::from_lines("the\nwas\nhe\nwhere\n");
        assert_eq!(
            stopwords.question_words("Where was he born, the man?"),
            vec!["born".to_string(), "man".to_string()]
        );
    }

    #[test]
    fn test_slots() {
        let parts = Partition {
            entities: vec!["oscar".into()],
            common: vec!["inception".into()],
            context: vec!["nolan".into()],
        };
        assert_eq!(sr_context(&parts), vec!["inception".to_string(), "nolan".to_string()]);
        assert_eq!(sr_entities(&parts), vec!["oscar".to_string()]);

        let only_context = Partition {
            context: vec!["nolan".into()],
            ..Partition::default()
        };
        assert!(sr_context(&only_context).is_empty());
        assert_eq!(sr_entities(&only_context), vec!["nolan".to_string()]);
    }

    #[tokio::test]
    async fn test_annotate_conversation() {
        let kb = inception_kb();
        let cache = KbCache::new(64);
        let mut conversation = inception_conversation();
        let graph = FlowGraphBuilder::new(&kb, &cache, TraversalOptions::default())
            .build(&conversation)
            .await
            .unwrap()
            .unwrap();

        StructuredRepresentationAnnotator::new(&kb, &cache, true, None)
            .annotate(&graph, &mut conversation)
            .await
            .unwrap();

        let first = &conversation.questions[0].silver_sr[0];
        assert!(first.context.is_empty());
        assert_eq!(first.entities, vec!["Inception".to_string()]);
        assert_eq!(first.relation, vec!["who directed".to_string()]);
        assert_eq!(first.answer_type, "screenwriter");

        let second = &conversation.questions[1].silver_sr[0];
        assert_eq!(second.entities, vec!["Christopher Nolan".to_string()]);
        assert!(second.context.is_empty());
        assert_eq!(second.relation, vec!["where was he born".to_string()]);
        assert_eq!(second.answer_type, "city");

        assert!(conversation.questions[3].silver_sr.is_empty());
    }
}
