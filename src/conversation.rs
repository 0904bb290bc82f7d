//! Conversations as read from (and written back to) the benchmark JSON files.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A gold answer: KB id (entity, timestamp, literal, `Yes`/`No`) with its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl Answer {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Silver structured representation of a question:
/// `(context, entities, relation, answer_type)`, serialized as a 4-element list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SrTuple", into = "SrTuple")]
pub struct StructuredRepresentation {
    pub context: Vec<String>,
    pub entities: Vec<String>,
    pub relation: Vec<String>,
    pub answer_type: String,
}

type SrTuple = (Vec<String>, Vec<String>, Vec<String>, String);

impl From<SrTuple> for StructuredRepresentation {
    fn from((context, entities, relation, answer_type): SrTuple) -> Self {
        Self {
            context,
            entities,
            relation,
            answer_type,
        }
    }
}

impl From<StructuredRepresentation> for SrTuple {
    fn from(sr: StructuredRepresentation) -> Self {
        (sr.context, sr.entities, sr.relation, sr.answer_type)
    }
}

/// One question/answer turn. Fields this crate does not know are kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    /// Raw ConvQuestions answer string, replaced by `answers` once parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(rename = "silver_SR", default)]
    pub silver_sr: Vec<StructuredRepresentation>,
    /// `None`: never reached by the flow graph; empty: self-sufficient.
    #[serde(default)]
    pub silver_relevant_turns: Option<Vec<usize>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Turn {
    pub fn new(question: impl Into<String>, answers: Vec<Answer>) -> Self {
        Self {
            question: question.into(),
            answers,
            answer: None,
            silver_sr: Vec::new(),
            silver_relevant_turns: None,
            extra: Map::new(),
        }
    }

    /// Gold answer ids.
    pub fn answer_ids(&self) -> Vec<String> {
        self.answers.iter().map(|a| a.id.clone()).collect()
    }

    /// Record `relevant_turn` as required by this turn (no duplicates).
    pub fn add_relevant_turn(&mut self, relevant_turn: usize) {
        let turns = self.silver_relevant_turns.get_or_insert_with(Vec::new);
        if !turns.contains(&relevant_turn) {
            turns.push(relevant_turn);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub questions: Vec<Turn>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Conversation {
    pub fn new(questions: Vec<Turn>) -> Self {
        Self {
            questions,
            extra: Map::new(),
        }
    }

    /// Reset annotation fields before a fresh annotation pass.
    pub fn reset_annotations(&mut self) {
        for turn in &mut self.questions {
            turn.silver_sr.clear();
            turn.silver_relevant_turns = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_keeps_unknown_fields() {
        let raw = r#"{
            "conv_id": 17,
            "domain": "movies",
            "questions": [
                {"turn": 0, "question": "Who directed Inception?",
                 "answers": [{"id": "Q25191", "label": "Christopher Nolan"}]}
            ]
        }"#;
        let conversation: Conversation = serde_json::from_str(raw).unwrap();
        assert_eq!(conversation.extra["conv_id"], 17);
        assert_eq!(conversation.questions[0].extra["turn"], 0);
        assert!(conversation.questions[0].silver_relevant_turns.is_none());

        let out = serde_json::to_value(&conversation).unwrap();
        assert_eq!(out["domain"], "movies");
        assert_eq!(out["questions"][0]["silver_relevant_turns"], Value::Null);
        assert_eq!(out["questions"][0]["silver_SR"], serde_json::json!([]));
        assert!(out["questions"][0].get("answer").is_none());
    }

    #[test]
    fn test_structured_representation_as_list() {
        let sr = StructuredRepresentation {
            context: vec!["Inception".into()],
            entities: vec![],
            relation: vec!["where was born".into()],
            answer_type: "city".into(),
        };
        let value = serde_json::to_value(&sr).unwrap();
        assert_eq!(
            value,
            serde_json::json!([["Inception"], [], ["where was born"], "city"])
        );
        let back: StructuredRepresentation = serde_json::from_value(value).unwrap();
        assert_eq!(back, sr);
    }

    #[test]
    fn test_add_relevant_turn_dedup() {
        let mut turn = Turn::new("q", vec![]);
        turn.add_relevant_turn(1);
        turn.add_relevant_turn(1);
        turn.add_relevant_turn(0);
        assert_eq!(turn.silver_relevant_turns, Some(vec![1, 0]));
    }
}
