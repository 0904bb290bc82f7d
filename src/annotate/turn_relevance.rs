//! Turn relevance labels from a finished flow graph: which history turns a
//! turn needs, as positive/negative training pairs and as each turn's
//! `silver_relevant_turns`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::flow_graph::{FlowGraph, FlowNode};
use crate::conversation::{Answer, Conversation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn: usize,
    pub question: String,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRelevanceExample {
    /// 1 if `history_turn` is needed to answer `current_turn`, else 0.
    pub relevance: u8,
    pub history_turn: TurnRecord,
    pub current_turn: TurnRecord,
}

/// Turn index to the turns it depends on.
pub type Relevances = BTreeMap<usize, Vec<usize>>;

/// Close `relevances` under transitivity (child -> parent -> grandparent
/// implies child -> grandparent) by fixpoint iteration.
///
/// Returns the `(child, grandparent)` pairs that were added, in insertion order.
pub fn transitive_closure(relevances: &mut Relevances) -> Vec<(usize, usize)> {
    let mut added = Vec::new();
    let mut changed = true;
    while changed {
        changed = false;
        let children: Vec<usize> = relevances.keys().copied().collect();
        for child in children {
            let parents = relevances[&child].clone();
            for parent in parents {
                let grandparents = relevances.get(&parent).cloned().unwrap_or_default();
                for grandparent in grandparents {
                    if grandparent == child {
                        continue;
                    }
                    let known = relevances.entry(child).or_default();
                    if !known.contains(&grandparent) {
                        known.push(grandparent);
                        added.push((child, grandparent));
                        changed = true;
                    }
                }
            }
        }
    }
    added
}

pub struct TurnRelevanceAnnotator {
    transitive: bool,
}

impl TurnRelevanceAnnotator {
    pub fn new(transitive: bool) -> Self {
        Self { transitive }
    }

    /// Label every ordered pair of distinct turns present in the graph and
    /// annotate `silver_relevant_turns` in place.
    pub fn annotate(
        &self,
        graph: &FlowGraph,
        conversation: &mut Conversation,
    ) -> Vec<TurnRelevanceExample> {
        let mut questions: IndexMap<usize, String> = IndexMap::new();
        let mut answers: BTreeMap<usize, Vec<Answer>> = BTreeMap::new();
        let mut positives: Vec<(usize, usize)> = Vec::new();

        for id in graph.upward_walk() {
            match graph.node(id) {
                FlowNode::Answer(node) => {
                    let answer = node
                        .relevant_disambiguations
                        .iter()
                        .map(|t| {
                            let label = t.surface_forms.first().unwrap_or(&t.label);
                            Answer::new(t.item_id.clone(), label.clone())
                        })
                        .collect();
                    answers.insert(node.turn, answer);
                }
                FlowNode::Question(node) => {
                    questions.insert(node.turn, node.question.clone());
                    if let Some(turn) = conversation.questions.get_mut(node.turn) {
                        turn.silver_relevant_turns.get_or_insert_with(Vec::new);
                    }
                    for &parent in &node.parents {
                        let parent_turn = graph.node(parent).turn();
                        if parent_turn == node.turn || positives.contains(&(parent_turn, node.turn)) {
                            continue;
                        }
                        positives.push((parent_turn, node.turn));
                        if let Some(turn) = conversation.questions.get_mut(node.turn) {
                            turn.add_relevant_turn(parent_turn);
                        }
                    }
                }
            }
        }

        let mut relevances: Relevances = questions.keys().map(|&turn| (turn, Vec::new())).collect();
        for &(parent, child) in &positives {
            relevances.entry(child).or_default().push(parent);
        }
        if self.transitive {
            for (child, ancestor) in transitive_closure(&mut relevances) {
                positives.push((ancestor, child));
                if let Some(turn) = conversation.questions.get_mut(child) {
                    turn.add_relevant_turn(ancestor);
                }
            }
        }

        let mut negatives: Vec<(usize, usize)> = Vec::new();
        for &current in questions.keys() {
            for &history in questions.keys() {
                if current == history {
                    continue;
                }
                let relevant = relevances
                    .get(&current)
                    .map(|turns| turns.contains(&history))
                    .unwrap_or(false);
                if !relevant {
                    negatives.push((history, current));
                }
            }
        }

        let record = |turn: usize| TurnRecord {
            turn,
            question: questions
                .get(&turn)
                .cloned()
                .or_else(|| conversation.questions.get(turn).map(|t| t.question.clone()))
                .unwrap_or_default(),
            answers: answers
                .get(&turn)
                .cloned()
                .or_else(|| conversation.questions.get(turn).map(|t| t.answers.clone()))
                .unwrap_or_default(),
        };

        let examples: Vec<TurnRelevanceExample> = positives
            .iter()
            .map(|&pair| (1, pair))
            .chain(negatives.iter().map(|&pair| (0, pair)))
            .map(|(relevance, (history, current))| TurnRelevanceExample {
                relevance,
                history_turn: record(history),
                current_turn: record(current),
            })
            .collect();

        log::debug!(
            "Turn relevance: {} positive, {} negative examples",
            positives.len(),
            negatives.len()
        );
        examples
    }
}
