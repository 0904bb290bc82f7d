//! Conversation flow graph: a DAG connecting every answerable turn's question
//! to the KB facts that answer it, possibly through entities surfaced by
//! earlier turns.
//!
//! Nodes live in an arena owned by [`FlowGraph`]; parents are stored as
//! [`NodeId`]s into that arena. A node is never mutated once pushed.

use serde::Serialize;
use std::collections::HashSet;

use super::disambiguation::{
    answer_connecting_disambiguations, answer_disambiguations, extract_answering_facts,
    DisambiguationTriple, ItemFilter,
};
use crate::config::KbConfig;
use crate::conversation::Conversation;
use crate::kb::{Disambiguation, Fact, KbCache, KbService, SearchParams};
use crate::literals::{is_year, AnswerKind};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Question,
    Answer,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionNode {
    pub turn: usize,
    pub question: String,
    /// Own disambiguations that explain an answering fact.
    pub relevant_disambiguations: Vec<DisambiguationTriple>,
    /// Disambiguations inherited from the parent nodes that explain an answering fact.
    pub relevant_context: Vec<DisambiguationTriple>,
    pub answering_facts: Vec<Fact>,
    pub parents: Vec<NodeId>,
    /// Previous turn's question when both share an answering predicate.
    pub relation_shared_with: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerNode {
    pub turn: usize,
    pub label: String,
    /// `(answer_id, [label], label)` per gold answer.
    pub relevant_disambiguations: Vec<DisambiguationTriple>,
    /// The question node of the same turn, the only parent.
    pub question: NodeId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlowNode {
    Question(QuestionNode),
    Answer(AnswerNode),
}

impl FlowNode {
    pub fn turn(&self) -> usize {
        match self {
            FlowNode::Question(node) => node.turn,
            FlowNode::Answer(node) => node.turn,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FlowNode::Question(_) => NodeKind::Question,
            FlowNode::Answer(_) => NodeKind::Answer,
        }
    }

    /// Question text or answer labels.
    pub fn label(&self) -> &str {
        match self {
            FlowNode::Question(node) => &node.question,
            FlowNode::Answer(node) => &node.label,
        }
    }

    pub fn relevant_disambiguations(&self) -> &[DisambiguationTriple] {
        match self {
            FlowNode::Question(node) => &node.relevant_disambiguations,
            FlowNode::Answer(node) => &node.relevant_disambiguations,
        }
    }

    pub fn parents(&self) -> &[NodeId] {
        match self {
            FlowNode::Question(node) => &node.parents,
            FlowNode::Answer(node) => std::slice::from_ref(&node.question),
        }
    }

    pub fn as_question(&self) -> Option<&QuestionNode> {
        match self {
            FlowNode::Question(node) => Some(node),
            FlowNode::Answer(_) => None,
        }
    }
}

/// A turn that did not make it into the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotAnswered {
    pub turn: usize,
    pub question: String,
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowGraph {
    nodes: Vec<FlowNode>,
    leafs: Vec<NodeId>,
    not_answered: Vec<NotAnswered>,
}

impl FlowGraph {
    pub fn node(&self, id: NodeId) -> &FlowNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FlowNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    /// Current frontier: nodes not yet consumed by a later turn.
    pub fn leafs(&self) -> &[NodeId] {
        &self.leafs
    }

    pub fn not_answered(&self) -> &[NotAnswered] {
        &self.not_answered
    }

    pub fn find(&self, turn: usize, kind: NodeKind) -> Option<NodeId> {
        self.nodes()
            .find(|(_, node)| node.turn() == turn && node.kind() == kind)
            .map(|(id, _)| id)
    }

    fn push(&mut self, node: FlowNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Nodes reachable from the frontier, layer by layer towards the root,
    /// each `(turn, kind)` visited once in first-reached order.
    pub fn upward_walk(&self) -> Vec<NodeId> {
        let mut explored: HashSet<(usize, NodeKind)> = HashSet::new();
        let mut order = Vec::new();
        let mut layer: Vec<NodeId> = self.leafs.clone();

        while !layer.is_empty() {
            for &id in &layer {
                let node = self.node(id);
                if explored.insert((node.turn(), node.kind())) {
                    order.push(id);
                }
            }
            let mut next: Vec<NodeId> = Vec::new();
            for &id in &layer {
                for &parent in self.node(id).parents() {
                    if !next.contains(&parent) {
                        next.push(parent);
                    }
                }
            }
            layer = next;
        }
        order
    }

    /// Number of question nodes reachable from the frontier.
    pub fn question_count(&self) -> usize {
        self.upward_walk()
            .into_iter()
            .filter(|&id| self.node(id).kind() == NodeKind::Question)
            .count()
    }
}

/// KB lookup settings used while growing the graph.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub search_params: SearchParams,
    pub neighborhood_max_facts: usize,
}

impl TraversalOptions {
    pub fn from_config(config: &KbConfig) -> Self {
        Self {
            search_params: config.search_params.clone(),
            neighborhood_max_facts: config.neighborhood_max_facts,
        }
    }
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            search_params: SearchParams::new(),
            neighborhood_max_facts: 1000,
        }
    }
}

/// Builds the flow graph of one conversation by distant supervision.
pub struct FlowGraphBuilder<'a, K> {
    kb: &'a K,
    cache: &'a KbCache,
    options: TraversalOptions,
}

impl<'a, K: KbService> FlowGraphBuilder<'a, K> {
    pub fn new(kb: &'a K, cache: &'a KbCache, options: TraversalOptions) -> Self {
        Self { kb, cache, options }
    }

    fn filter(&self) -> ItemFilter<'a, K> {
        ItemFilter::new(self.kb, self.cache)
    }

    /// Build the graph, or `None` when the first turn's answer cannot be
    /// grounded in the KB.
    pub async fn build(&self, conversation: &Conversation) -> Result<Option<FlowGraph>> {
        let Some(first) = conversation.questions.first() else {
            return Ok(None);
        };
        let gold = first.answer_ids();
        log::debug!("First question: {}", first.question);
        log::debug!("First answers: {:?}", gold);

        let search = self
            .kb
            .search(&first.question, &self.options.search_params)
            .await?;
        let disambiguated_ids = search.disambiguated_ids();
        let answering_facts = extract_answering_facts(&search.facts, &gold, &disambiguated_ids);
        let relevant_disambiguations = answer_connecting_disambiguations(
            &search.disambiguations,
            &answering_facts,
            &gold,
            &self.filter(),
        )
        .await?;
        if relevant_disambiguations.is_empty() {
            log::debug!("No grounded entities for first question: {}", first.question);
            return Ok(None);
        }

        let mut graph = FlowGraph::default();
        let question_id = graph.push(FlowNode::Question(QuestionNode {
            turn: 0,
            question: first.question.clone(),
            relevant_disambiguations,
            relevant_context: Vec::new(),
            answering_facts,
            parents: Vec::new(),
            relation_shared_with: None,
        }));
        let answer_id = self.push_answer(&mut graph, 0, question_id, &gold).await?;
        graph.leafs.push(answer_id);

        for (turn, followup) in conversation.questions.iter().enumerate().skip(1) {
            let gold = followup.answer_ids();
            if self.should_prune(&gold).await? {
                log::debug!("Pruned turn {} with answers {:?}", turn, gold);
                graph.not_answered.push(NotAnswered {
                    turn,
                    question: followup.question.clone(),
                    answers: gold,
                });
                continue;
            }
            log::debug!("Question: {}", followup.question);
            log::debug!("Answers: {:?}", gold);
            self.add_followup(&mut graph, turn, &followup.question, gold)
                .await?;
        }

        Ok(Some(graph))
    }

    /// Existential, year and country answers open too many spurious paths.
    async fn should_prune(&self, gold: &[String]) -> Result<bool> {
        let Some(first) = gold.first() else {
            return Ok(true);
        };
        if AnswerKind::of(first) == AnswerKind::Existential {
            return Ok(true);
        }
        let filter = self.filter();
        for answer in gold {
            if is_year(answer) || filter.is_country(answer).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn add_followup(
        &self,
        graph: &mut FlowGraph,
        turn: usize,
        question: &str,
        gold: Vec<String>,
    ) -> Result<()> {
        let filter = self.filter();

        // standalone attempt
        let search = self.kb.search(question, &self.options.search_params).await?;
        let disambiguated_ids = search.disambiguated_ids();
        let mut all_entities: HashSet<String> = disambiguated_ids.iter().cloned().collect();
        let answering_facts = extract_answering_facts(&search.facts, &gold, &disambiguated_ids);
        let mut answer_found = !answering_facts.is_empty();
        let relevant_disambiguations = if answer_found {
            answer_connecting_disambiguations(
                &search.disambiguations,
                &answering_facts,
                &gold,
                &filter,
            )
            .await?
        } else {
            Vec::new()
        };

        let mut new_node = QuestionNode {
            turn,
            question: question.to_string(),
            relevant_disambiguations,
            relevant_context: Vec::new(),
            answering_facts,
            parents: Vec::new(),
            relation_shared_with: None,
        };

        // context traversal from the frontier up to the root
        let mut prev_question: Option<NodeId> = None;
        let mut consumed: Vec<NodeId> = Vec::new();
        for id in graph.upward_walk() {
            let node = graph.node(id);
            if node.kind() == NodeKind::Question && node.turn() + 1 == turn {
                prev_question = Some(id);
            }

            let context_triples = node.relevant_disambiguations();
            let mut facts: Vec<Fact> = Vec::new();
            for triple in context_triples {
                if !all_entities.insert(triple.item_id.clone()) {
                    continue;
                }
                log::debug!("Retrieve facts for: {}", triple.item_id);
                facts.extend(
                    self.kb
                        .neighborhood(&triple.item_id, self.options.neighborhood_max_facts)
                        .await?,
                );
            }

            let answering = extract_answering_facts(&facts, &gold, &disambiguated_ids);
            if answering.is_empty() {
                continue;
            }
            answer_found = true;

            let context_disambiguations: Vec<Disambiguation> = context_triples
                .iter()
                .filter_map(DisambiguationTriple::to_disambiguation)
                .collect();
            let provenance = answer_connecting_disambiguations(
                &context_disambiguations,
                &answering,
                &gold,
                &filter,
            )
            .await?;
            new_node.relevant_context.extend(provenance);
            new_node.answering_facts.extend(answering);
            new_node.parents.push(id);
            if graph.leafs.contains(&id) {
                consumed.push(id);
            }
        }

        if let Some(prev_id) = prev_question {
            if let Some(prev) = graph.node(prev_id).as_question() {
                if shares_relation(&new_node.answering_facts, &prev.answering_facts) {
                    log::debug!("Turn {} shares its relation with turn {}", turn, prev.turn);
                    new_node.relation_shared_with = Some(prev_id);
                    if !new_node.parents.contains(&prev_id) {
                        new_node.parents.push(prev_id);
                    }
                }
            }
        }

        graph.leafs.retain(|id| !consumed.contains(id));

        if answer_found {
            let question_id = graph.push(FlowNode::Question(new_node));
            let answer_id = self.push_answer(graph, turn, question_id, &gold).await?;
            graph.leafs.push(answer_id);
        } else {
            log::debug!("No answering path for turn {}", turn);
            graph.not_answered.push(NotAnswered {
                turn,
                question: question.to_string(),
                answers: gold,
            });
        }
        Ok(())
    }

    async fn push_answer(
        &self,
        graph: &mut FlowGraph,
        turn: usize,
        question: NodeId,
        gold: &[String],
    ) -> Result<NodeId> {
        let relevant_disambiguations = answer_disambiguations(self.kb, self.cache, gold).await?;
        let label = relevant_disambiguations
            .iter()
            .map(|t| t.label.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(graph.push(FlowNode::Answer(AnswerNode {
            turn,
            label,
            relevant_disambiguations,
            question,
        })))
    }
}

/// Do two sets of answering facts share an item in second position (a proxy
/// for the predicate)?
fn shares_relation(facts: &[Fact], other: &[Fact]) -> bool {
    let predicates: HashSet<&str> = facts
        .iter()
        .filter(|fact| fact.len() > 1)
        .map(|fact| fact[1].id.as_str())
        .collect();
    other
        .iter()
        .filter(|fact| fact.len() > 1)
        .any(|fact| predicates.contains(fact[1].id.as_str()))
}
