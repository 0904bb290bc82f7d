//! Distant-supervision annotation: flow graph construction over the KB and
//! the silver labels derived from it (turn relevances, structured
//! representations).

pub mod disambiguation;
pub mod flow_graph;
pub mod matcher;
pub mod silver;
pub mod structured_representation;
pub mod turn_relevance;

#[cfg(test)]
mod fixtures;

pub use disambiguation::{DisambiguationTriple, Partition};
pub use flow_graph::{FlowGraph, FlowGraphBuilder, FlowNode, NodeId, NodeKind, TraversalOptions};
pub use silver::{ConversationReport, DatasetSummary, SilverAnnotator};
pub use structured_representation::{StructuredRepresentationAnnotator, Stopwords};
pub use turn_relevance::{TurnRelevanceAnnotator, TurnRelevanceExample};
