//! Silver annotation of whole conversations and benchmark files.

use serde::Serialize;
use std::path::Path;

use super::flow_graph::{FlowGraph, FlowGraphBuilder, TraversalOptions};
use super::structured_representation::{StructuredRepresentationAnnotator, Stopwords};
use super::turn_relevance::{TurnRelevanceAnnotator, TurnRelevanceExample};
use crate::config::{AnnotationConfig, Benchmark, Config};
use crate::conversation::{Answer, Conversation};
use crate::error::ConvflowError;
use crate::kb::{KbCache, KbService};
use crate::literals::{is_entity, is_timestamp, parse_answer_urls, timestamp_to_label};
use crate::Result;

/// Outcome of annotating one grounded conversation.
#[derive(Debug, Clone)]
pub struct ConversationReport {
    pub graph: FlowGraph,
    pub relevance_examples: Vec<TurnRelevanceExample>,
    /// Question nodes reachable from the graph frontier.
    pub question_count: usize,
}

/// Counters for one processed dataset file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub conversations: usize,
    pub annotated: usize,
    /// First turn could not be grounded in the KB.
    pub ungrounded: usize,
    /// KB errors; the conversation is written without annotations.
    pub failed: usize,
    pub questions_in_graphs: usize,
    pub relevance_examples: usize,
}

pub struct SilverAnnotator<K> {
    kb: K,
    cache: KbCache,
    options: TraversalOptions,
    annotation: AnnotationConfig,
    benchmark: Benchmark,
    stopwords: Option<Stopwords>,
}

impl<K: KbService> SilverAnnotator<K> {
    pub fn new(
        kb: K,
        options: TraversalOptions,
        annotation: AnnotationConfig,
        benchmark: Benchmark,
        cache_capacity: usize,
    ) -> Self {
        Self {
            kb,
            cache: KbCache::new(cache_capacity),
            options,
            annotation,
            benchmark,
            stopwords: None,
        }
    }

    /// Annotator configured from `config`; loads the stopword list when enabled.
    pub fn from_config(kb: K, config: &Config) -> Result<Self> {
        let mut annotator = Self::new(
            kb,
            TraversalOptions::from_config(&config.kb),
            config.annotation.clone(),
            config.convflow.benchmark,
            config.kb.cache_capacity,
        );
        if config.annotation.remove_stopwords {
            let path = config.annotation.stopwords_path.as_deref().ok_or_else(|| {
                ConvflowError::Config("remove_stopwords requires stopwords_path".to_string())
            })?;
            annotator.stopwords = Some(Stopwords::from_file(path)?);
        }
        Ok(annotator)
    }

    /// Build the flow graph of `conversation` and write its silver annotations
    /// in place. `None` when the first turn cannot be grounded.
    pub async fn annotate_conversation(
        &self,
        conversation: &mut Conversation,
    ) -> Result<Option<ConversationReport>> {
        conversation.reset_annotations();
        if self.benchmark == Benchmark::Convquestions {
            self.resolve_answers(conversation).await?;
        }

        let builder = FlowGraphBuilder::new(&self.kb, &self.cache, self.options.clone());
        let Some(graph) = builder.build(conversation).await? else {
            return Ok(None);
        };

        StructuredRepresentationAnnotator::new(
            &self.kb,
            &self.cache,
            self.annotation.relation_shared_active,
            self.stopwords.clone(),
        )
        .annotate(&graph, conversation)
        .await?;

        let relevance_examples = TurnRelevanceAnnotator::new(self.annotation.transitive_relevances)
            .annotate(&graph, conversation);

        Ok(Some(ConversationReport {
            relevance_examples,
            question_count: graph.question_count(),
            graph,
        }))
    }

    /// Turn raw ConvQuestions answer strings into `{id, label}` answers.
    async fn resolve_answers(&self, conversation: &mut Conversation) -> Result<()> {
        for turn in &mut conversation.questions {
            if !turn.answers.is_empty() {
                continue;
            }
            let Some(raw) = turn.answer.as_deref() else {
                continue;
            };
            let mut answers = Vec::new();
            for id in parse_answer_urls(raw) {
                let label = if is_entity(&id) {
                    self.cache.label(&self.kb, &id).await?
                } else if is_timestamp(&id) {
                    timestamp_to_label(&id)
                } else {
                    id.clone()
                };
                answers.push(Answer::new(id, label));
            }
            turn.answers = answers;
            turn.answer = None;
        }
        Ok(())
    }

    /// Annotate every conversation of `input` and write the annotated dataset
    /// to `output`, plus the turn relevance dataset to `relevance_output` when
    /// given and enabled.
    pub async fn process_dataset(
        &self,
        input: &Path,
        output: &Path,
        relevance_output: Option<&Path>,
    ) -> Result<DatasetSummary> {
        log::info!("Annotating {}", input.display());
        let content = std::fs::read_to_string(input)?;
        let mut conversations: Vec<Conversation> = serde_json::from_str(&content)?;

        let mut summary = DatasetSummary {
            conversations: conversations.len(),
            ..DatasetSummary::default()
        };
        let mut relevance_dataset: Vec<TurnRelevanceExample> = Vec::new();

        for (index, conversation) in conversations.iter_mut().enumerate() {
            match self.annotate_conversation(conversation).await {
                Ok(Some(report)) => {
                    summary.annotated += 1;
                    summary.questions_in_graphs += report.question_count;
                    relevance_dataset.extend(report.relevance_examples);
                }
                Ok(None) => {
                    log::debug!("Conversation {} could not be grounded", index);
                    summary.ungrounded += 1;
                }
                Err(ConvflowError::Kb(message)) => {
                    log::warn!("Conversation {} skipped: KB error: {}", index, message);
                    conversation.reset_annotations();
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
            if (index + 1) % 100 == 0 {
                log::info!("Annotated {}/{} conversations", index + 1, summary.conversations);
            }
        }
        summary.relevance_examples = relevance_dataset.len();

        write_json(output, &conversations)?;
        log::info!("Annotated dataset written to {}", output.display());

        if let Some(path) = relevance_output {
            if self.annotation.extract_relevance_dataset {
                write_json(path, &relevance_dataset)?;
                log::info!("Relevance dataset written to {}", path.display());
            }
        }

        log::info!(
            "Done: {} conversations, {} annotated, {} ungrounded, {} failed, {} questions in graphs",
            summary.conversations,
            summary.annotated,
            summary.ungrounded,
            summary.failed,
            summary.questions_in_graphs
        );
        self.cache.clear();
        Ok(summary)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::fixtures::{inception_conversation, inception_kb};
    use crate::conversation::{StructuredRepresentation, Turn};
    use crate::kb::{Fact, KbType, SearchParams, SearchSpace, StaticKb};
    use tempfile::TempDir;

    fn annotator(kb: StaticKb, benchmark: Benchmark) -> SilverAnnotator<StaticKb> {
        SilverAnnotator::new(
            kb,
            TraversalOptions::default(),
            AnnotationConfig::default(),
            benchmark,
            64,
        )
    }

    struct UnreachableKb;

    impl KbService for UnreachableKb {
        async fn search(&self, _text: &str, _params: &SearchParams) -> Result<SearchSpace> {
            Err(ConvflowError::Kb("connection refused".to_string()))
        }

        async fn neighborhood(&self, _item_id: &str, _max_facts: usize) -> Result<Vec<Fact>> {
            Err(ConvflowError::Kb("connection refused".to_string()))
        }

        async fn frequency(&self, _item_id: &str) -> Result<(u64, u64)> {
            Err(ConvflowError::Kb("connection refused".to_string()))
        }

        async fn types(&self, _item_id: &str) -> Result<Vec<KbType>> {
            Err(ConvflowError::Kb("connection refused".to_string()))
        }

        async fn label(&self, _item_id: &str) -> Result<String> {
            Err(ConvflowError::Kb("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_annotate_conversation() {
        let annotator = annotator(inception_kb(), Benchmark::Convmix);
        let mut conversation = inception_conversation();

        let report = annotator
            .annotate_conversation(&mut conversation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.question_count, 3);
        assert_eq!(report.graph.question_count(), 3);
        assert_eq!(report.relevance_examples.len(), 6);
        assert_eq!(conversation.questions[0].silver_sr.len(), 1);
        assert_eq!(conversation.questions[2].silver_relevant_turns.as_ref().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_reannotation_resets_previous_results() {
        let annotator = annotator(inception_kb(), Benchmark::Convmix);
        let mut conversation = inception_conversation();
        annotator.annotate_conversation(&mut conversation).await.unwrap();
        annotator.annotate_conversation(&mut conversation).await.unwrap();
        assert_eq!(conversation.questions[0].silver_sr.len(), 1);
    }

    #[tokio::test]
    async fn test_ungrounded_conversation() {
        let annotator = annotator(inception_kb(), Benchmark::Convmix);
        let mut turn = Turn::new("Who painted it?", vec![Answer::new("Q5582", "Vincent van Gogh")]);
        turn.silver_sr.push(StructuredRepresentation {
            context: vec![],
            entities: vec![],
            relation: vec![],
            answer_type: "stale".to_string(),
        });
        let mut conversation = Conversation::new(vec![turn]);

        let report = annotator.annotate_conversation(&mut conversation).await.unwrap();
        assert!(report.is_none());
        assert!(conversation.questions[0].silver_sr.is_empty());
    }

    #[tokio::test]
    async fn test_convquestions_answers_resolved() {
        let annotator = annotator(inception_kb(), Benchmark::Convquestions);
        let raw = r#"{"questions": [
            {"question": "Who directed Inception?", "answer": "https://www.wikidata.org/wiki/Q25191"},
            {"question": "Where was he born?", "answer": "https://www.wikidata.org/wiki/Q84"},
            {"question": "When was it released?", "answer": "16 July 2010"}
        ]}"#;
        let mut conversation: Conversation = serde_json::from_str(raw).unwrap();

        let report = annotator
            .annotate_conversation(&mut conversation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            conversation.questions[0].answers,
            vec![Answer::new("Q25191", "Christopher Nolan")]
        );
        assert_eq!(
            conversation.questions[2].answers,
            vec![Answer::new("2010-07-16T00:00:00Z", "16 July 2010")]
        );
        assert_eq!(report.question_count, 2);

        let value = serde_json::to_value(&conversation.questions[0]).unwrap();
        assert!(value.get("answer").is_none());
        assert_eq!(value["answers"][0]["id"], "Q25191");
        assert!(conversation.questions.iter().all(|turn| turn.answer.is_none()));
    }

    #[tokio::test]
    async fn test_process_dataset() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("train.json");
        let output = dir.path().join("annotated").join("annotated_train.json");
        let relevance = dir.path().join("tr").join("train.json");

        let ungrounded = Conversation::new(vec![Turn::new(
            "Who painted it?",
            vec![Answer::new("Q5582", "Vincent van Gogh")],
        )]);
        let dataset = vec![inception_conversation(), ungrounded];
        std::fs::write(&input, serde_json::to_string(&dataset).unwrap()).unwrap();

        let annotator = annotator(inception_kb(), Benchmark::Convmix);
        let summary = annotator
            .process_dataset(&input, &output, Some(&relevance))
            .await
            .unwrap();
        assert_eq!(summary.conversations, 2);
        assert_eq!(summary.annotated, 1);
        assert_eq!(summary.ungrounded, 1);
        assert_eq!(summary.questions_in_graphs, 3);
        assert_eq!(summary.relevance_examples, 6);

        let written: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0]["questions"][0]["silver_SR"].is_array());

        let examples: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&relevance).unwrap()).unwrap();
        assert_eq!(examples.len(), 6);
    }

    #[tokio::test]
    async fn test_kb_errors_do_not_abort_dataset() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("dev.json");
        let output = dir.path().join("out.json");
        std::fs::write(
            &input,
            serde_json::to_string(&vec![inception_conversation()]).unwrap(),
        )
        .unwrap();

        let annotator = SilverAnnotator::new(
            UnreachableKb,
            TraversalOptions::default(),
            AnnotationConfig::default(),
            Benchmark::Convmix,
            16,
        );
        let summary = annotator.process_dataset(&input, &output, None).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.annotated, 0);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let annotator = annotator(StaticKb::new(), Benchmark::Convmix);
        let result = annotator
            .process_dataset(&dir.path().join("missing.json"), &dir.path().join("out.json"), None)
            .await;
        assert!(matches!(result, Err(ConvflowError::Io(_))));
    }
}
