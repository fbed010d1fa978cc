//! Benchmark runner
//!
//! Asks the system under test every benchmark question, scores the answer
//! with all six evaluators, and yields one [`QuestionEvaluation`] per
//! question as soon as it is complete.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::try_stream;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::answer::MemoryAnswer;
use crate::error::{EvalError, Result};
use crate::evaluators::{
    AnswerCorrectnessEvaluator, AnswerRelevancyEvaluator, AnswerSimilarityEvaluator,
    ContextPrecisionEvaluator, ContextRecallEvaluator, FaithfulnessEvaluator,
};
use crate::judge::{Embedder, JudgeModel};
use crate::metrics::EvaluationMetrics;
use crate::retry::DEFAULT_MAX_RETRIES;
use crate::target::SystemUnderTest;
use crate::testset::TestSet;

/// The scored outcome of one benchmark question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEvaluation {
    pub test_set: TestSet,
    pub memory_answer: MemoryAnswer,
    /// Time the system under test took to answer
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
    pub metrics: EvaluationMetrics,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl QuestionEvaluation {
    /// Whether the system under test had no answer and scoring was skipped
    pub fn is_skipped(&self) -> bool {
        self.memory_answer.no_result
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(ms.max(0.0) / 1000.0))
    }
}

/// Tuning shared by the evaluators of one run
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorOptions {
    /// Reconstructed questions per answer for answer relevancy
    pub strictness: usize,
    pub max_retries: u32,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            strictness: crate::evaluators::DEFAULT_STRICTNESS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Runs a benchmark against one index of the system under test
pub struct TestSetEvaluator {
    system: Arc<dyn SystemUnderTest>,
    index: String,
    relevancy: AnswerRelevancyEvaluator,
    similarity: AnswerSimilarityEvaluator,
    correctness: AnswerCorrectnessEvaluator,
    faithfulness: FaithfulnessEvaluator,
    precision: ContextPrecisionEvaluator,
    recall: ContextRecallEvaluator,
}

impl TestSetEvaluator {
    pub fn new(
        judge: Arc<dyn JudgeModel>,
        embedder: Arc<dyn Embedder>,
        system: Arc<dyn SystemUnderTest>,
        index: impl Into<String>,
        options: EvaluatorOptions,
    ) -> Self {
        let retries = options.max_retries;
        Self {
            system,
            index: index.into(),
            relevancy: AnswerRelevancyEvaluator::new(judge.clone(), embedder.clone())
                .with_strictness(options.strictness)
                .with_max_retries(retries),
            similarity: AnswerSimilarityEvaluator::new(embedder).with_max_retries(retries),
            correctness: AnswerCorrectnessEvaluator::new(judge.clone()).with_max_retries(retries),
            faithfulness: FaithfulnessEvaluator::new(judge.clone()).with_max_retries(retries),
            precision: ContextPrecisionEvaluator::new(judge.clone()).with_max_retries(retries),
            recall: ContextRecallEvaluator::new(judge).with_max_retries(retries),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Evaluate `test_sets` lazily, in input order
    ///
    /// The stream ends after the first error; errors only come from the
    /// system under test, never from the evaluators.
    pub fn evaluate<'a, I>(&'a self, test_sets: I) -> impl Stream<Item = Result<QuestionEvaluation>> + 'a
    where
        I: IntoIterator<Item = TestSet> + 'a,
    {
        try_stream! {
            for test_set in test_sets {
                yield self.evaluate_one(test_set).await?;
            }
        }
    }

    /// Ask and score a single benchmark question
    pub async fn evaluate_one(&self, test_set: TestSet) -> Result<QuestionEvaluation> {
        let start = Instant::now();
        let answer = self
            .system
            .ask(&test_set.question, &self.index)
            .await
            .map_err(EvalError::SystemUnderTest)?;
        let elapsed = start.elapsed();

        if answer.no_result {
            info!(question = %test_set.question, "No result, skipping evaluation");
            return Ok(QuestionEvaluation {
                test_set,
                memory_answer: answer,
                elapsed,
                metrics: EvaluationMetrics::default(),
                metadata: HashMap::from([("skipped".to_string(), serde_json::Value::Bool(true))]),
            });
        }

        debug!(question = %test_set.question, "Scoring answer");
        let metrics = EvaluationMetrics {
            answer_relevancy: self.relevancy.evaluate_answer(&answer).await,
            answer_similarity: self.similarity.evaluate_answer(&test_set, &answer).await,
            answer_correctness: self.correctness.evaluate_answer(&test_set, &answer).await,
            faithfulness: self.faithfulness.evaluate_answer(&answer).await,
            context_precision: self.precision.evaluate_answer(&answer).await,
            context_recall: self.recall.evaluate_answer(&test_set, &answer).await,
        };

        let unavailable: Vec<&str> = metrics
            .values()
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name)
            .collect();

        info!(
            question = %test_set.question,
            elapsed_ms = elapsed.as_millis() as u64,
            unavailable = unavailable.len(),
            "Evaluated question"
        );

        let mut metadata = HashMap::new();
        if !unavailable.is_empty() {
            metadata.insert("unavailable_metrics".to_string(), serde_json::json!(unavailable));
        }

        Ok(QuestionEvaluation {
            test_set,
            memory_answer: answer,
            elapsed,
            metrics,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptKey;
    use crate::testing::{FakeEmbedder, FakeSystem, ScriptedJudge};
    use crate::testset::QuestionType;
    use futures::{pin_mut, StreamExt};

    fn test_set(question: &str, ground_truth: &str, context: &[&str]) -> TestSet {
        TestSet {
            question: question.to_string(),
            question_type: QuestionType::Simple,
            ground_truth: ground_truth.to_string(),
            ground_truth_verdict: 1,
            context: context.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn evaluator(judge: &ScriptedJudge, system: Arc<FakeSystem>) -> TestSetEvaluator {
        TestSetEvaluator::new(
            Arc::new(judge.clone()),
            Arc::new(FakeEmbedder::new()),
            system,
            "docs",
            EvaluatorOptions {
                strictness: 1,
                max_retries: 0,
            },
        )
    }

    fn script_full_run(judge: &ScriptedJudge) {
        judge.set_default(
            PromptKey::ExtractQuestion,
            r#"{"question": "Where is the tower?", "committal": 1}"#,
        );
        judge.set_default(PromptKey::ExtractStatements, r#"{"statements": ["The tower is in Paris."]}"#);
        judge.set_default(
            PromptKey::EvaluateCorrectness,
            r#"{"TP": [{"statement": "The tower is in Paris.", "reason": "matches"}], "FP": [], "FN": []}"#,
        );
        judge.set_default(
            PromptKey::EvaluateFaithfulness,
            r#"{"evaluations": [{"statement": "The tower is in Paris.", "reason": "stated", "verdict": 1}]}"#,
        );
        judge.set_default(PromptKey::EvaluateContextPrecision, r#"{"reason": "useful", "verdict": 1}"#);
        judge.set_default(
            PromptKey::EvaluateContextRecall,
            r#"{"evaluations": [{"statement": "The tower is in Paris.", "reason": "stated", "attributed": 1}]}"#,
        );
    }

    #[tokio::test]
    async fn test_no_result_skips_every_evaluator() {
        let judge = ScriptedJudge::new();
        let system = Arc::new(FakeSystem::new());
        let evaluator = evaluator(&judge, system.clone());

        let evaluation = evaluator
            .evaluate_one(test_set("Unknown?", "Nobody knows.", &["x"]))
            .await
            .unwrap();

        assert!(evaluation.is_skipped());
        assert_eq!(evaluation.metrics, EvaluationMetrics::default());
        assert_eq!(judge.total_calls(), 0);
        assert_eq!(system.ask_count(), 1);
    }

    #[tokio::test]
    async fn test_matching_answer_scores_perfectly() {
        let judge = ScriptedJudge::new();
        script_full_run(&judge);
        let system = Arc::new(FakeSystem::new());
        system.answer("Where is the tower?", "The tower is in Paris.", &["The tower is in Paris."]);

        let evaluation = evaluator(&judge, system)
            .evaluate_one(test_set(
                "Where is the tower?",
                "The tower is in Paris.",
                &["The tower is in Paris."],
            ))
            .await
            .unwrap();

        let metrics = &evaluation.metrics;
        assert!((metrics.answer_similarity.score - 1.0).abs() < 1e-5);
        assert!((metrics.answer_relevancy.score - 1.0).abs() < 1e-5);
        assert_eq!(metrics.answer_correctness.score, 1.0);
        assert_eq!(metrics.faithfulness.score, 1.0);
        assert_eq!(metrics.context_precision.score, 1.0);
        assert_eq!(metrics.context_recall.score, 1.0);
        assert!(evaluation.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_metric_does_not_abort_question() {
        let judge = ScriptedJudge::new();
        script_full_run(&judge);
        judge.set_default(PromptKey::EvaluateContextRecall, "garbage");
        let system = Arc::new(FakeSystem::new());
        system.answer("Where is the tower?", "In Paris.", &["The tower is in Paris."]);

        let evaluation = evaluator(&judge, system)
            .evaluate_one(test_set("Where is the tower?", "In Paris.", &[]))
            .await
            .unwrap();

        assert!(!evaluation.metrics.context_recall.is_available());
        assert!(evaluation.metrics.faithfulness.is_available());
        assert_eq!(
            evaluation.metadata["unavailable_metrics"],
            serde_json::json!(["context_recall"])
        );
    }

    #[tokio::test]
    async fn test_stream_preserves_order() {
        let judge = ScriptedJudge::new();
        script_full_run(&judge);
        let system = Arc::new(FakeSystem::new());
        system.answer("first?", "one", &["one"]);
        system.answer("third?", "three", &["three"]);

        let evaluator = evaluator(&judge, system.clone());
        let stream = evaluator.evaluate(vec![
            test_set("first?", "one", &[]),
            test_set("second?", "two", &[]),
            test_set("third?", "three", &[]),
        ]);
        pin_mut!(stream);

        let mut questions = Vec::new();
        while let Some(evaluation) = stream.next().await {
            let evaluation = evaluation.unwrap();
            questions.push((evaluation.test_set.question.clone(), evaluation.is_skipped()));
        }

        assert_eq!(
            questions,
            vec![
                ("first?".to_string(), false),
                ("second?".to_string(), true),
                ("third?".to_string(), false),
            ]
        );
        assert_eq!(system.ask_count(), 3);
    }

    #[test]
    fn test_elapsed_serializes_as_millis() {
        let evaluation = QuestionEvaluation {
            test_set: test_set("q", "a", &[]),
            memory_answer: MemoryAnswer::default(),
            elapsed: Duration::from_millis(1500),
            metrics: EvaluationMetrics::default(),
            metadata: HashMap::new(),
        };

        let json = serde_json::to_value(&evaluation).unwrap();
        assert_eq!(json["elapsed_ms"], 1500.0);

        let back: QuestionEvaluation = serde_json::from_value(json).unwrap();
        assert_eq!(back.elapsed, Duration::from_millis(1500));
    }
}
