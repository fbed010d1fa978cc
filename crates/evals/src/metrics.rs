//! Per-question metric bundle

use serde::{Deserialize, Deserializer, Serialize};

use crate::evaluators::{
    ContextRelevancy, CorrectnessEvaluation, GeneratedQuestion, GroundTruthClassification,
    SimilarityEvaluation, StatementEvaluation,
};

/// A metric score paired with the judge output that produced it
///
/// `detail` is `None` only when the metric could not be computed, either
/// because a retry budget ran out or because the metric was skipped. In that
/// case `score` is 0 and must not be read as a real zero.
///
/// A NaN score is written as JSON `null` and read back as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore<D> {
    #[serde(deserialize_with = "score_or_nan")]
    pub score: f32,
    pub detail: Option<D>,
}

fn score_or_nan<'de, De: Deserializer<'de>>(deserializer: De) -> Result<f32, De::Error> {
    Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::NAN))
}

impl<D> MetricScore<D> {
    pub fn available(score: f32, detail: D) -> Self {
        Self {
            score,
            detail: Some(detail),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            score: 0.0,
            detail: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.detail.is_some()
    }

    /// The score if the metric was computed and is a number
    pub fn value(&self) -> Option<f32> {
        match self.detail {
            Some(_) if !self.score.is_nan() => Some(self.score),
            _ => None,
        }
    }
}

impl<D> Default for MetricScore<D> {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// All six metrics for one benchmark question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Semantic similarity of the ground truth and the generated answer
    pub answer_similarity: MetricScore<SimilarityEvaluation>,
    /// How well the answer addresses the question
    pub answer_relevancy: MetricScore<Vec<GeneratedQuestion>>,
    /// Factual agreement of the answer with the ground truth
    pub answer_correctness: MetricScore<CorrectnessEvaluation>,
    /// Factual consistency of the answer with the retrieved context
    pub faithfulness: MetricScore<Vec<StatementEvaluation>>,
    /// Share of retrieved partitions that were useful for the answer
    pub context_precision: MetricScore<Vec<ContextRelevancy>>,
    /// Share of ground-truth statements attributable to the retrieved context
    pub context_recall: MetricScore<Vec<GroundTruthClassification>>,
}

/// Metric names in evaluation order
pub const METRIC_NAMES: [&str; 6] = [
    "answer_relevancy",
    "answer_similarity",
    "answer_correctness",
    "faithfulness",
    "context_precision",
    "context_recall",
];

impl EvaluationMetrics {
    /// `(name, value)` for every metric, in [`METRIC_NAMES`] order
    pub fn values(&self) -> [(&'static str, Option<f32>); 6] {
        [
            (METRIC_NAMES[0], self.answer_relevancy.value()),
            (METRIC_NAMES[1], self.answer_similarity.value()),
            (METRIC_NAMES[2], self.answer_correctness.value()),
            (METRIC_NAMES[3], self.faithfulness.value()),
            (METRIC_NAMES[4], self.context_precision.value()),
            (METRIC_NAMES[5], self.context_recall.value()),
        ]
    }
}
