//! LLM-judge evaluators
//!
//! Each evaluator turns some of (question, answer, context, ground truth)
//! into a [`MetricScore`](crate::metrics::MetricScore). Judge failures are
//! retried; once a retry budget is spent the evaluator returns an
//! unavailable score instead of failing, so one broken metric never aborts
//! a whole evaluation run.
//!
//! | Evaluator | Judge calls | Score |
//! |---|---|---|
//! | [`AnswerSimilarityEvaluator`] | none (embeddings) | cosine(ground truth, answer) |
//! | [`AnswerRelevancyEvaluator`] | `strictness` question reconstructions | mean cosine × committal |
//! | [`AnswerCorrectnessEvaluator`] | statements + classification | TP / (TP + ½(FP + FN)) |
//! | [`FaithfulnessEvaluator`] | statements + verdicts | supported / statements |
//! | [`ContextPrecisionEvaluator`] | one per partition | useful / partitions |
//! | [`ContextRecallEvaluator`] | one | attributed / ground-truth statements |

mod context_precision;
mod context_recall;
mod correctness;
mod faithfulness;
mod relevance;
mod similarity;
mod statements;

pub use context_precision::{ContextPrecisionEvaluator, ContextRelevancy};
pub use context_recall::{ContextRecallEvaluator, GroundTruthClassification};
pub use correctness::{correctness_score, AnswerCorrectnessEvaluator, CorrectnessEvaluation, StatementClassification};
pub use faithfulness::{FaithfulnessEvaluator, StatementEvaluation};
pub use relevance::{AnswerRelevancyEvaluator, GeneratedQuestion, DEFAULT_STRICTNESS};
pub use similarity::{cosine_similarity, AnswerSimilarityEvaluator, SimilarityEvaluation};
pub use statements::StatementExtractor;

use tracing::warn;

use crate::error::Result;
use crate::metrics::MetricScore;

/// Convert a stage result into a score, logging degradation
fn degrade<D>(metric: &str, result: Result<(f32, D)>) -> MetricScore<D> {
    match result {
        Ok((score, detail)) => MetricScore::available(score, detail),
        Err(e) => {
            warn!(metric, error = %e, "Metric unavailable after retries");
            MetricScore::unavailable()
        }
    }
}

/// `numerator / denominator`, or NaN when there is nothing to divide
fn ratio(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        f32::NAN
    } else {
        numerator as f32 / denominator as f32
    }
}
