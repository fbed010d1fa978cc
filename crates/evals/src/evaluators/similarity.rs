//! Embedding similarity between ground truth and answer

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::answer::MemoryAnswer;
use crate::error::{EvalError, Result};
use crate::judge::Embedder;
use crate::metrics::MetricScore;
use crate::retry::{attempt, DEFAULT_MAX_RETRIES};
use crate::testset::TestSet;

/// The two texts that were compared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEvaluation {
    pub ground_truth: String,
    pub answer: String,
}

/// Cosine similarity of two vectors
///
/// Returns 0 for mismatched lengths or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a < 1e-9 || norm_b < 1e-9 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Scores semantic similarity of the ground truth and the generated answer
pub struct AnswerSimilarityEvaluator {
    embedder: Arc<dyn Embedder>,
    max_retries: u32,
}

impl AnswerSimilarityEvaluator {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn evaluate(&self, ground_truth: &str, answer: &str) -> MetricScore<SimilarityEvaluation> {
        super::degrade("answer_similarity", self.try_evaluate(ground_truth, answer).await)
    }

    pub async fn evaluate_answer(&self, test_set: &TestSet, answer: &MemoryAnswer) -> MetricScore<SimilarityEvaluation> {
        self.evaluate(&test_set.ground_truth, &answer.result).await
    }

    async fn try_evaluate(&self, ground_truth: &str, answer: &str) -> Result<(f32, SimilarityEvaluation)> {
        let embedder = self.embedder.as_ref();
        let embeddings = attempt(self.max_retries, move |_| async move {
            let vectors = embedder
                .embed(vec![ground_truth.to_string(), answer.to_string()])
                .await
                .map_err(EvalError::Embedding)?;
            if vectors.len() != 2 {
                return Err(EvalError::Unusable(format!(
                    "expected 2 embeddings, got {}",
                    vectors.len()
                )));
            }
            Ok(vectors)
        })
        .await?;

        let score = cosine_similarity(&embeddings[0], &embeddings[1]);
        Ok((
            score,
            SimilarityEvaluation {
                ground_truth: ground_truth.to_string(),
                answer: answer.to_string(),
            },
        ))
    }
}
