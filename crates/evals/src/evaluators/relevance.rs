//! Answer relevancy via reverse question generation
//!
//! The judge reconstructs the question an answer appears to respond to.
//! Each reconstruction is compared to the real question by embedding
//! similarity and damped by the judge's committal flag, so evasive answers
//! score low even when their implied question matches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cosine_similarity;
use crate::answer::MemoryAnswer;
use crate::error::{EvalError, Result};
use crate::judge::{Embedder, JudgeModel, JudgePrompt};
use crate::metrics::MetricScore;
use crate::prompt_args;
use crate::prompts::PromptKey;
use crate::retry::{attempt, DEFAULT_MAX_RETRIES};

/// Number of question reconstructions per answer
pub const DEFAULT_STRICTNESS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
struct QuestionReconstruction {
    question: String,
    #[serde(default)]
    committal: f32,
}

/// One reconstructed question and its contribution to the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    /// 1 for a committal answer, lower for evasive ones
    pub committal: f32,
    pub similarity: f32,
    /// `similarity * committal`
    pub score: f32,
}

pub struct AnswerRelevancyEvaluator {
    judge: Arc<dyn JudgeModel>,
    embedder: Arc<dyn Embedder>,
    prompt: JudgePrompt,
    strictness: usize,
    max_retries: u32,
}

impl AnswerRelevancyEvaluator {
    pub fn new(judge: Arc<dyn JudgeModel>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            judge,
            embedder,
            prompt: JudgePrompt::new(PromptKey::ExtractQuestion),
            strictness: DEFAULT_STRICTNESS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set the number of reconstructions (at least one)
    pub fn with_strictness(mut self, strictness: usize) -> Self {
        self.strictness = strictness.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn evaluate(&self, question: &str, answer: &str, context: &str) -> MetricScore<Vec<GeneratedQuestion>> {
        super::degrade("answer_relevancy", self.try_evaluate(question, answer, context).await)
    }

    pub async fn evaluate_answer(&self, answer: &MemoryAnswer) -> MetricScore<Vec<GeneratedQuestion>> {
        self.evaluate(&answer.question, &answer.result, &answer.context()).await
    }

    async fn try_evaluate(&self, question: &str, answer: &str, context: &str) -> Result<(f32, Vec<GeneratedQuestion>)> {
        let args = prompt_args! {
            "context" => context,
            "answer" => answer,
        };
        let (judge, prompt, args) = (self.judge.as_ref(), &self.prompt, &args);

        let mut reconstructions = Vec::with_capacity(self.strictness);
        for _ in 0..self.strictness {
            let reconstruction: QuestionReconstruction =
                attempt(self.max_retries, move |_| async move { prompt.json(judge, args).await }).await?;
            reconstructions.push(reconstruction);
        }
        debug!(count = reconstructions.len(), "Reconstructed questions");

        let mut texts = Vec::with_capacity(reconstructions.len() + 1);
        texts.push(question.to_string());
        texts.extend(reconstructions.iter().map(|r| r.question.clone()));
        let expected = texts.len();

        let embedder = self.embedder.as_ref();
        let embeddings = attempt(self.max_retries, |_| {
            let texts = texts.clone();
            async move {
                let vectors = embedder.embed(texts).await.map_err(EvalError::Embedding)?;
                if vectors.len() != expected {
                    return Err(EvalError::Unusable(format!(
                        "expected {} embeddings, got {}",
                        expected,
                        vectors.len()
                    )));
                }
                Ok(vectors)
            }
        })
        .await?;

        let (original, generated) = embeddings.split_at(1);
        let questions: Vec<GeneratedQuestion> = reconstructions
            .into_iter()
            .zip(generated)
            .map(|(r, embedding)| {
                let similarity = cosine_similarity(&original[0], embedding);
                GeneratedQuestion {
                    score: similarity * r.committal,
                    question: r.question,
                    committal: r.committal,
                    similarity,
                }
            })
            .collect();

        let score = questions.iter().map(|q| q.score).sum::<f32>() / questions.len() as f32;
        Ok((score, questions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEmbedder, ScriptedJudge};

    fn evaluator(judge: &ScriptedJudge) -> AnswerRelevancyEvaluator {
        AnswerRelevancyEvaluator::new(Arc::new(judge.clone()), Arc::new(FakeEmbedder::new()))
    }

    #[tokio::test]
    async fn test_matching_committal_questions_score_one() {
        let judge = ScriptedJudge::new();
        judge.set_default(
            PromptKey::ExtractQuestion,
            r#"{"question": "Where is the Eiffel Tower?", "committal": 1}"#,
        );

        let result = evaluator(&judge)
            .evaluate("Where is the Eiffel Tower?", "In Paris.", "The Eiffel Tower is in Paris.")
            .await;

        assert!((result.score - 1.0).abs() < 1e-5);
        assert_eq!(result.detail.unwrap().len(), DEFAULT_STRICTNESS);
        assert_eq!(judge.calls(PromptKey::ExtractQuestion).len(), DEFAULT_STRICTNESS);
    }

    #[tokio::test]
    async fn test_noncommittal_answers_are_damped() {
        let judge = ScriptedJudge::new();
        judge.push(PromptKey::ExtractQuestion, r#"{"question": "Where is the Eiffel Tower?", "committal": 1}"#);
        judge.push(PromptKey::ExtractQuestion, r#"{"question": "Where is the Eiffel Tower?", "committal": 0}"#);

        let result = evaluator(&judge)
            .with_strictness(2)
            .evaluate("Where is the Eiffel Tower?", "Not sure.", "")
            .await;

        assert!((result.score - 0.5).abs() < 1e-5);
        let detail = result.detail.unwrap();
        assert_eq!(detail[1].score, 0.0);
        assert!((detail[1].similarity - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade() {
        let judge = ScriptedJudge::new();
        judge.set_default(PromptKey::ExtractQuestion, "not json");

        let result = evaluator(&judge).with_max_retries(1).evaluate("q", "a", "c").await;
        assert!(!result.is_available());
        assert_eq!(judge.calls(PromptKey::ExtractQuestion).len(), 2);
    }

    #[test]
    fn test_strictness_floor() {
        let judge = ScriptedJudge::new();
        assert_eq!(evaluator(&judge).with_strictness(0).strictness, 1);
    }
}
