//! Answer correctness against the ground truth

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::StatementExtractor;
use crate::answer::MemoryAnswer;
use crate::error::Result;
use crate::judge::{JudgeModel, JudgePrompt};
use crate::metrics::MetricScore;
use crate::prompt_args;
use crate::prompts::PromptKey;
use crate::retry::{attempt, DEFAULT_MAX_RETRIES};
use crate::testset::TestSet;

/// A statement with the judge's reason for its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementClassification {
    pub statement: String,
    #[serde(default)]
    pub reason: String,
}

/// Statements sorted into true positives, false positives and false negatives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectnessEvaluation {
    /// In the answer and supported by the ground truth
    #[serde(rename = "TP", default)]
    pub tp: Vec<StatementClassification>,
    /// In the answer but unsupported or contradicted
    #[serde(rename = "FP", default)]
    pub fp: Vec<StatementClassification>,
    /// In the ground truth but missing from the answer
    #[serde(rename = "FN", default)]
    pub fn_: Vec<StatementClassification>,
}

/// `TP / (TP + 0.5 * (FP + FN))`, or 0 without true positives
pub fn correctness_score(evaluation: &CorrectnessEvaluation) -> f32 {
    let tp = evaluation.tp.len() as f32;
    if tp == 0.0 {
        return 0.0;
    }
    let misses = (evaluation.fp.len() + evaluation.fn_.len()) as f32;
    tp / (tp + 0.5 * misses)
}

pub struct AnswerCorrectnessEvaluator {
    judge: Arc<dyn JudgeModel>,
    statements: StatementExtractor,
    prompt: JudgePrompt,
    max_retries: u32,
}

impl AnswerCorrectnessEvaluator {
    pub fn new(judge: Arc<dyn JudgeModel>) -> Self {
        Self {
            judge,
            statements: StatementExtractor::new(),
            prompt: JudgePrompt::new(PromptKey::EvaluateCorrectness),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn evaluate(&self, question: &str, answer: &str, ground_truth: &str) -> MetricScore<CorrectnessEvaluation> {
        super::degrade("answer_correctness", self.try_evaluate(question, answer, ground_truth).await)
    }

    pub async fn evaluate_answer(&self, test_set: &TestSet, answer: &MemoryAnswer) -> MetricScore<CorrectnessEvaluation> {
        self.evaluate(&test_set.question, &answer.result, &test_set.ground_truth).await
    }

    async fn try_evaluate(&self, question: &str, answer: &str, ground_truth: &str) -> Result<(f32, CorrectnessEvaluation)> {
        let judge = self.judge.as_ref();
        let statements = self
            .statements
            .extract(judge, question, answer, self.max_retries)
            .await?;

        let args = prompt_args! {
            "question" => question,
            "answer" => serde_json::to_string(&statements)?,
            "ground_truth" => serde_json::to_string(&[ground_truth])?,
        };
        let (prompt, args) = (&self.prompt, &args);

        let evaluation: CorrectnessEvaluation =
            attempt(self.max_retries, move |_| async move { prompt.json(judge, args).await }).await?;

        Ok((correctness_score(&evaluation), evaluation))
    }
}
