//! Recall of the retrieved context against the ground truth

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::answer::MemoryAnswer;
use crate::error::{EvalError, Result};
use crate::judge::{JudgeModel, JudgePrompt};
use crate::metrics::MetricScore;
use crate::prompt_args;
use crate::prompts::PromptKey;
use crate::retry::{attempt, DEFAULT_MAX_RETRIES};
use crate::testset::TestSet;

/// Whether one ground-truth statement is attributable to the context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthClassification {
    #[serde(default, alias = "partitionText")]
    pub statement: String,
    #[serde(default)]
    pub reason: String,
    /// Greater than 0 when the context supports the statement
    pub attributed: i32,
}

#[derive(Debug, Deserialize)]
struct GroundTruthClassifications {
    #[serde(default)]
    evaluations: Vec<GroundTruthClassification>,
}

pub struct ContextRecallEvaluator {
    judge: Arc<dyn JudgeModel>,
    prompt: JudgePrompt,
    max_retries: u32,
}

impl ContextRecallEvaluator {
    pub fn new(judge: Arc<dyn JudgeModel>) -> Self {
        Self {
            judge,
            prompt: JudgePrompt::new(PromptKey::EvaluateContextRecall),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn evaluate(&self, question: &str, partitions: &[String], ground_truth: &str) -> MetricScore<Vec<GroundTruthClassification>> {
        super::degrade("context_recall", self.try_evaluate(question, partitions, ground_truth).await)
    }

    pub async fn evaluate_answer(&self, test_set: &TestSet, answer: &MemoryAnswer) -> MetricScore<Vec<GroundTruthClassification>> {
        self.evaluate(&test_set.question, &answer.partition_texts(), &test_set.ground_truth)
            .await
    }

    async fn try_evaluate(&self, question: &str, partitions: &[String], ground_truth: &str) -> Result<(f32, Vec<GroundTruthClassification>)> {
        let args = prompt_args! {
            "question" => question,
            "context" => serde_json::to_string(partitions)?,
            "ground_truth" => ground_truth,
        };
        let (judge, prompt, args) = (self.judge.as_ref(), &self.prompt, &args);

        let classifications = attempt(self.max_retries, move |_| async move {
            let parsed: GroundTruthClassifications = prompt.json(judge, args).await?;
            // A ground truth always has at least one sentence to classify
            if parsed.evaluations.is_empty() {
                return Err(EvalError::Unusable("no ground-truth statements classified".to_string()));
            }
            Ok(parsed.evaluations)
        })
        .await?;

        let attributed = classifications.iter().filter(|c| c.attributed > 0).count();
        Ok((super::ratio(attributed, classifications.len()), classifications))
    }
}
