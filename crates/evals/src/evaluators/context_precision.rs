//! Precision of the retrieved context

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::answer::MemoryAnswer;
use crate::error::Result;
use crate::judge::{JudgeModel, JudgePrompt};
use crate::metrics::MetricScore;
use crate::prompt_args;
use crate::prompts::PromptKey;
use crate::retry::{attempt, DEFAULT_MAX_RETRIES};

/// The judge's verdict on one retrieved partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRelevancy {
    #[serde(default)]
    pub reason: String,
    /// Greater than 0 when the partition was useful for the answer
    pub verdict: i32,
    #[serde(default)]
    pub partition_text: String,
}

/// Judges every retrieved partition independently
pub struct ContextPrecisionEvaluator {
    judge: Arc<dyn JudgeModel>,
    prompt: JudgePrompt,
    max_retries: u32,
}

impl ContextPrecisionEvaluator {
    pub fn new(judge: Arc<dyn JudgeModel>) -> Self {
        Self {
            judge,
            prompt: JudgePrompt::new(PromptKey::EvaluateContextPrecision),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Score the partitions; with no partitions the score is NaN
    pub async fn evaluate(&self, question: &str, answer: &str, partitions: &[String]) -> MetricScore<Vec<ContextRelevancy>> {
        super::degrade("context_precision", self.try_evaluate(question, answer, partitions).await)
    }

    pub async fn evaluate_answer(&self, answer: &MemoryAnswer) -> MetricScore<Vec<ContextRelevancy>> {
        self.evaluate(&answer.question, &answer.result, &answer.partition_texts())
            .await
    }

    async fn try_evaluate(&self, question: &str, answer: &str, partitions: &[String]) -> Result<(f32, Vec<ContextRelevancy>)> {
        let mut verdicts = Vec::with_capacity(partitions.len());
        for partition in partitions {
            verdicts.push(self.judge_partition(question, answer, partition).await?);
        }

        let useful = verdicts.iter().filter(|v| v.verdict > 0).count();
        Ok((super::ratio(useful, verdicts.len()), verdicts))
    }

    async fn judge_partition(&self, question: &str, answer: &str, partition: &str) -> Result<ContextRelevancy> {
        let args = prompt_args! {
            "question" => question,
            "answer" => answer,
            "context" => partition,
        };
        let (judge, prompt, args) = (self.judge.as_ref(), &self.prompt, &args);

        let mut relevancy: ContextRelevancy =
            attempt(self.max_retries, move |_| async move { prompt.json(judge, args).await }).await?;
        relevancy.partition_text = partition.to_string();

        Ok(relevancy)
    }
}
