//! Faithfulness of the answer to the retrieved context

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

/// The judge's verdict on one answer statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementEvaluation {
    pub statement: String,
    #[serde(default)]
    pub reason: String,
    /// Greater than 0 when the context supports the statement
    pub verdict: i32,
}

#[derive(Debug, Deserialize)]
struct FaithfulnessEvaluations {
    #[serde(default)]
    evaluations: Vec<StatementEvaluation>,
}

pub struct FaithfulnessEvaluator {
    judge: Arc<dyn JudgeModel>,
    statements: StatementExtractor,
    prompt: JudgePrompt,
    max_retries: u32,
}

impl FaithfulnessEvaluator {
    pub fn new(judge: Arc<dyn JudgeModel>) -> Self {
        Self {
            judge,
            statements: StatementExtractor::new(),
            prompt: JudgePrompt::new(PromptKey::EvaluateFaithfulness),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn evaluate(&self, question: &str, answer: &str, context: &str) -> MetricScore<Vec<StatementEvaluation>> {
        super::degrade("faithfulness", self.try_evaluate(question, answer, context).await)
    }

    pub async fn evaluate_answer(&self, answer: &MemoryAnswer) -> MetricScore<Vec<StatementEvaluation>> {
        self.evaluate(&answer.question, &answer.result, &answer.context()).await
    }

    async fn try_evaluate(&self, question: &str, answer: &str, context: &str) -> Result<(f32, Vec<StatementEvaluation>)> {
        let judge = self.judge.as_ref();
        let statements = self
            .statements
            .extract(judge, question, answer, self.max_retries)
            .await?;

        // Nothing to verify; also guards the division below
        if statements.is_empty() {
            return Ok((0.0, Vec::new()));
        }

        let args = prompt_args! {
            "context" => context,
            "answer" => answer,
            "statements" => serde_json::to_string(&statements)?,
        };
        let (prompt, args) = (&self.prompt, &args);

        let faithfulness: FaithfulnessEvaluations =
            attempt(self.max_retries, move |_| async move { prompt.json(judge, args).await }).await?;

        // One verdict per extracted statement; extras from the judge are dropped
        let mut evaluations = faithfulness.evaluations;
        evaluations.truncate(statements.len());

        let supported = evaluations.iter().filter(|e| e.verdict > 0).count();
        let score = supported as f32 / statements.len() as f32;

        Ok((score, evaluations))
    }
}
