//! Atomic statement extraction shared by correctness and faithfulness

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::judge::{JudgeModel, JudgePrompt};
use crate::prompt_args;
use crate::prompts::PromptKey;
use crate::retry::attempt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StatementExtraction {
    #[serde(default)]
    statements: Vec<String>,
}

/// Breaks an answer into atomic factual statements
#[derive(Debug, Clone)]
pub struct StatementExtractor {
    prompt: JudgePrompt,
}

impl StatementExtractor {
    pub fn new() -> Self {
        Self {
            prompt: JudgePrompt::new(PromptKey::ExtractStatements),
        }
    }

    pub async fn extract(
        &self,
        judge: &dyn JudgeModel,
        question: &str,
        answer: &str,
        max_retries: u32,
    ) -> Result<Vec<String>> {
        let args = prompt_args! {
            "question" => question,
            "answer" => answer,
        };
        let (prompt, args) = (&self.prompt, &args);

        let extraction: StatementExtraction =
            attempt(max_retries, move |_| async move { prompt.json(judge, args).await }).await?;

        Ok(extraction
            .statements
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

impl Default for StatementExtractor {
    fn default() -> Self {
        Self::new()
    }
}
