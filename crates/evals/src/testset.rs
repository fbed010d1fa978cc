//! Benchmark records

use serde::{Deserialize, Serialize};

/// The kind of synthetic question a test set holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Simple,
    Reasoning,
    MultiContext,
    Conditioning,
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QuestionType::Simple => "simple",
            QuestionType::Reasoning => "reasoning",
            QuestionType::MultiContext => "multi_context",
            QuestionType::Conditioning => "conditioning",
        };
        f.write_str(name)
    }
}

/// One benchmark question with its ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSet {
    pub question: String,
    pub question_type: QuestionType,
    pub ground_truth: String,
    /// Validity verdict from the generation-time judge (>0 is valid)
    pub ground_truth_verdict: i32,
    /// Partitions the question was synthesized from, in order
    pub context: Vec<String>,
}

impl TestSet {
    /// Whether the generation-time judge accepted the ground truth
    pub fn is_verified(&self) -> bool {
        self.ground_truth_verdict > 0
    }
}
