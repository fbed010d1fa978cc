//! Evaluation toolkit for retrieval-augmented generation
//!
//! Scores the answers of a RAG system against a benchmark with LLM judges,
//! and synthesizes that benchmark from the system's own corpus when none
//! exists.
//!
//! ## Pipelines
//!
//! - **Generation**: [`TestSetGenerator`] cuts each document into nodes and
//!   synthesizes simple, reasoning, multi-context and conditional questions
//!   with judged ground truths.
//! - **Evaluation**: [`TestSetEvaluator`] asks the system every question and
//!   scores each answer with six metrics.
//!
//! ## Metrics
//!
//! - **Answer similarity**: embedding cosine of answer and ground truth
//! - **Answer relevancy**: how well questions reconstructed from the answer match the original
//! - **Answer correctness**: statement-level F-score against the ground truth
//! - **Faithfulness**: share of answer statements supported by the retrieved context
//! - **Context precision**: share of retrieved partitions that were useful
//! - **Context recall**: share of ground-truth statements found in the retrieved context

pub mod answer;
pub mod config;
pub mod error;
pub mod evaluators;
pub mod generator;
pub mod harness;
pub mod json;
pub mod judge;
pub mod loader;
pub mod metrics;
pub mod prompts;
pub mod retry;
pub mod summary;
pub mod target;
pub mod testset;

#[cfg(test)]
mod testing;

pub use answer::{Citation, CitationPartition, MemoryAnswer};
pub use error::{EvalError, Result};
pub use generator::{Distribution, GenerationOptions, Progress, TestSetGenerator};
pub use harness::{EvaluatorOptions, QuestionEvaluation, TestSetEvaluator};
pub use judge::{Embedder, InvocationOptions, JudgeModel, PromptTranslator, Translator};
pub use loader::{read_jsonl, JsonlWriter};
pub use metrics::{EvaluationMetrics, MetricScore};
pub use prompts::{PromptKey, PromptTemplate};
pub use summary::MetricsSummary;
pub use target::{CorpusStore, IpcRagClient, JsonlCorpus, StoredPartition, SystemUnderTest};
pub use testset::{QuestionType, TestSet};
