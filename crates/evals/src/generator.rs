//! Synthetic benchmark generation
//!
//! Every document in the index is cut into `count` contiguous nodes of
//! partitions. Nodes are handed out to the four question types according to
//! a [`Distribution`], and each node yields at most one [`TestSet`]:
//!
//! 1. keyphrases are extracted from the node and shuffled
//! 2. a seed question is written around the first keyphrase
//! 3. non-simple types rewrite the seed (reasoning, multi-context, conditional)
//! 4. a ground truth is generated and judged; invalid ones are regenerated
//!
//! Unlike evaluation, a stage that exhausts its retries fails the whole run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_stream::try_stream;
use futures::Stream;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EvalError, Result};
use crate::judge::{JudgeModel, JudgePrompt, Translator};
use crate::prompt_args;
use crate::prompts::{PromptArgs, PromptKey};
use crate::retry::{attempt, attempt_validated, DEFAULT_MAX_RETRIES};
use crate::target::{CorpusStore, StoredPartition};
use crate::testset::{QuestionType, TestSet};

const DISTRIBUTION_TOLERANCE: f32 = 1e-4;

/// Share of questions per type; the four fractions must sum to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Distribution {
    pub simple: f32,
    pub reasoning: f32,
    pub multi_context: f32,
    pub conditioning: f32,
}

impl Default for Distribution {
    fn default() -> Self {
        Self {
            simple: 0.5,
            reasoning: 0.16,
            multi_context: 0.17,
            conditioning: 0.17,
        }
    }
}

impl Distribution {
    pub fn new(simple: f32, reasoning: f32, multi_context: f32, conditioning: f32) -> Result<Self> {
        let distribution = Self {
            simple,
            reasoning,
            multi_context,
            conditioning,
        };
        distribution.validate()?;
        Ok(distribution)
    }

    pub fn validate(&self) -> Result<()> {
        let fractions = [self.simple, self.reasoning, self.multi_context, self.conditioning];
        let sum: f32 = fractions.iter().sum();
        if fractions.iter().any(|f| *f < 0.0) || (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
            return Err(EvalError::InvalidDistribution(sum));
        }
        Ok(())
    }

    /// Nodes per question type out of `count`
    ///
    /// Simple rounds up, reasoning rounds down, the other two round to nearest.
    pub fn allocate(&self, count: usize) -> Allocation {
        // Absorb f32 noise such as 0.3 * 10 = 3.0000001
        const EPSILON: f64 = 1e-4;
        let scaled = |fraction: f32| count as f64 * fraction as f64;

        Allocation {
            simple: (scaled(self.simple) - EPSILON).ceil().max(0.0) as usize,
            reasoning: (scaled(self.reasoning) + EPSILON).floor().max(0.0) as usize,
            multi_context: scaled(self.multi_context).round().max(0.0) as usize,
            conditioning: scaled(self.conditioning).round().max(0.0) as usize,
        }
    }
}

/// Node counts per question type for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub simple: usize,
    pub reasoning: usize,
    pub multi_context: usize,
    pub conditioning: usize,
}

impl Allocation {
    /// `(type, node count)` in generation order
    pub fn windows(&self) -> [(QuestionType, usize); 4] {
        [
            (QuestionType::Simple, self.simple),
            (QuestionType::Reasoning, self.reasoning),
            (QuestionType::MultiContext, self.multi_context),
            (QuestionType::Conditioning, self.conditioning),
        ]
    }
}

/// Split `items` into at most `count` contiguous, non-empty groups
///
/// Group sizes differ by at most one, larger groups first. Every item lands
/// in exactly one group and order is preserved. With fewer items than
/// `count`, each item becomes its own group.
pub fn split_into_nodes<T>(items: &[T], count: usize) -> Vec<&[T]> {
    let groups = count.min(items.len());
    if groups == 0 {
        return Vec::new();
    }

    let base = items.len() / groups;
    let extra = items.len() % groups;

    let mut nodes = Vec::with_capacity(groups);
    let mut start = 0;
    for i in 0..groups {
        let size = base + usize::from(i < extra);
        nodes.push(&items[start..start + size]);
        start += size;
    }
    nodes
}

/// Generation progress: records emitted so far out of the expected total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub total: usize,
    pub current: usize,
}

pub type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;

/// Per-run generation settings
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Questions to generate per document
    pub count: usize,
    pub retry_count: u32,
    /// Translate questions and ground truths into this language
    pub language: Option<String>,
    pub distribution: Distribution,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            count: 10,
            retry_count: DEFAULT_MAX_RETRIES,
            language: None,
            distribution: Distribution::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Keyphrases {
    #[serde(default)]
    keyphrases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QuestionAnswer {
    answer: String,
    verdict: i32,
}

/// Builds benchmarks from the partitions of an index
pub struct TestSetGenerator {
    judge: Arc<dyn JudgeModel>,
    corpus: Arc<dyn CorpusStore>,
    translator: Option<Arc<dyn Translator>>,
    rng: Mutex<StdRng>,
    on_progress: Option<ProgressCallback>,
    keyphrases: JudgePrompt,
    seed_question: JudgePrompt,
    reasoning_question: JudgePrompt,
    multi_context_question: JudgePrompt,
    conditional_question: JudgePrompt,
    question_answer: JudgePrompt,
}

impl TestSetGenerator {
    pub fn new(judge: Arc<dyn JudgeModel>, corpus: Arc<dyn CorpusStore>) -> Self {
        Self {
            judge,
            corpus,
            translator: None,
            rng: Mutex::new(StdRng::from_entropy()),
            on_progress: None,
            keyphrases: JudgePrompt::new(PromptKey::ExtractKeyphrases),
            seed_question: JudgePrompt::new(PromptKey::SeedQuestion),
            reasoning_question: JudgePrompt::new(PromptKey::ReasoningQuestion),
            multi_context_question: JudgePrompt::new(PromptKey::MultiContextQuestion),
            conditional_question: JudgePrompt::new(PromptKey::ConditionalQuestion),
            question_answer: JudgePrompt::new(PromptKey::QuestionAnswer),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Fix the keyphrase shuffle for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn with_on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Generate a benchmark for `index`
    ///
    /// Options are validated before any model or corpus call; the returned
    /// stream yields test sets document by document as they are produced.
    pub fn generate(
        &self,
        index: impl Into<String>,
        options: GenerationOptions,
    ) -> Result<impl Stream<Item = Result<TestSet>> + '_> {
        options.distribution.validate()?;
        if options.language.is_some() && self.translator.is_none() {
            return Err(EvalError::MissingTranslator);
        }

        let index = index.into();
        let allocation = options.distribution.allocate(options.count);

        Ok(try_stream! {
            let documents = self.document_ids(&index).await?;
            let mut progress = Progress {
                total: documents.len() * options.count,
                current: 0,
            };
            info!(index = %index, documents = documents.len(), total = progress.total, "Generating test sets");
            self.report(progress);

            for document_id in &documents {
                let partitions = self
                    .corpus
                    .list_partitions(&index, Some(document_id))
                    .await
                    .map_err(EvalError::Corpus)?;
                let nodes = split_into_nodes(&partitions, options.count);
                info!(document = %document_id, partitions = partitions.len(), nodes = nodes.len(), "Generating for document");

                let mut remaining = nodes.as_slice();
                for (question_type, wanted) in allocation.windows() {
                    let (window, rest) = remaining.split_at(wanted.min(remaining.len()));
                    remaining = rest;

                    for node in window {
                        if let Some(test_set) = self.generate_node(question_type, node, &options).await? {
                            yield test_set;
                            progress.current += 1;
                            self.report(progress);
                        }
                    }
                }
            }
        })
    }

    fn report(&self, progress: Progress) {
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }

    /// Distinct document ids in storage order
    async fn document_ids(&self, index: &str) -> Result<Vec<String>> {
        let partitions = self
            .corpus
            .list_partitions(index, None)
            .await
            .map_err(EvalError::Corpus)?;

        let mut seen = HashSet::new();
        Ok(partitions
            .into_iter()
            .filter(|p| seen.insert(p.document_id.clone()))
            .map(|p| p.document_id)
            .collect())
    }

    async fn generate_node(
        &self,
        question_type: QuestionType,
        node: &[StoredPartition],
        options: &GenerationOptions,
    ) -> Result<Option<TestSet>> {
        let retries = options.retry_count;
        debug!(%question_type, partitions = node.len(), "Generating question");

        let (question, context) = match question_type {
            QuestionType::MultiContext => {
                let (Some(first), Some(last)) = (node.first(), node.last()) else {
                    return Ok(None);
                };
                if node.len() < 2 {
                    debug!("Skipping single-partition node for multi-context question");
                    return Ok(None);
                }
                let seed = self.seed_question(&first.text, retries).await?;
                let question = self
                    .rewrite(
                        &self.multi_context_question,
                        prompt_args! {
                            "question" => seed,
                            "context1" => first.text,
                            "context2" => last.text,
                        },
                        retries,
                    )
                    .await?;
                (question, vec![first.text.clone(), last.text.clone()])
            }
            _ => {
                let context: Vec<String> = node.iter().map(|p| p.text.clone()).collect();
                let node_text = context.join(" ");
                let seed = self.seed_question(&node_text, retries).await?;

                let rewrite = match question_type {
                    QuestionType::Reasoning => Some(&self.reasoning_question),
                    QuestionType::Conditioning => Some(&self.conditional_question),
                    _ => None,
                };
                let question = match rewrite {
                    Some(prompt) => {
                        let args = prompt_args! {
                            "question" => seed,
                            "context" => node_text,
                        };
                        self.rewrite(prompt, args, retries).await?
                    }
                    None => seed,
                };
                (question, context)
            }
        };

        let ground_truth = self.ground_truth(&context.join(" "), &question, retries).await?;

        let (question, answer) = match &options.language {
            Some(language) => (
                self.translate(&question, language, retries).await?,
                self.translate(&ground_truth.answer, language, retries).await?,
            ),
            None => (question, ground_truth.answer),
        };

        Ok(Some(TestSet {
            question,
            question_type,
            ground_truth: answer,
            ground_truth_verdict: ground_truth.verdict,
            context,
        }))
    }

    async fn extract_keyphrases(&self, context: &str, retries: u32) -> Result<Vec<String>> {
        let args = prompt_args! { "input" => context };
        let (judge, prompt, args) = (self.judge.as_ref(), &self.keyphrases, &args);

        let mut phrases = attempt(retries, move |_| async move {
            let extracted: Keyphrases = prompt.json(judge, args).await?;
            let phrases: Vec<String> = extracted
                .keyphrases
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            if phrases.is_empty() {
                return Err(EvalError::Unusable("no keyphrases extracted".to_string()));
            }
            Ok(phrases)
        })
        .await?;

        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            phrases.shuffle(&mut *rng);
        }
        Ok(phrases)
    }

    async fn seed_question(&self, context: &str, retries: u32) -> Result<String> {
        let phrases = self.extract_keyphrases(context, retries).await?;
        let args = prompt_args! {
            "keyPhrase" => phrases[0],
            "context" => context,
        };
        self.rewrite(&self.seed_question, args, retries).await
    }

    async fn rewrite(&self, prompt: &JudgePrompt, args: PromptArgs, retries: u32) -> Result<String> {
        let (judge, args) = (self.judge.as_ref(), &args);
        attempt(retries, move |_| async move { prompt.text(judge, args).await }).await
    }

    /// Answer `question` from `context`, regenerating answers the judge rejects
    async fn ground_truth(&self, context: &str, question: &str, retries: u32) -> Result<QuestionAnswer> {
        let args = prompt_args! {
            "context" => context,
            "question" => question,
        };
        let (judge, prompt, args) = (self.judge.as_ref(), &self.question_answer, &args);

        attempt_validated(
            retries,
            move |_| async move { prompt.json::<QuestionAnswer>(judge, args).await },
            |answer| answer.verdict > 0,
        )
        .await
    }

    async fn translate(&self, text: &str, language: &str, retries: u32) -> Result<String> {
        let translator = self.translator.as_deref().ok_or(EvalError::MissingTranslator)?;
        attempt(retries, move |_| async move {
            translator
                .translate(text, language)
                .await
                .map_err(EvalError::Translation)
        })
        .await
    }
}
