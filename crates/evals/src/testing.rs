//! Scripted collaborators for unit tests

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::answer::{Citation, CitationPartition, MemoryAnswer};
use crate::judge::{Embedder, InvocationOptions, JudgeModel, Translator};
use crate::prompts::{PromptArgs, PromptKey, PromptTemplate};
use crate::target::{CorpusStore, StoredPartition, SystemUnderTest};

#[derive(Default)]
struct Script {
    queued: HashMap<PromptKey, VecDeque<Result<String, String>>>,
    defaults: HashMap<PromptKey, String>,
    calls: Vec<(PromptKey, PromptArgs)>,
}

/// Judge that replays queued completions per prompt key
///
/// Queued responses are consumed first; once a key's queue is empty its
/// default (if any) is returned on every call. A call with neither fails.
#[derive(Clone, Default)]
pub struct ScriptedJudge {
    script: Arc<Mutex<Script>>,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, key: PromptKey, completion: impl Into<String>) {
        let mut script = self.script.lock().unwrap();
        script.queued.entry(key).or_default().push_back(Ok(completion.into()));
    }

    pub fn push_error(&self, key: PromptKey, message: impl Into<String>) {
        let mut script = self.script.lock().unwrap();
        script.queued.entry(key).or_default().push_back(Err(message.into()));
    }

    pub fn set_default(&self, key: PromptKey, completion: impl Into<String>) {
        self.script.lock().unwrap().defaults.insert(key, completion.into());
    }

    /// Arguments of every call made with `key`, in call order
    pub fn calls(&self, key: PromptKey) -> Vec<PromptArgs> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl JudgeModel for ScriptedJudge {
    async fn invoke(
        &self,
        prompt: &PromptTemplate,
        args: &PromptArgs,
        _options: &InvocationOptions,
    ) -> anyhow::Result<String> {
        let key = prompt.key();
        let mut script = self.script.lock().unwrap();
        script.calls.push((key, args.clone()));

        if let Some(next) = script.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return next.map_err(|e| anyhow!(e));
        }
        script
            .defaults
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted completion for {key}"))
    }
}

const FAKE_DIMENSIONS: usize = 64;

/// Deterministic bag-of-words embedder
///
/// Identical texts embed to identical vectors; texts sharing no words are
/// (almost always) orthogonal.
#[derive(Default)]
pub struct FakeEmbedder {
    failing: bool,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; FAKE_DIMENSIONS];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % FAKE_DIMENSIONS as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            anyhow::bail!("embedding service unavailable");
        }
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

/// System under test with canned answers keyed by question
#[derive(Default)]
pub struct FakeSystem {
    answers: Mutex<HashMap<String, MemoryAnswer>>,
    asks: AtomicUsize,
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `question` with `result`, citing `partitions`
    pub fn answer(&self, question: &str, result: &str, partitions: &[&str]) {
        let answer = MemoryAnswer {
            question: question.to_string(),
            result: result.to_string(),
            relevant_sources: vec![Citation {
                document_id: Some("doc".to_string()),
                partitions: partitions
                    .iter()
                    .map(|text| CitationPartition { text: text.to_string() })
                    .collect(),
            }],
            no_result: false,
        };
        self.answers.lock().unwrap().insert(question.to_string(), answer);
    }

    pub fn ask_count(&self) -> usize {
        self.asks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SystemUnderTest for FakeSystem {
    async fn ask(&self, question: &str, _index: &str) -> anyhow::Result<MemoryAnswer> {
        self.asks.fetch_add(1, Ordering::SeqCst);
        let answers = self.answers.lock().unwrap();
        Ok(answers.get(question).cloned().unwrap_or_else(|| MemoryAnswer {
            question: question.to_string(),
            result: "INFO NOT FOUND".to_string(),
            relevant_sources: Vec::new(),
            no_result: true,
        }))
    }
}

/// In-memory corpus; every partition belongs to the one index
#[derive(Default)]
pub struct MemoryCorpus {
    partitions: Vec<StoredPartition>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, document_id: &str, texts: &[&str]) -> Self {
        self.partitions.extend(texts.iter().map(|text| StoredPartition {
            document_id: document_id.to_string(),
            text: text.to_string(),
        }));
        self
    }
}

#[async_trait]
impl CorpusStore for MemoryCorpus {
    async fn list_partitions(&self, _index: &str, document_id: Option<&str>) -> anyhow::Result<Vec<StoredPartition>> {
        Ok(self
            .partitions
            .iter()
            .filter(|p| document_id.map_or(true, |id| p.document_id == id))
            .cloned()
            .collect())
    }
}

/// Translator that tags text with the target language
#[derive(Default)]
pub struct EchoTranslator {
    calls: AtomicUsize,
}

impl EchoTranslator {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for EchoTranslator {
    async fn translate(&self, text: &str, language: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("[{language}] {text}"))
    }
}
