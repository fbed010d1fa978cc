//! Judge model, embedding and translation contracts
//!
//! The evaluators and the generator only see these traits. [`LlmClient`]
//! implements the judge and embedding contracts against an OpenAI-compatible
//! endpoint; tests substitute scripted fakes.

use anyhow::Context;
use async_trait::async_trait;
use llm::{ChatOptions, LlmClient, Message};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{EvalError, Result};
use crate::json::parse_json;
use crate::prompt_args;
use crate::prompts::{PromptArgs, PromptKey, PromptTemplate};

/// Sampling settings for one judge call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvocationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub seed: i64,
    pub json_object: bool,
}

impl InvocationOptions {
    /// Near-greedy, fixed-seed, JSON-constrained
    pub fn deterministic_json() -> Self {
        Self {
            json_object: true,
            ..Self::deterministic_text()
        }
    }

    /// Near-greedy, fixed-seed, free text
    pub fn deterministic_text() -> Self {
        Self {
            temperature: 1e-8,
            top_p: 1e-8,
            seed: 0,
            json_object: false,
        }
    }
}

impl From<InvocationOptions> for ChatOptions {
    fn from(options: InvocationOptions) -> Self {
        ChatOptions {
            temperature: Some(options.temperature),
            top_p: Some(options.top_p),
            seed: Some(options.seed),
            json_object: options.json_object,
        }
    }
}

/// A language model used purely to score, classify or synthesize
#[async_trait]
pub trait JudgeModel: Send + Sync {
    /// Render `prompt` with `args` and return the generated text
    async fn invoke(
        &self,
        prompt: &PromptTemplate,
        args: &PromptArgs,
        options: &InvocationOptions,
    ) -> anyhow::Result<String>;
}

/// Text embedding service; one vector per input, in input order
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Optional translation capability for generated benchmarks
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, language: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl JudgeModel for LlmClient {
    async fn invoke(
        &self,
        prompt: &PromptTemplate,
        args: &PromptArgs,
        options: &InvocationOptions,
    ) -> anyhow::Result<String> {
        let rendered = prompt.render(args);
        self.chat_with(vec![Message::user(rendered)], &(*options).into())
            .await
            .with_context(|| format!("{} invocation failed", prompt.key()))
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        LlmClient::embed(self, texts).await
    }
}

/// A prompt template bound to its invocation settings
///
/// Built once per evaluator or generator so templates are not reloaded on
/// every call.
#[derive(Debug, Clone)]
pub struct JudgePrompt {
    template: PromptTemplate,
    options: InvocationOptions,
}

impl JudgePrompt {
    pub fn new(key: PromptKey) -> Self {
        let options = if key.expects_json() {
            InvocationOptions::deterministic_json()
        } else {
            InvocationOptions::deterministic_text()
        };
        Self {
            template: PromptTemplate::from_key(key),
            options,
        }
    }

    pub fn key(&self) -> PromptKey {
        self.template.key()
    }

    /// Invoke and return the trimmed completion; empty output is an error
    pub async fn text(&self, model: &dyn JudgeModel, args: &PromptArgs) -> Result<String> {
        debug!(prompt = %self.key(), "Invoking judge");
        let output = model
            .invoke(&self.template, args, &self.options)
            .await
            .map_err(EvalError::Judge)?;

        let output = output.trim();
        if output.is_empty() {
            return Err(EvalError::EmptyCompletion);
        }
        Ok(output.to_string())
    }

    /// Invoke and parse the completion as JSON
    pub async fn json<T: DeserializeOwned>(&self, model: &dyn JudgeModel, args: &PromptArgs) -> Result<T> {
        let output = self.text(model, args).await?;
        parse_json(&output)
    }
}

/// Translator backed by the `Transmutation/Translate` prompt
pub struct PromptTranslator<M> {
    model: M,
    prompt: JudgePrompt,
}

impl<M: JudgeModel> PromptTranslator<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            prompt: JudgePrompt::new(PromptKey::Translate),
        }
    }
}

#[async_trait]
impl<M: JudgeModel> Translator for PromptTranslator<M> {
    async fn translate(&self, text: &str, language: &str) -> anyhow::Result<String> {
        let args = prompt_args! {
            "input" => text,
            "translate_to" => language,
        };
        Ok(self.prompt.text(&self.model, &args).await?)
    }
}
