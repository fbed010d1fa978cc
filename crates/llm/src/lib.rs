//! LLM client abstraction for rag-eval
//!
//! Provides a unified interface over OpenAI-compatible chat and embedding
//! endpoints. Judge calls use [`ChatOptions`] to pin sampling parameters so
//! repeated evaluations of the same answer stay reproducible.

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, EmbeddingInput,
        ResponseFormat,
    },
    Client as OpenAIClient,
};
use serde::{Deserialize, Serialize};

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (only openai-compatible endpoints are supported)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model to use for chat completions
    #[serde(default = "default_model")]
    pub model: String,
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// API key (optional if using env var or local provider)
    pub api_key: Option<String>,
    /// Base URL override (for custom endpoints)
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            api_key: None,
            base_url: None,
        }
    }
}

impl LlmConfig {
    /// Default configuration with the API key and base URL taken from
    /// `OPENAI_API_KEY` / `OPENAI_BASE_URL` when set
    pub fn from_env() -> Self {
        Self::default().with_env_fallback()
    }

    /// Fill unset credentials from the environment
    pub fn with_env_fallback(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL").ok();
        }
        self
    }
}

/// A message in a chat conversation
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters for a single chat completion
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub seed: Option<i64>,
    /// Ask the provider to constrain the output to a JSON object
    pub json_object: bool,
}

/// LLM client abstraction
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    /// Create a client from environment credentials and default models
    pub fn from_env() -> Result<Self> {
        let config = LlmConfig::from_env();
        if config.api_key.is_none() && config.base_url.is_none() {
            anyhow::bail!("OPENAI_API_KEY is not set and no base URL was configured");
        }
        Ok(Self::new(config))
    }

    /// Generate a chat completion with provider defaults
    pub async fn chat(&self, messages: Vec<Message>) -> Result<String> {
        self.chat_with(messages, &ChatOptions::default()).await
    }

    /// Generate a chat completion with explicit sampling options
    pub async fn chat_with(&self, messages: Vec<Message>, options: &ChatOptions) -> Result<String> {
        match self.config.provider.as_str() {
            "openai" => self.chat_openai(messages, options).await,
            provider => anyhow::bail!("Unsupported LLM provider: {}", provider),
        }
    }

    /// Simple completion with a system prompt and user message
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.chat(vec![Message::system(system), Message::user(user)])
            .await
    }

    /// Generate embeddings for a list of texts
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        match self.config.provider.as_str() {
            "openai" => self.embed_openai(texts).await,
            provider => anyhow::bail!("Unsupported embedding provider: {}", provider),
        }
    }

    /// Generate embedding for a single text
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed(vec![text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .context("No embedding returned")
    }

    fn openai_client(&self) -> OpenAIClient<OpenAIConfig> {
        let mut openai_config = OpenAIConfig::new();

        if let Some(api_key) = &self.config.api_key {
            openai_config = openai_config.with_api_key(api_key);
        }

        if let Some(base_url) = &self.config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        OpenAIClient::with_config(openai_config)
    }

    async fn embed_openai(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let client = self.openai_client();

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.config.embedding_model)
            .input(EmbeddingInput::StringArray(texts))
            .build()
            .context("Failed to build embedding request")?;

        let response = client
            .embeddings()
            .create(request)
            .await
            .context("Failed to create embeddings")?;

        // The API documents `index` but does not promise ordering
        let mut data = response.data;
        data.sort_by_key(|e| e.index);

        let embeddings: Vec<Vec<f32>> = data.into_iter().map(|e| e.embedding).collect();
        if embeddings.len() != expected {
            anyhow::bail!(
                "Embedding count mismatch: requested {}, received {}",
                expected,
                embeddings.len()
            );
        }

        Ok(embeddings)
    }

    async fn chat_openai(&self, messages: Vec<Message>, options: &ChatOptions) -> Result<String> {
        let client = self.openai_client();

        let openai_messages = messages
            .into_iter()
            .map(to_openai_message)
            .collect::<Result<Vec<ChatCompletionRequestMessage>>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.config.model).messages(openai_messages);
        if let Some(temperature) = options.temperature {
            args.temperature(temperature);
        }
        if let Some(top_p) = options.top_p {
            args.top_p(top_p);
        }
        if let Some(seed) = options.seed {
            args.seed(seed);
        }
        if options.json_object {
            args.response_format(ResponseFormat::JsonObject);
        }

        let request = args
            .build()
            .context("Failed to build chat completion request")?;

        let response = client
            .chat()
            .create(request)
            .await
            .context("Failed to create chat completion")?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }

    /// Get the configured model name
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the configured provider name
    pub fn provider(&self) -> &str {
        &self.config.provider
    }
}

fn to_openai_message(msg: Message) -> Result<ChatCompletionRequestMessage> {
    let message = match msg.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(msg.content)
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(msg.content)
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(msg.content)
            .build()?
            .into(),
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.embedding_model, "text-embedding-3-small");
    }

    #[test]
    fn test_env_fallback_keeps_explicit_key() {
        let config = LlmConfig {
            api_key: Some("explicit".to_string()),
            ..LlmConfig::default()
        }
        .with_env_fallback();
        assert_eq!(config.api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_message_builders() {
        let sys = Message::system("You are a strict grader");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "You are a strict grader");

        let user = Message::user("Grade this");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "Grade this");
    }

    #[test]
    fn test_chat_options_default_is_unconstrained() {
        let options = ChatOptions::default();
        assert!(options.temperature.is_none());
        assert!(options.seed.is_none());
        assert!(!options.json_object);
    }
}
