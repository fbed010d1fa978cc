//! `rag-eval` configuration
//!
//! Read from `config.toml` in the platform config directory, or from the
//! directory named by `RAG_EVAL_CONFIG_PATH`. A missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use llm::LlmConfig;
use serde::{Deserialize, Serialize};

use crate::generator::{Distribution, GenerationOptions};
use crate::harness::EvaluatorOptions;
use crate::retry::DEFAULT_MAX_RETRIES;

const APP_NAME: &str = "rag-eval";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model used to judge, extract and synthesize
    #[serde(default)]
    pub judge: LlmConfig,
    /// Model used for translation; falls back to the judge
    #[serde(default)]
    pub translator: Option<LlmConfig>,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

/// The RAG daemon being evaluated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub socket_path: Option<PathBuf>,
    pub index: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub count: usize,
    pub retry_count: u32,
    pub language: Option<String>,
    pub distribution: Distribution,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let defaults = GenerationOptions::default();
        Self {
            count: defaults.count,
            retry_count: defaults.retry_count,
            language: defaults.language,
            distribution: defaults.distribution,
        }
    }
}

impl GenerationConfig {
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            count: self.count,
            retry_count: self.retry_count,
            language: self.language.clone(),
            distribution: self.distribution,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub strictness: usize,
    pub retry_count: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            strictness: crate::evaluators::DEFAULT_STRICTNESS,
            retry_count: DEFAULT_MAX_RETRIES,
        }
    }
}

impl EvaluationConfig {
    pub fn options(&self) -> EvaluatorOptions {
        EvaluatorOptions {
            strictness: self.strictness,
            max_retries: self.retry_count,
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    // RAG_EVAL_CONFIG_PATH overrides the default config directory
    if let Ok(path) = std::env::var("RAG_EVAL_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("Could not determine config directory")
}

pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

pub fn get_socket_path(config: &Config) -> Result<PathBuf> {
    if let Some(path) = &config.target.socket_path {
        return Ok(path.clone());
    }
    Ok(get_config_dir()?.join("rag.sock"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_file()?)
}

pub fn load_config_from(config_file: &Path) -> Result<Config> {
    let mut config = if config_file.exists() {
        let contents = fs::read_to_string(config_file)
            .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", config_file.display()))?
    } else {
        Config::default()
    };

    config.judge = config.judge.with_env_fallback();
    Ok(config)
}
