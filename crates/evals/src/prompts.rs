//! Packaged prompt templates
//!
//! Templates live under `prompts/<Category>/<Name>.txt` and are compiled into
//! the binary. They are addressed by a stable `(category, name)` pair; the
//! file contents may change, the keys may not.
//!
//! Placeholders use `{{name}}` syntax and are filled by [`PromptTemplate::render`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Arguments substituted into a template
pub type PromptArgs = HashMap<&'static str, String>;

/// Every packaged prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptKey {
    ExtractStatements,
    ExtractQuestion,
    ExtractKeyphrases,
    EvaluateCorrectness,
    EvaluateFaithfulness,
    EvaluateContextPrecision,
    EvaluateContextRecall,
    QuestionAnswer,
    SeedQuestion,
    ReasoningQuestion,
    MultiContextQuestion,
    ConditionalQuestion,
    Translate,
}

impl PromptKey {
    pub const ALL: [PromptKey; 13] = [
        PromptKey::ExtractStatements,
        PromptKey::ExtractQuestion,
        PromptKey::ExtractKeyphrases,
        PromptKey::EvaluateCorrectness,
        PromptKey::EvaluateFaithfulness,
        PromptKey::EvaluateContextPrecision,
        PromptKey::EvaluateContextRecall,
        PromptKey::QuestionAnswer,
        PromptKey::SeedQuestion,
        PromptKey::ReasoningQuestion,
        PromptKey::MultiContextQuestion,
        PromptKey::ConditionalQuestion,
        PromptKey::Translate,
    ];

    pub fn category(self) -> &'static str {
        match self {
            PromptKey::ExtractStatements | PromptKey::ExtractQuestion | PromptKey::ExtractKeyphrases => {
                "Extraction"
            }
            PromptKey::EvaluateCorrectness
            | PromptKey::EvaluateFaithfulness
            | PromptKey::EvaluateContextPrecision
            | PromptKey::EvaluateContextRecall => "Evaluation",
            PromptKey::QuestionAnswer
            | PromptKey::SeedQuestion
            | PromptKey::ReasoningQuestion
            | PromptKey::MultiContextQuestion
            | PromptKey::ConditionalQuestion => "SyntheticData",
            PromptKey::Translate => "Transmutation",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PromptKey::ExtractStatements => "Statements",
            PromptKey::ExtractQuestion => "Question",
            PromptKey::ExtractKeyphrases => "Keyphrase",
            PromptKey::EvaluateCorrectness => "Correctness",
            PromptKey::EvaluateFaithfulness => "Faithfulness",
            PromptKey::EvaluateContextPrecision => "ContextPrecision",
            PromptKey::EvaluateContextRecall => "ContextRecall",
            PromptKey::QuestionAnswer => "QuestionAnswer",
            PromptKey::SeedQuestion => "SeedQuestion",
            PromptKey::ReasoningQuestion => "ReasoningQuestion",
            PromptKey::MultiContextQuestion => "MultiContextQuestion",
            PromptKey::ConditionalQuestion => "ConditionalQuestion",
            PromptKey::Translate => "Translate",
        }
    }

    /// Whether the judge is asked to answer with a JSON object
    pub fn expects_json(self) -> bool {
        !matches!(
            self,
            PromptKey::SeedQuestion
                | PromptKey::ReasoningQuestion
                | PromptKey::MultiContextQuestion
                | PromptKey::ConditionalQuestion
                | PromptKey::Translate
        )
    }

    /// Look up a key by its `(category, name)` pair
    pub fn find(category: &str, name: &str) -> Option<PromptKey> {
        Self::ALL
            .into_iter()
            .find(|key| key.category() == category && key.name() == name)
    }

    fn source(self) -> &'static str {
        match self {
            PromptKey::ExtractStatements => include_str!("../prompts/Extraction/Statements.txt"),
            PromptKey::ExtractQuestion => include_str!("../prompts/Extraction/Question.txt"),
            PromptKey::ExtractKeyphrases => include_str!("../prompts/Extraction/Keyphrase.txt"),
            PromptKey::EvaluateCorrectness => include_str!("../prompts/Evaluation/Correctness.txt"),
            PromptKey::EvaluateFaithfulness => include_str!("../prompts/Evaluation/Faithfulness.txt"),
            PromptKey::EvaluateContextPrecision => {
                include_str!("../prompts/Evaluation/ContextPrecision.txt")
            }
            PromptKey::EvaluateContextRecall => include_str!("../prompts/Evaluation/ContextRecall.txt"),
            PromptKey::QuestionAnswer => include_str!("../prompts/SyntheticData/QuestionAnswer.txt"),
            PromptKey::SeedQuestion => include_str!("../prompts/SyntheticData/SeedQuestion.txt"),
            PromptKey::ReasoningQuestion => {
                include_str!("../prompts/SyntheticData/ReasoningQuestion.txt")
            }
            PromptKey::MultiContextQuestion => {
                include_str!("../prompts/SyntheticData/MultiContextQuestion.txt")
            }
            PromptKey::ConditionalQuestion => {
                include_str!("../prompts/SyntheticData/ConditionalQuestion.txt")
            }
            PromptKey::Translate => include_str!("../prompts/Transmutation/Translate.txt"),
        }
    }
}

impl fmt::Display for PromptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category(), self.name())
    }
}

/// A loaded prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    key: PromptKey,
    text: &'static str,
}

impl PromptTemplate {
    /// Load a template by its `(category, name)` pair
    pub fn load(category: &str, name: &str) -> Result<Self> {
        PromptKey::find(category, name)
            .map(Self::from_key)
            .ok_or_else(|| EvalError::UnknownPrompt {
                category: category.to_string(),
                name: name.to_string(),
            })
    }

    pub fn from_key(key: PromptKey) -> Self {
        Self {
            key,
            text: key.source(),
        }
    }

    pub fn key(&self) -> PromptKey {
        self.key
    }

    pub fn text(&self) -> &str {
        self.text
    }

    /// Substitute `{{name}}` placeholders
    ///
    /// Placeholders without a matching argument render as empty strings.
    pub fn render(&self, args: &PromptArgs) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let name = after[..end].trim();
                    if let Some(value) = args.get(name) {
                        out.push_str(value);
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);

        out
    }
}

/// Build a [`PromptArgs`] map from `name => value` pairs
#[macro_export]
macro_rules! prompt_args {
    ($($name:literal => $value:expr),* $(,)?) => {{
        let mut args = $crate::prompts::PromptArgs::new();
        $(args.insert($name, ::std::string::ToString::to_string(&$value));)*
        args
    }};
}
