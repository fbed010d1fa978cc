//! Answers returned by the system under test

use serde::{Deserialize, Serialize};

/// An answer produced by the RAG system being evaluated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryAnswer {
    pub question: String,
    pub result: String,
    #[serde(default)]
    pub relevant_sources: Vec<Citation>,
    /// The system found nothing to answer with
    #[serde(default)]
    pub no_result: bool,
}

/// A source document cited by an answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub partitions: Vec<CitationPartition>,
}

/// A retrieved text partition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationPartition {
    pub text: String,
}

impl MemoryAnswer {
    /// Texts of every retrieved partition, in citation order
    pub fn partition_texts(&self) -> Vec<String> {
        self.relevant_sources
            .iter()
            .flat_map(|c| c.partitions.iter().map(|p| p.text.clone()))
            .collect()
    }

    /// All retrieved partitions joined by newlines
    pub fn context(&self) -> String {
        self.partition_texts().join("\n")
    }
}
