//! The RAG system under test and the corpus it indexes
//!
//! Both are reached through narrow traits. [`IpcRagClient`] talks to a RAG
//! daemon over its Unix socket; [`JsonlCorpus`] reads an exported corpus from
//! disk so generation can run without a daemon.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::answer::MemoryAnswer;
use ipc::Client as IpcClient;

/// A stored text partition and the document it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPartition {
    pub document_id: String,
    pub text: String,
}

/// The RAG system being benchmarked
#[async_trait]
pub trait SystemUnderTest: Send + Sync {
    async fn ask(&self, question: &str, index: &str) -> Result<MemoryAnswer>;
}

/// Read access to the partitions stored in an index
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Partitions of `index` in storage order, optionally for one document
    async fn list_partitions(&self, index: &str, document_id: Option<&str>) -> Result<Vec<StoredPartition>>;
}

/// Client for a RAG daemon
#[derive(Debug, Clone)]
pub struct IpcRagClient {
    client: IpcClient,
}

impl IpcRagClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            client: IpcClient::new(socket_path),
        }
    }
}

#[async_trait]
impl SystemUnderTest for IpcRagClient {
    async fn ask(&self, question: &str, index: &str) -> Result<MemoryAnswer> {
        #[derive(Serialize)]
        struct Params<'a> {
            question: &'a str,
            index: &'a str,
        }

        self.client
            .call("ask", Params { question, index })
            .await
            .context("Failed to ask question")
    }
}

#[async_trait]
impl CorpusStore for IpcRagClient {
    async fn list_partitions(&self, index: &str, document_id: Option<&str>) -> Result<Vec<StoredPartition>> {
        #[derive(Serialize)]
        struct Params<'a> {
            index: &'a str,
            document_id: Option<&'a str>,
        }

        self.client
            .call("list_partitions", Params { index, document_id })
            .await
            .context("Failed to list partitions")
    }
}

/// Corpus exported as JSON lines of `{"document_id", "text"}`
///
/// The file holds a single index, so the index argument is ignored.
#[derive(Debug, Clone)]
pub struct JsonlCorpus {
    path: PathBuf,
}

impl JsonlCorpus {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CorpusStore for JsonlCorpus {
    async fn list_partitions(&self, _index: &str, document_id: Option<&str>) -> Result<Vec<StoredPartition>> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open corpus {}", self.path.display()))?;

        let mut lines = BufReader::new(file).lines();
        let mut partitions = Vec::new();
        let mut line_no = 0;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let partition: StoredPartition = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid partition", self.path.display(), line_no))?;

            if document_id.map_or(true, |id| partition.document_id == id) {
                partitions.push(partition);
            }
        }

        Ok(partitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipc::{Request, Response};
    use std::io::Write;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixListener;

    fn serve_once(listener: UnixListener, reply: fn(Request) -> Response) {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut line = String::new();
            BufReader::new(reader).read_line(&mut line).await.unwrap();
            let request: Request = serde_json::from_str(&line).unwrap();
            let mut out = serde_json::to_string(&reply(request)).unwrap();
            out.push('\n');
            writer.write_all(out.as_bytes()).await.unwrap();
        });
    }

    #[tokio::test]
    async fn test_jsonl_corpus_filters_by_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"document_id": "a", "text": "one"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"document_id": "b", "text": "two"}}"#).unwrap();
        writeln!(file, r#"{{"document_id": "a", "text": "three"}}"#).unwrap();

        let corpus = JsonlCorpus::new(file.path());
        let all = corpus.list_partitions("any", None).await.unwrap();
        assert_eq!(all.len(), 3);

        let a: Vec<String> = corpus
            .list_partitions("any", Some("a"))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(a, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn test_jsonl_corpus_reports_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"document_id": "a", "text": "one"}}"#).unwrap();
        writeln!(file, "not json").unwrap();

        let err = JsonlCorpus::new(file.path())
            .list_partitions("any", None)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains(":2: invalid partition"));
    }

    #[tokio::test]
    async fn test_ipc_ask_decodes_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag.sock");
        serve_once(UnixListener::bind(&path).unwrap(), |req| {
            assert_eq!(req.method, "ask");
            assert_eq!(req.params["index"], "docs");
            Response::success(
                req.id,
                serde_json::json!({
                    "question": req.params["question"],
                    "result": "In Paris.",
                    "relevantSources": [{"partitions": [{"text": "The tower is in Paris."}]}],
                    "noResult": false
                }),
            )
            .unwrap()
        });

        let answer = IpcRagClient::new(&path).ask("Where?", "docs").await.unwrap();
        assert_eq!(answer.question, "Where?");
        assert_eq!(answer.partition_texts(), vec!["The tower is in Paris."]);
        assert!(!answer.no_result);
    }

    #[tokio::test]
    async fn test_ipc_list_partitions_sends_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag.sock");
        serve_once(UnixListener::bind(&path).unwrap(), |req| {
            assert_eq!(req.params["document_id"], "doc-1");
            Response::success(req.id, vec![StoredPartition {
                document_id: "doc-1".to_string(),
                text: "hello".to_string(),
            }])
            .unwrap()
        });

        let partitions = IpcRagClient::new(&path)
            .list_partitions("docs", Some("doc-1"))
            .await
            .unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].text, "hello");
    }

    #[tokio::test]
    async fn test_ipc_undecodable_answer_names_method() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag.sock");
        serve_once(UnixListener::bind(&path).unwrap(), |req| {
            Response::success(req.id, serde_json::json!({"result": 42})).unwrap()
        });

        let err = IpcRagClient::new(&path).ask("Where?", "docs").await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Failed to ask question"));
        assert!(message.contains("Failed to decode `ask` response"));
    }
}
