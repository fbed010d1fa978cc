//! IPC transport for RAG daemons
//!
//! The system under test and its document store usually live in a separate
//! process. This crate carries newline-delimited JSON-RPC style messages
//! over a Unix socket and knows nothing about questions or partitions.
//!
//! ```text
//! evals (IpcRagClient)  ──>  ipc::Client  ──>  Unix socket  ──>  RAG daemon
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use ipc::Client;
//!
//! let client = Client::new("/path/to/rag.sock");
//! let answer: serde_json::Value = client.call("ask", json!({"question": "..."})).await?;
//! ```

mod client;
mod protocol;

pub use client::Client;
pub use protocol::{Error, ErrorCode, Request, Response};
