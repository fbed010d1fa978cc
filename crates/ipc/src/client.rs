//! Socket client for daemon communication

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::protocol::{Error, ErrorCode, Request, Response};

/// Client for a daemon listening on a Unix socket
///
/// Opens one connection per request. Cloning is cheap and clones share
/// nothing but the socket path.
#[derive(Debug, Clone)]
pub struct Client {
    socket_path: PathBuf,
}

impl Client {
    /// Create a new client for the given socket path
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send a request and decode the result into `R`
    pub async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R> {
        let value = self.request(method, params).await?;
        serde_json::from_value(value)
            .with_context(|| format!("Failed to decode `{}` response", method))
    }

    /// Send a request and return the raw result value
    pub async fn request<P: Serialize>(&self, method: &str, params: P) -> Result<serde_json::Value> {
        let request = Request::new(method, params).context("Failed to create request")?;

        trace!("Sending request: {} (id={})", method, request.id);

        let response = self.send_request(&request).await?;

        if response.id != request.id {
            anyhow::bail!(
                "Response ID mismatch: expected {}, got {}",
                request.id,
                response.id
            );
        }

        response.into_result().map_err(|e| anyhow::anyhow!(e))
    }

    async fn send_request(&self, request: &Request) -> Result<Response> {
        let start = Instant::now();

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .with_context(|| format!(
                "Failed to connect to daemon at {}. Is the daemon running?",
                self.socket_path.display()
            ))?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut request_json = serde_json::to_string(request).context("Failed to serialize request")?;
        request_json.push('\n');

        writer
            .write_all(request_json.as_bytes())
            .await
            .context("Failed to write request")?;
        writer.flush().await.context("Failed to flush request")?;

        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .context("Failed to read response")?;

        if response_line.is_empty() {
            return Ok(Response::error(
                &request.id,
                Error::new(ErrorCode::ConnectionError, "Connection closed by daemon"),
            ));
        }

        let response: Response =
            serde_json::from_str(&response_line).context("Failed to parse response")?;

        debug!(
            method = %request.method,
            elapsed_ms = start.elapsed().as_micros() as f64 / 1000.0,
            "IPC round trip"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    /// Accept one connection and answer it with `reply(request)`
    fn serve_once(listener: UnixListener, reply: fn(Request) -> Response) {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let request: Request = serde_json::from_str(&line).unwrap();
            let mut out = serde_json::to_string(&reply(request)).unwrap();
            out.push('\n');
            writer.write_all(out.as_bytes()).await.unwrap();
        });
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new("/tmp/rag.sock");
        assert_eq!(client.socket_path(), Path::new("/tmp/rag.sock"));
    }

    #[tokio::test]
    async fn test_call_decodes_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag.sock");
        serve_once(UnixListener::bind(&path).unwrap(), |req| {
            Response::success(req.id, vec!["a", "b"]).unwrap()
        });

        let client = Client::new(&path);
        let values: Vec<String> = client.call("list", ()).await.unwrap();
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_daemon_error_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag.sock");
        serve_once(UnixListener::bind(&path).unwrap(), |req| {
            Response::error(req.id, Error::method_not_found(&req.method))
        });

        let client = Client::new(&path);
        let err = client.request("nope", ()).await.unwrap_err();
        assert!(err.to_string().contains("Unknown method: nope"));
    }

    #[tokio::test]
    async fn test_missing_socket_fails_with_context() {
        let client = Client::new("/nonexistent/dir/rag.sock");
        let err = client.request("ask", ()).await.unwrap_err();
        assert!(err.to_string().contains("Is the daemon running?"));
    }
}
