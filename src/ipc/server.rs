//! JSON-lines framing for [`IpcHost`].
//!
//! One request object per input line, one response object per output line,
//! processed strictly in arrival order. The stream ends when input closes.

use crate::error::{AppError, ErrorKind};
use crate::ipc::{IpcHost, IpcRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct WireRequest {
    #[serde(default)]
    pub id: Value,
    pub channel: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireError {
    pub code: ErrorKind,
    pub message: String,
    pub serious: bool,
}

impl From<&AppError> for WireError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.kind,
            message: err.message.clone(),
            serious: err.is_serious(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireResponse {
    Ok { id: Value, ok: Value },
    Err { id: Value, error: WireError },
}

impl WireResponse {
    fn from_result(id: Value, result: Result<Value, AppError>) -> Self {
        match result {
            Ok(ok) => WireResponse::Ok { id, ok },
            Err(err) => WireResponse::Err {
                id,
                error: WireError::from(&err),
            },
        }
    }
}

async fn handle_line(host: &IpcHost, line: &str) -> WireResponse {
    let request: WireRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed IPC request");
            let err = AppError::validation(format!("Malformed request: {err}"));
            return WireResponse::from_result(Value::Null, Err(err));
        }
    };
    debug!(channel = %request.channel, "IPC request");

    let result = match IpcRequest::decode(&request.channel, request.args) {
        Ok(decoded) => host.handle(decoded).await,
        Err(err) => {
            warn!(channel = %request.channel, "{}", err.message);
            Err(err)
        }
    };
    WireResponse::from_result(request.id, result)
}

pub async fn serve<R, W>(host: &IpcHost, reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(host, line).await;
        let mut encoded = serde_json::to_vec(&response).map_err(io::Error::other)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }

    info!("IPC input closed, shutting down");
    host.shutdown().await;
    Ok(())
}

/// Serves on stdin/stdout.
pub async fn serve_stdio(host: &IpcHost) -> io::Result<()> {
    serve(host, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cipher::StaticKeyCipher;
    use crate::core::config::Config;
    use crate::core::credentials::CredentialStore;
    use crate::core::proxy::ProviderProxy;
    use crate::utils::test_utils::test_client;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn host(dir: &TempDir) -> IpcHost {
        let credentials = Arc::new(CredentialStore::new(
            dir.path().join("credentials"),
            Arc::new(StaticKeyCipher::new([5u8; 32])),
        ));
        let proxy = ProviderProxy::new(Config::default(), None, credentials.clone())
            .unwrap()
            .with_http_client(test_client())
            .with_env(|_| None);
        IpcHost::new(Arc::new(proxy), credentials)
    }

    async fn run(input: &str) -> Vec<Value> {
        let dir = TempDir::new().unwrap();
        let host = host(&dir);
        let mut output = Vec::new();
        serve(&host, input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn requests_are_answered_in_order() {
        let input = [
            r#"{"id":1,"channel":"set-provider","args":{"name":"dummy"}}"#,
            "",
            r#"{"id":2,"channel":"chat-send-message","args":{"text":"hello"}}"#,
            r#"{"id":3,"channel":"chat-get-history"}"#,
        ]
        .join("\n");

        let responses = run(&input).await;
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0], json!({"id": 1, "ok": null}));
        assert_eq!(responses[1]["id"], 2);
        assert!(responses[1]["ok"].as_str().unwrap().contains("hello"));
        assert_eq!(responses[2]["ok"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failures_carry_code_and_severity() {
        let input = [
            "not json",
            r#"{"id":"a","channel":"open-devtools"}"#,
            r#"{"id":"b","channel":"set-provider","args":{"name":"mystery"}}"#,
            r#"{"id":"c","channel":"chat-send-message","args":{"text":"hi"}}"#,
        ]
        .join("\n");

        let responses = run(&input).await;
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(responses[1]["id"], "a");
        assert_eq!(responses[1]["error"]["serious"], false);
        assert_eq!(responses[3]["error"]["code"], "CONFIG_ERROR");
        assert_eq!(responses[3]["error"]["serious"], true);
    }
}
