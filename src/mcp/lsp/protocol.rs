// Copyright 2025 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! LSP protocol message types, stream framing and path utilities

use anyhow::Result;
use lsp_types::Uri;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use url::Url;

/// LSP request message wrapper
#[derive(Debug, Clone, Serialize)]
pub struct LspRequest {
	pub jsonrpc: String,
	pub id: u32,
	pub method: String,
	pub params: Value,
}

impl LspRequest {
	pub fn new(id: u32, method: impl Into<String>, params: Value) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			id,
			method: method.into(),
			params,
		}
	}
}

/// LSP notification message wrapper
#[derive(Debug, Clone, Serialize)]
pub struct LspNotification {
	pub jsonrpc: String,
	pub method: String,
	pub params: Value,
}

impl LspNotification {
	pub fn new(method: impl Into<String>, params: Value) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			method: method.into(),
			params,
		}
	}
}

/// Response sent back to a server-initiated request.
#[derive(Debug, Clone, Serialize)]
pub struct LspReply {
	pub jsonrpc: String,
	pub id: Value,
	pub result: Value,
}

impl LspReply {
	pub fn new(id: Value, result: Value) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			id,
			result,
		}
	}
}

/// LSP response message wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct LspResponse {
	pub id: Option<u32>,
	pub result: Option<Value>,
	pub error: Option<LspError>,
}

/// LSP error payload
#[derive(Debug, Clone, Deserialize)]
pub struct LspError {
	pub code: i64,
	pub message: String,
	#[serde(default)]
	pub data: Option<Value>,
}

/// Notification received from the server (no `id`).
#[derive(Debug, Clone, Deserialize)]
pub struct LspIncomingNotification {
	pub method: String,
	#[serde(default)]
	pub params: Option<Value>,
}

/// Request initiated by the server; must be answered to keep some peers alive.
#[derive(Debug, Clone, Deserialize)]
pub struct LspIncomingRequest {
	pub id: Value,
	pub method: String,
	#[serde(default)]
	pub params: Option<Value>,
}

/// A message read from the server's stdout.
///
/// JSON-RPC messages are classified by the structural presence of `method`
/// and `id` rather than serde's untagged matching: a response has no
/// `method`, a server request has both, a notification only `method`.
#[derive(Debug, Clone)]
pub enum LspMessage {
	Response(LspResponse),
	Notification(LspIncomingNotification),
	Request(LspIncomingRequest),
}

impl LspMessage {
	pub fn classify(value: Value) -> Result<Self> {
		let has_method = value.get("method").is_some();
		let has_id = value.get("id").is_some();

		match (has_method, has_id) {
			(false, _) => Ok(LspMessage::Response(serde_json::from_value(value)?)),
			(true, false) => Ok(LspMessage::Notification(serde_json::from_value(value)?)),
			(true, true) => Ok(LspMessage::Request(serde_json::from_value(value)?)),
		}
	}
}

/// Serialize a message with the `Content-Length` framing LSP requires.
pub fn encode_message<T: Serialize>(message: &T) -> Result<Vec<u8>> {
	let json = serde_json::to_string(message)?;
	let framed = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
	Ok(framed.into_bytes())
}

/// Read one framed LSP message from the stream.
///
/// Returns `None` on EOF. Unknown headers (e.g. `Content-Type`) are skipped.
pub async fn read_message<R>(reader: &mut BufReader<R>) -> Result<Option<LspMessage>>
where
	R: AsyncRead + Unpin,
{
	let mut content_length = 0usize;
	let mut buffer = String::new();

	loop {
		buffer.clear();
		match reader.read_line(&mut buffer).await? {
			0 => return Ok(None), // EOF
			_ => {
				let line = buffer.trim();
				if line.is_empty() {
					break;
				} else if let Some(value) = line.strip_prefix("Content-Length:") {
					content_length = value.trim().parse::<usize>()?;
				}
			}
		}
	}

	if content_length == 0 {
		return Err(anyhow::anyhow!("Missing or invalid Content-Length header"));
	}

	let mut content = vec![0u8; content_length];
	reader.read_exact(&mut content).await?;

	let value: Value = serde_json::from_slice(&content)?;
	Ok(Some(LspMessage::classify(value)?))
}

// ─── Path utilities ──────────────────────────────────────────────────────────

/// Convert an absolute file path to a `file://` URL.
pub fn file_path_to_uri(path: &std::path::Path) -> Result<Url> {
	Url::from_file_path(path)
		.map_err(|_| anyhow::anyhow!("Failed to convert path to URI: {}", path.display()))
}

/// Convert an LSP URI back to a file path.
pub fn uri_to_file_path(uri: &Uri) -> Result<std::path::PathBuf> {
	let url = Url::parse(uri.as_str())?;
	url.to_file_path()
		.map_err(|_| anyhow::anyhow!("Failed to convert URI to file path: {}", uri.as_str()))
}

/// Convert an absolute file path to an `lsp_types::Uri`.
pub fn file_path_to_lsp_uri(path: &std::path::Path) -> Result<Uri> {
	let url = file_path_to_uri(path)?;
	Uri::from_str(url.as_ref())
		.map_err(|e| anyhow::anyhow!("Invalid URI '{}': {}", url, e))
}

/// Resolve a possibly-relative path against a working directory.
pub fn resolve_relative_path(
	working_dir: &std::path::Path,
	relative_path: &str,
) -> std::path::PathBuf {
	if std::path::Path::new(relative_path).is_absolute() {
		std::path::PathBuf::from(relative_path)
	} else {
		working_dir.join(relative_path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn classify_response() {
		let msg = LspMessage::classify(json!({
			"jsonrpc": "2.0",
			"id": 3,
			"result": {"capabilities": {}}
		}))
		.unwrap();
		match msg {
			LspMessage::Response(r) => {
				assert_eq!(r.id, Some(3));
				assert!(r.result.is_some());
				assert!(r.error.is_none());
			}
			other => panic!("expected response, got {:?}", other),
		}
	}

	#[test]
	fn classify_notification() {
		let msg = LspMessage::classify(json!({
			"jsonrpc": "2.0",
			"method": "textDocument/publishDiagnostics",
			"params": {"uri": "file:///a.rs", "diagnostics": []}
		}))
		.unwrap();
		match msg {
			LspMessage::Notification(n) => {
				assert_eq!(n.method, "textDocument/publishDiagnostics");
				assert!(n.params.is_some());
			}
			other => panic!("expected notification, got {:?}", other),
		}
	}

	#[test]
	fn classify_server_request() {
		let msg = LspMessage::classify(json!({
			"jsonrpc": "2.0",
			"id": "reg-1",
			"method": "client/registerCapability",
			"params": {"registrations": []}
		}))
		.unwrap();
		match msg {
			LspMessage::Request(r) => {
				assert_eq!(r.method, "client/registerCapability");
				assert_eq!(r.id, json!("reg-1"));
			}
			other => panic!("expected request, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn read_framed_message() {
		let body = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
		let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
		let mut reader = BufReader::new(framed.as_bytes());

		let msg = read_message(&mut reader).await.unwrap().unwrap();
		assert!(matches!(msg, LspMessage::Response(_)));

		// Stream exhausted afterwards.
		assert!(read_message(&mut reader).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn read_skips_extra_headers() {
		let body = r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#;
		let framed = format!(
			"Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=utf-8\r\n\r\n{}",
			body.len(),
			body
		);
		let mut reader = BufReader::new(framed.as_bytes());

		let msg = read_message(&mut reader).await.unwrap().unwrap();
		assert!(matches!(msg, LspMessage::Notification(_)));
	}

	#[test]
	fn encode_produces_content_length_frame() {
		let notification = LspNotification::new("initialized", json!({}));
		let bytes = encode_message(&notification).unwrap();
		let text = String::from_utf8(bytes).unwrap();
		let body = text.split("\r\n\r\n").nth(1).unwrap();
		assert!(text.starts_with(&format!("Content-Length: {}", body.len())));
	}

	#[test]
	fn uri_round_trip() {
		let path = std::path::Path::new("/work/project/src/main.rs");
		let uri = file_path_to_lsp_uri(path).unwrap();
		assert_eq!(uri.as_str(), "file:///work/project/src/main.rs");
		let back = uri_to_file_path(&uri).unwrap();
		assert_eq!(back, path);
	}

	#[test]
	fn resolve_relative_against_root() {
		let root = std::path::Path::new("/work/project");
		assert_eq!(
			resolve_relative_path(root, "src/lib.rs"),
			std::path::PathBuf::from("/work/project/src/lib.rs")
		);
		assert_eq!(
			resolve_relative_path(root, "/etc/hosts"),
			std::path::PathBuf::from("/etc/hosts")
		);
	}
}
