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

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// MCP Protocol types
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest {
	pub jsonrpc: String,
	pub id: Option<Value>,
	pub method: String,
	pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
	pub jsonrpc: String,
	pub id: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
	pub code: i32,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl JsonRpcResponse {
	pub fn success(id: Option<Value>, result: Value) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			id,
			result: Some(result),
			error: None,
		}
	}

	pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			id,
			result: None,
			error: Some(JsonRpcError {
				code,
				message: message.into(),
				data: None,
			}),
		}
	}

	/// A `tools/call` result: one text content block with the canonical JSON
	/// of the payload.
	pub fn tool_result(id: Option<Value>, payload: &Value) -> Self {
		let text = serde_json::to_string(payload).unwrap_or_else(|_| "null".to_string());
		Self::success(
			id,
			json!({
				"content": [{ "type": "text", "text": text }]
			}),
		)
	}

	/// A failed `tools/call`: still a result, flagged `isError` with an
	/// `{"error": …}` text body, never a transport-level error.
	pub fn tool_error(id: Option<Value>, message: &str) -> Self {
		let text = json!({ "error": message }).to_string();
		Self::success(
			id,
			json!({
				"content": [{ "type": "text", "text": text }],
				"isError": true
			}),
		)
	}
}

/// MCP Tool definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
	pub name: String,
	pub description: String,
	#[serde(rename = "inputSchema")]
	pub input_schema: Value,
}
