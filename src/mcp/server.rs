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

use anyhow::Result;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::mcp::logging::{log_mcp_request, log_mcp_response, log_tool_call};
use crate::mcp::lsp::LspProvider;
use crate::mcp::types::{JsonRpcRequest, JsonRpcResponse};

/// MCP server: newline-delimited JSON-RPC 2.0 over stdio.
///
/// Tool payloads are returned as a single text content block holding the
/// canonical JSON of the result; tool failures become `isError` results so a
/// broken peer never takes the transport down with it.
pub struct McpServer {
	provider: LspProvider,
}

impl McpServer {
	pub fn new(provider: LspProvider) -> Self {
		Self { provider }
	}

	/// Serve MCP until stdin closes or a shutdown signal arrives, then shut
	/// every language server down and return.
	pub async fn run(&self) -> Result<()> {
		let stdin = tokio::io::stdin();
		let stdout = tokio::io::stdout();
		let mut reader = BufReader::new(stdin);
		let mut writer = stdout;

		let shutdown = wait_for_shutdown_signal();
		tokio::pin!(shutdown);

		let mut line = String::new();

		loop {
			line.clear();

			tokio::select! {
				result = reader.read_line(&mut line) => {
					match result {
						Ok(0) => {
							info!("Client closed stdin");
							break;
						}
						Ok(_) => {
							if let Some(response) = self.handle_request(&line).await {
								let response_json = serde_json::to_string(&response)?;
								writer.write_all(response_json.as_bytes()).await?;
								writer.write_all(b"\n").await?;
								writer.flush().await?;
							}
						}
						Err(e) => {
							debug!(error = %e, "Error reading from stdin");
							break;
						}
					}
				}

				_ = &mut shutdown => {
					info!("Shutdown signal received");
					break;
				}
			}
		}

		self.provider.multiplexer().shutdown_all().await;
		info!("Bridge stopped");
		Ok(())
	}

	async fn handle_request(&self, line: &str) -> Option<JsonRpcResponse> {
		let line = line.trim();
		if line.is_empty() {
			return None;
		}

		let request: JsonRpcRequest = match serde_json::from_str(line) {
			Ok(request) => request,
			Err(e) => {
				return Some(JsonRpcResponse::error(
					None,
					-32700,
					format!("Parse error: {}", e),
				));
			}
		};

		// Notifications get no response.
		if request.id.is_none() {
			debug!(method = %request.method, "Notification received");
			return None;
		}

		log_mcp_request(&request.method, request.id.as_ref());
		let start_time = std::time::Instant::now();
		let request_id = request.id.clone();

		let response = match request.method.as_str() {
			"initialize" => self.handle_initialize(&request),
			"tools/list" => self.handle_tools_list(&request),
			"tools/call" => self.handle_tools_call(&request).await,
			"ping" => JsonRpcResponse::success(request.id, json!({})),
			_ => JsonRpcResponse::error(request.id, -32601, "Method not found"),
		};

		log_mcp_response(
			&request.method,
			response.error.is_none(),
			request_id.as_ref(),
			start_time.elapsed().as_millis() as u64,
		);

		Some(response)
	}

	fn handle_initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
		JsonRpcResponse::success(
			request.id.clone(),
			json!({
				"protocolVersion": "2024-11-05",
				"capabilities": {
					"tools": {
						"listChanged": false
					}
				},
				"serverInfo": {
					"name": "mcp-lsp-bridge",
					"version": env!("CARGO_PKG_VERSION"),
					"description": "Language server bridge exposing code navigation, inspection and refactoring tools"
				},
				"instructions": "This server bridges language servers into MCP tools. Positions are 1-indexed. Use goto_definition / find_references / hover for navigation, rename for refactoring, and diagnostics to fetch compiler findings for a file."
			}),
		)
	}

	fn handle_tools_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
		let tools = self.provider.tool_definitions();
		JsonRpcResponse::success(request.id.clone(), json!({ "tools": tools }))
	}

	async fn handle_tools_call(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
		let id = request.id.clone();

		let Some(params) = &request.params else {
			return JsonRpcResponse::error(
				id,
				-32602,
				"Invalid params: missing parameters object",
			);
		};

		let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
			return JsonRpcResponse::error(id, -32602, "Invalid params: missing tool name");
		};

		let default_args = json!({});
		let arguments = params.get("arguments").unwrap_or(&default_args);
		log_tool_call(tool_name, arguments);

		if !self.provider.multiplexer().has_clients() {
			return JsonRpcResponse::tool_error(
				id,
				&format!(
					"No language servers are configured. Create {} in the project root to register servers.",
					crate::config::CONFIG_FILE_NAME
				),
			);
		}

		match self.provider.call_tool(tool_name, arguments).await {
			Ok(payload) => JsonRpcResponse::tool_result(id, &payload),
			Err(e) => JsonRpcResponse::tool_error(id, &e.to_string()),
		}
	}
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	let interrupt = signal(SignalKind::interrupt());
	let terminate = signal(SignalKind::terminate());

	match (interrupt, terminate) {
		(Ok(mut interrupt), Ok(mut terminate)) => {
			tokio::select! {
				_ = interrupt.recv() => {}
				_ = terminate.recv() => {}
			}
		}
		_ => {
			// Signal registration failed; fall back to ctrl-c.
			let _ = tokio::signal::ctrl_c().await;
		}
	}
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
	let _ = tokio::signal::ctrl_c().await;
}
