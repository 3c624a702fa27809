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

//! Tool dispatcher: the MCP tool catalog and its translation to LSP requests

use anyhow::Result;
use lsp_types::Range;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::debug;

use super::client::{LspClient, DIAGNOSTICS_WAIT_MS};
use super::extensions::{ExtensionDescriptor, ExtensionParams};
use super::multiplexer::Multiplexer;
use super::normalize;
use crate::mcp::types::McpTool;

/// Dispatches MCP tool calls onto language servers.
///
/// Owns the catalog of standard tools, validates inputs before any peer is
/// touched, converts between the external 1-based and wire 0-based coordinate
/// conventions, and forwards declared protocol extensions.
pub struct LspProvider {
	multiplexer: Arc<Multiplexer>,
}

// ─── Input schema shapes ─────────────────────────────────────────────────────

fn file_property() -> Value {
	json!({
		"type": "string",
		"description": "Path to the file, relative to the project root"
	})
}

fn position_properties() -> Value {
	json!({
		"file": file_property(),
		"line": {
			"type": "integer",
			"minimum": 1,
			"description": "Line number (1-indexed)"
		},
		"col": {
			"type": "integer",
			"minimum": 1,
			"description": "Column number (1-indexed)"
		}
	})
}

fn schema_file_only() -> Value {
	json!({
		"type": "object",
		"properties": { "file": file_property() },
		"required": ["file"],
		"additionalProperties": false
	})
}

fn schema_position() -> Value {
	json!({
		"type": "object",
		"properties": position_properties(),
		"required": ["file", "line", "col"],
		"additionalProperties": false
	})
}

fn schema_code_actions() -> Value {
	let mut properties = position_properties();
	properties["endLine"] = json!({
		"type": "integer",
		"minimum": 1,
		"description": "End line of the range (1-indexed, defaults to line)"
	});
	properties["endCol"] = json!({
		"type": "integer",
		"minimum": 1,
		"description": "End column of the range (1-indexed, defaults to col)"
	});
	json!({
		"type": "object",
		"properties": properties,
		"required": ["file", "line", "col"],
		"additionalProperties": false
	})
}

fn schema_rename() -> Value {
	let mut properties = position_properties();
	properties["newName"] = json!({
		"type": "string",
		"description": "Replacement name for the symbol"
	});
	json!({
		"type": "object",
		"properties": properties,
		"required": ["file", "line", "col", "newName"],
		"additionalProperties": false
	})
}

fn schema_query() -> Value {
	json!({
		"type": "object",
		"properties": {
			"query": {
				"type": "string",
				"description": "Symbol search query"
			}
		},
		"required": ["query"],
		"additionalProperties": false
	})
}

fn schema_diagnostics() -> Value {
	json!({
		"type": "object",
		"properties": { "file": file_property() },
		"additionalProperties": false
	})
}

fn extension_schema(ext: &ExtensionDescriptor) -> Value {
	match ext.params {
		ExtensionParams::Document => schema_file_only(),
		ExtensionParams::DocumentPosition => schema_position(),
		ExtensionParams::Opaque => json!({
			"type": "object",
			"properties": {},
			"additionalProperties": true
		}),
	}
}

// ─── Argument validation ─────────────────────────────────────────────────────

fn required_str<'a>(arguments: &'a Value, name: &str) -> Result<&'a str> {
	arguments
		.get(name)
		.and_then(|v| v.as_str())
		.ok_or_else(|| anyhow::anyhow!("Missing required parameter: {}", name))
}

fn required_u32(arguments: &Value, name: &str) -> Result<u32> {
	arguments
		.get(name)
		.and_then(|v| v.as_u64())
		.map(|v| v as u32)
		.ok_or_else(|| anyhow::anyhow!("Missing required parameter: {}", name))
}

fn optional_u32(arguments: &Value, name: &str) -> Option<u32> {
	arguments.get(name).and_then(|v| v.as_u64()).map(|v| v as u32)
}

impl LspProvider {
	pub fn new(multiplexer: Arc<Multiplexer>) -> Self {
		Self { multiplexer }
	}

	pub fn multiplexer(&self) -> &Multiplexer {
		&self.multiplexer
	}

	/// The full tool catalog: standard tools plus every extension declared by
	/// a configured peer, whether or not it has started.
	pub fn tool_definitions(&self) -> Vec<McpTool> {
		let mut tools = vec![
			McpTool {
				name: "goto_definition".to_string(),
				description: "Go to the definition of the symbol at a position".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "goto_type_definition".to_string(),
				description: "Go to the type definition of the symbol at a position".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "goto_implementation".to_string(),
				description: "Go to the implementations of the symbol at a position".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "goto_declaration".to_string(),
				description: "Go to the declaration of the symbol at a position".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "find_references".to_string(),
				description: "Find all references to the symbol at a position, including its declaration".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "hover".to_string(),
				description: "Get hover information (type, documentation) for the symbol at a position".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "signature_help".to_string(),
				description: "Get signature help for the call at a position".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "document_symbols".to_string(),
				description: "List all symbols in a file".to_string(),
				input_schema: schema_file_only(),
			},
			McpTool {
				name: "workspace_symbols".to_string(),
				description: "Search for symbols across the workspace, querying every running language server".to_string(),
				input_schema: schema_query(),
			},
			McpTool {
				name: "code_actions".to_string(),
				description: "List the code actions available for a range".to_string(),
				input_schema: schema_code_actions(),
			},
			McpTool {
				name: "rename_prepare".to_string(),
				description: "Check whether the symbol at a position can be renamed".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "rename".to_string(),
				description: "Rename the symbol at a position across the workspace".to_string(),
				input_schema: schema_rename(),
			},
			McpTool {
				name: "call_hierarchy_incoming".to_string(),
				description: "List the callers of the function at a position".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "call_hierarchy_outgoing".to_string(),
				description: "List the functions called by the function at a position".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "type_hierarchy".to_string(),
				description: "Get the supertypes and subtypes of the type at a position".to_string(),
				input_schema: schema_position(),
			},
			McpTool {
				name: "open_file".to_string(),
				description: "Open a file in its language server and start diagnostics for it".to_string(),
				input_schema: schema_file_only(),
			},
			McpTool {
				name: "diagnostics".to_string(),
				description: "Get diagnostics for a file, or all cached diagnostics when no file is given".to_string(),
				input_schema: schema_diagnostics(),
			},
		];

		for ext in self.multiplexer.all_configured_extensions() {
			tools.push(McpTool {
				name: ext.tool_name.to_string(),
				description: ext.description.to_string(),
				input_schema: extension_schema(ext),
			});
		}

		tools
	}

	/// Execute one tool call; any failure becomes an `isError` result upstream.
	pub async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Value> {
		debug!(tool = name, "Dispatching tool call");

		match name {
			"goto_definition" => self.goto(arguments, GotoKind::Definition).await,
			"goto_type_definition" => self.goto(arguments, GotoKind::TypeDefinition).await,
			"goto_implementation" => self.goto(arguments, GotoKind::Implementation).await,
			"goto_declaration" => self.goto(arguments, GotoKind::Declaration).await,
			"find_references" => self.find_references(arguments).await,
			"hover" => self.hover(arguments).await,
			"signature_help" => self.signature_help(arguments).await,
			"document_symbols" => self.document_symbols(arguments).await,
			"workspace_symbols" => self.workspace_symbols(arguments).await,
			"code_actions" => self.code_actions(arguments).await,
			"rename_prepare" => self.rename_prepare(arguments).await,
			"rename" => self.rename(arguments).await,
			"call_hierarchy_incoming" => self.call_hierarchy(arguments, "from").await,
			"call_hierarchy_outgoing" => self.call_hierarchy(arguments, "to").await,
			"type_hierarchy" => self.type_hierarchy(arguments).await,
			"open_file" => self.open_file(arguments).await,
			"diagnostics" => self.diagnostics(arguments).await,
			other => {
				if let Some(ext) = self
					.multiplexer
					.all_configured_extensions()
					.into_iter()
					.find(|e| e.tool_name == other)
				{
					self.execute_extension(ext, arguments).await
				} else {
					Err(anyhow::anyhow!("Unknown tool: {}", other))
				}
			}
		}
	}

	// ─── Shared plumbing ────────────────────────────────────────────────────

	/// Resolve the client for a file argument, starting it if necessary, and
	/// open the document on it.
	async fn client_and_uri(&self, file: &str) -> Result<(Arc<LspClient>, lsp_types::Uri)> {
		if !self.multiplexer.has_clients() {
			return Err(anyhow::anyhow!(
				"No language servers are configured. Create {} in the project root to register servers.",
				crate::config::CONFIG_FILE_NAME
			));
		}

		let client = self
			.multiplexer
			.ensure_client_for_file(file)
			.await
			.ok_or_else(|| anyhow::anyhow!("No language server available for file '{}'", file))?;

		let path = self.multiplexer.absolute_path(file);
		let uri = client.ensure_open(&path).await?;
		Ok((client, uri))
	}

	fn position_args(arguments: &Value) -> Result<(&str, lsp_types::Position)> {
		let file = required_str(arguments, "file")?;
		let line = required_u32(arguments, "line")?;
		let col = required_u32(arguments, "col")?;
		Ok((file, normalize::to_wire_position(line, col)))
	}

	// ─── Tool implementations ───────────────────────────────────────────────

	async fn goto(&self, arguments: &Value, kind: GotoKind) -> Result<Value> {
		let (file, position) = Self::position_args(arguments)?;
		let (client, uri) = self.client_and_uri(file).await?;

		let result = match kind {
			GotoKind::Definition => client.goto_definition(&uri, position).await?,
			GotoKind::TypeDefinition => client.goto_type_definition(&uri, position).await?,
			GotoKind::Implementation => client.goto_implementation(&uri, position).await?,
			GotoKind::Declaration => client.goto_declaration(&uri, position).await?,
		};
		Ok(normalize::normalize_locations(result, &self.multiplexer))
	}

	async fn find_references(&self, arguments: &Value) -> Result<Value> {
		let (file, position) = Self::position_args(arguments)?;
		let (client, uri) = self.client_and_uri(file).await?;

		let result = client.find_references(&uri, position).await?;
		Ok(normalize::normalize_locations(result, &self.multiplexer))
	}

	async fn hover(&self, arguments: &Value) -> Result<Value> {
		let (file, position) = Self::position_args(arguments)?;
		let (client, uri) = self.client_and_uri(file).await?;

		let result = client.hover(&uri, position).await?;
		Ok(normalize::normalize_hover(result))
	}

	async fn signature_help(&self, arguments: &Value) -> Result<Value> {
		let (file, position) = Self::position_args(arguments)?;
		let (client, uri) = self.client_and_uri(file).await?;

		let result = client.signature_help(&uri, position).await?;
		Ok(normalize::normalize_signature_help(result))
	}

	async fn document_symbols(&self, arguments: &Value) -> Result<Value> {
		let file = required_str(arguments, "file")?;
		let (client, uri) = self.client_and_uri(file).await?;

		let result = client.document_symbols(&uri).await?;
		Ok(normalize::normalize_document_symbols(result, &self.multiplexer))
	}

	/// Fan the query out to every Ready client; failed peers are dropped.
	async fn workspace_symbols(&self, arguments: &Value) -> Result<Value> {
		let query = required_str(arguments, "query")?;

		let clients = self.multiplexer.all_clients();
		let results = futures::future::join_all(
			clients.iter().map(|client| client.workspace_symbols(query)),
		)
		.await;

		let mut symbols = Vec::new();
		for (client, result) in clients.iter().zip(results) {
			match result {
				Ok(value) => symbols.extend(normalize::normalize_workspace_symbols(
					value,
					&self.multiplexer,
				)),
				Err(e) => {
					debug!(peer = %client.name(), error = %e, "Workspace symbol query failed")
				}
			}
		}

		Ok(Value::Array(symbols))
	}

	async fn code_actions(&self, arguments: &Value) -> Result<Value> {
		let file = required_str(arguments, "file")?;
		let line = required_u32(arguments, "line")?;
		let col = required_u32(arguments, "col")?;
		let start = normalize::to_wire_position(line, col);
		let end = normalize::to_wire_position(
			optional_u32(arguments, "endLine").unwrap_or(line),
			optional_u32(arguments, "endCol").unwrap_or(col),
		);

		let (client, uri) = self.client_and_uri(file).await?;
		let result = client
			.code_actions(&uri, Range { start, end }, Vec::new())
			.await?;
		Ok(normalize::normalize_code_actions(result, &self.multiplexer))
	}

	async fn rename_prepare(&self, arguments: &Value) -> Result<Value> {
		let (file, position) = Self::position_args(arguments)?;
		let (client, uri) = self.client_and_uri(file).await?;

		let result = client.prepare_rename(&uri, position).await?;
		Ok(normalize::normalize_prepare_rename(result))
	}

	async fn rename(&self, arguments: &Value) -> Result<Value> {
		let (file, position) = Self::position_args(arguments)?;
		let new_name = required_str(arguments, "newName")?;
		let (client, uri) = self.client_and_uri(file).await?;

		let result = client.rename(&uri, position, new_name).await?;
		if result.is_null() {
			return Ok(Value::Null);
		}
		Ok(normalize::normalize_workspace_edit(&result, &self.multiplexer))
	}

	async fn call_hierarchy(&self, arguments: &Value, direction_key: &str) -> Result<Value> {
		let (file, position) = Self::position_args(arguments)?;
		let (client, uri) = self.client_and_uri(file).await?;

		let prepared = client.call_hierarchy_prepare(&uri, position).await?;
		let Some(item) = prepared.as_array().and_then(|items| items.first()).cloned() else {
			return Ok(Value::Null);
		};

		let result = if direction_key == "from" {
			client.call_hierarchy_incoming(item).await?
		} else {
			client.call_hierarchy_outgoing(item).await?
		};
		Ok(normalize::normalize_hierarchy_calls(
			result,
			direction_key,
			&self.multiplexer,
		))
	}

	async fn type_hierarchy(&self, arguments: &Value) -> Result<Value> {
		let (file, position) = Self::position_args(arguments)?;
		let (client, uri) = self.client_and_uri(file).await?;

		let prepared = client.type_hierarchy_prepare(&uri, position).await?;
		let Some(item) = prepared.as_array().and_then(|items| items.first()).cloned() else {
			return Ok(Value::Null);
		};

		let (supertypes, subtypes) = tokio::join!(
			client.type_hierarchy_supertypes(item.clone()),
			client.type_hierarchy_subtypes(item.clone()),
		);

		let normalize_items = |result: Result<Value>| -> Vec<Value> {
			result
				.ok()
				.and_then(|v| v.as_array().cloned())
				.map(|items| {
					items
						.iter()
						.map(|i| normalize::hierarchy_item_to_json(i, &self.multiplexer))
						.collect()
				})
				.unwrap_or_default()
		};

		Ok(json!({
			"item": normalize::hierarchy_item_to_json(&item, &self.multiplexer),
			"supertypes": normalize_items(supertypes),
			"subtypes": normalize_items(subtypes),
		}))
	}

	async fn open_file(&self, arguments: &Value) -> Result<Value> {
		let file = required_str(arguments, "file")?;
		self.client_and_uri(file).await?;
		Ok(json!({ "file": file, "opened": true }))
	}

	async fn diagnostics(&self, arguments: &Value) -> Result<Value> {
		match arguments.get("file").and_then(|f| f.as_str()) {
			Some(file) => {
				let (client, uri) = self.client_and_uri(file).await?;
				let diagnostics = client
					.wait_for_diagnostics(
						uri.as_str(),
						Duration::from_millis(DIAGNOSTICS_WAIT_MS),
					)
					.await;
				Ok(Value::Array(normalize::normalize_diagnostics(
					uri.as_str(),
					&diagnostics,
					&self.multiplexer,
				)))
			}
			None => {
				let mut all = Vec::new();
				for client in self.multiplexer.all_clients() {
					for (uri, diagnostics) in client.all_cached_diagnostics() {
						all.extend(normalize::normalize_diagnostics(
							&uri,
							&diagnostics,
							&self.multiplexer,
						));
					}
				}
				Ok(Value::Array(all))
			}
		}
	}

	// ─── Extensions ─────────────────────────────────────────────────────────

	async fn execute_extension(
		&self,
		ext: &'static ExtensionDescriptor,
		arguments: &Value,
	) -> Result<Value> {
		match ext.params {
			ExtensionParams::Document => {
				let file = required_str(arguments, "file")?;
				let (client, uri) = self.extension_client_for_file(ext, file).await?;
				client
					.send_custom_request(
						ext.method,
						json!({ "textDocument": { "uri": uri.as_str() } }),
					)
					.await
			}
			ExtensionParams::DocumentPosition => {
				let (file, position) = Self::position_args(arguments)?;
				let (client, uri) = self.extension_client_for_file(ext, file).await?;
				client
					.send_custom_request(
						ext.method,
						json!({
							"textDocument": { "uri": uri.as_str() },
							"position": position,
						}),
					)
					.await
			}
			ExtensionParams::Opaque => {
				let (client, _) = self
					.multiplexer
					.client_for_extension_tool(ext.tool_name)
					.ok_or_else(|| {
						anyhow::anyhow!(
							"No running language server provides tool '{}'",
							ext.tool_name
						)
					})?;
				client
					.send_custom_request(ext.method, arguments.clone())
					.await
			}
		}
	}

	/// Resolve the client for a file-based extension call, verifying that the
	/// file's server actually declares the extension.
	async fn extension_client_for_file(
		&self,
		ext: &'static ExtensionDescriptor,
		file: &str,
	) -> Result<(Arc<LspClient>, lsp_types::Uri)> {
		let (client, uri) = self.client_and_uri(file).await?;
		if !client
			.extensions()
			.iter()
			.any(|e| e.tool_name == ext.tool_name)
		{
			return Err(anyhow::anyhow!(
				"Language server for '{}' does not provide tool '{}'",
				file,
				ext.tool_name
			));
		}
		Ok((client, uri))
	}
}

enum GotoKind {
	Definition,
	TypeDefinition,
	Implementation,
	Declaration,
}
