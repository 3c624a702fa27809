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

//! Normalization of LSP response payloads into the bridge's tool results
//!
//! LSP replies are polymorphic (Location vs LocationLink, DocumentSymbol vs
//! SymbolInformation, Command vs CodeAction, three prepare-rename forms).
//! Each normalizer selects the variant by the structural presence of its
//! discriminating fields and emits a compact JSON shape with 1-indexed
//! line/col coordinates. All coordinate conversion between the external
//! 1-based convention and the 0-based wire convention happens in this module
//! and in the dispatcher that feeds it.

use lsp_types::{Position, Uri};
use serde_json::{json, Value};
use std::str::FromStr;

use super::multiplexer::Multiplexer;
use super::protocol::uri_to_file_path;

// ─── Coordinates ─────────────────────────────────────────────────────────────

/// External 1-based `(line, col)` to wire 0-based position.
pub fn to_wire_position(line: u32, col: u32) -> Position {
	Position {
		line: line.saturating_sub(1),
		character: col.saturating_sub(1),
	}
}

/// Wire 0-based position value to external 1-based `{line, col}`.
pub fn from_wire_position(position: &Value) -> Value {
	let line = position.get("line").and_then(|v| v.as_u64()).unwrap_or(0);
	let character = position
		.get("character")
		.and_then(|v| v.as_u64())
		.unwrap_or(0);
	json!({ "line": line + 1, "col": character + 1 })
}

/// Wire range value to external `{start, end}` in 1-based coordinates.
pub fn from_wire_range(range: &Value) -> Value {
	json!({
		"start": from_wire_position(&range["start"]),
		"end": from_wire_position(&range["end"]),
	})
}

fn uri_to_relative(uri: &str, mux: &Multiplexer) -> String {
	match Uri::from_str(uri) {
		Ok(parsed) => match uri_to_file_path(&parsed) {
			Ok(path) => mux.relative_path(&path),
			Err(_) => uri.to_string(),
		},
		Err(_) => uri.to_string(),
	}
}

// ─── Locations ───────────────────────────────────────────────────────────────

/// One `Location` or `LocationLink` to `{file, line, col}`.
fn location_to_json(location: &Value, mux: &Multiplexer) -> Option<Value> {
	// LocationLink carries `targetUri` / `targetSelectionRange`.
	let (uri, range) = if location.get("targetUri").is_some() {
		(
			location.get("targetUri")?.as_str()?,
			location.get("targetSelectionRange")?,
		)
	} else {
		(location.get("uri")?.as_str()?, location.get("range")?)
	};

	let position = from_wire_position(&range["start"]);
	Some(json!({
		"file": uri_to_relative(uri, mux),
		"line": position["line"],
		"col": position["col"],
	}))
}

/// Goto-family and references result: null, one location, or many.
///
/// A single location (or an array of one) collapses to one object; an array
/// of many stays an array; anything empty is null.
pub fn normalize_locations(result: Value, mux: &Multiplexer) -> Value {
	match result {
		Value::Null => Value::Null,
		Value::Object(_) => location_to_json(&result, mux).unwrap_or(Value::Null),
		Value::Array(items) => {
			let mut locations: Vec<Value> = items
				.iter()
				.filter_map(|item| location_to_json(item, mux))
				.collect();
			match locations.len() {
				0 => Value::Null,
				1 => locations.remove(0),
				_ => Value::Array(locations),
			}
		}
		_ => Value::Null,
	}
}

// ─── Hover and signatures ────────────────────────────────────────────────────

/// Flatten any LSP hover/documentation content shape to a single string.
///
/// Strings pass through, `{kind, value}` yields the value, `{language, value}`
/// becomes a fenced code block, arrays join with blank lines.
pub fn flatten_contents(contents: &Value) -> String {
	match contents {
		Value::String(s) => s.clone(),
		Value::Array(parts) => parts
			.iter()
			.map(flatten_contents)
			.collect::<Vec<_>>()
			.join("\n\n"),
		Value::Object(map) => {
			if let Some(language) = map.get("language").and_then(|v| v.as_str()) {
				let value = map.get("value").and_then(|v| v.as_str()).unwrap_or("");
				format!("```{}\n{}\n```", language, value)
			} else {
				map.get("value")
					.and_then(|v| v.as_str())
					.unwrap_or("")
					.to_string()
			}
		}
		_ => String::new(),
	}
}

pub fn normalize_hover(result: Value) -> Value {
	if result.is_null() {
		return Value::Null;
	}

	let contents = result.get("contents").map(flatten_contents).unwrap_or_default();
	let mut normalized = json!({ "contents": contents });
	if let Some(range) = result.get("range") {
		normalized["range"] = from_wire_range(range);
	}
	normalized
}

pub fn normalize_signature_help(result: Value) -> Value {
	if result.is_null() {
		return Value::Null;
	}

	let signatures: Vec<Value> = result
		.get("signatures")
		.and_then(|s| s.as_array())
		.map(|signatures| {
			signatures
				.iter()
				.map(|signature| {
					let mut entry = json!({
						"label": signature.get("label").cloned().unwrap_or(Value::Null),
					});
					if let Some(doc) = signature.get("documentation") {
						entry["documentation"] = json!(flatten_contents(doc));
					}
					if let Some(parameters) = signature.get("parameters").and_then(|p| p.as_array()) {
						entry["parameters"] = parameters
							.iter()
							.map(|parameter| {
								let mut p = json!({
									"label": parameter.get("label").cloned().unwrap_or(Value::Null),
								});
								if let Some(doc) = parameter.get("documentation") {
									p["documentation"] = json!(flatten_contents(doc));
								}
								p
							})
							.collect();
					}
					entry
				})
				.collect()
		})
		.unwrap_or_default();

	json!({
		"signatures": signatures,
		"activeSignature": result.get("activeSignature").cloned().unwrap_or(json!(0)),
		"activeParameter": result.get("activeParameter").cloned().unwrap_or(json!(0)),
	})
}

// ─── Symbols ─────────────────────────────────────────────────────────────────

/// Canonical name for an LSP `SymbolKind` value.
pub fn symbol_kind_name(kind: u64) -> String {
	match kind {
		1 => "File",
		2 => "Module",
		3 => "Namespace",
		4 => "Package",
		5 => "Class",
		6 => "Method",
		7 => "Property",
		8 => "Field",
		9 => "Constructor",
		10 => "Enum",
		11 => "Interface",
		12 => "Function",
		13 => "Variable",
		14 => "Constant",
		15 => "String",
		16 => "Number",
		17 => "Boolean",
		18 => "Array",
		19 => "Object",
		20 => "Key",
		21 => "Null",
		22 => "EnumMember",
		23 => "Struct",
		24 => "Event",
		25 => "Operator",
		26 => "TypeParameter",
		other => return format!("Kind({})", other),
	}
	.to_string()
}

fn kind_name_of(value: &Value) -> String {
	symbol_kind_name(value.get("kind").and_then(|k| k.as_u64()).unwrap_or(0))
}

fn document_symbol_to_json(symbol: &Value) -> Value {
	let mut entry = json!({
		"name": symbol.get("name").cloned().unwrap_or(Value::Null),
		"kind": kind_name_of(symbol),
		"range": from_wire_range(&symbol["range"]),
		"selectionRange": from_wire_range(&symbol["selectionRange"]),
	});
	if let Some(detail) = symbol.get("detail").and_then(|d| d.as_str()) {
		entry["detail"] = json!(detail);
	}
	if let Some(children) = symbol.get("children").and_then(|c| c.as_array()) {
		if !children.is_empty() {
			entry["children"] = children.iter().map(document_symbol_to_json).collect();
		}
	}
	entry
}

/// Document symbols: hierarchical `DocumentSymbol[]` (has `selectionRange`)
/// recurses; flat `SymbolInformation[]` maps to `{name, kind, file, line, col}`.
pub fn normalize_document_symbols(result: Value, mux: &Multiplexer) -> Value {
	let Value::Array(symbols) = result else {
		return json!([]);
	};

	let hierarchical = symbols
		.first()
		.map(|s| s.get("selectionRange").is_some())
		.unwrap_or(false);

	if hierarchical {
		symbols.iter().map(document_symbol_to_json).collect()
	} else {
		symbols
			.iter()
			.filter_map(|symbol| {
				let location = symbol.get("location")?;
				let uri = location.get("uri")?.as_str()?;
				let position = from_wire_position(&location["range"]["start"]);
				Some(json!({
					"name": symbol.get("name").cloned().unwrap_or(Value::Null),
					"kind": kind_name_of(symbol),
					"file": uri_to_relative(uri, mux),
					"line": position["line"],
					"col": position["col"],
				}))
			})
			.collect()
	}
}

/// Workspace symbols: `SymbolInformation` carries a full location,
/// `WorkspaceSymbol` may carry only a URI.
pub fn normalize_workspace_symbols(result: Value, mux: &Multiplexer) -> Vec<Value> {
	let Value::Array(symbols) = result else {
		return Vec::new();
	};

	symbols
		.iter()
		.filter_map(|symbol| {
			let name = symbol.get("name")?;
			let location = symbol.get("location")?;
			let uri = location.get("uri")?.as_str()?;

			let mut entry = json!({
				"name": name,
				"kind": kind_name_of(symbol),
				"file": uri_to_relative(uri, mux),
			});
			if let Some(range) = location.get("range") {
				let position = from_wire_position(&range["start"]);
				entry["line"] = position["line"].clone();
				entry["col"] = position["col"].clone();
			}
			if let Some(container) = symbol.get("containerName").and_then(|c| c.as_str()) {
				entry["containerName"] = json!(container);
			}
			Some(entry)
		})
		.collect()
}

// ─── Workspace edits ─────────────────────────────────────────────────────────

fn text_edit_to_json(edit: &Value) -> Option<Value> {
	Some(json!({
		"range": from_wire_range(edit.get("range")?),
		"newText": edit.get("newText")?.clone(),
	}))
}

/// Normalize a `WorkspaceEdit` to a `{changes: {relative_path: [edit]}}` map
/// with 1-based coordinates.
///
/// Accepts either the `changes` map or the `documentChanges` array, preferring
/// `documentChanges` when both are present. Resource operations (create,
/// rename, delete) inside `documentChanges` are skipped.
pub fn normalize_workspace_edit(edit: &Value, mux: &Multiplexer) -> Value {
	let mut changes = serde_json::Map::new();

	if let Some(document_changes) = edit.get("documentChanges").and_then(|d| d.as_array()) {
		for change in document_changes {
			let Some(uri) = change
				.pointer("/textDocument/uri")
				.and_then(|u| u.as_str())
			else {
				continue; // resource operation, not a text document edit
			};
			let edits: Vec<Value> = change
				.get("edits")
				.and_then(|e| e.as_array())
				.map(|edits| edits.iter().filter_map(text_edit_to_json).collect())
				.unwrap_or_default();
			changes.insert(uri_to_relative(uri, mux), Value::Array(edits));
		}
	} else if let Some(change_map) = edit.get("changes").and_then(|c| c.as_object()) {
		for (uri, edits) in change_map {
			let edits: Vec<Value> = edits
				.as_array()
				.map(|edits| edits.iter().filter_map(text_edit_to_json).collect())
				.unwrap_or_default();
			changes.insert(uri_to_relative(uri, mux), Value::Array(edits));
		}
	}

	json!({ "changes": changes })
}

// ─── Code actions and rename ─────────────────────────────────────────────────

/// Code action result: bare `Command`s become `{title, command}`, literal
/// `CodeAction`s keep title, kind, preference, diagnostics and the edit.
pub fn normalize_code_actions(result: Value, mux: &Multiplexer) -> Value {
	let Value::Array(actions) = result else {
		return json!([]);
	};

	actions
		.iter()
		.map(|action| {
			// A bare Command has a string `command` field.
			if action.get("command").map(|c| c.is_string()).unwrap_or(false)
				&& action.get("edit").is_none()
				&& action.get("kind").is_none()
			{
				return json!({
					"title": action.get("title").cloned().unwrap_or(Value::Null),
					"command": action.get("command").cloned().unwrap_or(Value::Null),
				});
			}

			let mut entry = json!({
				"title": action.get("title").cloned().unwrap_or(Value::Null),
			});
			if let Some(kind) = action.get("kind") {
				entry["kind"] = kind.clone();
			}
			if let Some(preferred) = action.get("isPreferred") {
				entry["isPreferred"] = preferred.clone();
			}
			if let Some(diagnostics) = action.get("diagnostics") {
				entry["diagnostics"] = diagnostics.clone();
			}
			if let Some(edit) = action.get("edit") {
				entry["edit"] = normalize_workspace_edit(edit, mux);
			}
			entry
		})
		.collect()
}

/// Prepare-rename has three server response forms: a bare range, a range with
/// placeholder, or `{defaultBehavior}`. Null means the symbol cannot be
/// renamed.
pub fn normalize_prepare_rename(result: Value) -> Value {
	if result.is_null() {
		return json!({ "canRename": false });
	}

	if result.get("start").is_some() {
		return json!({ "canRename": true, "range": from_wire_range(&result) });
	}

	if let Some(range) = result.get("range") {
		let mut normalized = json!({ "canRename": true, "range": from_wire_range(range) });
		if let Some(placeholder) = result.get("placeholder") {
			normalized["placeholder"] = placeholder.clone();
		}
		return normalized;
	}

	// {defaultBehavior: true}
	json!({ "canRename": true })
}

// ─── Hierarchies ─────────────────────────────────────────────────────────────

/// A call- or type-hierarchy item to `{name, kind, file, line, col}`.
pub fn hierarchy_item_to_json(item: &Value, mux: &Multiplexer) -> Value {
	let uri = item.get("uri").and_then(|u| u.as_str()).unwrap_or_default();
	let range = item.get("selectionRange").or_else(|| item.get("range"));
	let position = range
		.map(|r| from_wire_position(&r["start"]))
		.unwrap_or_else(|| json!({"line": 1, "col": 1}));

	json!({
		"name": item.get("name").cloned().unwrap_or(Value::Null),
		"kind": kind_name_of(item),
		"file": uri_to_relative(uri, mux),
		"line": position["line"],
		"col": position["col"],
	})
}

/// Incoming/outgoing call lists. `direction_key` is `"from"` for incoming
/// calls and `"to"` for outgoing calls.
pub fn normalize_hierarchy_calls(result: Value, direction_key: &str, mux: &Multiplexer) -> Value {
	let Value::Array(calls) = result else {
		return json!([]);
	};

	calls
		.iter()
		.filter_map(|call| {
			let item = call.get(direction_key)?;
			let from_ranges: Vec<Value> = call
				.get("fromRanges")
				.and_then(|r| r.as_array())
				.map(|ranges| {
					ranges
						.iter()
						.map(|range| from_wire_position(&range["start"]))
						.collect()
				})
				.unwrap_or_default();
			Some(json!({
				direction_key: hierarchy_item_to_json(item, mux),
				"fromRanges": from_ranges,
			}))
		})
		.collect()
}

// ─── Diagnostics ─────────────────────────────────────────────────────────────

fn severity_name(severity: u64) -> &'static str {
	match severity {
		1 => "error",
		2 => "warning",
		3 => "information",
		4 => "hint",
		_ => "information",
	}
}

/// One wire diagnostic to `{file, line, col, severity, message, …}`.
pub fn diagnostic_to_json(file: &str, diagnostic: &Value) -> Value {
	let position = from_wire_position(&diagnostic["range"]["start"]);
	let mut entry = json!({
		"file": file,
		"line": position["line"],
		"col": position["col"],
		"severity": severity_name(
			diagnostic.get("severity").and_then(|s| s.as_u64()).unwrap_or(3)
		),
		"message": diagnostic.get("message").cloned().unwrap_or(Value::Null),
	});
	if let Some(source) = diagnostic.get("source") {
		entry["source"] = source.clone();
	}
	if let Some(code) = diagnostic.get("code") {
		entry["code"] = code.clone();
	}
	entry
}

/// A published batch for one URI to the normalized list.
pub fn normalize_diagnostics(uri: &str, diagnostics: &[Value], mux: &Multiplexer) -> Vec<Value> {
	let file = uri_to_relative(uri, mux);
	diagnostics
		.iter()
		.map(|diagnostic| diagnostic_to_json(&file, diagnostic))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Config;
	use std::path::PathBuf;

	fn mux() -> Multiplexer {
		Multiplexer::new(Config::default(), PathBuf::from("/proj")).unwrap()
	}

	// ── Coordinates ────────────────────────────────────────────────────────

	#[test]
	fn position_round_trip_is_identity() {
		for (line, col) in [(1u32, 1u32), (10, 5), (999, 120)] {
			let wire = to_wire_position(line, col);
			let external = from_wire_position(&serde_json::to_value(wire).unwrap());
			assert_eq!(external["line"], line);
			assert_eq!(external["col"], col);
		}
	}

	#[test]
	fn wire_position_is_zero_based() {
		let wire = to_wire_position(1, 1);
		assert_eq!(wire.line, 0);
		assert_eq!(wire.character, 0);
	}

	// ── Locations ──────────────────────────────────────────────────────────

	#[test]
	fn null_location_result_stays_null() {
		assert_eq!(normalize_locations(Value::Null, &mux()), Value::Null);
	}

	#[test]
	fn single_location_collapses_to_object() {
		let result = json!([{
			"uri": "file:///proj/src/lib.rs",
			"range": {"start": {"line": 9, "character": 4}, "end": {"line": 9, "character": 10}}
		}]);
		let normalized = normalize_locations(result, &mux());
		assert_eq!(
			normalized,
			json!({"file": "src/lib.rs", "line": 10, "col": 5})
		);
	}

	#[test]
	fn many_locations_stay_an_array() {
		let location = json!({
			"uri": "file:///proj/a.rs",
			"range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}}
		});
		let normalized = normalize_locations(json!([location, location]), &mux());
		assert_eq!(normalized.as_array().map(|a| a.len()), Some(2));
	}

	#[test]
	fn location_link_uses_target_selection_range() {
		let result = json!([{
			"targetUri": "file:///proj/b.rs",
			"targetRange": {"start": {"line": 0, "character": 0}, "end": {"line": 20, "character": 0}},
			"targetSelectionRange": {"start": {"line": 4, "character": 7}, "end": {"line": 4, "character": 12}}
		}]);
		let normalized = normalize_locations(result, &mux());
		assert_eq!(normalized, json!({"file": "b.rs", "line": 5, "col": 8}));
	}

	// ── Hover ──────────────────────────────────────────────────────────────

	#[test]
	fn hover_markup_content_flattens_to_value() {
		let result = json!({"contents": {"kind": "markdown", "value": "**T**"}});
		assert_eq!(normalize_hover(result), json!({"contents": "**T**"}));
	}

	#[test]
	fn hover_language_string_becomes_fenced_block() {
		let result = json!({"contents": {"language": "rust", "value": "fn main()"}});
		assert_eq!(
			normalize_hover(result)["contents"],
			"```rust\nfn main()\n```"
		);
	}

	#[test]
	fn hover_array_joins_with_blank_lines() {
		let result = json!({"contents": ["first", {"kind": "plaintext", "value": "second"}]});
		assert_eq!(normalize_hover(result)["contents"], "first\n\nsecond");
	}

	#[test]
	fn hover_range_is_one_based() {
		let result = json!({
			"contents": "x",
			"range": {"start": {"line": 2, "character": 3}, "end": {"line": 2, "character": 8}}
		});
		let normalized = normalize_hover(result);
		assert_eq!(normalized["range"]["start"], json!({"line": 3, "col": 4}));
	}

	// ── Signature help ─────────────────────────────────────────────────────

	#[test]
	fn signature_help_defaults_active_indices() {
		let result = json!({"signatures": [{"label": "fn f(a: i32)"}]});
		let normalized = normalize_signature_help(result);
		assert_eq!(normalized["activeSignature"], 0);
		assert_eq!(normalized["activeParameter"], 0);
	}

	#[test]
	fn signature_documentation_is_flattened() {
		let result = json!({
			"signatures": [{
				"label": "fn f()",
				"documentation": {"kind": "markdown", "value": "docs"},
				"parameters": [{"label": "a", "documentation": "param docs"}]
			}],
			"activeSignature": 1,
			"activeParameter": 2
		});
		let normalized = normalize_signature_help(result);
		assert_eq!(normalized["signatures"][0]["documentation"], "docs");
		assert_eq!(
			normalized["signatures"][0]["parameters"][0]["documentation"],
			"param docs"
		);
		assert_eq!(normalized["activeSignature"], 1);
		assert_eq!(normalized["activeParameter"], 2);
	}

	// ── Symbols ────────────────────────────────────────────────────────────

	#[test]
	fn symbol_kind_names_are_canonical() {
		assert_eq!(symbol_kind_name(1), "File");
		assert_eq!(symbol_kind_name(12), "Function");
		assert_eq!(symbol_kind_name(22), "EnumMember");
		assert_eq!(symbol_kind_name(26), "TypeParameter");
		assert_eq!(symbol_kind_name(99), "Kind(99)");
	}

	#[test]
	fn hierarchical_symbols_recurse() {
		let range = json!({"start": {"line": 0, "character": 0}, "end": {"line": 10, "character": 0}});
		let result = json!([{
			"name": "Outer",
			"kind": 23,
			"detail": "struct Outer",
			"range": range,
			"selectionRange": range,
			"children": [{
				"name": "field",
				"kind": 8,
				"range": range,
				"selectionRange": range
			}]
		}]);
		let normalized = normalize_document_symbols(result, &mux());
		assert_eq!(normalized[0]["name"], "Outer");
		assert_eq!(normalized[0]["kind"], "Struct");
		assert_eq!(normalized[0]["detail"], "struct Outer");
		assert_eq!(normalized[0]["children"][0]["kind"], "Field");
	}

	#[test]
	fn flat_symbol_information_maps_to_file_entries() {
		let result = json!([{
			"name": "main",
			"kind": 12,
			"location": {
				"uri": "file:///proj/src/main.rs",
				"range": {"start": {"line": 2, "character": 3}, "end": {"line": 2, "character": 7}}
			}
		}]);
		let normalized = normalize_document_symbols(result, &mux());
		assert_eq!(
			normalized[0],
			json!({"name": "main", "kind": "Function", "file": "src/main.rs", "line": 3, "col": 4})
		);
	}

	#[test]
	fn workspace_symbol_without_range_omits_position() {
		let result = json!([{
			"name": "A",
			"kind": 5,
			"location": {"uri": "file:///proj/a.ts"}
		}]);
		let normalized = normalize_workspace_symbols(result, &mux());
		assert_eq!(normalized[0]["name"], "A");
		assert_eq!(normalized[0]["kind"], "Class");
		assert_eq!(normalized[0]["file"], "a.ts");
		assert!(normalized[0].get("line").is_none());
	}

	// ── Workspace edits ────────────────────────────────────────────────────

	fn one_edit_range() -> Value {
		json!({"start": {"line": 9, "character": 4}, "end": {"line": 9, "character": 5}})
	}

	#[test]
	fn document_changes_and_changes_normalize_identically() {
		let from_document_changes = normalize_workspace_edit(
			&json!({
				"documentChanges": [{
					"textDocument": {"uri": "file:///proj/a.ts", "version": 4},
					"edits": [{"range": one_edit_range(), "newText": "y"}]
				}]
			}),
			&mux(),
		);
		let from_changes = normalize_workspace_edit(
			&json!({
				"changes": {
					"file:///proj/a.ts": [{"range": one_edit_range(), "newText": "y"}]
				}
			}),
			&mux(),
		);

		assert_eq!(from_document_changes, from_changes);
		assert_eq!(
			from_document_changes["changes"]["a.ts"][0],
			json!({
				"range": {"start": {"line": 10, "col": 5}, "end": {"line": 10, "col": 6}},
				"newText": "y"
			})
		);
	}

	#[test]
	fn document_changes_preferred_over_changes() {
		let edit = json!({
			"changes": {
				"file:///proj/old.ts": [{"range": one_edit_range(), "newText": "ignored"}]
			},
			"documentChanges": [{
				"textDocument": {"uri": "file:///proj/new.ts", "version": 1},
				"edits": [{"range": one_edit_range(), "newText": "kept"}]
			}]
		});
		let normalized = normalize_workspace_edit(&edit, &mux());
		assert!(normalized["changes"].get("new.ts").is_some());
		assert!(normalized["changes"].get("old.ts").is_none());
	}

	#[test]
	fn resource_operations_are_skipped() {
		let edit = json!({
			"documentChanges": [
				{"kind": "create", "uri": "file:///proj/new.ts"},
				{
					"textDocument": {"uri": "file:///proj/a.ts", "version": 1},
					"edits": [{"range": one_edit_range(), "newText": "x"}]
				}
			]
		});
		let normalized = normalize_workspace_edit(&edit, &mux());
		let changes = normalized["changes"].as_object().unwrap();
		assert_eq!(changes.len(), 1);
		assert!(changes.contains_key("a.ts"));
	}

	// ── Code actions ───────────────────────────────────────────────────────

	#[test]
	fn bare_command_keeps_title_and_command() {
		let result = json!([{"title": "Run fix", "command": "quickfix.run", "arguments": []}]);
		let normalized = normalize_code_actions(result, &mux());
		assert_eq!(
			normalized[0],
			json!({"title": "Run fix", "command": "quickfix.run"})
		);
	}

	#[test]
	fn code_action_keeps_kind_and_normalizes_edit() {
		let result = json!([{
			"title": "Organize imports",
			"kind": "source.organizeImports",
			"isPreferred": true,
			"edit": {
				"changes": {
					"file:///proj/a.ts": [{"range": one_edit_range(), "newText": ""}]
				}
			}
		}]);
		let normalized = normalize_code_actions(result, &mux());
		assert_eq!(normalized[0]["kind"], "source.organizeImports");
		assert_eq!(normalized[0]["isPreferred"], true);
		assert!(normalized[0]["edit"]["changes"].get("a.ts").is_some());
	}

	// ── Prepare rename ─────────────────────────────────────────────────────

	#[test]
	fn prepare_rename_null_means_cannot_rename() {
		assert_eq!(
			normalize_prepare_rename(Value::Null),
			json!({"canRename": false})
		);
	}

	#[test]
	fn prepare_rename_bare_range() {
		let normalized = normalize_prepare_rename(one_edit_range());
		assert_eq!(normalized["canRename"], true);
		assert_eq!(normalized["range"]["start"], json!({"line": 10, "col": 5}));
	}

	#[test]
	fn prepare_rename_with_placeholder() {
		let normalized = normalize_prepare_rename(json!({
			"range": one_edit_range(),
			"placeholder": "newName"
		}));
		assert_eq!(normalized["placeholder"], "newName");
	}

	#[test]
	fn prepare_rename_default_behavior() {
		let normalized = normalize_prepare_rename(json!({"defaultBehavior": true}));
		assert_eq!(normalized, json!({"canRename": true}));
	}

	// ── Hierarchies ────────────────────────────────────────────────────────

	#[test]
	fn incoming_calls_normalize_from_items() {
		let result = json!([{
			"from": {
				"name": "caller",
				"kind": 12,
				"uri": "file:///proj/c.rs",
				"range": {"start": {"line": 0, "character": 0}, "end": {"line": 5, "character": 0}},
				"selectionRange": {"start": {"line": 0, "character": 3}, "end": {"line": 0, "character": 9}}
			},
			"fromRanges": [{"start": {"line": 2, "character": 8}, "end": {"line": 2, "character": 14}}]
		}]);
		let normalized = normalize_hierarchy_calls(result, "from", &mux());
		assert_eq!(normalized[0]["from"]["name"], "caller");
		assert_eq!(normalized[0]["from"]["kind"], "Function");
		assert_eq!(normalized[0]["from"]["line"], 1);
		assert_eq!(normalized[0]["fromRanges"][0], json!({"line": 3, "col": 9}));
	}

	// ── Diagnostics ────────────────────────────────────────────────────────

	#[test]
	fn diagnostics_normalize_severity_and_position() {
		let diagnostics = vec![json!({
			"range": {"start": {"line": 4, "character": 2}, "end": {"line": 4, "character": 9}},
			"severity": 1,
			"message": "mismatched types",
			"source": "rustc",
			"code": "E0308"
		})];
		let normalized = normalize_diagnostics("file:///proj/src/lib.rs", &diagnostics, &mux());
		assert_eq!(
			normalized[0],
			json!({
				"file": "src/lib.rs",
				"line": 5,
				"col": 3,
				"severity": "error",
				"message": "mismatched types",
				"source": "rustc",
				"code": "E0308"
			})
		);
	}

	#[test]
	fn diagnostic_without_severity_defaults_to_information() {
		let diagnostics = vec![json!({
			"range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}},
			"message": "note"
		})];
		let normalized = normalize_diagnostics("file:///proj/a.rs", &diagnostics, &mux());
		assert_eq!(normalized[0]["severity"], "information");
	}
}
