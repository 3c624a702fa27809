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

//! Registry of server-specific protocol extensions exposed as MCP tools
//!
//! Language servers ship non-standard methods behind vendor prefixes
//! (`rust-analyzer/…`, `rubyLsp/…`). Each registry entry matches a substring
//! of the configured command line and contributes tool descriptors for the
//! methods that server understands.

/// How the tool arguments map onto the wire request params.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionParams {
	/// `{ textDocument: { uri } }` built from the `file` argument.
	Document,
	/// `{ textDocument: { uri }, position: { line, character } }`.
	DocumentPosition,
	/// Validated arguments forwarded verbatim.
	Opaque,
}

/// One non-standard method surfaced as an MCP tool.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionDescriptor {
	/// Tool name advertised over MCP.
	pub tool_name: &'static str,
	/// Wire method sent to the peer.
	pub method: &'static str,
	/// Human-readable description for `tools/list`.
	pub description: &'static str,
	/// Parameter shape.
	pub params: ExtensionParams,
}

struct RegistryEntry {
	/// Substring matched against the peer's command line.
	command_pattern: &'static str,
	extensions: &'static [ExtensionDescriptor],
}

static REGISTRY: &[RegistryEntry] = &[
	RegistryEntry {
		command_pattern: "rust-analyzer",
		extensions: &[
			ExtensionDescriptor {
				tool_name: "rust_expand_macro",
				method: "rust-analyzer/expandMacro",
				description: "Expand the macro invocation at a position using rust-analyzer",
				params: ExtensionParams::DocumentPosition,
			},
			ExtensionDescriptor {
				tool_name: "rust_reload_workspace",
				method: "rust-analyzer/reloadWorkspace",
				description: "Ask rust-analyzer to reload the Cargo workspace",
				params: ExtensionParams::Opaque,
			},
		],
	},
	RegistryEntry {
		command_pattern: "clangd",
		extensions: &[
			ExtensionDescriptor {
				tool_name: "clangd_switch_source_header",
				method: "textDocument/switchSourceHeader",
				description: "Switch between a C/C++ source file and its header using clangd",
				params: ExtensionParams::Document,
			},
			ExtensionDescriptor {
				tool_name: "clangd_symbol_info",
				method: "textDocument/symbolInfo",
				description: "Get clangd symbol info (USR and mangled name) at a position",
				params: ExtensionParams::DocumentPosition,
			},
		],
	},
	RegistryEntry {
		command_pattern: "ruby-lsp",
		extensions: &[ExtensionDescriptor {
			tool_name: "ruby_discover_tests",
			method: "rubyLsp/discoverTests",
			description: "Discover the tests defined in a Ruby file using ruby-lsp",
			params: ExtensionParams::Document,
		}],
	},
];

/// Extensions available for a peer, matched by command-line substring.
pub fn extensions_for_command(command: &[String]) -> &'static [ExtensionDescriptor] {
	let command_line = command.join(" ");
	for entry in REGISTRY {
		if command_line.contains(entry.command_pattern) {
			return entry.extensions;
		}
	}
	&[]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cmd(parts: &[&str]) -> Vec<String> {
		parts.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn matches_by_substring() {
		let exts = extensions_for_command(&cmd(&["/usr/local/bin/rust-analyzer"]));
		assert!(exts.iter().any(|e| e.tool_name == "rust_expand_macro"));
	}

	#[test]
	fn matches_anywhere_in_command_line() {
		let exts = extensions_for_command(&cmd(&["bundle", "exec", "ruby-lsp"]));
		assert_eq!(exts.len(), 1);
		assert_eq!(exts[0].tool_name, "ruby_discover_tests");
		assert_eq!(exts[0].method, "rubyLsp/discoverTests");
		assert_eq!(exts[0].params, ExtensionParams::Document);
	}

	#[test]
	fn unknown_command_has_no_extensions() {
		assert!(extensions_for_command(&cmd(&["gopls"])).is_empty());
	}

	#[test]
	fn tool_names_are_unique_across_registry() {
		let mut seen = std::collections::HashSet::new();
		for entry in super::REGISTRY {
			for ext in entry.extensions {
				assert!(seen.insert(ext.tool_name), "duplicate tool {}", ext.tool_name);
			}
		}
	}
}
