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

//! File extension to LSP language identifier mapping

use std::path::Path;

/// Detect the LSP `languageId` for a file based on its extension.
///
/// Returns `None` for unknown extensions; callers fall back to `"plaintext"`.
pub fn language_id(path: &Path) -> Option<&'static str> {
	match path.extension()?.to_str()? {
		"rs" => Some("rust"),
		"py" | "pyi" => Some("python"),
		"js" | "mjs" | "cjs" => Some("javascript"),
		"jsx" => Some("javascriptreact"),
		"ts" | "mts" | "cts" => Some("typescript"),
		"tsx" => Some("typescriptreact"),
		"go" => Some("go"),
		"c" => Some("c"),
		"cpp" | "cc" | "cxx" | "c++" | "hpp" | "hh" | "h" => Some("cpp"),
		"java" => Some("java"),
		"kt" | "kts" => Some("kotlin"),
		"rb" => Some("ruby"),
		"php" => Some("php"),
		"cs" => Some("csharp"),
		"swift" => Some("swift"),
		"zig" => Some("zig"),
		"lua" => Some("lua"),
		"ex" | "exs" => Some("elixir"),
		"erl" | "hrl" => Some("erlang"),
		"hs" => Some("haskell"),
		"ml" | "mli" => Some("ocaml"),
		"scala" | "sc" => Some("scala"),
		"sh" | "bash" => Some("shellscript"),
		"json" => Some("json"),
		"yaml" | "yml" => Some("yaml"),
		"toml" => Some("toml"),
		"html" | "htm" => Some("html"),
		"css" => Some("css"),
		"scss" | "sass" => Some("scss"),
		"md" | "markdown" => Some("markdown"),
		"tex" => Some("latex"),
		"sql" => Some("sql"),
		"vue" => Some("vue"),
		"svelte" => Some("svelte"),
		"dart" => Some("dart"),
		_ => None,
	}
}

/// Language id with the `plaintext` fallback applied.
pub fn language_id_or_plaintext(path: &Path) -> &'static str {
	language_id(path).unwrap_or("plaintext")
}
