use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "mcp-lsp-bridge.toml";

/// Configuration for one language server peer.
///
/// Keyed by a user-chosen name (e.g. `"typescript"`, `"rust"`) in the
/// `[servers.<name>]` table of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
	/// Executable and arguments, e.g. `["typescript-language-server", "--stdio"]`.
	pub command: Vec<String>,

	/// Glob patterns for the files this server handles, e.g. `["**/*.ts"]`.
	pub file_patterns: Vec<String>,

	/// Forwarded verbatim as `initializationOptions` in the LSP handshake.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub initialization_options: Option<serde_json::Value>,

	/// Overrides the `rootUri` derived from the project root.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub root_uri: Option<String>,

	/// Environment variables overlaid onto the process environment.
	#[serde(default, skip_serializing_if = "HashMap::is_empty")]
	pub env: HashMap<String, String>,
}

/// Immutable bridge configuration: the set of named peers.
///
/// Loaded once at startup; peer order in the file is preserved because the
/// multiplexer uses configuration order as its selection tie-break.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub servers: Vec<NamedServer>,
}

/// A peer together with its configured name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedServer {
	pub name: String,
	#[serde(flatten)]
	pub server: ServerConfig,
}

/// On-disk shape: a TOML table keyed by peer name.
#[derive(Debug, Deserialize)]
struct ConfigFile {
	#[serde(default)]
	servers: toml::map::Map<String, toml::Value>,
}

impl Config {
	/// Load the configuration for a project root.
	///
	/// A missing file yields an empty peer set; tool calls then report that
	/// no language servers are configured instead of failing at startup.
	pub fn load(project_root: &Path, override_path: Option<&Path>) -> Result<Self> {
		let config_path = match override_path {
			Some(path) => path.to_path_buf(),
			None => project_root.join(CONFIG_FILE_NAME),
		};

		if !config_path.exists() {
			return Ok(Config::default());
		}

		let content = fs::read_to_string(&config_path).map_err(|e| {
			anyhow::anyhow!("Failed to read config '{}': {}", config_path.display(), e)
		})?;
		Self::parse(&content).map_err(|e| {
			anyhow::anyhow!("Invalid config '{}': {}", config_path.display(), e)
		})
	}

	/// Parse a TOML document into a configuration.
	pub fn parse(content: &str) -> Result<Self> {
		let file: ConfigFile = toml::from_str(content)?;

		let mut servers = Vec::with_capacity(file.servers.len());
		for (name, value) in file.servers {
			let server: ServerConfig = value.try_into().map_err(|e| {
				anyhow::anyhow!("Invalid server config for '{}': {}", name, e)
			})?;
			if server.command.is_empty() {
				return Err(anyhow::anyhow!("Server '{}' has an empty command", name));
			}
			if server.file_patterns.is_empty() {
				return Err(anyhow::anyhow!("Server '{}' has no file patterns", name));
			}
			servers.push(NamedServer { name, server });
		}

		Ok(Config { servers })
	}

	pub fn is_empty(&self) -> bool {
		self.servers.is_empty()
	}

	/// Path the configuration is expected at for a given project root.
	pub fn default_path(project_root: &Path) -> PathBuf {
		project_root.join(CONFIG_FILE_NAME)
	}
}
