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

//! Multiplexer: routes files to language servers and manages lazy startup

use anyhow::Result;
use lsp_types::Uri;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::client::{ClientState, LspClient};
use super::extensions::ExtensionDescriptor;
use super::protocol::{file_path_to_lsp_uri, resolve_relative_path};
use crate::config::Config;

/// Owns every configured client and matches files to them by glob.
///
/// Clients are created eagerly (compiling their glob sets once) but their
/// subprocesses start lazily on the first matching request. Configuration
/// order is the selection tie-break throughout.
pub struct Multiplexer {
	clients: Vec<Arc<LspClient>>,
	project_root: PathBuf,
}

impl Multiplexer {
	pub fn new(config: Config, project_root: PathBuf) -> Result<Self> {
		let mut clients = Vec::with_capacity(config.servers.len());
		for named in config.servers {
			let client = LspClient::new(named.name, named.server, project_root.clone())?;
			clients.push(Arc::new(client));
		}

		Ok(Self {
			clients,
			project_root,
		})
	}

	pub fn project_root(&self) -> &Path {
		&self.project_root
	}

	pub fn has_clients(&self) -> bool {
		!self.clients.is_empty()
	}

	/// Find or lazily start the client responsible for a file.
	///
	/// A Ready match wins; otherwise the first configured-but-unstarted match
	/// is started. Start failure is logged and yields `None`. A Dead client
	/// is never restarted.
	pub async fn ensure_client_for_file(&self, relative_path: &str) -> Option<Arc<LspClient>> {
		if let Some(client) = self.client_for_file(relative_path) {
			return Some(client);
		}

		let candidate = self.clients.iter().find(|c| {
			c.matches(relative_path)
				&& matches!(c.state(), ClientState::Idle | ClientState::Starting)
		})?;

		match candidate.start().await {
			Ok(()) => Some(candidate.clone()),
			Err(e) => {
				warn!(
					peer = %candidate.name(),
					file = relative_path,
					error = %e,
					"Failed to start language server"
				);
				None
			}
		}
	}

	/// First Ready client whose globs match; never starts anything.
	pub fn client_for_file(&self, relative_path: &str) -> Option<Arc<LspClient>> {
		self.clients
			.iter()
			.find(|c| c.is_ready() && c.matches(relative_path))
			.cloned()
	}

	/// Every Ready client whose globs match, in configuration order.
	pub fn clients_for_file(&self, relative_path: &str) -> Vec<Arc<LspClient>> {
		self.clients
			.iter()
			.filter(|c| c.is_ready() && c.matches(relative_path))
			.cloned()
			.collect()
	}

	/// Every Ready client, in configuration order.
	pub fn all_clients(&self) -> Vec<Arc<LspClient>> {
		self.clients
			.iter()
			.filter(|c| c.is_ready())
			.cloned()
			.collect()
	}

	/// Extensions declared for every configured client, running or not.
	///
	/// Used to advertise extension tools up front; duplicates (two peers with
	/// the same binary) are collapsed by tool name.
	pub fn all_configured_extensions(&self) -> Vec<&'static ExtensionDescriptor> {
		let mut seen = std::collections::HashSet::new();
		let mut extensions = Vec::new();
		for client in &self.clients {
			for ext in client.extensions() {
				if seen.insert(ext.tool_name) {
					extensions.push(ext);
				}
			}
		}
		extensions
	}

	/// Find a Ready client that serves an extension tool.
	///
	/// Returns `None` when the tool exists in the registry but no matching
	/// peer has started yet.
	pub fn client_for_extension_tool(
		&self,
		tool_name: &str,
	) -> Option<(Arc<LspClient>, &'static ExtensionDescriptor)> {
		for client in &self.clients {
			if !client.is_ready() {
				continue;
			}
			if let Some(ext) = client.extensions().iter().find(|e| e.tool_name == tool_name) {
				return Some((client.clone(), ext));
			}
		}
		None
	}

	// ─── Path helpers ───────────────────────────────────────────────────────

	pub fn absolute_path(&self, relative_path: &str) -> PathBuf {
		resolve_relative_path(&self.project_root, relative_path)
	}

	pub fn relative_path(&self, absolute: &Path) -> String {
		match absolute.strip_prefix(&self.project_root) {
			Ok(relative) => relative.to_string_lossy().to_string(),
			Err(_) => absolute.to_string_lossy().to_string(),
		}
	}

	pub fn file_uri(&self, relative_path: &str) -> Result<Uri> {
		file_path_to_lsp_uri(&self.absolute_path(relative_path))
	}

	// ─── Shutdown ───────────────────────────────────────────────────────────

	/// Shut down every client concurrently; per-peer failures never propagate.
	pub async fn shutdown_all(&self) {
		debug!(clients = self.clients.len(), "Shutting down all language servers");
		futures::future::join_all(self.clients.iter().map(|c| c.shutdown())).await;
	}
}
