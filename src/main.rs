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
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use mcp_lsp_bridge::config::Config;
use mcp_lsp_bridge::mcp::logging::init_logging;
use mcp_lsp_bridge::mcp::lsp::{LspProvider, Multiplexer};
use mcp_lsp_bridge::mcp::McpServer;

#[derive(Parser)]
#[command(name = "mcp-lsp-bridge")]
#[command(version)]
#[command(about = "Bridge language servers to Model Context Protocol tools over stdio")]
struct BridgeArgs {
	/// Project root directory to serve (defaults to the current directory)
	#[arg(default_value = ".")]
	path: String,

	/// Path to the configuration file (defaults to mcp-lsp-bridge.toml in the project root)
	#[arg(long)]
	config: Option<PathBuf>,

	/// Enable debug logging
	#[arg(long)]
	debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = BridgeArgs::parse();

	init_logging(args.debug);

	let project_root = std::path::Path::new(&args.path)
		.canonicalize()
		.map_err(|e| anyhow::anyhow!("Invalid path '{}': {}", args.path, e))?;
	if !project_root.is_dir() {
		return Err(anyhow::anyhow!(
			"Path '{}' is not a directory",
			project_root.display()
		));
	}

	let config = Config::load(&project_root, args.config.as_deref())?;
	if config.is_empty() {
		warn!(
			config = %Config::default_path(&project_root).display(),
			"No language servers configured; tool calls will explain how to add them"
		);
	} else {
		info!(
			servers = config.servers.len(),
			project_root = %project_root.display(),
			"Bridge starting"
		);
	}

	let multiplexer = Multiplexer::new(config, project_root)?;
	let provider = LspProvider::new(Arc::new(multiplexer));
	let server = McpServer::new(provider);
	server.run().await
}
