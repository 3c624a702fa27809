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

//! LSP client: one peer subprocess, its protocol state and document tables

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use lsp_types::{
	DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
	DidSaveTextDocumentParams, Position, TextDocumentContentChangeEvent, TextDocumentIdentifier,
	TextDocumentItem, TextDocumentPositionParams, Uri, VersionedTextDocumentIdentifier,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{oneshot, Mutex};
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, error, info, warn};

use super::extensions::{extensions_for_command, ExtensionDescriptor};
use super::protocol::{
	encode_message, file_path_to_lsp_uri, file_path_to_uri, read_message, LspMessage,
	LspNotification, LspReply, LspRequest, LspResponse,
};
use crate::config::ServerConfig;
use crate::languages::language_id_or_plaintext;

/// A cached diagnostics entry younger than this is served without waiting.
pub const DIAGNOSTICS_FRESH_MS: u64 = 500;
/// How long a diagnostics wait blocks before falling back to the cache.
pub const DIAGNOSTICS_WAIT_MS: u64 = 10_000;
/// Bound on the graceful shutdown handshake before the peer is killed.
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
/// Bound on any single request round trip.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Peer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
	Idle,
	Starting,
	Ready,
	Stopping,
	Dead,
}

// ─── Document table ──────────────────────────────────────────────────────────

/// A document synchronized to the peer.
#[derive(Debug, Clone)]
pub struct OpenDocument {
	pub language_id: String,
	pub version: i32,
	pub text: String,
}

/// Open-document table keyed by URI.
///
/// Versions are strictly increasing per URI; mutations happen while the
/// owning client holds its document lock so the peer observes them in order.
#[derive(Debug, Default)]
pub struct DocumentStore {
	docs: HashMap<String, OpenDocument>,
}

impl DocumentStore {
	pub fn contains(&self, uri: &str) -> bool {
		self.docs.contains_key(uri)
	}

	pub fn get(&self, uri: &str) -> Option<&OpenDocument> {
		self.docs.get(uri)
	}

	/// Record a newly opened document at version 1.
	pub fn open(&mut self, uri: &str, language_id: &str, text: String) -> i32 {
		let doc = OpenDocument {
			language_id: language_id.to_string(),
			version: 1,
			text,
		};
		self.docs.insert(uri.to_string(), doc);
		1
	}

	/// Replace the text of an open document, returning the new version.
	pub fn change(&mut self, uri: &str, text: String) -> Option<i32> {
		let doc = self.docs.get_mut(uri)?;
		doc.version += 1;
		doc.text = text;
		Some(doc.version)
	}

	pub fn close(&mut self, uri: &str) -> bool {
		self.docs.remove(uri).is_some()
	}
}

// ─── Diagnostics cache and waiters ───────────────────────────────────────────

/// The last diagnostics batch published for a URI.
#[derive(Debug, Clone)]
pub struct CachedDiagnostics {
	pub diagnostics: Vec<Value>,
	pub received_at: Instant,
}

#[derive(Default)]
struct DiagnosticsInner {
	cache: HashMap<String, CachedDiagnostics>,
	waiters: HashMap<String, Vec<oneshot::Sender<Vec<Value>>>>,
}

/// Diagnostics cache with freshness-gated waiters.
///
/// `publish` overwrites the cache entry and completes every pending waiter
/// for the URI under one lock, so a waiter can never observe the new cache
/// entry without also being resolved.
#[derive(Default)]
pub struct DiagnosticsStore {
	inner: StdMutex<DiagnosticsInner>,
}

impl DiagnosticsStore {
	/// Record a `publishDiagnostics` batch and resolve all waiters for the URI.
	pub fn publish(&self, uri: &str, diagnostics: Vec<Value>) {
		let waiters = {
			let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
			inner.cache.insert(
				uri.to_string(),
				CachedDiagnostics {
					diagnostics: diagnostics.clone(),
					received_at: Instant::now(),
				},
			);
			inner.waiters.remove(uri).unwrap_or_default()
		};

		for waiter in waiters {
			let _ = waiter.send(diagnostics.clone());
		}
	}

	/// Wait for diagnostics for `uri`.
	///
	/// A fresh cache entry (younger than [`DIAGNOSTICS_FRESH_MS`]) is returned
	/// immediately. Otherwise the call blocks until the next publish for the
	/// URI or until `wait` elapses, in which case the stale cache entry (or an
	/// empty list) is returned and the waiter is deregistered.
	pub async fn wait_for(&self, uri: &str, wait: Duration) -> Vec<Value> {
		let receiver = {
			let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
			if let Some(cached) = inner.cache.get(uri) {
				if cached.received_at.elapsed() < Duration::from_millis(DIAGNOSTICS_FRESH_MS) {
					return cached.diagnostics.clone();
				}
			}

			let (tx, rx) = oneshot::channel();
			inner.waiters.entry(uri.to_string()).or_default().push(tx);
			rx
		};

		match timeout(wait, receiver).await {
			Ok(Ok(diagnostics)) => diagnostics,
			_ => {
				// Timed out (or the client died): drop our registration and
				// fall back to whatever is cached.
				let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
				if let Some(waiters) = inner.waiters.get_mut(uri) {
					waiters.retain(|w| !w.is_closed());
					if waiters.is_empty() {
						inner.waiters.remove(uri);
					}
				}
				inner
					.cache
					.get(uri)
					.map(|c| c.diagnostics.clone())
					.unwrap_or_default()
			}
		}
	}

	/// Every cached entry with a non-empty diagnostics list.
	pub fn all_non_empty(&self) -> Vec<(String, Vec<Value>)> {
		let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		inner
			.cache
			.iter()
			.filter(|(_, c)| !c.diagnostics.is_empty())
			.map(|(uri, c)| (uri.clone(), c.diagnostics.clone()))
			.collect()
	}

	pub fn remove(&self, uri: &str) {
		let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		inner.cache.remove(uri);
	}

	/// Fail every outstanding waiter (used when the peer dies).
	fn abandon_all(&self) {
		let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		inner.waiters.clear();
	}
}

// ─── Client ──────────────────────────────────────────────────────────────────

type PendingMap = HashMap<u32, oneshot::Sender<LspResponse>>;

/// LSP client for one configured peer.
///
/// Owns the subprocess, the framed JSON-RPC connection and all per-document
/// state. Construction is cheap; the subprocess is spawned by [`start`],
/// which the multiplexer calls on the first matching request.
///
/// [`start`]: LspClient::start
pub struct LspClient {
	name: String,
	config: ServerConfig,
	project_root: PathBuf,
	globs: GlobSet,
	extensions: &'static [ExtensionDescriptor],
	state: Arc<StdMutex<ClientState>>,
	process: Arc<Mutex<Option<Child>>>,
	stdin: Arc<Mutex<Option<ChildStdin>>>,
	next_request_id: AtomicU32,
	pending: Arc<Mutex<PendingMap>>,
	capabilities: Arc<StdMutex<Option<Value>>>,
	documents: Arc<Mutex<DocumentStore>>,
	diagnostics: Arc<DiagnosticsStore>,
	start_lock: Mutex<()>,
}

impl LspClient {
	/// Create a client for a configured peer without spawning anything.
	///
	/// Glob patterns are compiled exactly once, here.
	pub fn new(name: String, config: ServerConfig, project_root: PathBuf) -> Result<Self> {
		if config.command.is_empty() {
			return Err(anyhow::anyhow!("Server '{}' has an empty command", name));
		}

		let mut builder = GlobSetBuilder::new();
		for pattern in &config.file_patterns {
			let glob = GlobBuilder::new(pattern)
				.literal_separator(true)
				.build()
				.map_err(|e| anyhow::anyhow!("Invalid glob '{}' for '{}': {}", pattern, name, e))?;
			builder.add(glob);
		}
		let globs = builder
			.build()
			.map_err(|e| anyhow::anyhow!("Invalid glob set for '{}': {}", name, e))?;

		let extensions = extensions_for_command(&config.command);

		Ok(Self {
			name,
			config,
			project_root,
			globs,
			extensions,
			state: Arc::new(StdMutex::new(ClientState::Idle)),
			process: Arc::new(Mutex::new(None)),
			stdin: Arc::new(Mutex::new(None)),
			next_request_id: AtomicU32::new(1),
			pending: Arc::new(Mutex::new(HashMap::new())),
			capabilities: Arc::new(StdMutex::new(None)),
			documents: Arc::new(Mutex::new(DocumentStore::default())),
			diagnostics: Arc::new(DiagnosticsStore::default()),
			start_lock: Mutex::new(()),
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn config(&self) -> &ServerConfig {
		&self.config
	}

	pub fn extensions(&self) -> &'static [ExtensionDescriptor] {
		self.extensions
	}

	/// Whether this peer's glob patterns match a project-relative path.
	pub fn matches(&self, relative_path: &str) -> bool {
		self.globs.is_match(relative_path)
	}

	pub fn state(&self) -> ClientState {
		*self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn is_ready(&self) -> bool {
		self.state() == ClientState::Ready
	}

	fn set_state(&self, state: ClientState) {
		*self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
	}

	/// Server capabilities from the initialize reply, stored unchanged.
	pub fn capabilities(&self) -> Option<Value> {
		self.capabilities
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}

	pub fn diagnostics(&self) -> &DiagnosticsStore {
		&self.diagnostics
	}

	// ─── Lifecycle ──────────────────────────────────────────────────────────

	/// Spawn the peer and run the initialize handshake.
	///
	/// Idempotent for a Ready client; a Dead client is never revived.
	pub async fn start(&self) -> Result<()> {
		let _guard = self.start_lock.lock().await;

		match self.state() {
			ClientState::Ready => return Ok(()),
			ClientState::Dead => {
				return Err(anyhow::anyhow!("Language server '{}' is dead", self.name))
			}
			_ => {}
		}

		self.set_state(ClientState::Starting);
		info!(peer = %self.name, command = ?self.config.command, "Starting language server");

		match self.spawn_and_initialize().await {
			Ok(()) => {
				self.set_state(ClientState::Ready);
				info!(peer = %self.name, "Language server ready");
				Ok(())
			}
			Err(e) => {
				error!(peer = %self.name, error = %e, "Language server failed to start");
				self.mark_dead().await;
				Err(e)
			}
		}
	}

	async fn spawn_and_initialize(&self) -> Result<()> {
		let program = &self.config.command[0];
		let args = &self.config.command[1..];

		let mut child = tokio::process::Command::new(program)
			.args(args)
			.envs(&self.config.env)
			.current_dir(&self.project_root)
			.stdin(std::process::Stdio::piped())
			.stdout(std::process::Stdio::piped())
			.stderr(std::process::Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| {
				anyhow::anyhow!("Failed to spawn language server '{}': {}", program, e)
			})?;

		let stdin = child
			.stdin
			.take()
			.ok_or_else(|| anyhow::anyhow!("Language server stdin not available"))?;
		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| anyhow::anyhow!("Language server stdout not available"))?;
		let stderr = child
			.stderr
			.take()
			.ok_or_else(|| anyhow::anyhow!("Language server stderr not available"))?;

		*self.process.lock().await = Some(child);
		*self.stdin.lock().await = Some(stdin);

		// Forward peer stderr into the log, tagged with the peer name.
		let peer = self.name.clone();
		tokio::spawn(async move {
			let mut lines = BufReader::new(stderr).lines();
			while let Ok(Some(line)) = lines.next_line().await {
				debug!(peer = %peer, "{}", line);
			}
		});

		tokio::spawn(Self::reader_loop(
			self.name.clone(),
			stdout,
			self.pending.clone(),
			self.diagnostics.clone(),
			self.stdin.clone(),
			self.state.clone(),
		));

		// Handshake: initialize, then the initialized notification.
		let response = self
			.send_request("initialize", self.initialize_params()?)
			.await?;
		let capabilities = response
			.result
			.as_ref()
			.and_then(|r| r.get("capabilities"))
			.cloned()
			.unwrap_or(Value::Null);
		*self.capabilities.lock().unwrap_or_else(|e| e.into_inner()) = Some(capabilities);

		self.send_notification("initialized", json!({})).await?;

		Ok(())
	}

	/// Build the fixed initialize payload.
	fn initialize_params(&self) -> Result<Value> {
		let root_uri = match &self.config.root_uri {
			Some(uri) => uri.clone(),
			None => file_path_to_uri(&self.project_root)?.to_string(),
		};

		let mut params = json!({
			"processId": std::process::id(),
			"rootUri": root_uri,
			"workspaceFolders": null,
			"clientInfo": {
				"name": "mcp-lsp-bridge",
				"version": env!("CARGO_PKG_VERSION"),
			},
			"capabilities": {
				"textDocument": {
					"synchronization": {
						"didSave": true,
					},
					"hover": {
						"contentFormat": ["markdown", "plaintext"],
					},
					"definition": { "linkSupport": false },
					"typeDefinition": { "linkSupport": false },
					"implementation": { "linkSupport": false },
					"declaration": { "linkSupport": false },
					"references": {},
					"signatureHelp": {
						"signatureInformation": {
							"documentationFormat": ["markdown"],
						},
					},
					"documentSymbol": {
						"hierarchicalDocumentSymbolSupport": true,
					},
					"codeAction": {},
					"rename": { "prepareSupport": true },
					"publishDiagnostics": {
						"relatedInformation": true,
						"tagSupport": { "valueSet": [1, 2] },
					},
					"callHierarchy": {},
					"typeHierarchy": {},
				},
				"workspace": {
					"symbol": {},
				},
			},
		});

		if let Some(options) = &self.config.initialization_options {
			params["initializationOptions"] = options.clone();
		}

		Ok(params)
	}

	/// Graceful shutdown: `shutdown` request, `exit` notification, bounded by
	/// [`SHUTDOWN_TIMEOUT_MS`], then force-kill. Never returns an error.
	pub async fn shutdown(&self) {
		match self.state() {
			ClientState::Idle | ClientState::Dead => {
				self.set_state(ClientState::Dead);
				return;
			}
			_ => {}
		}
		self.set_state(ClientState::Stopping);
		debug!(peer = %self.name, "Shutting down language server");

		let handshake = async {
			self.send_request("shutdown", Value::Null).await?;
			self.send_notification("exit", Value::Null).await
		};
		match timeout(Duration::from_millis(SHUTDOWN_TIMEOUT_MS), handshake).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => {
				warn!(peer = %self.name, error = %e, "Shutdown handshake failed, killing process")
			}
			Err(_) => {
				warn!(peer = %self.name, "Shutdown handshake timed out, killing process")
			}
		}

		self.mark_dead().await;
	}

	/// Kill the subprocess (if any), dispose the connection and fail all
	/// outstanding work.
	async fn mark_dead(&self) {
		self.set_state(ClientState::Dead);

		if let Some(mut child) = self.process.lock().await.take() {
			if let Err(e) = child.kill().await {
				debug!(peer = %self.name, error = %e, "Failed to kill language server process");
			}
			let _ = child.wait().await;
		}
		*self.stdin.lock().await = None;
		self.pending.lock().await.clear();
		self.diagnostics.abandon_all();
	}

	// ─── Connection ─────────────────────────────────────────────────────────

	async fn reader_loop(
		peer: String,
		stdout: ChildStdout,
		pending: Arc<Mutex<PendingMap>>,
		diagnostics: Arc<DiagnosticsStore>,
		stdin: Arc<Mutex<Option<ChildStdin>>>,
		state: Arc<StdMutex<ClientState>>,
	) {
		let mut reader = BufReader::new(stdout);

		loop {
			match read_message(&mut reader).await {
				Ok(Some(LspMessage::Response(response))) => {
					if let Some(id) = response.id {
						let sender = pending.lock().await.remove(&id);
						match sender {
							Some(tx) => {
								let _ = tx.send(response);
							}
							None => {
								warn!(peer = %peer, id = id, "Response for unknown request id")
							}
						}
					}
				}
				Ok(Some(LspMessage::Notification(notification))) => {
					match notification.method.as_str() {
						"textDocument/publishDiagnostics" => {
							let Some(params) = notification.params else {
								continue;
							};
							let uri = params.get("uri").and_then(|u| u.as_str());
							let diags = params
								.get("diagnostics")
								.and_then(|d| d.as_array())
								.cloned()
								.unwrap_or_default();
							if let Some(uri) = uri {
								debug!(peer = %peer, uri = %uri, count = diags.len(), "Diagnostics published");
								diagnostics.publish(uri, diags);
							}
						}
						"window/logMessage" | "window/showMessage" => {
							debug!(peer = %peer, params = ?notification.params, "Server message");
						}
						"$/progress" => {
							debug!(peer = %peer, params = ?notification.params, "Server progress");
						}
						other => {
							debug!(peer = %peer, method = other, "Unhandled notification");
						}
					}
				}
				Ok(Some(LspMessage::Request(request))) => {
					// Answer server-initiated requests so peers that block on
					// them (configuration, registration) keep responding.
					let result = match request.method.as_str() {
						"workspace/configuration" => {
							let items = request
								.params
								.as_ref()
								.and_then(|p| p.get("items"))
								.and_then(|i| i.as_array())
								.map(|i| i.len())
								.unwrap_or(0);
							Value::Array(vec![Value::Null; items])
						}
						_ => Value::Null,
					};
					debug!(peer = %peer, method = %request.method, "Answering server request");
					let reply = LspReply::new(request.id, result);
					if let Ok(bytes) = encode_message(&reply) {
						let mut guard = stdin.lock().await;
						if let Some(stdin) = guard.as_mut() {
							let _ = stdin.write_all(&bytes).await;
							let _ = stdin.flush().await;
						}
					}
				}
				Ok(None) => {
					info!(peer = %peer, "Language server closed its stdout");
					break;
				}
				Err(e) => {
					error!(peer = %peer, error = %e, "Error reading from language server");
					break;
				}
			}
		}

		// Subprocess exit (or a broken stream) means this peer is gone.
		*state.lock().unwrap_or_else(|e| e.into_inner()) = ClientState::Dead;
		pending.lock().await.clear();
		diagnostics.abandon_all();
	}

	async fn write_message<T: serde::Serialize>(&self, message: &T) -> Result<()> {
		let bytes = encode_message(message)?;
		let mut guard = self.stdin.lock().await;
		match guard.as_mut() {
			Some(stdin) => {
				stdin.write_all(&bytes).await?;
				stdin.flush().await?;
				Ok(())
			}
			None => Err(anyhow::anyhow!(
				"Language server '{}' is not running",
				self.name
			)),
		}
	}

	/// Send a request and await the correlated response.
	pub async fn send_request(&self, method: &str, params: Value) -> Result<LspResponse> {
		let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
		let request = LspRequest::new(id, method, params);

		let (tx, rx) = oneshot::channel();
		self.pending.lock().await.insert(id, tx);

		if let Err(e) = self.write_message(&request).await {
			self.pending.lock().await.remove(&id);
			return Err(e);
		}

		let response = match timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), rx).await {
			Ok(Ok(response)) => response,
			Ok(Err(_)) => {
				return Err(anyhow::anyhow!(
					"Language server '{}' exited during '{}'",
					self.name,
					method
				));
			}
			Err(_) => {
				self.pending.lock().await.remove(&id);
				return Err(anyhow::anyhow!(
					"Request '{}' to '{}' timed out",
					method,
					self.name
				));
			}
		};

		if let Some(error) = &response.error {
			return Err(anyhow::anyhow!(
				"Language server error {}: {}",
				error.code,
				error.message
			));
		}

		Ok(response)
	}

	/// Fire-and-forget notification.
	pub async fn send_notification(&self, method: &str, params: Value) -> Result<()> {
		self.write_message(&LspNotification::new(method, params)).await
	}

	// ─── Document synchronization ───────────────────────────────────────────

	/// Ensure a document is open on the peer; returns its URI.
	pub async fn ensure_open(&self, path: &Path) -> Result<Uri> {
		let uri = file_path_to_lsp_uri(path)?;

		let mut docs = self.documents.lock().await;
		if docs.contains(uri.as_str()) {
			return Ok(uri);
		}

		let text = std::fs::read_to_string(path)
			.map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))?;
		let language_id = language_id_or_plaintext(path);

		// Announce first, record second: the table only ever holds documents
		// the peer has been told about.
		let params = DidOpenTextDocumentParams {
			text_document: TextDocumentItem {
				uri: uri.clone(),
				language_id: language_id.to_string(),
				version: 1,
				text: text.clone(),
			},
		};
		self.send_notification("textDocument/didOpen", serde_json::to_value(params)?)
			.await?;
		docs.open(uri.as_str(), language_id, text);

		debug!(peer = %self.name, uri = %uri.as_str(), "Opened document");
		Ok(uri)
	}

	/// Replace the full text of a document, opening it first if needed.
	pub async fn notify_change(&self, path: &Path, text: String) -> Result<()> {
		let uri = file_path_to_lsp_uri(path)?;

		let mut docs = self.documents.lock().await;
		let Some(current) = docs.get(uri.as_str()).map(|d| d.version) else {
			// Not open yet: a change to an untracked document opens it.
			let language_id = language_id_or_plaintext(path);
			let params = DidOpenTextDocumentParams {
				text_document: TextDocumentItem {
					uri: uri.clone(),
					language_id: language_id.to_string(),
					version: 1,
					text: text.clone(),
				},
			};
			self.send_notification("textDocument/didOpen", serde_json::to_value(params)?)
				.await?;
			docs.open(uri.as_str(), language_id, text);
			return Ok(());
		};

		let params = DidChangeTextDocumentParams {
			text_document: VersionedTextDocumentIdentifier {
				uri: uri.clone(),
				version: current + 1,
			},
			content_changes: vec![TextDocumentContentChangeEvent {
				range: None,
				range_length: None,
				text: text.clone(),
			}],
		};
		self.send_notification("textDocument/didChange", serde_json::to_value(params)?)
			.await?;
		docs.change(uri.as_str(), text);
		Ok(())
	}

	/// Emit a save notification with the current text; no-op when not open.
	pub async fn notify_save(&self, path: &Path) -> Result<()> {
		let uri = file_path_to_lsp_uri(path)?;

		let docs = self.documents.lock().await;
		let Some(doc) = docs.get(uri.as_str()) else {
			return Ok(());
		};

		let params = DidSaveTextDocumentParams {
			text_document: TextDocumentIdentifier { uri },
			text: Some(doc.text.clone()),
		};
		self.send_notification("textDocument/didSave", serde_json::to_value(params)?)
			.await
	}

	/// Close a document and drop its diagnostics.
	pub async fn notify_close(&self, path: &Path) -> Result<()> {
		let uri = file_path_to_lsp_uri(path)?;

		let mut docs = self.documents.lock().await;
		if !docs.contains(uri.as_str()) {
			return Ok(());
		}

		let params = DidCloseTextDocumentParams {
			text_document: TextDocumentIdentifier { uri: uri.clone() },
		};
		self.send_notification("textDocument/didClose", serde_json::to_value(params)?)
			.await?;

		docs.close(uri.as_str());
		self.diagnostics.remove(uri.as_str());
		Ok(())
	}

	// ─── Request surface ────────────────────────────────────────────────────

	fn position_params(uri: &Uri, position: Position) -> Value {
		serde_json::to_value(TextDocumentPositionParams {
			text_document: TextDocumentIdentifier { uri: uri.clone() },
			position,
		})
		.unwrap_or(Value::Null)
	}

	async fn position_request(
		&self,
		method: &str,
		uri: &Uri,
		position: Position,
	) -> Result<Value> {
		let response = self
			.send_request(method, Self::position_params(uri, position))
			.await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	pub async fn goto_definition(&self, uri: &Uri, position: Position) -> Result<Value> {
		self.position_request("textDocument/definition", uri, position).await
	}

	pub async fn goto_type_definition(&self, uri: &Uri, position: Position) -> Result<Value> {
		self.position_request("textDocument/typeDefinition", uri, position).await
	}

	pub async fn goto_implementation(&self, uri: &Uri, position: Position) -> Result<Value> {
		self.position_request("textDocument/implementation", uri, position).await
	}

	pub async fn goto_declaration(&self, uri: &Uri, position: Position) -> Result<Value> {
		self.position_request("textDocument/declaration", uri, position).await
	}

	/// References always include the declaration.
	pub async fn find_references(&self, uri: &Uri, position: Position) -> Result<Value> {
		let mut params = Self::position_params(uri, position);
		params["context"] = json!({ "includeDeclaration": true });
		let response = self.send_request("textDocument/references", params).await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	pub async fn hover(&self, uri: &Uri, position: Position) -> Result<Value> {
		self.position_request("textDocument/hover", uri, position).await
	}

	pub async fn signature_help(&self, uri: &Uri, position: Position) -> Result<Value> {
		self.position_request("textDocument/signatureHelp", uri, position).await
	}

	pub async fn document_symbols(&self, uri: &Uri) -> Result<Value> {
		let params = json!({ "textDocument": { "uri": uri.as_str() } });
		let response = self
			.send_request("textDocument/documentSymbol", params)
			.await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	pub async fn workspace_symbols(&self, query: &str) -> Result<Value> {
		let response = self
			.send_request("workspace/symbol", json!({ "query": query }))
			.await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	pub async fn code_actions(
		&self,
		uri: &Uri,
		range: lsp_types::Range,
		context_diagnostics: Vec<Value>,
	) -> Result<Value> {
		let params = json!({
			"textDocument": { "uri": uri.as_str() },
			"range": range,
			"context": { "diagnostics": context_diagnostics },
		});
		let response = self.send_request("textDocument/codeAction", params).await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	pub async fn prepare_rename(&self, uri: &Uri, position: Position) -> Result<Value> {
		self.position_request("textDocument/prepareRename", uri, position).await
	}

	pub async fn rename(&self, uri: &Uri, position: Position, new_name: &str) -> Result<Value> {
		let mut params = Self::position_params(uri, position);
		params["newName"] = json!(new_name);
		let response = self.send_request("textDocument/rename", params).await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	pub async fn call_hierarchy_prepare(&self, uri: &Uri, position: Position) -> Result<Value> {
		self.position_request("textDocument/prepareCallHierarchy", uri, position).await
	}

	pub async fn call_hierarchy_incoming(&self, item: Value) -> Result<Value> {
		let response = self
			.send_request("callHierarchy/incomingCalls", json!({ "item": item }))
			.await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	pub async fn call_hierarchy_outgoing(&self, item: Value) -> Result<Value> {
		let response = self
			.send_request("callHierarchy/outgoingCalls", json!({ "item": item }))
			.await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	pub async fn type_hierarchy_prepare(&self, uri: &Uri, position: Position) -> Result<Value> {
		self.position_request("textDocument/prepareTypeHierarchy", uri, position).await
	}

	pub async fn type_hierarchy_supertypes(&self, item: Value) -> Result<Value> {
		let response = self
			.send_request("typeHierarchy/supertypes", json!({ "item": item }))
			.await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	pub async fn type_hierarchy_subtypes(&self, item: Value) -> Result<Value> {
		let response = self
			.send_request("typeHierarchy/subtypes", json!({ "item": item }))
			.await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	/// Opaque request for protocol extensions.
	pub async fn send_custom_request(&self, method: &str, params: Value) -> Result<Value> {
		let response = self.send_request(method, params).await?;
		Ok(response.result.unwrap_or(Value::Null))
	}

	/// Wait for diagnostics for a document URI.
	pub async fn wait_for_diagnostics(&self, uri: &str, wait: Duration) -> Vec<Value> {
		self.diagnostics.wait_for(uri, wait).await
	}

	/// Every cached diagnostics entry with a non-empty list.
	pub fn all_cached_diagnostics(&self) -> Vec<(String, Vec<Value>)> {
		self.diagnostics.all_non_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn test_config(patterns: &[&str]) -> ServerConfig {
		ServerConfig {
			command: vec!["test-lsp".to_string()],
			file_patterns: patterns.iter().map(|p| p.to_string()).collect(),
			initialization_options: None,
			root_uri: None,
			env: HashMap::new(),
		}
	}

	fn test_client(patterns: &[&str]) -> LspClient {
		LspClient::new(
			"test".to_string(),
			test_config(patterns),
			PathBuf::from("/work/project"),
		)
		.unwrap()
	}

	// ── Document store ─────────────────────────────────────────────────────

	#[test]
	fn document_versions_strictly_increase() {
		let mut store = DocumentStore::default();
		let uri = "file:///work/a.rs";

		assert_eq!(store.open(uri, "rust", "v1".into()), 1);
		let mut versions = vec![1];
		for i in 2..=6 {
			let v = store.change(uri, format!("v{}", i)).unwrap();
			versions.push(v);
		}
		assert_eq!(versions, vec![1, 2, 3, 4, 5, 6]);
		assert_eq!(store.get(uri).unwrap().text, "v6");
	}

	#[test]
	fn change_on_unopened_document_is_none() {
		let mut store = DocumentStore::default();
		assert!(store.change("file:///missing.rs", "text".into()).is_none());
	}

	#[test]
	fn close_removes_document() {
		let mut store = DocumentStore::default();
		store.open("file:///a.rs", "rust", String::new());
		assert!(store.close("file:///a.rs"));
		assert!(!store.close("file:///a.rs"));
		assert!(!store.contains("file:///a.rs"));
	}

	// ── Diagnostics store ──────────────────────────────────────────────────

	#[tokio::test]
	async fn fresh_cache_returns_immediately() {
		let store = DiagnosticsStore::default();
		let diags = vec![json!({"message": "oops"})];
		store.publish("file:///a.ts", diags.clone());

		// Within the freshness window there is no waiting at all.
		let result = store
			.wait_for("file:///a.ts", Duration::from_millis(1))
			.await;
		assert_eq!(result, diags);
	}

	#[tokio::test]
	async fn publish_resolves_pending_waiters() {
		let store = Arc::new(DiagnosticsStore::default());

		let waiter = {
			let store = store.clone();
			tokio::spawn(async move {
				store
					.wait_for("file:///b.ts", Duration::from_secs(5))
					.await
			})
		};
		let second = {
			let store = store.clone();
			tokio::spawn(async move {
				store
					.wait_for("file:///b.ts", Duration::from_secs(5))
					.await
			})
		};

		// Give both waiters time to register.
		tokio::time::sleep(Duration::from_millis(50)).await;
		let diags = vec![json!({"message": "late"})];
		store.publish("file:///b.ts", diags.clone());

		assert_eq!(waiter.await.unwrap(), diags);
		assert_eq!(second.await.unwrap(), diags);

		// No waiter remains registered afterwards.
		let inner = store.inner.lock().unwrap();
		assert!(inner.waiters.get("file:///b.ts").is_none());
	}

	#[tokio::test]
	async fn timeout_falls_back_to_stale_cache() {
		let store = DiagnosticsStore::default();
		store.publish("file:///c.ts", vec![]);
		// Age the entry past the freshness window.
		tokio::time::sleep(Duration::from_millis(DIAGNOSTICS_FRESH_MS + 100)).await;

		let result = store
			.wait_for("file:///c.ts", Duration::from_millis(50))
			.await;
		assert_eq!(result, Vec::<Value>::new());

		let inner = store.inner.lock().unwrap();
		assert!(
			inner
				.waiters
				.get("file:///c.ts")
				.map(|w| w.is_empty())
				.unwrap_or(true),
			"waiter should be deregistered after timeout"
		);
	}

	#[tokio::test]
	async fn timeout_with_no_cache_returns_empty() {
		let store = DiagnosticsStore::default();
		let result = store
			.wait_for("file:///never.ts", Duration::from_millis(20))
			.await;
		assert!(result.is_empty());
	}

	#[test]
	fn all_non_empty_skips_clean_files() {
		let store = DiagnosticsStore::default();
		store.publish("file:///clean.ts", vec![]);
		store.publish("file:///dirty.ts", vec![json!({"message": "x"})]);

		let all = store.all_non_empty();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].0, "file:///dirty.ts");
	}

	// ── Client construction ────────────────────────────────────────────────

	#[test]
	fn client_matches_by_glob() {
		let client = test_client(&["**/*.ts", "**/*.tsx"]);
		assert!(client.matches("src/app.ts"));
		assert!(client.matches("deep/nested/component.tsx"));
		assert!(!client.matches("src/main.rs"));
	}

	#[test]
	fn client_starts_idle() {
		let client = test_client(&["**/*.rs"]);
		assert_eq!(client.state(), ClientState::Idle);
		assert!(!client.is_ready());
		assert!(client.capabilities().is_none());
	}

	#[test]
	fn invalid_glob_is_rejected() {
		let result = LspClient::new(
			"broken".to_string(),
			test_config(&["a{"]),
			PathBuf::from("/work"),
		);
		assert!(result.is_err());
	}

	#[test]
	fn initialize_params_carry_root_and_options() {
		let mut config = test_config(&["**/*.rs"]);
		config.initialization_options = Some(json!({"cargo": {"features": "all"}}));
		let client =
			LspClient::new("rust".to_string(), config, PathBuf::from("/work/project")).unwrap();

		let params = client.initialize_params().unwrap();
		assert_eq!(params["rootUri"], "file:///work/project");
		assert_eq!(params["workspaceFolders"], Value::Null);
		assert_eq!(params["initializationOptions"]["cargo"]["features"], "all");
		let sync = &params["capabilities"]["textDocument"]["synchronization"];
		assert_eq!(sync["didSave"], true);
		let tags = &params["capabilities"]["textDocument"]["publishDiagnostics"]["tagSupport"];
		assert_eq!(tags["valueSet"], json!([1, 2]));
	}

	// ── Document notifications ─────────────────────────────────────────────

	#[tokio::test]
	async fn save_of_unopened_document_is_a_noop() {
		let client = test_client(&["**/*.rs"]);
		// Never opened, so nothing is sent and nothing fails.
		client.notify_save(Path::new("/work/project/a.rs")).await.unwrap();
	}

	#[tokio::test]
	async fn close_of_unopened_document_is_a_noop() {
		let client = test_client(&["**/*.rs"]);
		client.notify_close(Path::new("/work/project/a.rs")).await.unwrap();
	}

	#[tokio::test]
	async fn change_without_running_server_fails() {
		let client = test_client(&["**/*.rs"]);
		let err = client
			.notify_change(Path::new("/work/project/a.rs"), "fn main() {}".into())
			.await
			.unwrap_err();
		assert!(err.to_string().contains("not running"));
	}

	#[test]
	fn initialize_params_honor_root_uri_override() {
		let mut config = test_config(&["**/*.rs"]);
		config.root_uri = Some("file:///other/root".to_string());
		let client =
			LspClient::new("rust".to_string(), config, PathBuf::from("/work/project")).unwrap();

		let params = client.initialize_params().unwrap();
		assert_eq!(params["rootUri"], "file:///other/root");
	}
}
