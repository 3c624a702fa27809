use tracing::{debug, info, warn};
use tracing_subscriber::{fmt::Layer, prelude::*, registry::Registry, EnvFilter};

/// Initialize logging for the bridge.
///
/// Everything goes to standard error with ISO-8601 timestamps; standard
/// output is reserved for the MCP protocol stream.
pub fn init_logging(debug_mode: bool) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if debug_mode {
			EnvFilter::new("debug")
		} else {
			EnvFilter::new("info")
		}
	});

	let stderr_layer = Layer::new()
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.with_target(false);

	Registry::default().with(env_filter).with(stderr_layer).init();
}

/// Log an MCP request as it arrives.
pub fn log_mcp_request(method: &str, request_id: Option<&serde_json::Value>) {
	info!(method = method, request_id = ?request_id, "MCP request received");
}

/// Log the outcome of an MCP request.
pub fn log_mcp_response(
	method: &str,
	success: bool,
	request_id: Option<&serde_json::Value>,
	duration_ms: u64,
) {
	if success {
		info!(
			method = method,
			request_id = ?request_id,
			duration_ms = duration_ms,
			"MCP request processed"
		);
	} else {
		warn!(
			method = method,
			request_id = ?request_id,
			duration_ms = duration_ms,
			"MCP request failed"
		);
	}
}

/// Log a tool invocation at debug level with its arguments.
pub fn log_tool_call(tool: &str, arguments: &serde_json::Value) {
	debug!(tool = tool, arguments = %arguments, "Tool call");
}
