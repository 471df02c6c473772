use crate::error::CallFailedSnafu;
use crate::error::NotConnectedSnafu;
use crate::error::ProtocolMismatchSnafu;
use crate::error::Result;
use crate::error::ToolNotFoundSnafu;
use crate::error::TransportSnafu;
use loom_mcp_types::McpCallResult;
use loom_mcp_types::McpContentBlock;
use loom_mcp_types::McpToolDescriptor;
use loom_protocol::McpServerConfig;
use loom_protocol::McpTransport;
use rmcp::RoleClient;
use rmcp::ServiceExt;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::TokioChildProcess;
use rmcp::transport::sse_client::SseClientTransport;
use snafu::ResultExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::info;
use tracing::warn;

/// Lifecycle of one configured server's connection. A server starts
/// `Disconnected` and moves forward only; a failed connection is not
/// retried automatically — the caller (session startup) decides whether
/// to try again.
#[derive(Debug, Clone)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready { tools: Vec<McpToolDescriptor> },
    Failed { reason: String },
}

struct ServerHandle {
    service: RunningService<RoleClient, ()>,
    state: ConnectionState,
}

/// Bridges configured MCP servers into the session's tool registry:
/// connects each server's transport, lists its tools under a
/// `<server>_<tool>` prefix, and forwards calls back to the originating
/// server with the prefix stripped.
#[derive(Clone, Default)]
pub struct McpBridge {
    servers: Arc<RwLock<HashMap<String, ServerHandle>>>,
}

impl McpBridge {
    pub fn new() -> Self {
        McpBridge::default()
    }

    /// Connects to `config.name` and lists its tools. On any failure the
    /// server is left out of the registry entirely — a broken MCP server
    /// degrades to "those tools aren't available", not a processor crash.
    pub async fn connect(&self, config: McpServerConfig) -> Result<()> {
        let server = config.name.clone();
        info!(server = %server, "connecting to MCP server");

        let service = match &config.transport {
            McpTransport::Stdio { command, args, env } => {
                let mut cmd = Command::new(command);
                cmd.args(args).envs(env);
                let transport = TokioChildProcess::new(cmd).map_err(|e| {
                    TransportSnafu {
                        server: server.clone(),
                        message: format!("failed to spawn child process transport: {e}"),
                    }
                    .build()
                })?;
                ().serve(transport).await.map_err(|e| {
                    TransportSnafu {
                        server: server.clone(),
                        message: format!("failed to initialize MCP session over stdio: {e}"),
                    }
                    .build()
                })?
            }
            McpTransport::Http { url, .. } => {
                let transport = SseClientTransport::start(url.clone()).await.map_err(|e| {
                    TransportSnafu {
                        server: server.clone(),
                        message: format!("failed to start SSE transport: {e}"),
                    }
                    .build()
                })?;
                ().serve(transport).await.map_err(|e| {
                    TransportSnafu {
                        server: server.clone(),
                        message: format!("failed to initialize MCP session over SSE: {e}"),
                    }
                    .build()
                })?
            }
        };

        if let Some(info) = service.peer_info() {
            let reported = info.protocol_version.to_string();
            if reported != loom_mcp_types::PROTOCOL_VERSION {
                let _ = service.cancel().await;
                return ProtocolMismatchSnafu {
                    server: server.clone(),
                    reported,
                    expected: loom_mcp_types::PROTOCOL_VERSION.to_string(),
                }
                .fail();
            }
        }

        // A server that can't list its tools is still a server worth keeping
        // connected — it's registered with an empty tool set rather than
        // dropped, so one misbehaving server can't take the whole registry
        // down at startup.
        let tools: Vec<McpToolDescriptor> = match service.list_tools(Default::default()).await {
            Ok(listed) => listed
                .tools
                .into_iter()
                .map(|tool| McpToolDescriptor {
                    name: tool.name.to_string(),
                    description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
                    input_schema: serde_json::to_value(&tool.input_schema)
                        .unwrap_or(serde_json::json!({})),
                })
                .collect(),
            Err(e) => {
                warn!(server = %server, error = %e, "failed to list tools, registering with an empty tool set");
                Vec::new()
            }
        };

        let handle = ServerHandle {
            service,
            state: ConnectionState::Ready {
                tools: tools.clone(),
            },
        };
        self.servers.write().await.insert(server.clone(), handle);
        info!(server = %server, tool_count = tools.len(), "MCP server ready");
        Ok(())
    }

    pub async fn disconnect(&self, server: &str) {
        if let Some(handle) = self.servers.write().await.remove(server) {
            if let Err(err) = handle.service.cancel().await {
                warn!(server, ?err, "error while shutting down MCP server");
            }
        }
    }

    pub async fn server_names(&self) -> Vec<String> {
        self.servers.read().await.keys().cloned().collect()
    }

    /// All tools across every connected server, named
    /// `<server>_<tool>` as they'll be registered in the session.
    pub async fn prefixed_tool_descriptors(&self) -> Vec<(String, McpToolDescriptor)> {
        self.servers
            .read()
            .await
            .iter()
            .flat_map(|(server, handle)| match &handle.state {
                ConnectionState::Ready { tools } => tools
                    .iter()
                    .map(|tool| {
                        (
                            loom_mcp_types::prefixed_tool_name(server, &tool.name),
                            tool.clone(),
                        )
                    })
                    .collect::<Vec<_>>(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<McpCallResult> {
        let servers = self.servers.read().await;
        let handle = servers.get(server).context(NotConnectedSnafu {
            server: server.to_string(),
        })?;

        if let ConnectionState::Ready { tools } = &handle.state {
            if !tools.iter().any(|t| t.name == tool) {
                return ToolNotFoundSnafu {
                    server: server.to_string(),
                    tool: tool.to_string(),
                }
                .fail();
            }
        }

        let args_object = arguments.as_object().cloned();

        let result = handle
            .service
            .call_tool(CallToolRequestParam {
                name: tool.to_string().into(),
                arguments: args_object,
            })
            .await
            .map_err(|e| {
                CallFailedSnafu {
                    server: server.to_string(),
                    tool: tool.to_string(),
                    message: format!("request failed: {e}"),
                }
                .build()
            })?;

        let content = result
            .content
            .into_iter()
            .map(|block| match block.raw {
                rmcp::model::RawContent::Text(text) => McpContentBlock::Text { text: text.text },
                rmcp::model::RawContent::Image(image) => McpContentBlock::Image {
                    data: image.data,
                    mime_type: image.mime_type,
                },
                rmcp::model::RawContent::Resource(resource) => McpContentBlock::Resource {
                    uri: resource.resource.uri().to_string(),
                    text: resource.resource.as_text().map(|t| t.text.clone()),
                },
                _ => McpContentBlock::Text {
                    text: String::new(),
                },
            })
            .collect();

        Ok(McpCallResult {
            content,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    /// Looks up which connected server exposes `prefixed_name`, stripping
    /// the `<server>_` prefix. Returns `None` if no connected server's
    /// prefix matches.
    pub async fn resolve_prefixed_tool(&self, prefixed_name: &str) -> Option<(String, String)> {
        let servers = self.server_names().await;
        loom_mcp_types::split_prefixed_tool_name(prefixed_name, &servers)
            .map(|(server, tool)| (server.to_string(), tool.to_string()))
    }
}
