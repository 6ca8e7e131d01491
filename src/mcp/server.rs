use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::transport::StdioTransport;
use super::types::*;
use crate::tools::{
    extract_tool::{ExtractTool, EXTRACT_TOOL_DEFINITION},
    summarize_tool::{SummarizeTool, SUMMARIZE_TOOL_DEFINITION},
};

pub struct McpServer {
    summarize_tool: SummarizeTool,
    extract_tool: ExtractTool,
    initialized: bool,
}

impl McpServer {
    pub fn new(summarize_tool: SummarizeTool, extract_tool: ExtractTool) -> Self {
        Self {
            summarize_tool,
            extract_tool,
            initialized: false,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        let mut transport = StdioTransport::new();
        info!("MCP server started and listening on stdio");

        loop {
            match transport.read_message().await? {
                Some(message) => match message {
                    McpMessage::Request(request) => {
                        let response = self.handle_request(request).await;
                        transport.write_response(response).await?;
                    }
                    McpMessage::Notification(notification) => {
                        self.handle_notification(notification).await;
                    }
                    McpMessage::Malformed(reason) => {
                        let response = McpResponse::error(
                            serde_json::Value::Null,
                            PARSE_ERROR,
                            format!("Parse error: {}", reason),
                        );
                        transport.write_response(response).await?;
                    }
                },
                None => {
                    info!("Client disconnected");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_request(&mut self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id.clone());

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request).await,
            "tools/list" => self.handle_list_tools(request).await,
            "tools/call" => self.handle_call_tool(request).await,
            "ping" => self.handle_ping(request).await,
            _ => McpResponse::error(id, METHOD_NOT_FOUND, "Method not found"),
        }
    }

    async fn handle_notification(&mut self, notification: McpNotification) {
        debug!("Received notification: {}", notification.method);

        match notification.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialization completed");
                self.initialized = true;
            }
            "notifications/cancelled" => {
                debug!("Request cancelled notification received");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    fn ensure_valid_id(id: Option<serde_json::Value>) -> serde_json::Value {
        match id {
            Some(value) => match value {
                serde_json::Value::Null => serde_json::Value::String("0".to_string()),
                _ => value,
            },
            None => serde_json::Value::String("0".to_string()),
        }
    }

    fn result_response(id: serde_json::Value, result: &impl Serialize) -> McpResponse {
        match serde_json::to_value(result) {
            Ok(value) => McpResponse::result(id, value),
            Err(e) => {
                error!("Failed to serialize result: {}", e);
                McpResponse::error(id, INTERNAL_ERROR, format!("Internal error: {}", e))
            }
        }
    }

    async fn handle_initialize(&mut self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id.clone());

        match request.params {
            Some(params) => match serde_json::from_value::<InitializeParams>(params) {
                Ok(init_params) => {
                    info!(
                        client = %init_params.client_info.name,
                        version = %init_params.client_info.version,
                        "Initializing session"
                    );
                    let result = InitializeResult {
                        protocol_version: PROTOCOL_VERSION.to_string(),
                        server_info: ServerInfo {
                            name: "Content Digest MCP".to_string(),
                            version: env!("CARGO_PKG_VERSION").to_string(),
                            description: Some("A Model Context Protocol server that summarizes and extracts structured data from PDFs, web pages and text".to_string()),
                        },
                        capabilities: ServerCapabilities {
                            tools: Some(ToolsCapability {
                                list_changed: Some(false),
                            }),
                            logging: Some(serde_json::json!({})),
                        },
                    };

                    Self::result_response(id, &result)
                }
                Err(e) => McpResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
            },
            None => McpResponse::error(id, INVALID_PARAMS, "Missing params"),
        }
    }

    async fn handle_list_tools(&self, request: McpRequest) -> McpResponse {
        let result = ListToolsResult {
            tools: vec![
                SUMMARIZE_TOOL_DEFINITION.clone(),
                EXTRACT_TOOL_DEFINITION.clone(),
            ],
        };

        Self::result_response(Self::ensure_valid_id(request.id), &result)
    }

    async fn handle_call_tool(&self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id.clone());
        if !self.initialized {
            debug!("tools/call received before notifications/initialized");
        }

        match request.params {
            Some(params) => match serde_json::from_value::<CallToolParams>(params) {
                Ok(call_params) => {
                    let result = self.execute_tool(call_params).await;
                    Self::result_response(id, &result)
                }
                Err(e) => McpResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
            },
            None => McpResponse::error(id, INVALID_PARAMS, "Missing params"),
        }
    }

    async fn handle_ping(&self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id.clone());

        McpResponse::result(id, serde_json::json!({}))
    }

    async fn execute_tool(&self, params: CallToolParams) -> CallToolResult {
        match params.name.as_str() {
            "summarize-content" => self.summarize_tool.execute(params.arguments).await,
            "extract-content" => self.extract_tool.execute(params.arguments).await,
            _ => CallToolResult::error(format!("Tool not found: {}", params.name)),
        }
    }
}
