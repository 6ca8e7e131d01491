use std::process;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod error;
mod llm;
mod mcp;
mod models;
mod services;
mod tools;
mod utils;

use config::Settings;
use mcp::server::McpServer;
use services::{ContentRouter, ExtractionService, PromptBuilder, SummarizationService};
use tools::{extract_tool::ExtractTool, summarize_tool::SummarizeTool};
use utils::web_fetch::HttpFetcher;

#[tokio::main]
async fn main() {
    let matches = config::command().get_matches();

    // Initialize tracing to stderr only (stdout is reserved for JSON-RPC)
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(config::log_filter(matches.get_flag("quiet"), rust_log.as_deref()))
        .init();

    let settings = match Settings::from_matches(&matches) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let provider = match llm::create_provider(&settings) {
        Ok(provider) => provider,
        Err(e) => {
            error!(
                "Failed to create LLM provider '{}' (known: {}): {}",
                settings.provider,
                llm::provider_names().collect::<Vec<_>>().join(", "),
                e
            );
            process::exit(1);
        }
    };

    info!(
        provider = provider.provider_name(),
        model = %settings.model_name,
        max_tokens = settings.max_tokens,
        upload_dir = %settings.upload_dir.display(),
        "Configuration loaded"
    );

    let router = ContentRouter::new(Arc::new(HttpFetcher::new(settings.fetch_timeout)));
    let prompts = PromptBuilder::new(settings.max_tokens);

    let summarization = SummarizationService::new(
        router.clone(),
        provider.clone(),
        prompts,
        settings.default_summary_length,
    );
    let extraction = ExtractionService::new(router, provider, prompts);

    info!("Starting MCP server...");

    let mut server = McpServer::new(
        SummarizeTool::new(Arc::new(summarization), settings.upload_dir.clone()),
        ExtractTool::new(Arc::new(extraction), settings.upload_dir.clone()),
    );
    if let Err(e) = server.start().await {
        error!("Server stopped with error: {}", e);
        process::exit(1);
    }
}
