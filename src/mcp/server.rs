//! Corpus MCP Server implementation

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::core::config::Config;
use crate::error::Error;
use crate::search::collection::CollectionDb;
use crate::search::embedding::HtpEmbedder;
use crate::search::engine::{QueryEngine, SearchHit};

const MAX_TOP_K: usize = 100;

/// Parameters for corpus_search tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Natural language search query
    #[schemars(description = "Natural language search query")]
    pub query: String,
    /// Maximum number of fragments to return (default: collection config)
    #[schemars(description = "Maximum number of fragments (default: 5, max: 100)")]
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Parameters for corpus_get_fragment tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetFragmentParams {
    #[schemars(description = "Row id returned by corpus_search")]
    pub row_id: usize,
}

/// Search hit for JSON output
#[derive(Debug, Serialize)]
struct SearchHitJson {
    rank: usize,
    row_id: usize,
    source: String,
    chunk_index: usize,
    score: f32,
    preview: String,
}

impl SearchHitJson {
    fn new(rank: usize, hit: SearchHit) -> Self {
        Self {
            rank,
            row_id: hit.row_id,
            source: hit.fragment.source,
            chunk_index: hit.fragment.chunk_index,
            score: hit.score,
            preview: hit.fragment.preview,
        }
    }
}

/// Corpus MCP Service
#[derive(Clone)]
pub struct CorpusService {
    config: Arc<Config>,
    embedder: HtpEmbedder,
    tool_router: ToolRouter<Self>,
}

impl CorpusService {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            embedder: HtpEmbedder::new(),
            tool_router: Self::tool_router(),
        }
    }

    fn open_db(&self) -> Result<CollectionDb, McpError> {
        CollectionDb::open(&self.config.collection_path()).map_err(to_mcp_error)
    }

    /// Requested top_k clamped to 1..=100; absent or 0 means the configured default
    fn clamp_top_k(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(0) | None => self.config.top_k,
            Some(k) => k,
        }
        .min(MAX_TOP_K)
    }
}

fn to_mcp_error(e: Error) -> McpError {
    match e {
        Error::CollectionNotFound { .. } => McpError::invalid_request(
            format!("{}. Run `corpus build-index` first.", e),
            None,
        ),
        Error::NotFound { .. } | Error::InvalidParameter(_) | Error::DimensionMismatch { .. } => {
            McpError::invalid_params(e.to_string(), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

#[tool_router]
impl CorpusService {
    /// Semantic search over the collection
    #[tool(description = "Search the document corpus by semantic similarity. Returns the most similar text fragments with their source document, chunk position and score.")]
    async fn corpus_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let top_k = self.clamp_top_k(params.0.top_k);
        let engine = QueryEngine::open(&self.config, &self.embedder).map_err(to_mcp_error)?;

        let hits = engine
            .query(&params.0.query, top_k)
            .map_err(to_mcp_error)?;

        let json_hits: Vec<SearchHitJson> = hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| SearchHitJson::new(i + 1, hit))
            .collect();

        to_json(&json_hits)
    }

    /// Fetch one stored fragment
    #[tool(description = "Get the stored preview and provenance of one fragment by its row id.")]
    async fn corpus_get_fragment(
        &self,
        params: Parameters<GetFragmentParams>,
    ) -> Result<CallToolResult, McpError> {
        let fragment = self
            .open_db()?
            .get_fragment(params.0.row_id)
            .map_err(to_mcp_error)?;

        to_json(&serde_json::json!({
            "row_id": params.0.row_id,
            "source": fragment.source,
            "chunk_index": fragment.chunk_index,
            "preview": fragment.preview,
        }))
    }

    /// Collection summary
    #[tool(description = "Get the corpus collection status: fragment count, dimensionality, chunking parameters and build time.")]
    async fn corpus_status(&self) -> Result<CallToolResult, McpError> {
        let stats = self.open_db()?.stats().map_err(to_mcp_error)?;
        to_json(&stats)
    }
}

#[tool_handler]
impl ServerHandler for CorpusService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Corpus search MCP Server. Provides semantic search over a locally indexed document folder.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server over stdio
pub async fn run_mcp_server(config: Config) -> Result<()> {
    use tokio::io::{stdin, stdout};

    info!(collection = %config.collection, "starting MCP server");
    let service = CorpusService::new(config);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_top_k() {
        let service = CorpusService::new(Config {
            top_k: 7,
            ..Config::default()
        });

        assert_eq!(service.clamp_top_k(None), 7);
        assert_eq!(service.clamp_top_k(Some(0)), 7);
        assert_eq!(service.clamp_top_k(Some(3)), 3);
        assert_eq!(service.clamp_top_k(Some(10_000)), MAX_TOP_K);
    }

    #[test]
    fn test_error_mapping() {
        let missing = to_mcp_error(Error::CollectionNotFound {
            name: "default".to_string(),
            path: "artifacts/default.db".into(),
        });
        assert!(missing.message.contains("build-index"));

        let bad_row = to_mcp_error(Error::NotFound { row_id: 9, len: 3 });
        assert!(bad_row.message.contains("row 9"));
    }
}
