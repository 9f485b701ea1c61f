//! MCP server for a corpus collection
//!
//! Exposes semantic search over the built collection to MCP clients.

mod server;

pub use server::{run_mcp_server, CorpusService};
