// src/server/mod.rs
// HTTP + MCP transport

mod handlers;
mod mcp;
mod router;

pub use mcp::MnemoMcpServer;
pub use router::{build_router, serve};
