// src/server/mcp.rs
// MCP endpoint: the same verb payloads over a bidirectional
// session-oriented envelope

use crate::verbs::{
    AskRequest, AugmentRequest, ComposeRequest, DecomposeRequest, Dispatcher, ForgetRequest,
    InspectRequest, NavigateRequest, PanRequest, RecallRequest, RememberRequest, TellRequest,
    TiltRequest, VerbCall, ZoomRequest,
};
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*, tool,
    tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct MnemoMcpServer {
    dispatcher: Arc<Dispatcher>,
    tool_router: ToolRouter<Self>,
}

impl MnemoMcpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            tool_router: Self::tool_router(),
        }
    }

    async fn run(&self, call: VerbCall) -> Result<CallToolResult, McpError> {
        let response = self
            .dispatcher
            .dispatch(call, CancellationToken::new())
            .await;
        let success = response.success;
        let text = serde_json::to_string_pretty(&response)
            .unwrap_or_else(|e| format!("{{\"success\":false,\"error\":\"{e}\"}}"));
        if success {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        }
    }
}

#[tool_router]
impl MnemoMcpServer {
    #[tool(description = "Store content in semantic memory. Concepts and an embedding are \
        extracted automatically; documents are additionally decomposed into the knowledge graph.")]
    async fn tell(
        &self,
        Parameters(req): Parameters<TellRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Tell(req)).await
    }

    #[tool(description = "Ask a question against semantic memory. Retrieves context under the \
        session's ZPT lens, optionally augments with hypothetical answers (HyDE), and generates \
        a grounded response.")]
    async fn ask(&self, Parameters(req): Parameters<AskRequest>) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Ask(req)).await
    }

    #[tool(description = "Run an augmentation sub-pipeline: concept enhancement, batch concept \
        extraction, full decomposition, relationship analysis, or hypothesis promotion.")]
    async fn augment(
        &self,
        Parameters(req): Parameters<AugmentRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Augment(req)).await
    }

    #[tool(description = "Store a fact with domain scoping and importance for later recall.")]
    async fn remember(
        &self,
        Parameters(req): Parameters<RememberRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Remember(req)).await
    }

    #[tool(description = "Search stored interactions with explicit domain and time filters, \
        without touching the session's navigation state.")]
    async fn recall(
        &self,
        Parameters(req): Parameters<RecallRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Recall(req)).await
    }

    #[tool(description = "Remove an interaction by id, or fade matching interactions by a \
        factor. System instructions are preserved.")]
    async fn forget(
        &self,
        Parameters(req): Parameters<ForgetRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Forget(req)).await
    }

    #[tool(description = "Set the zoom level (entity, unit, text, community, corpus). Re-runs \
        the session's last query under the new lens.")]
    async fn zoom(&self, Parameters(req): Parameters<ZoomRequest>) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Zoom(req)).await
    }

    #[tool(description = "Update pan filters (domains, keywords, entities, temporal window). \
        Filters accumulate; pass an empty list to reset a dimension.")]
    async fn pan(&self, Parameters(req): Parameters<PanRequest>) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Pan(req)).await
    }

    #[tool(description = "Set the tilt projection (keywords, embedding, graph, temporal) used \
        for ranking.")]
    async fn tilt(&self, Parameters(req): Parameters<TiltRequest>) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Tilt(req)).await
    }

    #[tool(description = "Read-only inspection of the session, server state, or memory tiers.")]
    async fn inspect(
        &self,
        Parameters(req): Parameters<InspectRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Inspect(req)).await
    }

    #[tool(description = "Assemble the retrieval-grounded prompt for a query without invoking \
        generation.")]
    async fn compose(
        &self,
        Parameters(req): Parameters<ComposeRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Compose(req)).await
    }

    #[tool(description = "Decompose text into semantic units, entities, and relationships, \
        optionally persisting the resulting graph.")]
    async fn decompose(
        &self,
        Parameters(req): Parameters<DecomposeRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Decompose(req)).await
    }

    #[tool(description = "Apply a combined zoom/pan/tilt update and optionally re-run a query \
        under the new lens.")]
    async fn navigate(
        &self,
        Parameters(req): Parameters<NavigateRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run(VerbCall::Navigate(req)).await
    }
}

#[tool_handler]
impl ServerHandler for MnemoMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Mnemo - Semantic Memory Core. Verbs: tell/ask store and answer against a \
                 hybrid semantic memory (embeddings + concepts + knowledge graph); zoom/pan/tilt \
                 steer the retrieval lens; remember/recall/forget manage domain-scoped facts; \
                 augment and decompose run the graph pipelines."
                    .to_string(),
            ),
        }
    }
}
