//! MCP surface: the `chat` and `consensus` tools over rmcp.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use tracing::warn;

use crate::error::ToolResult;
use crate::tools::{self, ChatArgs, ConsensusArgs, SharedToolContext, ToolResponse};

const INSTRUCTIONS: &str = "MCP server for multi-model collaboration.\n\
- chat: talk to one model (name, alias, or 'auto'); pass `continuation` to keep the thread going\n\
- consensus: ask several models the same question in parallel, then let each refine its answer \
after seeing the others (set enable_cross_feedback=false to skip the refinement round)\n\n\
Every successful call returns the answer followed by a JSON `continuation` object whose `id` \
can be passed back to either tool.";

#[derive(Clone)]
pub struct ConsensusServer {
    ctx: SharedToolContext,
    tool_router: ToolRouter<Self>,
}

impl ConsensusServer {
    pub fn new(ctx: SharedToolContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }
}

/// Tool outcome as MCP content; tool failures are reported in-band
fn into_call_result(name: &str, outcome: ToolResult<ToolResponse>) -> CallToolResult {
    match outcome {
        Ok(response) => {
            let continuation = response.continuation_json();
            CallToolResult::success(vec![
                Content::text(response.content),
                Content::text(continuation),
            ])
        }
        Err(e) => {
            warn!("{} failed: {}", name, e);
            CallToolResult::error(vec![Content::text(e.to_string())])
        }
    }
}

#[tool_router]
impl ConsensusServer {
    #[tool(
        description = "Chat with a single AI model. Good for brainstorming, second opinions and quick questions. Supports files, images and multi-turn conversations via `continuation`."
    )]
    async fn chat(
        &self,
        Parameters(args): Parameters<ChatArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result("chat", tools::chat(&self.ctx, args).await))
    }

    #[tool(
        description = "Ask several AI models the same question in parallel, then (by default) show each model the others' answers so it can refine its own. Returns every model's initial and refined response; one failing model never fails the call."
    )]
    async fn consensus(
        &self,
        Parameters(args): Parameters<ConsensusArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(
            "consensus",
            tools::consensus(&self.ctx, args).await,
        ))
    }
}

#[tool_handler]
impl ServerHandler for ConsensusServer {
    fn get_info(&self) -> ServerInfo {
        let available = self
            .ctx
            .registry
            .available_kinds()
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>();

        let instructions = if available.is_empty() {
            format!(
                "{}\n\nNo provider is configured yet; set an API key such as GEMINI_API_KEY.",
                INSTRUCTIONS
            )
        } else {
            format!("{}\n\nConfigured providers: {}", INSTRUCTIONS, available.join(", "))
        };

        ServerInfo {
            instructions: Some(instructions),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
