//! Cost analysis stage with an external price lookup.

use crate::agents::{NO_WEB_DATA_MARKER, QueryState, Stage, StageError, StageUpdate};
use crate::llm::{ChatClient, ChatMessage};
use crate::tools::ToolRegistry;
use async_trait::async_trait;
use std::sync::Arc;

/// Labels the synthesis call must produce, in order.
pub const REPORT_FIELDS: [&str; 5] = [
    "TOTAL EXPENSE COST",
    "SUGGESTED RETAIL PRICE",
    "ESTIMATED PROFIT",
    "TARGET CUSTOMERS",
    "SALES CHANNELS",
];

/// Second stage: looks up ingredient prices and synthesizes a financial report.
///
/// The first model call advertises the tool catalog; any declared tool calls are
/// executed synchronously and their raw output feeds a second, tool-free synthesis
/// call. When the model declines to use a tool the synthesis falls back to general
/// model knowledge, flagged with an explicit marker.
pub struct FinancialsAgent {
    chat: Arc<ChatClient>,
    tools: Arc<ToolRegistry>,
}

impl FinancialsAgent {
    /// Build the stage from shared service handles.
    pub fn new(chat: Arc<ChatClient>, tools: Arc<ToolRegistry>) -> Self {
        Self { chat, tools }
    }

    fn build_synthesis_prompt(search_context: &str, recipe: &str) -> String {
        format!(
            "You are the financial manager of an artisan bakery.\n\
             Based on this search data: {search_context}\n\
             \n\
             Analyze the following recipe: {recipe}\n\
             \n\
             Write your report strictly in the following format:\n\
             - TOTAL EXPENSE COST: [amount] EUR\n\
             - SUGGESTED RETAIL PRICE: [amount] EUR (exactly 3 times the total expense cost)\n\
             - ESTIMATED PROFIT: [amount] EUR\n\
             - TARGET CUSTOMERS: [description]\n\
             - SALES CHANNELS: [description]\n\
             \n\
             Be direct and give no technical explanation."
        )
    }
}

#[async_trait]
impl Stage for FinancialsAgent {
    fn name(&self) -> &'static str {
        "financials"
    }

    async fn run(&self, state: &QueryState) -> Result<StageUpdate, StageError> {
        let recipe = state.recipe_proposal.as_deref().unwrap_or("");
        tracing::info!("Financials stage: price research and synthesis");

        let search_prompt = format!(
            "Find the current market prices for the ingredients of this recipe: {recipe}"
        );
        let catalog = self.tools.catalog();
        let first = self
            .chat
            .complete(&[ChatMessage::user(search_prompt)], Some(&catalog))
            .await?;

        let search_context = if first.tool_calls.is_empty() {
            tracing::debug!("Model declined tool use; falling back to general knowledge");
            NO_WEB_DATA_MARKER.to_string()
        } else {
            let mut collected = String::new();
            for call in &first.tool_calls {
                let kind = self.tools.resolve(&call.name)?;
                tracing::debug!(tool = call.name, "Executing declared tool call");
                let output = self.tools.invoke(kind, &call.arguments).await?;
                collected.push_str(&output);
                collected.push('\n');
            }
            collected
        };

        // Second call runs without tools to force report prose.
        let synthesis = Self::build_synthesis_prompt(&search_context, recipe);
        let outcome = self
            .chat
            .complete(&[ChatMessage::user(synthesis)], None)
            .await?;

        Ok(StageUpdate {
            financials: Some(outcome.text().to_string()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::RetrievedContext;
    use crate::tools::TavilyClient;
    use httpmock::{Method::POST, MockServer};

    fn test_chat(server: &MockServer) -> Arc<ChatClient> {
        Arc::new(ChatClient {
            client: reqwest::Client::builder()
                .user_agent("fournil-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: "test-key".into(),
            model: "llama-3.1-8b-instant".into(),
        })
    }

    fn test_tools(server: &MockServer) -> Arc<ToolRegistry> {
        let tavily = TavilyClient {
            client: reqwest::Client::builder()
                .user_agent("fournil-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: "tavily-key".into(),
        };
        Arc::new(ToolRegistry::new(Some(tavily)).expect("registry"))
    }

    fn state_with_proposal(proposal: &str) -> QueryState {
        let mut state = QueryState::new("How much would this cost?");
        state.apply(StageUpdate {
            context: Some(RetrievedContext::Found("context".into())),
            recipe_proposal: Some(proposal.into()),
            ..Default::default()
        });
        state
    }

    #[tokio::test]
    async fn declared_tool_call_is_executed_and_fed_to_synthesis() {
        let server = MockServer::start_async().await;

        let first_call = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_contains("\"tools\"");
                then.status(200).json_body(serde_json::json!({
                    "choices": [
                        {
                            "message": {
                                "role": "assistant",
                                "content": null,
                                "tool_calls": [
                                    {
                                        "id": "call-1",
                                        "type": "function",
                                        "function": {
                                            "name": "price_search",
                                            "arguments": "{\"query\": \"flour butter price\"}"
                                        }
                                    }
                                ]
                            }
                        }
                    ]
                }));
            })
            .await;

        let tavily = server
            .mock_async(|when, then| {
                when.method(POST).path("/search");
                then.status(200).json_body(serde_json::json!({
                    "results": [
                        { "title": "Prices", "url": "https://example.org", "content": "Flour 1.2 EUR/kg" }
                    ]
                }));
            })
            .await;

        let synthesis = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_contains("Flour 1.2 EUR/kg");
                then.status(200).json_body(serde_json::json!({
                    "choices": [
                        {
                            "message": {
                                "role": "assistant",
                                "content": "- TOTAL EXPENSE COST: 4 EUR\n- SUGGESTED RETAIL PRICE: 12 EUR\n- ESTIMATED PROFIT: 8 EUR\n- TARGET CUSTOMERS: locals\n- SALES CHANNELS: market stalls"
                            }
                        }
                    ]
                }));
            })
            .await;

        let agent = FinancialsAgent::new(test_chat(&server), test_tools(&server));
        let update = agent
            .run(&state_with_proposal("Brioche with flour and butter"))
            .await
            .expect("stage update");

        first_call.assert();
        tavily.assert();
        synthesis.assert();

        let report = update.financials.expect("financial report");
        for field in REPORT_FIELDS {
            assert!(report.contains(field), "missing field {field}");
        }
    }

    #[tokio::test]
    async fn no_tool_call_falls_back_to_general_knowledge() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_contains("\"tools\"");
                then.status(200).json_body(serde_json::json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "I can estimate from memory." } }
                    ]
                }));
            })
            .await;

        let fallback = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_contains("No web data found");
                then.status(200).json_body(serde_json::json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "- TOTAL EXPENSE COST: 3 EUR" } }
                    ]
                }));
            })
            .await;

        let agent = FinancialsAgent::new(test_chat(&server), test_tools(&server));
        let update = agent
            .run(&state_with_proposal("Plain baguette"))
            .await
            .expect("stage update");

        fallback.assert();
        assert!(update.financials.expect("report").contains("TOTAL EXPENSE COST"));
    }
}
