//! Allergen and safety review stage.

use crate::agents::{
    INVALID_RECIPE_DIAGNOSTIC, NO_ALLERGENS_SENTINEL, NOT_FOUND_REPLY, QueryState, Stage,
    StageError, StageUpdate,
};
use crate::llm::{ChatClient, ChatMessage};
use crate::retrieval::RetrievedContext;
use async_trait::async_trait;
use std::sync::Arc;

/// Final stage: reviews the proposal for allergens.
///
/// This is the only stage that converts generation failures into a visible error
/// string instead of aborting the query; the user always gets a safety verdict slot.
pub struct SafetyAgent {
    chat: Arc<ChatClient>,
}

impl SafetyAgent {
    /// Build the stage from a shared chat handle.
    pub fn new(chat: Arc<ChatClient>) -> Self {
        Self { chat }
    }

    fn build_prompt(proposal: &str) -> String {
        format!(
            "You are a food safety expert.\n\
             Review the chef's proposal below and identify ALL potential allergens.\n\
             \n\
             CHEF'S PROPOSAL:\n{proposal}\n\
             \n\
             INSTRUCTION: List the allergens in **BOLD UPPERCASE**.\n\
             If no allergen is present, say '{NO_ALLERGENS_SENTINEL}'."
        )
    }

    fn proposal_is_invalid(state: &QueryState) -> bool {
        let proposal = state.recipe_proposal.as_deref().unwrap_or("");
        proposal.trim().is_empty()
            || proposal == NOT_FOUND_REPLY
            || matches!(state.context, Some(RetrievedContext::NotFound))
    }
}

#[async_trait]
impl Stage for SafetyAgent {
    fn name(&self) -> &'static str {
        "safety"
    }

    async fn run(&self, state: &QueryState) -> Result<StageUpdate, StageError> {
        if Self::proposal_is_invalid(state) {
            tracing::info!("No valid proposal; skipping safety generation");
            return Ok(StageUpdate {
                safety_report: Some(INVALID_RECIPE_DIAGNOSTIC.to_string()),
                ..Default::default()
            });
        }

        let proposal = state.recipe_proposal.as_deref().unwrap_or("");
        let prompt = Self::build_prompt(proposal);

        let report = match self.chat.complete(&[ChatMessage::user(prompt)], None).await {
            Ok(outcome) => outcome.text().to_string(),
            Err(error) => {
                tracing::error!(error = %error, "Safety review failed");
                format!("Error during safety review: {error}")
            }
        };

        Ok(StageUpdate {
            safety_report: Some(report),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn state_with(proposal: Option<&str>, context: Option<RetrievedContext>) -> QueryState {
        let mut state = QueryState::new("What allergens are in this recipe?");
        state.apply(StageUpdate {
            context,
            recipe_proposal: proposal.map(str::to_string),
            ..Default::default()
        });
        state
    }

    #[tokio::test]
    async fn not_found_proposal_skips_generation() {
        let server = MockServer::start_async().await;
        // No chat mock: a generation call here would fail the test.
        let agent = SafetyAgent::new(test_chat(&server));

        let state = state_with(
            Some(NOT_FOUND_REPLY),
            Some(RetrievedContext::Found("ctx".into())),
        );
        let update = agent.run(&state).await.expect("stage update");
        assert_eq!(
            update.safety_report.as_deref(),
            Some(INVALID_RECIPE_DIAGNOSTIC)
        );
    }

    #[tokio::test]
    async fn missing_proposal_skips_generation() {
        let server = MockServer::start_async().await;
        let agent = SafetyAgent::new(test_chat(&server));

        let update = agent
            .run(&state_with(None, Some(RetrievedContext::NotFound)))
            .await
            .expect("stage update");
        assert_eq!(
            update.safety_report.as_deref(),
            Some(INVALID_RECIPE_DIAGNOSTIC)
        );
    }

    #[tokio::test]
    async fn valid_proposal_produces_a_report() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_contains("flour, sugar, eggs");
                then.status(200).json_body(serde_json::json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "**EGGS**, **GLUTEN**" } }
                    ]
                }));
            })
            .await;

        let agent = SafetyAgent::new(test_chat(&server));
        let state = state_with(
            Some("A cake with flour, sugar, eggs."),
            Some(RetrievedContext::Found("ctx".into())),
        );
        let update = agent.run(&state).await.expect("stage update");

        mock.assert();
        assert_eq!(
            update.safety_report.as_deref(),
            Some("**EGGS**, **GLUTEN**")
        );
    }

    #[tokio::test]
    async fn generation_failure_becomes_an_error_string() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("overloaded");
            })
            .await;

        let agent = SafetyAgent::new(test_chat(&server));
        let state = state_with(
            Some("A cake with hazelnuts."),
            Some(RetrievedContext::Found("ctx".into())),
        );
        let update = agent.run(&state).await.expect("stage update");

        let report = update.safety_report.expect("report");
        assert!(report.starts_with("Error during safety review:"));
    }
}
