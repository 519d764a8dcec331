//! Agent stages of the query pipeline.
//!
//! Each stage reads the accumulated query state and returns an immutable update record;
//! the orchestrator merges updates between stages. Stages never mutate shared state and
//! are never revisited.

use crate::llm::ChatError;
use crate::retrieval::{RetrievedContext, SearchError};
use crate::tools::ToolError;
use async_trait::async_trait;
use thiserror::Error;

mod financials;
mod recipe;
mod safety;

pub use financials::FinancialsAgent;
pub use recipe::RecipeAgent;
pub use safety::SafetyAgent;

/// Fixed reply when the corpus holds no relevant context for a question.
pub const NOT_FOUND_REPLY: &str = "I'm sorry, that information is not in this document.";

/// Sentinel the safety reviewer answers when a proposal carries no allergens.
pub const NO_ALLERGENS_SENTINEL: &str = "RAS";

/// Diagnostic written when the safety stage has no valid recipe to review.
pub const INVALID_RECIPE_DIAGNOSTIC: &str = "Review impossible: no valid recipe to examine.";

/// Marker injected when the financials stage runs without web search data.
pub const NO_WEB_DATA_MARKER: &str =
    "No web data found; rely on your general knowledge of ingredient prices.";

/// Errors raised by a pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// Context retrieval failed.
    #[error("Retrieval failed: {0}")]
    Search(#[from] SearchError),
    /// Generation call failed.
    #[error("Generation failed: {0}")]
    Chat(#[from] ChatError),
    /// Tool resolution or execution failed.
    #[error("Tool execution failed: {0}")]
    Tool(#[from] ToolError),
}

/// Accumulated state for one question moving through the pipeline.
#[derive(Debug, Clone)]
pub struct QueryState {
    /// The user's question, set once at the start.
    pub question: String,
    /// Tagged retrieval outcome written by the recipe stage.
    pub context: Option<RetrievedContext>,
    /// Proposal written by the recipe stage.
    pub recipe_proposal: Option<String>,
    /// Cost analysis written by the financials stage.
    pub financials: Option<String>,
    /// Allergen review written by the safety stage.
    pub safety_report: Option<String>,
}

impl QueryState {
    /// Seed the state for a new question.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: None,
            recipe_proposal: None,
            financials: None,
            safety_report: None,
        }
    }

    /// Merge a stage's update record into the accumulated state.
    pub fn apply(&mut self, update: StageUpdate) {
        if let Some(context) = update.context {
            self.context = Some(context);
        }
        if let Some(proposal) = update.recipe_proposal {
            self.recipe_proposal = Some(proposal);
        }
        if let Some(financials) = update.financials {
            self.financials = Some(financials);
        }
        if let Some(report) = update.safety_report {
            self.safety_report = Some(report);
        }
    }
}

/// Partial state produced by one stage, merged by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct StageUpdate {
    /// Retrieval outcome, when the stage performed retrieval.
    pub context: Option<RetrievedContext>,
    /// New recipe proposal, if any.
    pub recipe_proposal: Option<String>,
    /// New cost analysis, if any.
    pub financials: Option<String>,
    /// New safety report, if any.
    pub safety_report: Option<String>,
}

/// One step of the fixed linear pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable stage name used for logging and error attribution.
    fn name(&self) -> &'static str;

    /// Consume the accumulated state and produce a partial update.
    async fn run(&self, state: &QueryState) -> Result<StageUpdate, StageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_overwrites_only_provided_fields() {
        let mut state = QueryState::new("What goes into brioche?");
        state.apply(StageUpdate {
            context: Some(RetrievedContext::Found("butter".into())),
            recipe_proposal: Some("A brioche".into()),
            ..Default::default()
        });
        state.apply(StageUpdate {
            financials: Some("Costs".into()),
            ..Default::default()
        });

        assert_eq!(state.question, "What goes into brioche?");
        assert_eq!(state.recipe_proposal.as_deref(), Some("A brioche"));
        assert_eq!(state.financials.as_deref(), Some("Costs"));
        assert!(state.safety_report.is_none());
    }
}
