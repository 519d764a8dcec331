//! Fixed linear pipeline orchestration.
//!
//! The graph is `start → recipe → financials → safety → end`: every node runs exactly
//! once per question, in order, with no cycles and no skips. Each stage returns a
//! partial update record that the orchestrator folds into the accumulated state; after
//! the terminal stage the three report fields are extracted for display.

use crate::agents::{FinancialsAgent, QueryState, RecipeAgent, SafetyAgent, Stage, StageError};
use crate::metrics::{AssistantMetrics, MetricsSnapshot};
use crate::retrieval::RetrievedContext;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors aborting a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The question was empty or whitespace.
    #[error("Question must not be empty")]
    EmptyQuestion,
    /// A stage failed; the query is aborted with no partial report.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        /// Name of the failing stage.
        stage: &'static str,
        /// Underlying stage error.
        #[source]
        source: StageError,
    },
    /// A stage completed without writing its required field.
    #[error("Pipeline finished without producing '{0}'")]
    IncompleteState(&'static str),
}

/// Final accumulated result of one pipeline run.
#[derive(Debug, Clone)]
pub struct QueryReport {
    /// Retrieval outcome surfaced alongside the reports.
    pub context: RetrievedContext,
    /// Recipe proposal from the first stage.
    pub recipe_proposal: String,
    /// Cost analysis from the second stage.
    pub financials: String,
    /// Allergen review from the third stage.
    pub safety_report: String,
}

impl QueryReport {
    /// Render the three reports as display text.
    pub fn render_text(&self) -> String {
        format!(
            "--- Recipe proposal ---\n{}\n\n--- Cost analysis ---\n{}\n\n--- Safety review ---\n{}",
            self.recipe_proposal, self.financials, self.safety_report
        )
    }
}

/// The fixed three-stage pipeline.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Wire the three agents in their fixed order.
    pub fn new(recipe: RecipeAgent, financials: FinancialsAgent, safety: SafetyAgent) -> Self {
        Self::from_stages(vec![
            Box::new(recipe),
            Box::new(financials),
            Box::new(safety),
        ])
    }

    /// Assemble a pipeline from explicit stages.
    pub fn from_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Run the pipeline to completion for one question.
    pub async fn run(&self, question: &str) -> Result<QueryReport, PipelineError> {
        self.run_streamed(question, |_| {}).await
    }

    /// Run the pipeline, invoking `on_stage` as each node completes.
    pub async fn run_streamed(
        &self,
        question: &str,
        mut on_stage: impl FnMut(&'static str) + Send,
    ) -> Result<QueryReport, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        let mut state = QueryState::new(question);
        for stage in &self.stages {
            let update = stage
                .run(&state)
                .await
                .map_err(|source| PipelineError::Stage {
                    stage: stage.name(),
                    source,
                })?;
            state.apply(update);
            tracing::info!(stage = stage.name(), "Stage complete");
            on_stage(stage.name());
        }

        Ok(QueryReport {
            context: state.context.unwrap_or(RetrievedContext::NotFound),
            recipe_proposal: state
                .recipe_proposal
                .ok_or(PipelineError::IncompleteState("recipe_proposal"))?,
            financials: state
                .financials
                .ok_or(PipelineError::IncompleteState("financials"))?,
            safety_report: state
                .safety_report
                .ok_or(PipelineError::IncompleteState("safety_report"))?,
        })
    }
}

/// Abstraction over the assistant used by external surfaces (REPL, HTTP).
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Run the full pipeline for one question.
    async fn answer(&self, question: &str) -> Result<QueryReport, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Pipeline plus counters, shared across surfaces.
pub struct Assistant {
    pipeline: Pipeline,
    metrics: Arc<AssistantMetrics>,
}

impl Assistant {
    /// Wrap a pipeline with the shared metrics registry.
    pub fn new(pipeline: Pipeline, metrics: Arc<AssistantMetrics>) -> Self {
        Self { pipeline, metrics }
    }

    /// Run the pipeline, reporting each completed stage through `on_stage`.
    pub async fn answer_streamed(
        &self,
        question: &str,
        on_stage: impl FnMut(&'static str) + Send,
    ) -> Result<QueryReport, PipelineError> {
        let report = self.pipeline.run_streamed(question, on_stage).await?;
        self.metrics.record_question();
        Ok(report)
    }
}

#[async_trait]
impl AssistantApi for Assistant {
    async fn answer(&self, question: &str) -> Result<QueryReport, PipelineError> {
        self.answer_streamed(question, |_| {}).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::StageUpdate;
    use std::sync::Mutex;

    struct RecordingStage {
        stage_name: &'static str,
        update: fn(&QueryState) -> StageUpdate,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Stage for RecordingStage {
        fn name(&self) -> &'static str {
            self.stage_name
        }

        async fn run(&self, state: &QueryState) -> Result<StageUpdate, StageError> {
            self.log.lock().expect("log lock").push(self.stage_name);
            Ok((self.update)(state))
        }
    }

    fn stub_pipeline(log: Arc<Mutex<Vec<&'static str>>>) -> Pipeline {
        Pipeline::from_stages(vec![
            Box::new(RecordingStage {
                stage_name: "recipe",
                update: |_| StageUpdate {
                    context: Some(RetrievedContext::Found("context".into())),
                    recipe_proposal: Some("proposal".into()),
                    ..Default::default()
                },
                log: log.clone(),
            }),
            Box::new(RecordingStage {
                stage_name: "financials",
                update: |state| {
                    assert_eq!(state.recipe_proposal.as_deref(), Some("proposal"));
                    StageUpdate {
                        financials: Some("costs".into()),
                        ..Default::default()
                    }
                },
                log: log.clone(),
            }),
            Box::new(RecordingStage {
                stage_name: "safety",
                update: |state| {
                    assert_eq!(state.financials.as_deref(), Some("costs"));
                    StageUpdate {
                        safety_report: Some("RAS".into()),
                        ..Default::default()
                    }
                },
                log,
            }),
        ])
    }

    #[tokio::test]
    async fn stages_run_once_in_order_and_populate_all_reports() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = stub_pipeline(log.clone());

        let report = pipeline
            .run("What can I bake with flour?")
            .await
            .expect("pipeline report");

        assert_eq!(
            *log.lock().expect("log lock"),
            vec!["recipe", "financials", "safety"]
        );
        assert_eq!(report.recipe_proposal, "proposal");
        assert_eq!(report.financials, "costs");
        assert_eq!(report.safety_report, "RAS");
        assert!(report.context.is_found());
    }

    #[tokio::test]
    async fn streamed_run_reports_each_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = stub_pipeline(log);

        let mut observed = Vec::new();
        pipeline
            .run_streamed("A question", |stage| observed.push(stage))
            .await
            .expect("pipeline report");

        assert_eq!(observed, vec!["recipe", "financials", "safety"]);
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let pipeline = stub_pipeline(Arc::new(Mutex::new(Vec::new())));
        let error = pipeline.run("   ").await.unwrap_err();
        assert!(matches!(error, PipelineError::EmptyQuestion));
    }

    #[tokio::test]
    async fn missing_report_field_is_detected() {
        struct SilentStage;

        #[async_trait]
        impl Stage for SilentStage {
            fn name(&self) -> &'static str {
                "silent"
            }

            async fn run(&self, _state: &QueryState) -> Result<StageUpdate, StageError> {
                Ok(StageUpdate::default())
            }
        }

        let pipeline = Pipeline::from_stages(vec![Box::new(SilentStage)]);
        let error = pipeline.run("A question").await.unwrap_err();
        assert!(matches!(
            error,
            PipelineError::IncompleteState("recipe_proposal")
        ));
    }

    #[tokio::test]
    async fn assistant_counts_answered_questions() {
        let metrics = Arc::new(AssistantMetrics::new());
        let assistant = Assistant::new(
            stub_pipeline(Arc::new(Mutex::new(Vec::new()))),
            metrics.clone(),
        );

        assistant.answer("A question").await.expect("report");
        assistant.answer("Another question").await.expect("report");

        assert_eq!(metrics.snapshot().questions_answered, 2);
    }
}
