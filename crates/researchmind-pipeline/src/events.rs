use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::error::PipelineError;
use crate::orchestrator::ResearchReport;
use crate::records::{Stage, StagePayload};
use crate::state::activity;

pub const SYSTEM_AGENT: &str = "System";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Started,
    Thinking,
    Done,
    Complete,
    Error,
}

/// Progress event delivered in streaming mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub agent: String,
    pub status: EventStatus,
    pub message: String,
    pub data: Value,
}

impl ProgressEvent {
    fn new(agent: &str, status: EventStatus, message: String, data: Value) -> Self {
        Self { agent: agent.to_string(), status, message, data }
    }

    pub fn started(query: &str) -> Self {
        Self::new(SYSTEM_AGENT, EventStatus::Started, format!("Starting research pipeline for: {query}"), json!({}))
    }

    pub fn thinking(stage: Stage) -> Self {
        Self::new(stage.name(), EventStatus::Thinking, activity(stage).to_string(), json!({}))
    }

    pub fn done(payload: &StagePayload) -> Self {
        Self::new(payload.stage().name(), EventStatus::Done, payload.summary_line(), stage_data(payload))
    }

    pub fn complete(report: &ResearchReport) -> Self {
        Self::new(
            SYSTEM_AGENT,
            EventStatus::Complete,
            "Research complete!".to_string(),
            json!({
                "answer": report.answer,
                "sources": report.sources,
                "verified_claims": report.verified_claims,
                "disputed_claims": report.disputed_claims,
            }),
        )
    }

    pub fn error(err: &PipelineError) -> Self {
        Self::new(SYSTEM_AGENT, EventStatus::Error, format!("Pipeline error: {err}"), json!({}))
    }

    pub fn is_terminal(&self) -> bool { matches!(self.status, EventStatus::Complete | EventStatus::Error) }
}

/// Counts attached to a stage's `done` event.
fn stage_data(payload: &StagePayload) -> Value {
    match payload {
        StagePayload::Search(o) => json!({ "total_results": o.total_results, "sources_used": o.sources_used }),
        StagePayload::Summaries(o) => json!({ "total_summaries": o.summaries.len() }),
        StagePayload::Critiques(o) => json!({ "total_reliable": o.reliable.len(), "total_critiqued": o.critiques.len() }),
        StagePayload::FactCheck(o) => json!({ "verified": o.verified().count(), "disputed": o.disputed().count() }),
        StagePayload::Synthesis(o) => json!({ "answer_length": o.answer.chars().count() }),
    }
}

/// Sending half of a run's event channel.
pub(crate) struct Emitter {
    tx: mpsc::Sender<ProgressEvent>,
    delay: Duration,
}

impl Emitter {
    pub(crate) fn new(tx: mpsc::Sender<ProgressEvent>, delay: Duration) -> Self { Self { tx, delay } }

    /// Delivers one event, then waits the configured delay.
    pub(crate) async fn send(&self, event: ProgressEvent) -> Result<(), PipelineError> {
        self.tx.send(event).await.map_err(|_| PipelineError::Disconnected)?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}
