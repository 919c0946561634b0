use serde::Serialize;

use crate::error::PipelineError;
use crate::records::{PipelineStatus, Stage, StagePayload};

/// What a stage is doing while it runs.
pub fn activity(stage: Stage) -> &'static str {
    match stage {
        Stage::Searcher => "Searching web and documents for relevant sources...",
        Stage::Summarizer => "Summarizing each source...",
        Stage::Critic => "Reviewing summaries for quality and bias...",
        Stage::FactChecker => "Cross-verifying claims across sources...",
        Stage::Synthesizer => "Generating final structured answer...",
    }
}

/// State of one run. Never shared between runs; the log only grows.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub query: String,
    pub status: PipelineStatus,
    pub log: Vec<String>,
    pub outputs: Vec<StagePayload>,
    pub degradations: Vec<String>,
}

impl PipelineState {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            status: PipelineStatus::Starting,
            log: vec![format!("System: starting research pipeline for: {query}")],
            outputs: Vec::new(),
            degradations: Vec::new(),
        }
    }

    /// The stage allowed to run next, if any.
    pub fn next_stage(&self) -> Option<Stage> {
        if matches!(self.status, PipelineStatus::Complete | PipelineStatus::Error) {
            return None;
        }
        Stage::ORDER.get(self.outputs.len()).copied()
    }

    pub fn enter(&mut self, stage: Stage) -> Result<(), PipelineError> {
        let expected = self.next_stage();
        if expected != Some(stage) {
            return Err(PipelineError::OutOfOrder { expected, got: stage });
        }
        self.status = stage.status();
        self.log.push(format!("{stage}: {}", activity(stage)));
        Ok(())
    }

    pub fn record(&mut self, payload: StagePayload, degradations: Vec<String>) -> Result<(), PipelineError> {
        let stage = payload.stage();
        if self.status != stage.status() || self.next_stage() != Some(stage) {
            return Err(PipelineError::OutOfOrder { expected: self.next_stage(), got: stage });
        }
        self.log.push(format!("{stage}: {}", payload.summary_line()));
        for d in degradations {
            self.log.push(format!("{stage}: degraded: {d}"));
            self.degradations.push(format!("{stage}: {d}"));
        }
        self.outputs.push(payload);
        Ok(())
    }

    pub fn fail(&mut self, stage: Stage, err: &PipelineError) {
        self.status = PipelineStatus::Error;
        self.log.push(format!("{stage}: failed: {err}"));
    }

    pub fn finish(&mut self) -> Result<(), PipelineError> {
        if self.outputs.len() != Stage::ORDER.len() {
            return Err(PipelineError::OutOfOrder { expected: self.next_stage(), got: Stage::Synthesizer });
        }
        self.status = PipelineStatus::Complete;
        self.log.push("System: research complete".to_string());
        Ok(())
    }
}
