use thiserror::Error;

use researchmind_core::Error as CoreError;

use crate::records::Stage;

/// Failures that end a run. Stage-local degradations never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid pipeline configuration: {0}")]
    Config(String),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: CoreError,
    },

    #[error("{stage} worker did not finish: {message}")]
    Worker { stage: Stage, message: String },

    #[error("{got} cannot run here; expected {}", .expected.map_or("no further stage", Stage::name))]
    OutOfOrder { expected: Option<Stage>, got: Stage },

    #[error("event receiver disconnected")]
    Disconnected,
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } | PipelineError::Worker { stage, .. } => Some(*stage),
            PipelineError::OutOfOrder { got, .. } => Some(*got),
            _ => None,
        }
    }
}
