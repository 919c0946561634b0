//! researchmind-pipeline
//!
//! The research pipeline: search, summarize, critique, fact-check and
//! synthesize, run either to completion or as a stream of progress events.

pub mod clients;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod prompts;
pub mod records;
pub mod stages;
pub mod state;

pub use error::PipelineError;
pub use events::{EventStatus, ProgressEvent};
pub use orchestrator::{Pipeline, PipelineBuilder, ResearchReport, ResearchRequest};
pub use records::{
    Citation, Claim, ClaimStatus, Confidence, Critique, CritiqueOutput, Evidence, FactCheckOutput, PipelineStatus,
    SearchOutput, Stage, StageOutcome, StagePayload, Summary, SummaryOutput, Synthesis, Verdict,
};
pub use stages::PipelineStage;
pub use state::PipelineState;
