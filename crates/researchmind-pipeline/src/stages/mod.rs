//! The five research stages. Each owns its collaborators and turns one
//! stage record into the next.

mod critic;
mod factchecker;
mod searcher;
mod summarizer;
mod synthesizer;

use async_trait::async_trait;

use researchmind_core::Result;

use crate::records::{Stage, StageOutcome};

pub use critic::Critic;
pub use factchecker::FactChecker;
pub use searcher::Searcher;
pub use summarizer::Summarizer;
pub use synthesizer::Synthesizer;

/// A single pipeline step.
///
/// `Err` means the stage could not run at all. A collaborator failure that
/// the stage papered over is reported through `StageOutcome::degradations`.
#[async_trait]
pub trait PipelineStage: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    const STAGE: Stage;

    async fn run(&self, input: Self::Input) -> Result<StageOutcome<Self::Output>>;
}
