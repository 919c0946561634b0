use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use researchmind_core::traits::TextGenerator;
use researchmind_core::{GenerationParams, Result};

use super::PipelineStage;
use crate::prompts::{self, parse_critique};
use crate::records::{Confidence, Critique, CritiqueOutput, Stage, StageOutcome, SummaryOutput, Verdict};

const PARAMS: GenerationParams = GenerationParams::new(0.2, 400);

pub struct Critic {
    generator: Arc<dyn TextGenerator>,
}

impl Critic {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self { Self { generator } }
}

#[async_trait]
impl PipelineStage for Critic {
    type Input = SummaryOutput;
    type Output = CritiqueOutput;

    const STAGE: Stage = Stage::Critic;

    async fn run(&self, input: SummaryOutput) -> Result<StageOutcome<CritiqueOutput>> {
        let mut critiques = Vec::with_capacity(input.summaries.len());
        let mut degradations = Vec::new();

        for summary in input.summaries {
            let prompt = prompts::critique(&input.query, &summary);
            let (confidence, issues, verdict) = match self.generator.generate(&prompt, PARAMS).await {
                Ok(text) => parse_critique(&text),
                Err(e) => {
                    warn!(source = %summary.source, error = %e, "critique generation failed");
                    degradations.push(format!("critique of {} defaulted: {e}", summary.source));
                    (Confidence::Medium, "Could not critique due to generation error".to_string(), Verdict::Reliable)
                }
            };
            if verdict == Verdict::Unreliable {
                info!(source = %summary.source, "excluding unreliable summary");
            }
            critiques.push(Critique { summary, confidence, issues, verdict });
        }

        Ok(StageOutcome::degraded(CritiqueOutput::new(input.query, critiques), degradations))
    }
}
