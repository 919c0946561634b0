use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use researchmind_core::traits::TextGenerator;
use researchmind_core::{GenerationParams, Result};

use super::PipelineStage;
use crate::prompts::{self, parse_claims};
use crate::records::{CritiqueOutput, FactCheckOutput, Stage, StageOutcome};

const PARAMS: GenerationParams = GenerationParams::new(0.1, 600);

pub struct FactChecker {
    generator: Arc<dyn TextGenerator>,
    max_claims: usize,
}

impl FactChecker {
    pub fn new(generator: Arc<dyn TextGenerator>, max_claims: usize) -> Self { Self { generator, max_claims } }
}

#[async_trait]
impl PipelineStage for FactChecker {
    type Input = CritiqueOutput;
    type Output = FactCheckOutput;

    const STAGE: Stage = Stage::FactChecker;

    async fn run(&self, input: CritiqueOutput) -> Result<StageOutcome<FactCheckOutput>> {
        if input.reliable.is_empty() {
            debug!("no reliable summaries; skipping claim extraction");
            return Ok(StageOutcome::clean(FactCheckOutput { query: input.query, reliable: Vec::new(), claims: Vec::new() }));
        }

        let prompt = prompts::fact_check(&input.query, &input.reliable, self.max_claims);
        let (claims, degradations) = match self.generator.generate(&prompt, PARAMS).await {
            Ok(text) => {
                let mut claims = parse_claims(&text);
                claims.truncate(self.max_claims);
                (claims, Vec::new())
            }
            Err(e) => {
                warn!(error = %e, "fact check generation failed");
                (Vec::new(), vec![format!("fact check skipped: {e}")])
            }
        };

        Ok(StageOutcome::degraded(FactCheckOutput { query: input.query, reliable: input.reliable, claims }, degradations))
    }
}
