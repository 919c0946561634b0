use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use researchmind_core::traits::TextGenerator;
use researchmind_core::{GenerationParams, Result};

use super::PipelineStage;
use crate::prompts::{self, ensure_disputed_section};
use crate::records::{Citation, Claim, ClaimStatus, FactCheckOutput, Stage, StageOutcome, Synthesis};

const PARAMS: GenerationParams = GenerationParams::new(0.4, 1000);

pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self { Self { generator } }
}

/// Answer assembled without the generator.
fn fallback_answer(input: &FactCheckOutput) -> String {
    let mut answer = String::from("## Summary\nAutomatic synthesis was unavailable. The verified source summaries are listed below.\n\n## Key Findings\n");
    if input.reliable.is_empty() {
        answer.push_str("- No verified sources were found for this question.\n");
    }
    for (i, c) in input.reliable.iter().enumerate() {
        let _ = writeln!(answer, "- [Source {}] {}", i + 1, c.summary.summary);
    }
    for claim in input.claims.iter().filter(|c| c.status == ClaimStatus::Verified) {
        let _ = writeln!(answer, "- Verified: {}", claim.claim);
    }
    answer
}

#[async_trait]
impl PipelineStage for Synthesizer {
    type Input = FactCheckOutput;
    type Output = Synthesis;

    const STAGE: Stage = Stage::Synthesizer;

    async fn run(&self, input: FactCheckOutput) -> Result<StageOutcome<Synthesis>> {
        let disputed: Vec<&Claim> = input.disputed().collect();
        let context = prompts::synthesis_context(&input.reliable, &input.claims);
        let warning = prompts::disputed_warning(&disputed);
        let prompt = prompts::synthesize(&input.query, &context, warning.as_deref());

        let mut degradations = Vec::new();
        let answer = match self.generator.generate(&prompt, PARAMS).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                degradations.push("synthesis returned no text".to_string());
                fallback_answer(&input)
            }
            Err(e) => {
                warn!(error = %e, "synthesis generation failed");
                degradations.push(format!("synthesis fell back to source summaries: {e}"));
                fallback_answer(&input)
            }
        };
        let answer = ensure_disputed_section(&answer, &disputed);

        let sources = input
            .reliable
            .iter()
            .enumerate()
            .map(|(i, c)| Citation {
                index: i + 1,
                source: c.summary.source.clone(),
                url: c.summary.url.clone(),
                source_type: c.summary.source_type,
                confidence: c.confidence,
            })
            .collect();
        let disputed_points: Vec<String> = disputed.iter().map(|c| c.claim.clone()).collect();

        let output = Synthesis {
            query: input.query.clone(),
            answer,
            sources,
            verified_claims: input.verified().count(),
            disputed_claims: disputed_points.len(),
            disputed_points,
        };
        Ok(StageOutcome::degraded(output, degradations))
    }
}
