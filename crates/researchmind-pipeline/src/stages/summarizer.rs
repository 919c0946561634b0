use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use researchmind_core::traits::TextGenerator;
use researchmind_core::{GenerationParams, Result};

use super::PipelineStage;
use crate::prompts::{self, truncate_chars};
use crate::records::{SearchOutput, Stage, StageOutcome, Summary, SummaryOutput};

const PARAMS: GenerationParams = GenerationParams::new(0.3, 400);
const FALLBACK_CHARS: usize = 300;
const ORIGINAL_CHARS: usize = 500;

pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    min_content_chars: usize,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, min_content_chars: usize) -> Self {
        Self { generator, min_content_chars }
    }
}

fn fallback_summary(content: &str) -> String {
    format!("{}...", truncate_chars(content.trim(), FALLBACK_CHARS))
}

#[async_trait]
impl PipelineStage for Summarizer {
    type Input = SearchOutput;
    type Output = SummaryOutput;

    const STAGE: Stage = Stage::Summarizer;

    async fn run(&self, input: SearchOutput) -> Result<StageOutcome<SummaryOutput>> {
        let mut summaries = Vec::with_capacity(input.results.len());
        let mut degradations = Vec::new();

        for (index, evidence) in input.results.iter().enumerate() {
            if evidence.content.trim().chars().count() < self.min_content_chars {
                debug!(source = %evidence.source, "skipping source with too little content");
                continue;
            }
            let prompt = prompts::summarize(&input.query, evidence);
            let summary = match self.generator.generate(&prompt, PARAMS).await {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => {
                    degradations.push(format!("empty summary for {}", evidence.source));
                    fallback_summary(&evidence.content)
                }
                Err(e) => {
                    warn!(source = %evidence.source, error = %e, "summary generation failed");
                    degradations.push(format!("summary of {} fell back to raw text: {e}", evidence.source));
                    fallback_summary(&evidence.content)
                }
            };
            summaries.push(Summary {
                source_index: index,
                source: evidence.source.clone(),
                url: evidence.url.clone(),
                source_type: evidence.source_type,
                original_content: truncate_chars(&evidence.content, ORIGINAL_CHARS).to_string(),
                summary,
            });
        }

        Ok(StageOutcome::degraded(SummaryOutput { query: input.query, summaries }, degradations))
    }
}
