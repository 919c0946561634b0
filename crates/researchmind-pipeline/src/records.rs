//! Stage output records. Each stage consumes the previous record whole and
//! produces the next; every field is required at construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use researchmind_core::{RetrievalResult, SourceType, WebDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Searcher,
    Summarizer,
    Critic,
    FactChecker,
    Synthesizer,
}

impl Stage {
    pub const ORDER: [Stage; 5] = [Stage::Searcher, Stage::Summarizer, Stage::Critic, Stage::FactChecker, Stage::Synthesizer];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Searcher => "Searcher",
            Stage::Summarizer => "Summarizer",
            Stage::Critic => "Critic",
            Stage::FactChecker => "FactChecker",
            Stage::Synthesizer => "Synthesizer",
        }
    }

    /// Status a run is in while this stage executes.
    pub fn status(self) -> PipelineStatus {
        match self {
            Stage::Searcher => PipelineStatus::Searching,
            Stage::Summarizer => PipelineStatus::Summarizing,
            Stage::Critic => PipelineStatus::Critiquing,
            Stage::FactChecker => PipelineStatus::FactChecking,
            Stage::Synthesizer => PipelineStatus::Synthesizing,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Starting,
    Searching,
    Summarizing,
    Critiquing,
    FactChecking,
    Synthesizing,
    Complete,
    Error,
}

/// One ranked piece of evidence from the document store or the web.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub content: String,
    pub source: String,
    pub url: String,
    pub title: String,
    pub score: Option<f32>,
    #[serde(rename = "type")]
    pub source_type: SourceType,
}

impl Evidence {
    pub fn rank_score(&self) -> f32 { self.score.unwrap_or(0.0) }
}

impl From<RetrievalResult> for Evidence {
    fn from(r: RetrievalResult) -> Self {
        Self { content: r.text, source: r.source, url: String::new(), title: String::new(), score: Some(r.score), source_type: r.source_type }
    }
}

impl From<WebDocument> for Evidence {
    fn from(d: WebDocument) -> Self {
        Self { content: d.content, source: d.source, url: d.url, title: d.title, score: d.score, source_type: d.source_type }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutput {
    pub query: String,
    pub results: Vec<Evidence>,
    pub sources_used: Vec<String>,
    pub total_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Position of the evidence in the search output.
    pub source_index: usize,
    pub source: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub original_content: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub query: String,
    pub summaries: Vec<Summary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Confidence::High => "HIGH", Confidence::Medium => "MEDIUM", Confidence::Low => "LOW" })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Reliable,
    Questionable,
    Unreliable,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Reliable => "RELIABLE",
            Verdict::Questionable => "QUESTIONABLE",
            Verdict::Unreliable => "UNRELIABLE",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub summary: Summary,
    pub confidence: Confidence,
    pub issues: String,
    pub verdict: Verdict,
}

impl Critique {
    pub fn keep(&self) -> bool { self.verdict != Verdict::Unreliable }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueOutput {
    pub query: String,
    pub critiques: Vec<Critique>,
    /// Critiques whose verdict is not unreliable, in input order.
    pub reliable: Vec<Critique>,
}

impl CritiqueOutput {
    pub fn new(query: String, critiques: Vec<Critique>) -> Self {
        let reliable = critiques.iter().filter(|c| c.keep()).cloned().collect();
        Self { query, critiques, reliable }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClaimStatus {
    Verified,
    Disputed,
    Unverified,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClaimStatus::Verified => "VERIFIED",
            ClaimStatus::Disputed => "DISPUTED",
            ClaimStatus::Unverified => "UNVERIFIED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim: String,
    pub status: ClaimStatus,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckOutput {
    pub query: String,
    pub reliable: Vec<Critique>,
    pub claims: Vec<Claim>,
}

impl FactCheckOutput {
    pub fn verified(&self) -> impl Iterator<Item = &Claim> { self.claims.iter().filter(|c| c.status == ClaimStatus::Verified) }
    pub fn disputed(&self) -> impl Iterator<Item = &Claim> { self.claims.iter().filter(|c| c.status == ClaimStatus::Disputed) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based, matching `[Source N]` in the answer.
    pub index: usize,
    pub source: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub query: String,
    pub answer: String,
    pub sources: Vec<Citation>,
    pub verified_claims: usize,
    pub disputed_claims: usize,
    pub disputed_points: Vec<String>,
}

/// Tagged chain of stage outputs as recorded in a run's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "output")]
pub enum StagePayload {
    Search(SearchOutput),
    Summaries(SummaryOutput),
    Critiques(CritiqueOutput),
    FactCheck(FactCheckOutput),
    Synthesis(Synthesis),
}

impl StagePayload {
    pub fn stage(&self) -> Stage {
        match self {
            StagePayload::Search(_) => Stage::Searcher,
            StagePayload::Summaries(_) => Stage::Summarizer,
            StagePayload::Critiques(_) => Stage::Critic,
            StagePayload::FactCheck(_) => Stage::FactChecker,
            StagePayload::Synthesis(_) => Stage::Synthesizer,
        }
    }

    /// One-line outcome used for the run log and the `done` event.
    pub fn summary_line(&self) -> String {
        match self {
            StagePayload::Search(o) => format!("Found {} relevant sources", o.total_results),
            StagePayload::Summaries(o) => format!("Created {} summaries", o.summaries.len()),
            StagePayload::Critiques(o) => format!("{}/{} summaries passed", o.reliable.len(), o.critiques.len()),
            StagePayload::FactCheck(o) => format!("{} verified, {} disputed", o.verified().count(), o.disputed().count()),
            StagePayload::Synthesis(_) => "Final answer ready".to_string(),
        }
    }
}

macro_rules! payload_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for StagePayload {
            fn from(output: $ty) -> Self { StagePayload::$variant(output) }
        })*
    };
}

payload_from!(Search(SearchOutput), Summaries(SummaryOutput), Critiques(CritiqueOutput), FactCheck(FactCheckOutput), Synthesis(Synthesis));

/// A stage result that may carry best-effort substitutions.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    pub output: T,
    pub degradations: Vec<String>,
}

impl<T> StageOutcome<T> {
    pub fn clean(output: T) -> Self { Self { output, degradations: Vec::new() } }
    pub fn degraded(output: T, degradations: Vec<String>) -> Self { Self { output, degradations } }
    pub fn is_degraded(&self) -> bool { !self.degradations.is_empty() }
}
