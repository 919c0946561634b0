use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, info_span, warn, Instrument};

use researchmind_core::config::{PipelineSettings, RetrievalSettings, Settings, WebSettings};
use researchmind_core::traits::{TextGenerator, WebSearch};
use researchmind_hybrid::StoreRegistry;

use crate::error::PipelineError;
use crate::events::{Emitter, ProgressEvent};
use crate::records::{Citation, PipelineStatus, StageOutcome, StagePayload};
use crate::stages::{Critic, FactChecker, PipelineStage, Searcher, Summarizer, Synthesizer};
use crate::state::PipelineState;

const EVENT_BUFFER: usize = 32;
const QUERY_CHARS: std::ops::RangeInclusive<usize> = 3..=500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    pub user_id: Option<String>,
    pub use_documents: bool,
}

impl ResearchRequest {
    /// Web-only request.
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), user_id: None, use_documents: false }
    }

    /// Searches `user_id`'s documents alongside the web.
    pub fn with_documents(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.use_documents = true;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(PipelineError::InvalidRequest("query cannot be empty".into()));
        }
        let len = query.chars().count();
        if !QUERY_CHARS.contains(&len) {
            return Err(PipelineError::InvalidRequest(format!(
                "query must be {} to {} characters (got {len})",
                QUERY_CHARS.start(),
                QUERY_CHARS.end()
            )));
        }
        if self.use_documents && self.user_id.is_none() {
            return Err(PipelineError::InvalidRequest("document search needs a user id".into()));
        }
        Ok(())
    }
}

/// Final result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub query: String,
    pub answer: String,
    pub sources: Vec<Citation>,
    pub agent_logs: Vec<String>,
    pub status: PipelineStatus,
    pub verified_claims: usize,
    pub disputed_claims: usize,
    pub degradations: Vec<String>,
}

/// The fixed five-stage research pipeline.
///
/// Cheap to clone; clones share the stages and the worker pool. Every run
/// gets its own `PipelineState`.
#[derive(Clone)]
pub struct Pipeline {
    searcher: Arc<Searcher>,
    summarizer: Arc<Summarizer>,
    critic: Arc<Critic>,
    fact_checker: Arc<FactChecker>,
    synthesizer: Arc<Synthesizer>,
    workers: Arc<Semaphore>,
    event_delay: Duration,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder { PipelineBuilder::default() }

    /// Runs every stage and returns the final report.
    pub async fn run(&self, request: ResearchRequest) -> Result<ResearchReport, PipelineError> {
        let span = info_span!("research", query = %request.query);
        self.execute(request, None).instrument(span).await
    }

    /// Runs in the background and streams progress events. The channel ends
    /// after one `complete` or `error` event.
    pub fn stream(&self, request: ResearchRequest) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = self.clone();
        let span = info_span!("research_stream", query = %request.query);
        tokio::spawn(
            async move {
                let emitter = Emitter::new(tx, pipeline.event_delay);
                match pipeline.execute(request, Some(&emitter)).await {
                    Ok(report) => {
                        let _ = emitter.send(ProgressEvent::complete(&report)).await;
                    }
                    Err(PipelineError::Disconnected) => debug!("receiver went away; stopping event emission"),
                    Err(err) => {
                        let _ = emitter.send(ProgressEvent::error(&err)).await;
                    }
                }
            }
            .instrument(span),
        );
        rx
    }

    async fn execute(&self, request: ResearchRequest, events: Option<&Emitter>) -> Result<ResearchReport, PipelineError> {
        request.validate()?;
        let mut state = PipelineState::new(&request.query);
        if let Some(events) = events {
            events.send(ProgressEvent::started(&request.query)).await?;
        }

        let search = self.advance(&mut state, events, &self.searcher, request).await?;
        let summaries = self.advance(&mut state, events, &self.summarizer, search).await?;
        let critiques = self.advance(&mut state, events, &self.critic, summaries).await?;
        let facts = self.advance(&mut state, events, &self.fact_checker, critiques).await?;
        let synthesis = self.advance(&mut state, events, &self.synthesizer, facts).await?;
        state.finish()?;
        info!(sources = synthesis.sources.len(), degraded = state.degradations.len(), "research complete");

        Ok(ResearchReport {
            query: synthesis.query,
            answer: synthesis.answer,
            sources: synthesis.sources,
            agent_logs: state.log,
            status: state.status,
            verified_claims: synthesis.verified_claims,
            disputed_claims: synthesis.disputed_claims,
            degradations: state.degradations,
        })
    }

    /// Runs one stage against the run state, emitting its events when
    /// streaming.
    async fn advance<S>(
        &self,
        state: &mut PipelineState,
        events: Option<&Emitter>,
        stage: &Arc<S>,
        input: S::Input,
    ) -> Result<S::Output, PipelineError>
    where
        S: PipelineStage,
        S::Output: Clone + Into<StagePayload>,
    {
        state.enter(S::STAGE)?;
        if let Some(events) = events {
            events.send(ProgressEvent::thinking(S::STAGE)).await?;
        }

        let outcome = match self.dispatch(stage, input, events.is_some()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(stage = %S::STAGE, error = %err, "stage failed");
                state.fail(S::STAGE, &err);
                return Err(err);
            }
        };

        if outcome.is_degraded() {
            warn!(stage = %S::STAGE, notes = ?outcome.degradations, "stage fell back to degraded output");
        }
        let payload: StagePayload = outcome.output.clone().into();
        if let Some(events) = events {
            events.send(ProgressEvent::done(&payload)).await?;
        }
        state.record(payload, outcome.degradations)?;
        Ok(outcome.output)
    }

    /// Inline in blocking mode. In streaming mode the stage runs as its own
    /// task once a worker permit is free, so a dropped run does not cancel
    /// work already handed out.
    async fn dispatch<S: PipelineStage>(
        &self,
        stage: &Arc<S>,
        input: S::Input,
        offload: bool,
    ) -> Result<StageOutcome<S::Output>, PipelineError> {
        let as_stage_error = |source| PipelineError::Stage { stage: S::STAGE, source };
        if !offload {
            return stage.run(input).await.map_err(as_stage_error);
        }

        let worker_error = |message: String| PipelineError::Worker { stage: S::STAGE, message };
        let permit = Arc::clone(&self.workers).acquire_owned().await.map_err(|e| worker_error(e.to_string()))?;
        let stage = Arc::clone(stage);
        let handle = tokio::spawn(
            async move {
                let _permit = permit;
                stage.run(input).await
            }
            .in_current_span(),
        );
        handle.await.map_err(|e| worker_error(e.to_string()))?.map_err(as_stage_error)
    }
}

/// Wires collaborators and settings into a [`Pipeline`].
pub struct PipelineBuilder {
    generator: Option<Arc<dyn TextGenerator>>,
    synthesis_generator: Option<Arc<dyn TextGenerator>>,
    web: Option<Arc<dyn WebSearch>>,
    registry: Option<Arc<StoreRegistry>>,
    settings: PipelineSettings,
    document_top_k: usize,
    web_max_results: usize,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            generator: None,
            synthesis_generator: None,
            web: None,
            registry: None,
            settings: PipelineSettings::default(),
            document_top_k: RetrievalSettings::default().document_top_k,
            web_max_results: WebSettings::default().max_results,
        }
    }
}

impl PipelineBuilder {
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Generator for the final answer; defaults to the stage generator.
    pub fn synthesis_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.synthesis_generator = Some(generator);
        self
    }

    pub fn web_search(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn registry(mut self, registry: Arc<StoreRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn pipeline_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn document_top_k(mut self, k: usize) -> Self {
        self.document_top_k = k;
        self
    }

    pub fn web_max_results(mut self, n: usize) -> Self {
        self.web_max_results = n;
        self
    }

    pub fn with_settings(self, settings: &Settings) -> Self {
        self.pipeline_settings(settings.pipeline.clone())
            .document_top_k(settings.retrieval.document_top_k)
            .web_max_results(settings.web.max_results)
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        self.settings.validate().map_err(|e| PipelineError::Config(e.to_string()))?;
        let generator = self.generator.ok_or_else(|| PipelineError::Config("a text generator is required".into()))?;
        let web = self.web.ok_or_else(|| PipelineError::Config("a web search backend is required".into()))?;
        let synthesis_generator = self.synthesis_generator.unwrap_or_else(|| Arc::clone(&generator));
        let s = &self.settings;

        Ok(Pipeline {
            searcher: Arc::new(Searcher::new(self.registry, web, self.document_top_k, self.web_max_results, s.max_sources)),
            summarizer: Arc::new(Summarizer::new(Arc::clone(&generator), s.min_content_chars)),
            critic: Arc::new(Critic::new(Arc::clone(&generator))),
            fact_checker: Arc::new(FactChecker::new(generator, s.max_claims)),
            synthesizer: Arc::new(Synthesizer::new(synthesis_generator)),
            workers: Arc::new(Semaphore::new(s.workers)),
            event_delay: Duration::from_millis(s.event_delay_ms),
        })
    }
}
