#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use researchmind_core::config::PipelineSettings;
use researchmind_core::traits::{Embedder, TextGenerator, WebSearch};
use researchmind_core::{Chunk, Error, GenerationParams, Result, SourceType, WebDocument};
use researchmind_embed::FakeEmbedder;
use researchmind_hybrid::{FusionConfig, StoreRegistry};
use researchmind_pipeline::prompts::{CRITIC_HEADER, FACT_CHECKER_HEADER, SUMMARIZER_HEADER, SYNTHESIZER_HEADER};
use researchmind_pipeline::{Pipeline, PipelineBuilder};

pub const CAFFEINE_QUERY: &str = "effects of caffeine on sleep";
pub const UNRELIABLE_MARKER: &str = "energy drink marketing";
pub const DISPUTED_CLAIM: &str = "Caffeine effects last about six hours";

pub const CLAIMS_RESPONSE: &str = "CLAIM: Caffeine delays sleep onset\n\
STATUS: VERIFIED\n\
REASON: Both the uploaded study and a web source report it\n\
---\n\
CLAIM: Caffeine effects last about six hours\n\
STATUS: DISPUTED\n\
REASON: Sources give half-lives between three and seven hours\n\
---\n\
CLAIM: Decaffeinated coffee has no effect on sleep\n\
STATUS: UNVERIFIED\n\
REASON: Only one source mentions it\n\
---";

fn between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    let Some(from) = text.find(start).map(|i| i + start.len()) else { return "" };
    let to = text[from..].find(end).map_or(text.len(), |i| from + i);
    &text[from..to]
}

/// Generation double that answers by prompt header.
///
/// Summaries echo the source content, critiques flag content containing
/// [`UNRELIABLE_MARKER`], claims come from [`CLAIMS_RESPONSE`] and the
/// answer cites every `[Source N]` it was given.
#[derive(Default)]
pub struct ScriptedGenerator {
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Vec<&'static str>,
    params: Mutex<Vec<GenerationParams>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self { Self::default() }

    /// Every prompt starting with one of `headers` fails.
    pub fn failing(headers: &[&'static str]) -> Self {
        Self { failing: headers.to_vec(), ..Self::default() }
    }

    pub fn calls(&self, header: &str) -> usize { self.calls.lock().unwrap().get(header).copied().unwrap_or(0) }

    pub fn total_calls(&self) -> usize { self.calls.lock().unwrap().values().sum() }

    pub fn params(&self) -> Vec<GenerationParams> { self.params.lock().unwrap().clone() }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String> {
        let header = [SUMMARIZER_HEADER, CRITIC_HEADER, FACT_CHECKER_HEADER, SYNTHESIZER_HEADER]
            .into_iter()
            .find(|h| prompt.starts_with(h))
            .ok_or_else(|| Error::Generation("unexpected prompt".into()))?;
        *self.calls.lock().unwrap().entry(header).or_insert(0) += 1;
        self.params.lock().unwrap().push(params);
        if self.failing.contains(&header) {
            return Err(Error::Generation("quota exceeded".into()));
        }

        let query = between(prompt, "Research question: ", "\n");
        let reply = match header {
            SUMMARIZER_HEADER => format!("Summary: {}", between(prompt, "Content:\n", "\n\nSummary:").trim()),
            CRITIC_HEADER if prompt.contains(UNRELIABLE_MARKER) => {
                "CONFIDENCE: LOW\nISSUES: Promotional content\nwith no cited evidence\nVERDICT: UNRELIABLE".to_string()
            }
            CRITIC_HEADER => "CONFIDENCE: HIGH\nISSUES: None\nVERDICT: RELIABLE".to_string(),
            FACT_CHECKER_HEADER => CLAIMS_RESPONSE.to_string(),
            _ => {
                let cited: Vec<String> = (1..)
                    .map(|i| format!("[Source {i}]"))
                    .take_while(|tag| prompt.contains(tag.as_str()))
                    .collect();
                format!(
                    "## Summary\nResearch on {query}.\n\n## Key Findings\n{}\n\n## Conclusion\nSee the sources above.",
                    cited.iter().map(|c| format!("- Finding from {c}")).collect::<Vec<_>>().join("\n")
                )
            }
        };
        Ok(reply)
    }
}

/// Web double returning fixed documents, or failing.
pub struct StaticWebSearch {
    docs: Vec<WebDocument>,
    fail: bool,
    calls: Mutex<usize>,
}

impl StaticWebSearch {
    pub fn new(docs: Vec<WebDocument>) -> Self { Self { docs, fail: false, calls: Mutex::new(0) } }
    pub fn empty() -> Self { Self::new(Vec::new()) }
    pub fn unavailable() -> Self { Self { docs: Vec::new(), fail: true, calls: Mutex::new(0) } }
    pub fn calls(&self) -> usize { *self.calls.lock().unwrap() }
}

#[async_trait]
impl WebSearch for StaticWebSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<WebDocument>> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(Error::WebSearch("connection refused".into()));
        }
        Ok(self.docs.iter().take(max_results).cloned().collect())
    }
}

/// Web double that blocks inside `search` until the test opens the gate.
pub struct GatedWebSearch {
    docs: Vec<WebDocument>,
    gate: tokio::sync::Semaphore,
    calls: AtomicUsize,
    finished: AtomicBool,
}

impl GatedWebSearch {
    pub fn new(docs: Vec<WebDocument>) -> Self {
        Self { docs, gate: tokio::sync::Semaphore::new(0), calls: AtomicUsize::new(0), finished: AtomicBool::new(false) }
    }
    pub fn open_gate(&self) { self.gate.add_permits(1) }
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
    pub fn finished(&self) -> bool { self.finished.load(Ordering::SeqCst) }
}

#[async_trait]
impl WebSearch for GatedWebSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<WebDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.map_err(|e| Error::WebSearch(e.to_string()))?;
        permit.forget();
        self.finished.store(true, Ordering::SeqCst);
        Ok(self.docs.iter().take(max_results).cloned().collect())
    }
}

/// Indexes fine but cannot embed queries.
pub struct QueryFailingEmbedder(pub FakeEmbedder);

impl Embedder for QueryFailingEmbedder {
    fn dimension(&self) -> usize { self.0.dimension() }
    fn embed(&self, _text: &str) -> Result<Vec<f32>> { Err(Error::Embedding("model crashed".into())) }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { self.0.embed_batch(texts) }
}

pub fn web_doc(url: &str, content: &str, score: f32) -> WebDocument {
    WebDocument {
        source: url.to_string(),
        url: url.to_string(),
        title: url.to_string(),
        content: content.to_string(),
        score: Some(score),
        source_type: SourceType::Web,
    }
}

pub fn caffeine_web_docs() -> Vec<WebDocument> {
    vec![
        web_doc(
            "https://sleep.example/caffeine",
            "A sleep foundation review finds caffeine taken six hours before bed still delays sleep onset and shortens deep sleep.",
            0.91,
        ),
        web_doc(
            "https://pharma.example/half-life",
            "Pharmacology notes put the half-life of caffeine between three and seven hours depending on the person and their liver.",
            0.84,
        ),
        web_doc(
            "https://boost.example/drinks",
            "This energy drink marketing page claims caffeine never affects sleep for active people and promotes its new product line.",
            0.77,
        ),
    ]
}

pub fn caffeine_chunks() -> Vec<Chunk> {
    vec![
        Chunk::from_text(0, "In our lab study caffeine consumed in the evening delayed sleep onset by about forty minutes on average."),
        Chunk::from_text(1, "Participants who drank coffee after dinner reported lighter sleep and woke more often during the night."),
    ]
}

pub fn registry_with(root: &Path, embedder: Arc<dyn Embedder>) -> Arc<StoreRegistry> {
    Arc::new(StoreRegistry::new(root, embedder, FusionConfig::default(), 8).unwrap())
}

pub fn fake_registry(root: &Path) -> Arc<StoreRegistry> { registry_with(root, Arc::new(FakeEmbedder::new(64))) }

pub fn fast_settings() -> PipelineSettings {
    PipelineSettings { event_delay_ms: 0, ..PipelineSettings::default() }
}

pub fn pipeline(generator: Arc<ScriptedGenerator>, web: Arc<StaticWebSearch>, registry: Option<Arc<StoreRegistry>>) -> Pipeline {
    let mut builder = PipelineBuilder::default().generator(generator).web_search(web).pipeline_settings(fast_settings());
    if let Some(registry) = registry {
        builder = builder.registry(registry);
    }
    builder.build().unwrap()
}
