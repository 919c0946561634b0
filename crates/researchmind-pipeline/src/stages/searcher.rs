use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use researchmind_core::traits::WebSearch;
use researchmind_core::{Error, Result, RetrievalResult};
use researchmind_hybrid::StoreRegistry;

use super::PipelineStage;
use crate::orchestrator::ResearchRequest;
use crate::records::{Evidence, SearchOutput, Stage, StageOutcome};

pub struct Searcher {
    registry: Option<Arc<StoreRegistry>>,
    web: Arc<dyn WebSearch>,
    document_top_k: usize,
    web_max_results: usize,
    max_sources: usize,
}

impl Searcher {
    pub fn new(
        registry: Option<Arc<StoreRegistry>>,
        web: Arc<dyn WebSearch>,
        document_top_k: usize,
        web_max_results: usize,
        max_sources: usize,
    ) -> Self {
        Self { registry, web, document_top_k, web_max_results, max_sources }
    }

    async fn search_documents(&self, registry: &Arc<StoreRegistry>, user_id: &str, query: &str) -> Result<Vec<RetrievalResult>> {
        let registry = Arc::clone(registry);
        let user_id = user_id.to_string();
        let query = query.to_string();
        let k = self.document_top_k;
        tokio::task::spawn_blocking(move || {
            let store = registry.open(&user_id)?;
            let retriever = store.read().map_err(|e| Error::poisoned("retriever", e))?;
            if !retriever.is_ready() {
                debug!(user = %user_id, "no documents indexed");
                return Ok(Vec::new());
            }
            retriever.search_results(&query, k)
        })
        .await
        .map_err(|e| Error::Operation(format!("document search task failed: {e}")))?
    }
}

#[async_trait]
impl PipelineStage for Searcher {
    type Input = ResearchRequest;
    type Output = SearchOutput;

    const STAGE: Stage = Stage::Searcher;

    async fn run(&self, request: ResearchRequest) -> Result<StageOutcome<SearchOutput>> {
        let mut results: Vec<Evidence> = Vec::new();
        let mut sources_used = Vec::new();
        let mut degradations = Vec::new();

        if request.use_documents {
            if let (Some(registry), Some(user_id)) = (&self.registry, request.user_id.as_deref()) {
                let docs = self.search_documents(registry, user_id, &request.query).await?;
                if !docs.is_empty() {
                    sources_used.push("documents".to_string());
                    results.extend(docs.into_iter().map(Evidence::from));
                }
            }
        }

        match self.web.search(&request.query, self.web_max_results).await {
            Ok(docs) if !docs.is_empty() => {
                sources_used.push("web".to_string());
                results.extend(docs.into_iter().map(Evidence::from));
            }
            Ok(_) => debug!("web search returned nothing"),
            Err(e) => {
                warn!(error = %e, "web search failed; continuing with documents only");
                degradations.push(format!("web search unavailable: {e}"));
            }
        }

        results.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));
        results.truncate(self.max_sources);
        info!(results = results.len(), sources = ?sources_used, "search finished");

        let output = SearchOutput { query: request.query, total_results: results.len(), results, sources_used };
        Ok(StageOutcome::degraded(output, degradations))
    }
}
