mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use researchmind_core::Error;
use researchmind_embed::FakeEmbedder;
use researchmind_pipeline::prompts::{CRITIC_HEADER, DISPUTED_HEADING, FACT_CHECKER_HEADER, SUMMARIZER_HEADER, SYNTHESIZER_HEADER};
use researchmind_pipeline::{EventStatus, PipelineBuilder, PipelineError, PipelineStatus, ProgressEvent, ResearchRequest, Stage};

fn disputed_section(answer: &str) -> &str {
    let start = answer.find(DISPUTED_HEADING).expect("disputed section present");
    let body = &answer[start + DISPUTED_HEADING.len()..];
    let end = body.find("\n## ").unwrap_or(body.len());
    &body[..end]
}

async fn collect(mut rx: tokio::sync::mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn caffeine_question_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = fake_registry(tmp.path());
    registry.index_documents("alice", &caffeine_chunks()).unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let web = Arc::new(StaticWebSearch::new(caffeine_web_docs()));
    let pipeline = pipeline(generator.clone(), web, Some(registry));

    let report = pipeline.run(ResearchRequest::new(CAFFEINE_QUERY).with_documents("alice")).await.unwrap();

    assert_eq!(report.status, PipelineStatus::Complete);
    assert_eq!(generator.calls(SUMMARIZER_HEADER), 5);
    assert_eq!(generator.calls(CRITIC_HEADER), 5);
    assert_eq!(generator.calls(FACT_CHECKER_HEADER), 1);
    assert_eq!(generator.calls(SYNTHESIZER_HEADER), 1);

    assert_eq!(report.sources.len(), 4, "the marketing page is excluded");
    assert!(report.sources.iter().all(|s| s.source != "https://boost.example/drinks"));
    assert_eq!(report.sources.iter().map(|s| s.index).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert!(report.sources.iter().any(|s| s.source.starts_with("Uploaded Document")));

    assert!(report.answer.contains("[Source 1]"));
    assert!(report.answer.contains("[Source 2]"));
    assert!(report.answer.contains(CAFFEINE_QUERY));
    let section = disputed_section(&report.answer);
    assert!(section.contains(DISPUTED_CLAIM));
    assert_eq!(report.verified_claims, 1);
    assert_eq!(report.disputed_claims, 1);
    assert!(report.degradations.is_empty());

    for stage in Stage::ORDER {
        assert!(report.agent_logs.iter().any(|l| l.starts_with(stage.name())), "{stage} missing from the log");
    }
}

#[tokio::test]
async fn empty_search_still_synthesizes() {
    let generator = Arc::new(ScriptedGenerator::new());
    let pipeline = pipeline(generator.clone(), Arc::new(StaticWebSearch::empty()), None);

    let report = pipeline.run(ResearchRequest::new("a question nobody wrote about")).await.unwrap();

    assert_eq!(report.status, PipelineStatus::Complete);
    assert!(report.sources.is_empty());
    assert_eq!((report.verified_claims, report.disputed_claims), (0, 0));
    assert_eq!(generator.calls(SUMMARIZER_HEADER), 0);
    assert_eq!(generator.calls(CRITIC_HEADER), 0);
    assert_eq!(generator.calls(FACT_CHECKER_HEADER), 0);
    assert_eq!(generator.calls(SYNTHESIZER_HEADER), 1);
    assert!(report.answer.contains(DISPUTED_HEADING));
}

#[tokio::test]
async fn fact_checker_is_skipped_when_nothing_is_reliable() {
    let generator = Arc::new(ScriptedGenerator::new());
    let web = Arc::new(StaticWebSearch::new(vec![web_doc(
        "https://boost.example/only",
        "Pure energy drink marketing copy that says caffeine is harmless at any hour of the day.",
        0.9,
    )]));
    let pipeline = pipeline(generator.clone(), web, None);

    let report = pipeline.run(ResearchRequest::new(CAFFEINE_QUERY)).await.unwrap();

    assert_eq!(generator.calls(CRITIC_HEADER), 1);
    assert_eq!(generator.calls(FACT_CHECKER_HEADER), 0);
    assert!(report.sources.is_empty());
    assert_eq!(report.verified_claims, 0);
}

#[tokio::test]
async fn short_sources_are_skipped() {
    let generator = Arc::new(ScriptedGenerator::new());
    let web = Arc::new(StaticWebSearch::new(vec![
        web_doc("https://tiny.example", "Too short to summarize.", 0.99),
        caffeine_web_docs().remove(0),
    ]));
    let pipeline = pipeline(generator.clone(), web, None);

    let report = pipeline.run(ResearchRequest::new(CAFFEINE_QUERY)).await.unwrap();

    assert_eq!(generator.calls(SUMMARIZER_HEADER), 1);
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].source, "https://sleep.example/caffeine");
}

#[tokio::test]
async fn web_failure_degrades_to_documents() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = fake_registry(tmp.path());
    registry.index_documents("alice", &caffeine_chunks()).unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let pipeline = pipeline(generator, Arc::new(StaticWebSearch::unavailable()), Some(registry));

    let report = pipeline.run(ResearchRequest::new(CAFFEINE_QUERY).with_documents("alice")).await.unwrap();

    assert_eq!(report.status, PipelineStatus::Complete);
    assert_eq!(report.sources.len(), 2);
    assert!(report.degradations.iter().any(|d| d.starts_with("Searcher: web search unavailable")));
}

#[tokio::test]
async fn generation_outages_degrade_every_stage() {
    let generator = Arc::new(ScriptedGenerator::failing(&[
        SUMMARIZER_HEADER,
        CRITIC_HEADER,
        FACT_CHECKER_HEADER,
        SYNTHESIZER_HEADER,
    ]));
    let pipeline = pipeline(generator.clone(), Arc::new(StaticWebSearch::new(caffeine_web_docs())), None);

    let report = pipeline.run(ResearchRequest::new(CAFFEINE_QUERY)).await.unwrap();

    assert_eq!(report.status, PipelineStatus::Complete);
    // critiques default to reliable, so every source is kept
    assert_eq!(report.sources.len(), 3);
    assert_eq!(report.verified_claims + report.disputed_claims, 0);
    assert!(report.answer.contains("[Source 1]"));
    assert!(report.answer.contains("..."));
    assert!(report.answer.contains(DISPUTED_HEADING));
    for stage in ["Summarizer", "Critic", "FactChecker", "Synthesizer"] {
        assert!(report.degradations.iter().any(|d| d.starts_with(stage)), "{stage} should report a degradation");
    }
}

#[tokio::test]
async fn stage_parameters_follow_each_stage() {
    let generator = Arc::new(ScriptedGenerator::new());
    let web = Arc::new(StaticWebSearch::new(vec![caffeine_web_docs().remove(0)]));
    pipeline(generator.clone(), web, None).run(ResearchRequest::new(CAFFEINE_QUERY)).await.unwrap();

    let params: Vec<(f32, u32)> = generator.params().iter().map(|p| (p.temperature, p.max_tokens)).collect();
    assert_eq!(params, vec![(0.3, 400), (0.2, 400), (0.1, 600), (0.4, 1000)]);
}

#[tokio::test]
async fn blank_queries_are_rejected() {
    let generator = Arc::new(ScriptedGenerator::new());
    let web = Arc::new(StaticWebSearch::empty());
    let pipeline = pipeline(generator.clone(), web.clone(), None);

    let err = pipeline.run(ResearchRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    for query in ["  ab  ".to_string(), "q".repeat(501)] {
        let err = pipeline.run(ResearchRequest::new(query)).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
    }
    assert_eq!(web.calls(), 0);
    assert_eq!(generator.total_calls(), 0);
}

#[tokio::test]
async fn queries_at_the_length_bounds_are_accepted() {
    let generator = Arc::new(ScriptedGenerator::new());
    let web = Arc::new(StaticWebSearch::empty());
    let pipeline = pipeline(generator, web.clone(), None);

    pipeline.run(ResearchRequest::new(" tea ")).await.unwrap();
    pipeline.run(ResearchRequest::new("é".repeat(500))).await.unwrap();
    assert_eq!(web.calls(), 2);
}

#[tokio::test]
async fn retrieval_failure_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_with(tmp.path(), Arc::new(QueryFailingEmbedder(FakeEmbedder::new(64))));
    registry.index_documents("alice", &caffeine_chunks()).unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let pipeline = pipeline(generator.clone(), Arc::new(StaticWebSearch::new(caffeine_web_docs())), Some(registry));

    let err = pipeline.run(ResearchRequest::new(CAFFEINE_QUERY).with_documents("alice")).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Searcher));
    assert!(matches!(err, PipelineError::Stage { source: Error::Embedding(_), .. }));
    assert_eq!(generator.total_calls(), 0);
}

#[tokio::test]
async fn stream_emits_events_in_stage_order() {
    let generator = Arc::new(ScriptedGenerator::new());
    let pipeline = pipeline(generator, Arc::new(StaticWebSearch::new(caffeine_web_docs())), None);

    let events = collect(pipeline.stream(ResearchRequest::new(CAFFEINE_QUERY))).await;

    let mut expected = vec![("System".to_string(), EventStatus::Started)];
    for stage in Stage::ORDER {
        expected.push((stage.name().to_string(), EventStatus::Thinking));
        expected.push((stage.name().to_string(), EventStatus::Done));
    }
    expected.push(("System".to_string(), EventStatus::Complete));
    let actual: Vec<(String, EventStatus)> = events.iter().map(|e| (e.agent.clone(), e.status)).collect();
    assert_eq!(actual, expected);

    let search_done = &events[2];
    assert_eq!(search_done.data["total_results"], 3);
    assert_eq!(search_done.data["sources_used"][0], "web");
    let critic_done = &events[6];
    assert_eq!(critic_done.message, "2/3 summaries passed");

    let complete = events.last().unwrap();
    assert!(complete.is_terminal());
    assert!(complete.data["answer"].as_str().unwrap().contains(DISPUTED_HEADING));
    assert_eq!(complete.data["sources"].as_array().unwrap().len(), 2);
    assert_eq!(complete.data["disputed_claims"], 1);
}

#[tokio::test]
async fn stream_failure_ends_with_one_error_event() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_with(tmp.path(), Arc::new(QueryFailingEmbedder(FakeEmbedder::new(64))));
    registry.index_documents("alice", &caffeine_chunks()).unwrap();
    let pipeline = pipeline(Arc::new(ScriptedGenerator::new()), Arc::new(StaticWebSearch::empty()), Some(registry));

    let events = collect(pipeline.stream(ResearchRequest::new(CAFFEINE_QUERY).with_documents("alice"))).await;

    let statuses: Vec<EventStatus> = events.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![EventStatus::Started, EventStatus::Thinking, EventStatus::Error]);
    let last = events.last().unwrap();
    assert_eq!(last.agent, "System");
    assert!(last.message.starts_with("Pipeline error:"));
    assert!(last.message.contains("model crashed"));
}

#[tokio::test]
async fn stream_rejects_blank_queries_with_an_error_event() {
    let pipeline = pipeline(Arc::new(ScriptedGenerator::new()), Arc::new(StaticWebSearch::empty()), None);
    let events = collect(pipeline.stream(ResearchRequest::new(""))).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, EventStatus::Error);
}

#[tokio::test]
async fn concurrent_runs_do_not_share_state() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = fake_registry(tmp.path());
    registry.index_documents("alice", &caffeine_chunks()).unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let pipeline = pipeline(generator, Arc::new(StaticWebSearch::empty()), Some(registry));

    let with_docs = pipeline.clone();
    let a = tokio::spawn(async move { with_docs.run(ResearchRequest::new(CAFFEINE_QUERY).with_documents("alice")).await });
    let web_only = pipeline.clone();
    let b = tokio::spawn(async move { web_only.run(ResearchRequest::new("history of tea")).await });
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    assert_eq!(a.query, CAFFEINE_QUERY);
    assert_eq!(a.sources.len(), 2);
    assert!(a.answer.contains(CAFFEINE_QUERY));
    assert_eq!(b.query, "history of tea");
    assert!(b.sources.is_empty());
    assert!(b.answer.contains("history of tea"));
    assert!(b.agent_logs.iter().all(|l| !l.contains(CAFFEINE_QUERY)));
}

#[tokio::test]
async fn dropped_receiver_stops_after_the_in_flight_stage() {
    let generator = Arc::new(ScriptedGenerator::new());
    let web = Arc::new(GatedWebSearch::new(caffeine_web_docs()));
    let pipeline = PipelineBuilder::default()
        .generator(generator.clone())
        .web_search(web.clone())
        .pipeline_settings(fast_settings())
        .build()
        .unwrap();

    let mut rx = pipeline.stream(ResearchRequest::new(CAFFEINE_QUERY));
    drop(pipeline);
    let started = rx.recv().await.unwrap();
    let thinking = rx.recv().await.unwrap();
    assert_eq!(started.status, EventStatus::Started);
    assert_eq!((thinking.agent.as_str(), thinking.status), (Stage::Searcher.name(), EventStatus::Thinking));
    drop(rx);

    web.open_gate();
    // the background run holds the only other reference to the web double
    tokio::time::timeout(Duration::from_secs(5), async {
        while Arc::strong_count(&web) > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("streaming run ends once the receiver is gone");

    assert_eq!(web.calls(), 1);
    assert!(web.finished(), "search already handed out runs to completion");
    assert_eq!(generator.total_calls(), 0, "no stage after the search is started");
}
