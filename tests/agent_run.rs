// tests/agent_run.rs
mod common;

use std::sync::Arc;

use arxiv_digest::digest::{Summarizer, SUMMARY_PLACEHOLDER};
use arxiv_digest::notify::{Notifier, NotifierMux};
use arxiv_digest::scheduler::{run_guarded, ScheduledJob};
use arxiv_digest::{DigestAgent, Topic};
use common::{ledger_at, pipeline, raw, settings, topic, RecordingNotifier, ScriptedBackend, StubLlm};

fn agent(
    dir: &std::path::Path,
    topics: Vec<Topic>,
    backend: &ScriptedBackend,
    summary_llm: Arc<StubLlm>,
    notifiers: Vec<Box<dyn Notifier>>,
) -> DigestAgent {
    // keyword-only topics in these tests; the relevance model always refuses
    let fetch = pipeline(ledger_at(dir), StubLlm::answering("no"), backend, settings(3));
    DigestAgent::new(
        topics,
        fetch,
        Summarizer::new(summary_llm, "Summarize: {abstract}"),
        NotifierMux::new(notifiers),
    )
}

#[tokio::test]
async fn relevant_papers_are_summarized_and_delivered() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::pages(vec![vec![
        raw(2, "Diffusion for robots"),
        raw(1, "Robot grasping"),
        raw(3, "Tax law"),
    ]]);
    let (rec, sent) = RecordingNotifier::new(true);
    let summary_llm = StubLlm::answering("Short summary.");
    let a = agent(
        dir.path(),
        vec![topic("robotics", &["robot"], 5)],
        &backend,
        summary_llm.clone(),
        vec![Box::new(rec)],
    );

    let report = a.run().await;

    assert_eq!(report.topics.len(), 1);
    assert_eq!(report.topics[0].fetched, 2);
    assert_eq!(report.topics[0].delivered, Some(true));

    let sent = sent.lock();
    assert_eq!(sent.len(), 1);
    let digest = &sent[0];
    assert_eq!(digest.topic, "robotics");
    assert_eq!(digest.title, "ROBOTICS");
    let titles: Vec<_> = digest.entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, ["Diffusion for robots", "Robot grasping"]);
    assert!(digest.entries.iter().all(|e| e.summary == "Short summary."));
    assert_eq!(digest.entries[1].url, raw(1, "").id);
    assert_eq!(summary_llm.calls(), 2);
    assert!(summary_llm.prompts.lock()[0].starts_with("Summarize: Abstract of Diffusion"));
}

#[tokio::test]
async fn topics_without_new_papers_send_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::pages(vec![vec![raw(1, "Tax law")]]);
    let (rec, sent) = RecordingNotifier::new(true);
    let summary_llm = StubLlm::answering("unused");
    let a = agent(
        dir.path(),
        vec![topic("robotics", &["robot"], 5)],
        &backend,
        summary_llm.clone(),
        vec![Box::new(rec)],
    );

    let report = a.run().await;

    assert_eq!(report.topics[0].fetched, 0);
    assert_eq!(report.topics[0].delivered, None);
    assert!(sent.lock().is_empty());
    assert_eq!(summary_llm.calls(), 0);
}

#[tokio::test]
async fn disabled_topics_are_not_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::pages(vec![vec![raw(1, "Robot grasping")]]);
    let (rec, sent) = RecordingNotifier::new(true);
    let mut off = topic("robotics", &["robot"], 5);
    off.enabled = false;
    let a = agent(
        dir.path(),
        vec![off],
        &backend,
        StubLlm::answering("s"),
        vec![Box::new(rec)],
    );

    let report = a.run().await;

    assert!(report.topics.is_empty());
    assert!(sent.lock().is_empty());
    assert_eq!(backend.pull_count(), 0);
}

#[tokio::test]
async fn summary_failures_use_the_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::pages(vec![vec![raw(1, "Robot grasping")]]);
    let (rec, sent) = RecordingNotifier::new(true);
    let a = agent(
        dir.path(),
        vec![topic("robotics", &["robot"], 5)],
        &backend,
        StubLlm::failing(),
        vec![Box::new(rec)],
    );

    a.run().await;

    let sent = sent.lock();
    assert_eq!(sent[0].entries[0].summary, SUMMARY_PLACEHOLDER);
}

#[tokio::test]
async fn one_working_endpoint_counts_as_delivered() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::pages(vec![vec![raw(1, "Robot grasping")]]);
    let (down, down_sent) = RecordingNotifier::new(false);
    let (up, up_sent) = RecordingNotifier::new(true);
    let a = agent(
        dir.path(),
        vec![topic("robotics", &["robot"], 5)],
        &backend,
        StubLlm::answering("s"),
        vec![Box::new(down), Box::new(up)],
    );

    let report = a.run().await;

    assert_eq!(report.topics[0].delivered, Some(true));
    assert_eq!(down_sent.lock().len(), 1);
    assert_eq!(up_sent.lock().len(), 1);
}

#[tokio::test]
async fn failed_delivery_still_records_papers() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::pages(vec![vec![raw(1, "Robot grasping")]]);
    let (down, _) = RecordingNotifier::new(false);
    let a = agent(
        dir.path(),
        vec![topic("robotics", &["robot"], 5)],
        &backend,
        StubLlm::answering("s"),
        vec![Box::new(down)],
    );

    let report = a.run().await;
    assert_eq!(report.topics[0].delivered, Some(false));

    // at-most-once: the paper is not offered again
    backend.reset(vec![Ok(vec![raw(1, "Robot grasping")])]);
    let again = a.run().await;
    assert_eq!(again.topics[0].fetched, 0);
}

#[tokio::test]
async fn topics_run_in_configuration_order() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok(vec![raw(1, "Robot grasping")]),
        Ok(vec![]),
        Ok(vec![raw(2, "Vision transformers")]),
        Ok(vec![]),
    ]);
    let (rec, sent) = RecordingNotifier::new(true);
    let a = agent(
        dir.path(),
        vec![
            topic("robotics", &["robot"], 5),
            topic("vision", &["vision"], 5),
        ],
        &backend,
        StubLlm::answering("s"),
        vec![Box::new(rec)],
    );

    a.run().await;

    let order: Vec<_> = sent.lock().iter().map(|d| d.topic.clone()).collect();
    assert_eq!(order, ["robotics", "vision"]);
    assert_eq!(backend.opened.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn agent_runs_as_a_scheduled_job() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::pages(vec![vec![raw(1, "Robot grasping")]]);
    let (rec, sent) = RecordingNotifier::new(true);
    let job: Arc<dyn ScheduledJob> = Arc::new(agent(
        dir.path(),
        vec![topic("robotics", &["robot"], 5)],
        &backend,
        StubLlm::answering("s"),
        vec![Box::new(rec)],
    ));

    assert!(run_guarded(job).await);
    assert_eq!(sent.lock().len(), 1);
}
