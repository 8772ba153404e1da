//! Integration tests for the normalization pipeline.
//!
//! These run against a temp-directory corpus and a stubbed rewrite service:
//! no network, no API keys, deterministic outcomes. Live-provider smoke
//! testing is done manually through the CLI.

use futures::future::BoxFuture;
use futures::FutureExt;
use probnorm::{
    audit, run, DocError, DocStatus, Document, DocumentOutcome, DocumentStore, JsonDirStore, Lang,
    NormalizeConfig, ProbnormError, ReportSink, RewriteResponse, RewriteService,
    RewriteServiceError, RunStats,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const JAVA_BODY: &str =
    "<p>Use a map.</p><pre>class Solution { public int[] twoSum(int[] nums) { return nums; } }</pre>";
const CPP_BODY: &str =
    "<p>Use a map.</p><pre>#include &lt;vector&gt;\nstd::vector&lt;int&gt; twoSum();</pre>";
const REWRITTEN_BODY: &str =
    "<p>Use a map.</p><pre>class Solution { public int[] twoSum(int[] nums) { return nums; } }</pre>";

fn doc(id: &str, body: Option<&str>) -> Document {
    Document {
        id: id.into(),
        title: format!("Problem {id}"),
        slug: None,
        difficulty: Some("Easy".into()),
        tags: vec!["Array".into()],
        description: Some("<p>Find two numbers.</p>".into()),
        snippets: vec![],
        solution_body: body.map(Into::into),
    }
}

/// What the stub should do on each call.
enum StubMode {
    /// Return this content, always.
    Fixed(&'static str),
    /// Always fail the call.
    Error,
}

/// Scripted rewrite service that counts its calls.
struct StubService {
    mode: StubMode,
    calls: AtomicUsize,
}

impl StubService {
    fn new(mode: StubMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RewriteService for StubService {
    fn rewrite<'a>(
        &'a self,
        _html: &'a str,
        _system_prompt: &'a str,
    ) -> BoxFuture<'a, Result<RewriteResponse, RewriteServiceError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            match self.mode {
                StubMode::Fixed(content) => Ok(RewriteResponse {
                    content: content.to_string(),
                    input_tokens: 100,
                    output_tokens: 200,
                }),
                StubMode::Error => Err(RewriteServiceError::Call("HTTP 503".into())),
            }
        }
        .boxed()
    }
}

/// Store wrapper whose saves always fail, as on a read-only filesystem.
struct RejectingSaveStore {
    inner: JsonDirStore,
}

impl DocumentStore for RejectingSaveStore {
    fn list_ids(&self) -> Result<Vec<String>, ProbnormError> {
        self.inner.list_ids()
    }

    fn load(&self, id: &str) -> Result<Document, DocError> {
        self.inner.load(id)
    }

    fn save(&self, id: &str, _doc: &Document) -> Result<(), DocError> {
        Err(DocError::SaveFailed {
            id: id.to_string(),
            detail: "read-only filesystem".into(),
        })
    }
}

/// Sink that collects every recorded outcome.
#[derive(Default)]
struct CollectingSink {
    begun_with: Mutex<Option<usize>>,
    outcomes: Mutex<Vec<DocumentOutcome>>,
    finished: AtomicUsize,
}

impl ReportSink for CollectingSink {
    fn begin(&self, total_documents: usize) {
        *self.begun_with.lock().unwrap() = Some(total_documents);
    }

    fn record(&self, outcome: &DocumentOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    fn finish(&self, _stats: &RunStats) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

fn config_with(service: Arc<StubService>, concurrency: usize) -> NormalizeConfig {
    NormalizeConfig::builder()
        .target(Lang::Java)
        .service(service)
        .concurrency(concurrency)
        .retry_backoff_ms(1)
        .build()
        .expect("valid test config")
}

// ── Skip and rewrite paths ───────────────────────────────────────────────────

#[tokio::test]
async fn already_target_document_skips_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store.save("1", &doc("1", Some(JAVA_BODY))).unwrap();

    let service = StubService::new(StubMode::Error);
    let report = run(&store, &config_with(Arc::clone(&service), 2))
        .await
        .unwrap();

    assert_eq!(service.calls(), 0);
    assert_eq!(report.stats.already_target, 1);
    assert!(report.is_settled());

    // The solution body still carries the Java block.
    let saved = store.load("1").unwrap();
    let body = saved.solution_body.unwrap();
    assert!(body.contains("public int[] twoSum"), "got: {body}");
}

#[tokio::test]
async fn foreign_document_is_rewritten_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store.save("2", &doc("2", Some(CPP_BODY))).unwrap();

    let service = StubService::new(StubMode::Fixed(REWRITTEN_BODY));
    let report = run(&store, &config_with(Arc::clone(&service), 2))
        .await
        .unwrap();

    assert_eq!(service.calls(), 1);
    assert_eq!(report.stats.rewritten, 1);
    assert_eq!(report.outcomes[0].attempts, 1);

    let saved = store.load("2").unwrap();
    let body = saved.solution_body.unwrap();
    assert!(body.contains("class Solution"), "got: {body}");
    assert!(!body.contains("std::"), "C++ block survived: {body}");
}

#[tokio::test]
async fn prose_only_document_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store
        .save("3", &doc("3", Some("<p>No code here at all.</p>")))
        .unwrap();

    let service = StubService::new(StubMode::Error);
    let report = run(&store, &config_with(Arc::clone(&service), 1))
        .await
        .unwrap();

    assert_eq!(service.calls(), 0);
    assert_eq!(report.stats.already_target, 1);
}

#[tokio::test]
async fn missing_body_counts_as_no_content() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store.save("4", &doc("4", None)).unwrap();

    let service = StubService::new(StubMode::Error);
    let report = run(&store, &config_with(service, 1)).await.unwrap();

    assert_eq!(report.stats.no_content, 1);
    assert!(report.is_settled());
}

// ── Failure paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn service_failure_leaves_content_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store.save("5", &doc("5", Some(CPP_BODY))).unwrap();
    let before = std::fs::read_to_string(dir.path().join("5.json")).unwrap();

    let service = StubService::new(StubMode::Error);
    let report = run(&store, &config_with(Arc::clone(&service), 1))
        .await
        .unwrap();

    // One retry for the service-failure kind, then terminal.
    assert_eq!(service.calls(), 2);
    assert_eq!(report.stats.failed_service, 1);
    assert!(!report.is_settled());
    assert_eq!(report.outcomes[0].attempts, 2);

    let after = std::fs::read_to_string(dir.path().join("5.json")).unwrap();
    assert_eq!(before, after, "failed document must not be touched on disk");
}

#[tokio::test]
async fn wrong_language_response_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store.save("6", &doc("6", Some(CPP_BODY))).unwrap();

    // The "rewrite" comes back in Python: must never be accepted as Java.
    let service = StubService::new(StubMode::Fixed(
        "<pre>class Solution:\n    def two_sum(self, nums):\n        return nums</pre>",
    ));
    let report = run(&store, &config_with(Arc::clone(&service), 1))
        .await
        .unwrap();

    assert_eq!(service.calls(), 2);
    assert_eq!(report.stats.failed_validation, 1);

    let saved = store.load("6").unwrap();
    assert_eq!(saved.solution_body.as_deref(), Some(CPP_BODY));
}

#[tokio::test]
async fn failed_save_keeps_the_rewritten_record_in_the_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let inner = JsonDirStore::open(dir.path()).unwrap();
    inner.save("7", &doc("7", Some(CPP_BODY))).unwrap();
    let store = RejectingSaveStore { inner };

    let service = StubService::new(StubMode::Fixed(REWRITTEN_BODY));
    let report = run(&store, &config_with(Arc::clone(&service), 1))
        .await
        .unwrap();

    assert_eq!(service.calls(), 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, DocStatus::SaveFailed);
    assert_eq!(report.stats.unresolved_io, 1);
    assert!(!report.is_settled());

    // The paid-for rewrite survives in the outcome so a caller can retry
    // the write without another service call.
    let settled = outcome.document.as_ref().expect("settled record retained");
    let body = settled.solution_body.as_deref().unwrap();
    assert!(body.contains("class Solution"), "got: {body}");
    assert!(!body.contains("std::"), "got: {body}");

    // The disk copy is still the original.
    let on_disk = store.load("7").unwrap();
    assert_eq!(on_disk.solution_body.as_deref(), Some(CPP_BODY));
}

#[tokio::test]
async fn unreadable_record_does_not_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store.save("1", &doc("1", Some(JAVA_BODY))).unwrap();
    std::fs::write(dir.path().join("2.json"), "{ torn").unwrap();

    let service = StubService::new(StubMode::Error);
    let report = run(&store, &config_with(service, 2)).await.unwrap();

    assert_eq!(report.stats.total_documents, 2);
    assert_eq!(report.stats.already_target, 1);
    assert_eq!(report.stats.unresolved_io, 1);
}

// ── Scheduler behaviour ──────────────────────────────────────────────────────

#[tokio::test]
async fn every_document_settles_exactly_once_regardless_of_concurrency() {
    for concurrency in [1, 4, 64] {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        for i in 0..12 {
            let body = if i % 2 == 0 { JAVA_BODY } else { CPP_BODY };
            let id = format!("{i:04}");
            store.save(&id, &doc(&id, Some(body))).unwrap();
        }

        let service = StubService::new(StubMode::Fixed(REWRITTEN_BODY));
        let report = run(&store, &config_with(service, concurrency))
            .await
            .unwrap();

        assert_eq!(report.stats.total_documents, 12);
        let mut ids: Vec<&str> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 12, "concurrency {concurrency}: duplicate outcome");
        // Outcomes are id-sorted no matter what order tasks finished in.
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}

#[tokio::test]
async fn rerun_converges_without_further_service_calls() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store.save("1", &doc("1", Some(CPP_BODY))).unwrap();
    store.save("2", &doc("2", Some(JAVA_BODY))).unwrap();

    let service = StubService::new(StubMode::Fixed(REWRITTEN_BODY));
    let first = run(&store, &config_with(Arc::clone(&service), 2))
        .await
        .unwrap();
    assert_eq!(first.stats.rewritten, 1);
    assert_eq!(service.calls(), 1);

    // Second pass: everything already settled, zero new calls.
    let second = run(&store, &config_with(Arc::clone(&service), 2))
        .await
        .unwrap();
    assert_eq!(service.calls(), 1);
    assert_eq!(second.stats.rewritten, 0);
    assert_eq!(second.stats.already_target, 2);
    assert!(second.is_settled());
}

#[tokio::test]
async fn sink_sees_begin_every_outcome_and_finish() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store.save("1", &doc("1", Some(JAVA_BODY))).unwrap();
    store.save("2", &doc("2", Some(CPP_BODY))).unwrap();

    let sink = Arc::new(CollectingSink::default());
    let service = StubService::new(StubMode::Fixed(REWRITTEN_BODY));
    let config = NormalizeConfig::builder()
        .target(Lang::Java)
        .service(service)
        .concurrency(2)
        .retry_backoff_ms(1)
        .report_sink(Arc::clone(&sink) as Arc<dyn ReportSink>)
        .build()
        .unwrap();

    run(&store, &config).await.unwrap();

    assert_eq!(*sink.begun_with.lock().unwrap(), Some(2));
    assert_eq!(sink.outcomes.lock().unwrap().len(), 2);
    assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
}

// ── Audit mode ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_reports_without_writing_or_calling() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    store.save("1", &doc("1", Some(JAVA_BODY))).unwrap();
    store.save("2", &doc("2", Some(CPP_BODY))).unwrap();
    store.save("3", &doc("3", None)).unwrap();
    let before: Vec<String> = (1..=3)
        .map(|i| std::fs::read_to_string(dir.path().join(format!("{i}.json"))).unwrap())
        .collect();

    let service = StubService::new(StubMode::Error);
    let config = config_with(Arc::clone(&service), 2);
    let report = audit(&store, &config).unwrap();

    assert_eq!(service.calls(), 0);
    assert_eq!(report.stats.already_target, 1);
    assert_eq!(report.stats.needs_rewrite, 1);
    assert_eq!(report.stats.no_content, 1);

    let after: Vec<String> = (1..=3)
        .map(|i| std::fs::read_to_string(dir.path().join(format!("{i}.json"))).unwrap())
        .collect();
    assert_eq!(before, after, "audit must not modify the corpus");
}
