//! In-memory endpoints for exercising the migration engine.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use native_migrate::{ByteStream, DestinationEndpoint, Filter, MigrateError, Prompt, Result, SourceEndpoint};

/// Decrements the active-export gauge when the export stream is dropped.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockSource {
    addr: String,
    tenants: Vec<String>,
    metrics: Vec<String>,
    chunks: usize,
    chunk_size: usize,
    chunk_delay: Duration,
    failures: Mutex<HashMap<String, u32>>,
    exports: AtomicUsize,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    requests: Mutex<Vec<(String, Filter)>>,
    listings: Mutex<Vec<Filter>>,
}

impl MockSource {
    pub fn new(metrics: &[&str]) -> Self {
        Self {
            addr: "http://source:8428".into(),
            tenants: Vec::new(),
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            chunks: 4,
            chunk_size: 10,
            chunk_delay: Duration::ZERO,
            failures: Mutex::new(HashMap::new()),
            exports: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
            listings: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tenants(mut self, tenants: &[&str]) -> Self {
        self.tenants = tenants.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Each export yields `chunks` chunks of `chunk_size` bytes, `delay` apart.
    pub fn with_payload(mut self, chunks: usize, chunk_size: usize, delay: Duration) -> Self {
        self.chunks = chunks;
        self.chunk_size = chunk_size;
        self.chunk_delay = delay;
        self
    }

    /// Fail the first `n` exports of `metric`.
    pub fn failing(self, metric: &str, n: u32) -> Self {
        self.failures.lock().unwrap().insert(metric.to_string(), n);
        self
    }

    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn bytes_per_shard(&self) -> u64 {
        (self.chunks * self.chunk_size) as u64
    }

    pub fn requests(&self) -> Vec<(String, Filter)> {
        self.requests.lock().unwrap().clone()
    }

    /// Filters passed to metric listing.
    pub fn listings(&self) -> Vec<Filter> {
        self.listings.lock().unwrap().clone()
    }
}

/// Metric name from a `__name__="..."` matcher.
pub fn metric_of(filter: &Filter) -> String {
    let expr = &filter.match_expr;
    let start = expr.find("__name__=\"").map(|i| i + "__name__=\"".len()).unwrap_or(0);
    let end = expr[start..].find('"').map(|i| start + i).unwrap_or(expr.len());
    expr[start..end].to_string()
}

#[async_trait]
impl SourceEndpoint for MockSource {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn discover_tenants(&self, _filter: &Filter) -> Result<Vec<String>> {
        Ok(self.tenants.clone())
    }

    async fn list_metric_names(&self, filter: &Filter, _tenant: &str) -> Result<Vec<String>> {
        self.listings.lock().unwrap().push(filter.clone());
        Ok(self.metrics.clone())
    }

    async fn open_export_stream(&self, url: &str, filter: &Filter) -> Result<ByteStream> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), filter.clone()));

        let metric = metric_of(filter);
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&metric) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MigrateError::endpoint(url, "injected export failure"));
            }
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let guard = ActiveGuard(self.active.clone());

        let chunk = Bytes::from(vec![b'x'; self.chunk_size]);
        let delay = self.chunk_delay;
        let stream = futures::stream::unfold(
            (self.chunks, guard),
            move |(left, guard)| {
                let chunk = chunk.clone();
                async move {
                    if left == 0 {
                        return None;
                    }
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Some((Ok(chunk), (left - 1, guard)))
                }
            },
        );
        Ok(stream.boxed())
    }
}

#[derive(Default)]
pub struct MockDestination {
    imports: Mutex<Vec<(String, usize)>>,
}

impl MockDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn imports(&self) -> Vec<(String, usize)> {
        self.imports.lock().unwrap().clone()
    }

    pub fn total_bytes(&self) -> u64 {
        self.imports().iter().map(|(_, n)| *n as u64).sum()
    }
}

#[async_trait]
impl DestinationEndpoint for MockDestination {
    fn addr(&self) -> &str {
        "http://destination:8428"
    }

    async fn import_stream(&self, url: &str, body: ByteStream) -> Result<()> {
        let len = body
            .try_fold(0usize, |acc, chunk| async move { Ok(acc + chunk.len()) })
            .await?;
        self.imports.lock().unwrap().push((url.to_string(), len));
        Ok(())
    }
}

/// Answers every question with `answer` and records the questions.
pub struct ScriptedPrompt {
    answer: bool,
    questions: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, question: &str) -> bool {
        self.questions.lock().unwrap().push(question.to_string());
        self.answer
    }
}
