//! Per-host benchmark workers.
//!
//! Each host gets one spawned worker that owns its result record outright and
//! sends it back once over an mpsc channel. The parent drains the channel, so no
//! result is ever shared between tasks.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use super::{
    results_path, write_results, BenchError, BenchmarkResults, Iteration, ModelBenchmark, Stats,
};
use crate::config::{BenchConfig, Host, DEFAULT_PROMPT};
use crate::provider::{
    Backend, BackendFactory, ChatMessage, CompletionMeta, ProviderError, StreamCallbacks,
    StreamRequest,
};
use crate::telemetry::{self, BenchSpan, SpanExt};

/// Run parameters for the harness.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub benchmark_count: usize,
    pub prompt: String,
    pub results_dir: PathBuf,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            benchmark_count: 5,
            prompt: DEFAULT_PROMPT.to_string(),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl HarnessOptions {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            benchmark_count: config.benchmark_count,
            prompt: config.prompt.clone(),
            results_dir: config.results_dir.clone(),
        }
    }
}

/// Check run preconditions. Nothing is contacted before this passes.
pub fn validate_hosts(hosts: &[Host], benchmark_count: usize) -> Result<(), BenchError> {
    if benchmark_count == 0 {
        return Err(BenchError::ZeroIterations);
    }
    if hosts.len() < 2 {
        return Err(BenchError::TooFewHosts(hosts.len()));
    }

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for host in hosts {
        let [model] = host.models.as_slice() else {
            return Err(BenchError::ModelCount {
                host: host.name.clone(),
                count: host.models.len(),
            });
        };
        if let Some(first) = owners.insert(model.as_str(), host.name.as_str()) {
            return Err(BenchError::DuplicateModel {
                model: model.clone(),
                first: first.to_string(),
                second: host.name.clone(),
            });
        }
    }
    Ok(())
}

/// Drives timed probes against a fleet of hosts.
pub struct BenchmarkHarness {
    factory: Arc<dyn BackendFactory>,
    options: HarnessOptions,
    cancel: CancellationToken,
}

impl BenchmarkHarness {
    pub fn new(factory: Arc<dyn BackendFactory>, options: HarnessOptions) -> Self {
        Self {
            factory,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop starting new iterations once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &HarnessOptions {
        &self.options
    }

    /// Run every host's iterations in parallel and aggregate per model.
    ///
    /// Host and iteration failures are logged; every configured model still gets
    /// an entry, with zero iterations if its host never got going.
    pub async fn run(&self, hosts: &[Host]) -> Result<BenchmarkResults, BenchError> {
        let count = self.options.benchmark_count;
        validate_hosts(hosts, count)?;

        let backends: Vec<(Host, Result<Arc<dyn Backend>, ProviderError>)> = hosts
            .iter()
            .map(|host| (host.clone(), self.factory.create(host)))
            .collect();

        unload_fleet(&backends).await;

        // Seeded so a worker that dies still leaves an entry behind.
        let mut results: BenchmarkResults = hosts
            .iter()
            .map(|h| {
                let model = h.models[0].clone();
                let record = ModelBenchmark::empty(model.clone(), h.name.clone(), count);
                (model, record)
            })
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel::<ModelBenchmark>();
        let mut workers = Vec::with_capacity(backends.len());
        for (host, backend) in backends {
            let worker = HostWorker {
                model: host.models[0].clone(),
                host,
                prompt: self.options.prompt.clone(),
                count,
                cancel: self.cancel.clone(),
            };
            let span = BenchSpan::host(&worker.host.name, &worker.model);
            let tx = tx.clone();
            workers.push(tokio::spawn(
                async move {
                    let record = worker.run(backend).await;
                    // The receiver outlives every worker.
                    let _ = tx.send(record);
                }
                .instrument(span),
            ));
        }
        drop(tx);

        while let Some(record) = rx.recv().await {
            results.insert(record.model.clone(), record);
        }
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "benchmark worker panicked");
            }
        }

        for record in results.values_mut() {
            record.finalize();
        }
        Ok(results)
    }

    /// [`run`](Self::run), then write the results file. Returns its path.
    pub async fn run_and_write(
        &self,
        hosts: &[Host],
    ) -> Result<(PathBuf, BenchmarkResults), BenchError> {
        let results = self.run(hosts).await?;
        let models: Vec<&str> = hosts.iter().map(|h| h.models[0].as_str()).collect();
        let path = results_path(&self.options.results_dir, &models, self.options.benchmark_count);
        write_results(&path, &results).await?;
        tracing::info!(path = %path.display(), models = results.len(), "benchmark results written");
        Ok((path, results))
    }
}

/// Unload whatever is resident on every reachable host so each model starts cold.
async fn unload_fleet(backends: &[(Host, Result<Arc<dyn Backend>, ProviderError>)]) {
    let tasks = backends
        .iter()
        .filter_map(|(host, backend)| backend.as_ref().ok().map(|b| unload_host(host, b.as_ref())));
    futures::future::join_all(tasks).await;
}

async fn unload_host(host: &Host, backend: &dyn Backend) {
    let running = match backend.running_models(host).await {
        Ok(running) => running,
        Err(e) => {
            log_admin_failure(host, "running_models", &e);
            return;
        }
    };
    for model in running {
        match backend.unload_model(host, &model.name).await {
            Ok(()) => tracing::info!(host = %host.name, model = %model.name, "unloaded model"),
            Err(e) if e.is_unsupported() => {
                log_admin_failure(host, "unload", &e);
                return;
            }
            Err(e) => log_admin_failure(host, "unload", &e),
        }
    }
}

fn log_admin_failure(host: &Host, operation: &str, error: &ProviderError) {
    if error.is_unsupported() {
        tracing::debug!(host = %host.name, operation, "skipped: {}", error);
    } else {
        tracing::warn!(host = %host.name, operation, error = %error, "pre-run unload failed");
    }
}

struct HostWorker {
    host: Host,
    model: String,
    prompt: String,
    count: usize,
    cancel: CancellationToken,
}

impl HostWorker {
    async fn run(self, backend: Result<Arc<dyn Backend>, ProviderError>) -> ModelBenchmark {
        let mut record = ModelBenchmark::empty(self.model.clone(), self.host.name.clone(), self.count);
        let span = Span::current();

        let prepared = match backend {
            Ok(backend) => backend
                .ensure_model_ready(&self.host, &self.model)
                .await
                .map(|()| backend),
            Err(e) => Err(e),
        };
        span.record_result(&prepared);
        let backend = match prepared {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(
                    host = %self.host.name, model = %self.model, error = %e,
                    "host not ready, skipping its iterations"
                );
                telemetry::record_host_failure(&self.host.name);
                span.record("iterations", 0u64);
                return record;
            }
        };

        let request = StreamRequest {
            host: self.host.clone(),
            model: self.model.clone(),
            history: vec![ChatMessage::user(self.prompt.as_str())],
        };

        for index in 1..=self.count {
            if self.cancel.is_cancelled() {
                tracing::info!(host = %self.host.name, completed = record.iterations.len(), "run cancelled");
                break;
            }
            match run_iteration(backend.as_ref(), &request).await {
                Ok(stats) => {
                    telemetry::record_iteration_success(
                        &self.model,
                        stats.time_to_first_token_ms,
                        stats.total_execution_time_ms,
                    );
                    tracing::debug!(
                        host = %self.host.name, iteration = index,
                        tokens_per_second = stats.tokens_per_second, "iteration complete"
                    );
                    record.iterations.push(Iteration { index, stats });
                }
                Err(e) => {
                    telemetry::record_iteration_failure(&self.model);
                    tracing::warn!(
                        host = %self.host.name, model = %self.model, iteration = index, error = %e,
                        "iteration failed, skipping"
                    );
                }
            }
        }

        span.record("iterations", record.iterations.len() as u64);
        record
    }
}

async fn run_iteration(backend: &dyn Backend, request: &StreamRequest) -> Result<Stats, ProviderError> {
    let mut probe = IterationProbe::start();
    backend.stream(request, &mut probe).await?;
    Ok(probe.finish())
}

/// Turns stream callbacks into one [`Stats`] sample.
struct IterationProbe {
    started: Instant,
    first_chunk: Option<Duration>,
    meta: Option<CompletionMeta>,
}

impl IterationProbe {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            first_chunk: None,
            meta: None,
        }
    }

    fn finish(self) -> Stats {
        stats_from(self.started.elapsed(), self.first_chunk, self.meta.unwrap_or_default())
    }
}

impl StreamCallbacks for IterationProbe {
    fn on_chunk(&mut self, _chunk: &str) -> Result<(), ProviderError> {
        if self.first_chunk.is_none() {
            self.first_chunk = Some(self.started.elapsed());
        }
        Ok(())
    }

    fn on_complete(&mut self, meta: CompletionMeta) -> Result<(), ProviderError> {
        self.meta = Some(meta);
        Ok(())
    }
}

/// Tokens/sec is output tokens over the whole wall-clock duration. No first chunk
/// means no TTFT was observed; it is recorded as zero.
fn stats_from(elapsed: Duration, first_chunk: Option<Duration>, meta: CompletionMeta) -> Stats {
    let total_secs = elapsed.as_secs_f64();
    let tokens_per_second = if total_secs > 0.0 {
        meta.eval_count as f64 / total_secs
    } else {
        0.0
    };
    Stats {
        total_execution_time_ms: total_secs * 1000.0,
        time_to_first_token_ms: first_chunk.map_or(0.0, |d| d.as_secs_f64() * 1000.0),
        tokens_per_second,
        input_tokens: meta.prompt_eval_count,
        output_tokens: meta.eval_count,
    }
}
