//! Integration tests for the benchmark harness against a scripted provider.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use fleet_bench::bench::{load_results, results_path, BenchError, BenchmarkHarness, HarnessOptions};
use fleet_bench::config::{Host, HostKind};
use fleet_bench::provider::{
    Backend, BackendFactory, CompletionMeta, ModelAdmin, ModelInfo, ProviderError, RunningModel,
    StreamCallbacks, StreamRequest, StreamingProvider,
};

// =============================================================================
// Scripted provider
// =============================================================================

#[derive(Default, Clone)]
struct Script {
    fail_ready: bool,
    /// 1-based stream calls that fail.
    fail_calls: Vec<usize>,
    output_tokens: u64,
    resident: Vec<String>,
    unload_unsupported: bool,
}

struct ScriptedBackend {
    script: Script,
    calls: AtomicUsize,
    unloaded: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl StreamingProvider for ScriptedBackend {
    async fn ensure_model_ready(&self, host: &Host, model: &str) -> Result<(), ProviderError> {
        if self.script.fail_ready {
            return Err(ProviderError::ModelUnavailable {
                host: host.name.clone(),
                model: model.to_string(),
            });
        }
        Ok(())
    }

    async fn stream(
        &self,
        request: &StreamRequest,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Result<(), ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.script.fail_calls.contains(&call) {
            return Err(ProviderError::Format {
                url: request.host.url.clone(),
                reason: format!("scripted failure on call {}", call),
            });
        }
        tokio::time::sleep(Duration::from_millis(3)).await;
        callbacks.on_chunk("Hello")?;
        tokio::time::sleep(Duration::from_millis(2)).await;
        callbacks.on_chunk(", world")?;
        callbacks.on_complete(CompletionMeta {
            eval_count: self.script.output_tokens,
            prompt_eval_count: 12,
        })
    }
}

#[async_trait]
impl ModelAdmin for ScriptedBackend {
    async fn list_models(&self, _host: &Host) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(Vec::new())
    }

    async fn pull_model(&self, _host: &Host, _model: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn delete_model(&self, _host: &Host, _model: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn unload_model(&self, host: &Host, model: &str) -> Result<(), ProviderError> {
        if self.script.unload_unsupported {
            return Err(ProviderError::Unsupported {
                backend: host.kind,
                operation: "unload",
            });
        }
        self.unloaded
            .lock()
            .unwrap()
            .push(format!("{}:{}", host.name, model));
        Ok(())
    }

    async fn running_models(&self, _host: &Host) -> Result<Vec<RunningModel>, ProviderError> {
        Ok(self
            .script
            .resident
            .iter()
            .map(|name| RunningModel {
                name: name.clone(),
                size_vram_bytes: 0,
            })
            .collect())
    }

    async fn model_parameters(&self, _host: &Host, _model: &str) -> Result<serde_json::Value, ProviderError> {
        Ok(serde_json::Value::Null)
    }
}

#[derive(Default)]
struct ScriptedFactory {
    scripts: HashMap<String, Script>,
    broken: Vec<String>,
    unloaded: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFactory {
    fn with(mut self, host: &str, script: Script) -> Self {
        self.scripts.insert(host.to_string(), script);
        self
    }
}

impl BackendFactory for ScriptedFactory {
    fn create(&self, host: &Host) -> Result<Arc<dyn Backend>, ProviderError> {
        if self.broken.contains(&host.name) {
            return Err(ProviderError::Setup(format!("no client for {}", host.name)));
        }
        let script = self.scripts.get(&host.name).cloned().unwrap_or_default();
        Ok(Arc::new(ScriptedBackend {
            script,
            calls: AtomicUsize::new(0),
            unloaded: self.unloaded.clone(),
        }))
    }
}

fn hosts() -> Vec<Host> {
    vec![
        Host::new("gpu1", "http://gpu1:11434", HostKind::Ollama, "model-a"),
        Host::new("gpu2", "http://gpu2:8080", HostKind::LlamaCpp, "model-b"),
    ]
}

fn options(count: usize, dir: &Path) -> HarnessOptions {
    HarnessOptions {
        benchmark_count: count,
        prompt: "Say hello.".to_string(),
        results_dir: dir.to_path_buf(),
    }
}

fn tokens(n: u64) -> Script {
    Script {
        output_tokens: n,
        ..Script::default()
    }
}

// =============================================================================
// Run behavior
// =============================================================================

#[tokio::test]
async fn test_two_hosts_three_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let factory = ScriptedFactory::default().with("gpu1", tokens(40)).with("gpu2", tokens(90));
    let harness = BenchmarkHarness::new(Arc::new(factory), options(3, dir.path()));

    let results = harness.run(&hosts()).await.unwrap();

    assert_eq!(results.len(), 2);
    for (model, host) in [("model-a", "gpu1"), ("model-b", "gpu2")] {
        let result = &results[model];
        assert_eq!(result.host, host);
        assert_eq!(result.benchmark_count, 3);
        assert_eq!(result.iterations.len(), 3);
        let indices: Vec<usize> = result.iterations.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);

        let tps: Vec<f64> = result.iterations.iter().map(|i| i.stats.tokens_per_second).collect();
        let mean = tps.iter().sum::<f64>() / 3.0;
        assert!((result.average.tokens_per_second - mean).abs() < 1e-9);
        assert!(result.min.tokens_per_second <= result.average.tokens_per_second);
        assert!(result.average.tokens_per_second <= result.max.tokens_per_second);

        for it in &result.iterations {
            assert!(it.stats.time_to_first_token_ms > 0.0);
            assert!(it.stats.time_to_first_token_ms <= it.stats.total_execution_time_ms);
            assert_eq!(it.stats.input_tokens, 12);
        }
    }
    assert_eq!(results["model-b"].average.output_tokens, 90);
}

#[tokio::test]
async fn test_failed_readiness_leaves_zero_iteration_entry() {
    let dir = tempfile::tempdir().unwrap();
    let factory = ScriptedFactory::default().with("gpu1", tokens(40)).with(
        "gpu2",
        Script {
            fail_ready: true,
            ..Script::default()
        },
    );
    let harness = BenchmarkHarness::new(Arc::new(factory), options(3, dir.path()));

    let results = harness.run(&hosts()).await.unwrap();

    assert_eq!(results["model-a"].iterations.len(), 3);
    assert!(results["model-a"].average.tokens_per_second > 0.0);
    let failed = &results["model-b"];
    assert!(failed.iterations.is_empty());
    assert_eq!(failed.average.tokens_per_second, 0.0);
    assert_eq!(failed.max.total_execution_time_ms, 0.0);
}

#[tokio::test]
async fn test_factory_failure_is_host_scoped() {
    let dir = tempfile::tempdir().unwrap();
    let factory = ScriptedFactory {
        broken: vec!["gpu1".to_string()],
        ..ScriptedFactory::default()
    }
    .with("gpu2", tokens(10));
    let harness = BenchmarkHarness::new(Arc::new(factory), options(2, dir.path()));

    let results = harness.run(&hosts()).await.unwrap();

    assert!(results["model-a"].iterations.is_empty());
    assert_eq!(results["model-b"].iterations.len(), 2);
}

#[tokio::test]
async fn test_stream_failure_skips_only_that_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let flaky = Script {
        output_tokens: 25,
        fail_calls: vec![2],
        ..Script::default()
    };
    let factory = ScriptedFactory::default().with("gpu1", flaky).with("gpu2", tokens(25));
    let harness = BenchmarkHarness::new(Arc::new(factory), options(4, dir.path()));

    let results = harness.run(&hosts()).await.unwrap();

    let indices: Vec<usize> = results["model-a"].iterations.iter().map(|i| i.index).collect();
    assert_eq!(indices, vec![1, 3, 4]);
    assert_eq!(results["model-a"].benchmark_count, 4);
    assert_eq!(results["model-b"].iterations.len(), 4);
}

#[tokio::test]
async fn test_cancelled_run_still_returns_every_model() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let factory = ScriptedFactory::default().with("gpu1", tokens(5)).with("gpu2", tokens(5));
    let harness = BenchmarkHarness::new(Arc::new(factory), options(3, dir.path())).with_cancellation(token);

    let results = harness.run(&hosts()).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.values().all(|r| r.iterations.is_empty()));
}

#[tokio::test]
async fn test_resident_models_unloaded_before_timing() {
    let dir = tempfile::tempdir().unwrap();
    let unloaded = Arc::new(Mutex::new(Vec::new()));
    let factory = ScriptedFactory {
        unloaded: unloaded.clone(),
        ..ScriptedFactory::default()
    }
    .with(
        "gpu1",
        Script {
            output_tokens: 5,
            resident: vec!["old-1".into(), "old-2".into()],
            ..Script::default()
        },
    )
    .with(
        "gpu2",
        Script {
            output_tokens: 5,
            resident: vec!["served".into()],
            unload_unsupported: true,
            ..Script::default()
        },
    );
    let harness = BenchmarkHarness::new(Arc::new(factory), options(1, dir.path()));

    let results = harness.run(&hosts()).await.unwrap();

    let mut seen = unloaded.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["gpu1:old-1".to_string(), "gpu1:old-2".to_string()]);
    assert_eq!(results["model-b"].iterations.len(), 1);
}

// =============================================================================
// Validation and output
// =============================================================================

#[tokio::test]
async fn test_validation_fails_before_any_host_work() {
    let dir = tempfile::tempdir().unwrap();
    let unloaded = Arc::new(Mutex::new(Vec::new()));
    let factory = ScriptedFactory {
        unloaded: unloaded.clone(),
        ..ScriptedFactory::default()
    }
    .with(
        "gpu1",
        Script {
            resident: vec!["old".into()],
            ..Script::default()
        },
    );
    let harness = BenchmarkHarness::new(Arc::new(factory), options(3, dir.path()));

    let all = hosts();
    let err = harness.run(&all[..1]).await.unwrap_err();
    assert!(matches!(err, BenchError::TooFewHosts(1)));

    let mut two_models = hosts();
    two_models[0].models.push("model-c".into());
    let err = harness.run(&two_models).await.unwrap_err();
    assert!(matches!(err, BenchError::ModelCount { count: 2, .. }));

    assert!(unloaded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_and_write_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results");
    let factory = ScriptedFactory::default().with("gpu1", tokens(20)).with("gpu2", tokens(30));
    let harness = BenchmarkHarness::new(Arc::new(factory), options(2, &out));

    let (path, results) = harness.run_and_write(&hosts()).await.unwrap();

    assert_eq!(path, results_path(&out, &["model-a", "model-b"], 2));
    assert_eq!(path.file_name().unwrap(), "model-a_model-b-2.json");
    assert_eq!(load_results(&path).unwrap(), results);
}
