//! Corpus ingestion: accuracy logs, benchmark files and metadata documents
//! grouped into per-(accelerator, model) bundles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::bundle::{BundleKey, ModelMetricsBundle};
use super::error::LoadError;
use super::records::{AccuracyRecord, BenchmarkRun, ModelMetadataDocument};
use crate::bench::BenchmarkResults;
use crate::config::AnalyticsConfig;

const ACCURACY_EXTENSIONS: &[&str] = &["jsonl", "ndjson", "json"];
const DOCUMENT_EXTENSIONS: &[&str] = &["json"];

/// Bundles in key order.
pub type BundleMap = BTreeMap<BundleKey, ModelMetricsBundle>;

/// The three corpus directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusDirs {
    pub accuracy: PathBuf,
    pub benchmarks: PathBuf,
    pub metadata: PathBuf,
}

impl From<&AnalyticsConfig> for CorpusDirs {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            accuracy: config.accuracy_dir.clone(),
            benchmarks: config.benchmark_dir.clone(),
            metadata: config.metadata_dir.clone(),
        }
    }
}

/// Split a file name into `(accelerator, model)` on the first `_`.
///
/// Only the last extension is stripped, so `gpu1_llama-3.2-1b.gguf.json` yields
/// `("gpu1", "llama-3.2-1b.gguf")`. Returns `None` unless both parts are non-empty.
pub fn parse_file_key(path: &Path) -> Option<(String, String)> {
    let stem = path.file_stem()?.to_str()?;
    let (accelerator, model) = stem.split_once('_')?;
    if accelerator.is_empty() || model.is_empty() {
        return None;
    }
    Some((accelerator.to_string(), model.to_string()))
}

/// Parse one accuracy log line. Blank lines are the caller's concern.
pub fn parse_accuracy_line(line: &str) -> Result<AccuracyRecord, serde_json::Error> {
    serde_json::from_str(line)
}

/// Accumulates bundles across any number of files. Load only; nothing is computed here.
#[derive(Debug, Default)]
pub struct MetricsLoader {
    bundles: BundleMap,
}

impl MetricsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all three directories and return the bundles.
    pub fn load_dirs(dirs: &CorpusDirs) -> Result<BundleMap, LoadError> {
        let mut loader = Self::new();
        let accuracy = loader.load_accuracy_dir(&dirs.accuracy)?;
        let benchmarks = loader.load_benchmark_dir(&dirs.benchmarks)?;
        let metadata = loader.load_metadata_dir(&dirs.metadata)?;
        tracing::info!(
            accuracy_files = accuracy,
            benchmark_files = benchmarks,
            metadata_files = metadata,
            bundles = loader.bundles.len(),
            "corpus loaded"
        );
        Ok(loader.finish())
    }

    pub fn load_accuracy_dir(&mut self, dir: &Path) -> Result<usize, LoadError> {
        self.load_dir(dir, ACCURACY_EXTENSIONS, Self::load_accuracy_file)
    }

    pub fn load_benchmark_dir(&mut self, dir: &Path) -> Result<usize, LoadError> {
        self.load_dir(dir, DOCUMENT_EXTENSIONS, Self::load_benchmark_file)
    }

    pub fn load_metadata_dir(&mut self, dir: &Path) -> Result<usize, LoadError> {
        self.load_dir(dir, DOCUMENT_EXTENSIONS, Self::load_metadata_file)
    }

    /// Ingest one line-delimited accuracy log. Returns whether the file name matched.
    pub fn load_accuracy_file(&mut self, path: &Path) -> Result<bool, LoadError> {
        let Some((accelerator, model)) = parse_file_key(path) else {
            tracing::debug!(path = %path.display(), "skipping accuracy file with unmatched name");
            return Ok(false);
        };
        let content = read(path)?;

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = parse_accuracy_line(line).map_err(|source| LoadError::AccuracyLine {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })?;
            records.push(record);
        }

        let display = records
            .iter()
            .map(|r| r.model.as_str())
            .find(|m| !m.is_empty())
            .unwrap_or(model.as_str())
            .to_string();
        tracing::debug!(path = %path.display(), records = records.len(), "accuracy log loaded");
        self.bundle_mut(&accelerator, &model, &display).accuracy.extend(records);
        Ok(true)
    }

    /// Ingest one benchmark file.
    ///
    /// A top-level object is the harness's keyed layout; each entry is keyed by its
    /// own host and model, falling back to the file name parts. Anything else must
    /// be a flat [`BenchmarkRun`] array, keyed by the file name.
    pub fn load_benchmark_file(&mut self, path: &Path) -> Result<bool, LoadError> {
        let Some((accelerator, model)) = parse_file_key(path) else {
            tracing::debug!(path = %path.display(), "skipping benchmark file with unmatched name");
            return Ok(false);
        };
        let content = read(path)?;

        let malformed = |source| LoadError::Benchmark {
            path: path.to_path_buf(),
            source,
        };

        // A top-level object can only be the keyed layout; report its own error.
        if content.trim_start().starts_with('{') {
            let results: BenchmarkResults = serde_json::from_str(&content).map_err(malformed)?;
            for (name, result) in &results {
                let entry_accelerator = non_empty_or(&result.host, &accelerator);
                let entry_model = non_empty_or(&result.model, name);
                self.bundle_mut(entry_accelerator, entry_model, entry_model)
                    .benchmarks
                    .extend(BenchmarkRun::from_model_benchmark(result));
            }
            tracing::debug!(path = %path.display(), models = results.len(), "harness results loaded");
            return Ok(true);
        }

        let runs: Vec<BenchmarkRun> = serde_json::from_str(&content).map_err(malformed)?;
        tracing::debug!(path = %path.display(), runs = runs.len(), "benchmark runs loaded");
        self.bundle_mut(&accelerator, &model, &model).benchmarks.extend(runs);
        Ok(true)
    }

    /// Ingest one metadata document. A second document for the same bundle is ignored.
    pub fn load_metadata_file(&mut self, path: &Path) -> Result<bool, LoadError> {
        let Some((accelerator, model)) = parse_file_key(path) else {
            tracing::debug!(path = %path.display(), "skipping metadata file with unmatched name");
            return Ok(false);
        };
        let content = read(path)?;
        let doc: ModelMetadataDocument =
            serde_json::from_str(&content).map_err(|source| LoadError::Metadata {
                path: path.to_path_buf(),
                source,
            })?;

        let display = doc.model.clone().unwrap_or_else(|| model.clone());
        let bundle = self.bundle_mut(&accelerator, &model, &display);
        if bundle.metadata.is_some() {
            tracing::warn!(
                path = %path.display(), bundle = %bundle.key,
                "duplicate metadata document ignored"
            );
        } else {
            bundle.metadata = Some(doc);
        }
        Ok(true)
    }

    pub fn finish(self) -> BundleMap {
        self.bundles
    }

    fn load_dir(
        &mut self,
        dir: &Path,
        extensions: &[&str],
        load: fn(&mut Self, &Path) -> Result<bool, LoadError>,
    ) -> Result<usize, LoadError> {
        let mut loaded = 0;
        for path in list_files(dir, extensions)? {
            if load(self, &path)? {
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Bundle for a key, created on first reference. The display name is only
    /// set at creation.
    fn bundle_mut(&mut self, accelerator: &str, model: &str, display: &str) -> &mut ModelMetricsBundle {
        let key = BundleKey::new(accelerator, model);
        self.bundles
            .entry(key.clone())
            .or_insert_with(|| ModelMetricsBundle::new(key, display))
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Regular files under `dir` with a matching extension, recursively, in path order.
/// A missing directory is an empty corpus.
fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, LoadError> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "corpus directory missing, treating as empty");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|source| LoadError::Read {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Read {
                path: current.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if has_extension(&path, extensions) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_key_first_separator() {
        assert_eq!(
            parse_file_key(Path::new("gpu1_llama-3.2-1b.gguf.json")),
            Some(("gpu1".to_string(), "llama-3.2-1b.gguf".to_string()))
        );
        assert_eq!(
            parse_file_key(Path::new("dir/rtx4090_qwen_2.5.jsonl")),
            Some(("rtx4090".to_string(), "qwen_2.5".to_string()))
        );
    }

    #[test]
    fn test_parse_file_key_rejects_bad_shapes() {
        assert_eq!(parse_file_key(Path::new("no-separator.json")), None);
        assert_eq!(parse_file_key(Path::new("_model.json")), None);
        assert_eq!(parse_file_key(Path::new("gpu1_.json")), None);
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("a_b.JSONL"), ACCURACY_EXTENSIONS));
        assert!(!has_extension(Path::new("a_b.txt"), ACCURACY_EXTENSIONS));
        assert!(!has_extension(Path::new("a_b"), DOCUMENT_EXTENSIONS));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = list_files(&dir.path().join("absent"), DOCUMENT_EXTENSIONS).unwrap();
        assert!(files.is_empty());
    }
}
