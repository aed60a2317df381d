//! Results file naming and persistence.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::{BenchError, BenchmarkResults};

fn non_slug_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9_]+").unwrap())
}

/// File-name-safe form of a model name.
///
/// Lower-cases, maps `:` to `_`, replaces every run outside `[a-z0-9_]` with a
/// single `-` (which also collapses repeated `-`), then trims `-` and `_` from both ends.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase().replace(':', "_");
    let dashed = non_slug_run().replace_all(&lowered, "-");
    dashed.trim_matches(|c: char| c == '-' || c == '_').to_string()
}

/// `<results_dir>/<slug>_<slug>...-<count>.json`, slugs in the given model order.
pub fn results_path<S: AsRef<str>>(results_dir: &Path, models: &[S], count: usize) -> PathBuf {
    let slugs: Vec<String> = models.iter().map(|m| slugify(m.as_ref())).collect();
    results_dir.join(format!("{}-{}.json", slugs.join("_"), count))
}

/// Write results as pretty JSON, creating the directory if needed.
pub async fn write_results(path: &Path, results: &BenchmarkResults) -> Result<(), BenchError> {
    let json = serde_json::to_vec_pretty(results)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| BenchError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|source| BenchError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Read a results file back.
pub fn load_results(path: &Path) -> Result<BenchmarkResults, BenchError> {
    let content = std::fs::read(path).map_err(|source| BenchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::ModelBenchmark;

    #[test]
    fn test_slugify_colon_and_spaces() {
        assert_eq!(slugify("Model:One"), "model_one");
        assert_eq!(slugify("  Model Two  "), "model-two");
    }

    #[test]
    fn test_slugify_collapses_and_trims() {
        assert_eq!(slugify("llama3.2:1b-instruct-q4_K_M"), "llama3-2_1b-instruct-q4_k_m");
        assert_eq!(slugify("--a//b--"), "a-b");
        assert_eq!(slugify(":x:"), "x");
        assert_eq!(slugify("a - - b"), "a-b");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_results_path_pattern() {
        let path = results_path(Path::new("out"), &["llama3.2:1b", "Qwen 2.5"], 3);
        assert_eq!(path, PathBuf::from("out/llama3-2_1b_qwen-2-5-3.json"));
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/run-3.json");
        let mut results = BenchmarkResults::new();
        results.insert("m1".into(), ModelBenchmark::empty("m1", "gpu1", 3));

        write_results(&path, &results).await.unwrap();
        let loaded = load_results(&path).unwrap();
        assert_eq!(loaded, results);
    }
}
