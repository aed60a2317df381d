//! Bundle keys and the per-(accelerator, model) unit of analysis.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::aggregates::DerivedAggregates;
use super::records::{AccuracyRecord, BenchmarkRun, ModelMetadataDocument};

/// Model-file extensions dropped during normalization.
const MODEL_EXTENSIONS: &[&str] = &[".gguf", ".ggml", ".bin", ".safetensors", ".onnx", ".pth", ".pt"];

fn non_alnum_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap())
}

/// Canonical form of an accelerator or model identifier.
///
/// Trims, lower-cases, strips one known model-file extension, collapses every
/// non-alphanumeric run to `-` and trims `-` from both ends. Idempotent.
pub fn normalize(id: &str) -> String {
    let lowered = id.trim().to_lowercase();
    let stem = MODEL_EXTENSIONS
        .iter()
        .find_map(|ext| lowered.strip_suffix(ext))
        .unwrap_or(&lowered);
    non_alnum_run()
        .replace_all(stem, "-")
        .trim_matches('-')
        .to_string()
}

/// Normalized (accelerator, model) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BundleKey {
    pub accelerator: String,
    pub model: String,
}

impl BundleKey {
    pub fn new(accelerator: &str, model: &str) -> Self {
        Self {
            accelerator: normalize(accelerator),
            model: normalize(model),
        }
    }
}

impl fmt::Display for BundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.accelerator, self.model)
    }
}

/// All records for one (accelerator, model) pair.
///
/// Records accumulate only while loading; `aggregates` is filled once after the
/// whole corpus is in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetricsBundle {
    pub key: BundleKey,
    /// Display name from the first source that named the model.
    pub model_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub accuracy: Vec<AccuracyRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub benchmarks: Vec<BenchmarkRun>,
    pub metadata: Option<ModelMetadataDocument>,
    pub aggregates: Option<DerivedAggregates>,
}

impl ModelMetricsBundle {
    pub fn new(key: BundleKey, model_name: impl Into<String>) -> Self {
        Self {
            key,
            model_name: model_name.into(),
            accuracy: Vec::new(),
            benchmarks: Vec::new(),
            metadata: None,
            aggregates: None,
        }
    }

    /// Computed aggregates, or zero values before the compute pass.
    pub fn derived(&self) -> DerivedAggregates {
        self.aggregates.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_extension_and_collapses() {
        assert_eq!(normalize("Llama-3.2-1B.gguf"), "llama-3-2-1b");
        assert_eq!(normalize("  qwen2.5:7b__Q4_K_M  "), "qwen2-5-7b-q4-k-m");
        assert_eq!(normalize("--GPU 1--"), "gpu-1");
        assert_eq!(normalize("model.safetensors"), "model");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in ["Llama-3.2-1B.gguf", "x.GGUF.gguf", "a__b..c", "Ünïcode-Model", "-_-", "m.pt"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "input {:?}", raw);
        }
    }

    #[test]
    fn test_keys_merge_on_normalized_form() {
        assert_eq!(BundleKey::new("GPU1", "Llama-3.2-1B.gguf"), BundleKey::new("gpu1", "llama 3.2 1b"));
        assert_eq!(BundleKey::new("gpu1", "m").to_string(), "gpu1/m");
    }
}
