//! Fuzz target for identifier normalization.

#![no_main]

use libfuzzer_sys::fuzz_target;
use fleet_bench::metrics::{normalize, parse_file_key, BundleKey};
use std::path::Path;

fuzz_target!(|data: &str| {
    let once = normalize(data);
    assert_eq!(normalize(&once), once, "normalize is not idempotent");
    assert!(!once.starts_with('-') && !once.ends_with('-'));

    if let Some((accelerator, model)) = parse_file_key(Path::new(data)) {
        assert!(!accelerator.is_empty() && !model.is_empty());
        let key = BundleKey::new(&accelerator, &model);
        assert_eq!(key, BundleKey::new(&key.accelerator, &key.model));
    }
});
