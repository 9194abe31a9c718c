use fake_profile_detector::feature_codec::FeatureSchema;
use fake_profile_detector::gender::{GenderInferer, GenderLabel, NameTable};
use fake_profile_detector::models::ArtifactSchema;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[allow(dead_code)]
pub fn shipped_models_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("models")
}

#[allow(dead_code)]
pub fn shipped_name_table() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data/names.csv")
}

/// Forest with a single leaf: always answers `probability`
#[allow(dead_code)]
pub fn write_constant_model(dir: &Path, model_id: &str, probability: f64) {
    let body = json!({
        "model_id": model_id,
        "family": "random_forest",
        "version": "test",
        "schema": ArtifactSchema::from(&FeatureSchema::v1()),
        "params": {"trees": [{"nodes": [{"fake_probability": probability}]}]}
    });
    std::fs::write(dir.join(format!("{model_id}.json")), body.to_string()).unwrap();
}

#[allow(dead_code)]
pub fn small_inferer() -> GenderInferer {
    let table = NameTable::from_pairs([
        ("maria", GenderLabel::Female),
        ("john", GenderLabel::Male),
    ]);
    GenderInferer::new(Arc::new(table))
}
