//! Config loading + validation round-trips without any external services.

use std::io::Write;

use cp_domain::config::{Config, ConfigSeverity};

#[test]
fn defaults_are_sane() {
    let config = Config::default();
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.llm.timeout_sec, 60);
    assert_eq!(config.retrieval.collection, "cs_guideline");
    assert_eq!(config.retrieval.dense_vector, "dense");
    assert_eq!(config.retrieval.sparse_vector, "sparse");
    assert_eq!(config.backoffice.profile_timeout_sec, 5);
    assert_eq!(config.backoffice.archive_timeout_sec, 10);
    assert!(!config.llm.allow_plain_fallback);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let config = Config::load(Some(std::path::Path::new("/nonexistent/callpilot.toml"))).unwrap();
    assert_eq!(config.server.port, 8000);
}

#[test]
fn partial_toml_overrides_only_named_fields() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[server]
port = 9100

[llm]
model = "gpt-4o"
"#
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.llm.model, "gpt-4o");
    // Untouched sections keep their defaults.
    assert_eq!(config.llm.fast_model, "gpt-4o-mini");
    assert_eq!(config.retrieval.category_key, "metadata.category");
}

#[test]
fn zero_llm_timeout_is_an_error() {
    let mut config = Config::default();
    config.llm.timeout_sec = 0;
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error && i.field == "llm.timeout_sec"));
}

#[test]
fn empty_retrieval_url_is_only_a_warning() {
    let config = Config::default();
    let issues = config.validate();
    let retrieval: Vec<_> = issues
        .iter()
        .filter(|i| i.field == "retrieval.url")
        .collect();
    assert_eq!(retrieval.len(), 1);
    assert_eq!(retrieval[0].severity, ConfigSeverity::Warning);
}
