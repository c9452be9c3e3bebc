use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use docqa_core::config::{resolve_with_base, Config, LlmProvider, Pooling, Settings};
use docqa_core::Error;
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;

#[test]
fn defaults_apply_without_config_files() {
    let tmp = TempDir::new().unwrap();
    let settings = Config::load_in(tmp.path()).unwrap().settings().expect("settings");
    assert_eq!(settings.chunking.chunk_size, 1000);
    assert_eq!(settings.chunking.chunk_overlap, 200);
    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.embedding.pooling, Pooling::Cls);
    assert_eq!(settings.llm.provider, LlmProvider::Groq);
    assert!((settings.llm.temperature - 0.1).abs() < f32::EPSILON);
    assert_eq!(settings.data.index_dir, tmp.path().join("vectorstore/index"));
}

#[test]
fn settings_from_figment_keep_relative_paths() {
    let settings = settings_from("").unwrap();
    assert_eq!(settings.data.source_dir, PathBuf::from("data/pdfs"));
    assert_eq!(settings.data.index_dir, PathBuf::from("vectorstore/index"));
    assert_eq!(settings.embedding.model_dir, None);
}

#[test]
fn configured_paths_expand_variables_and_home() {
    std::env::set_var("DOCQA_TEST_INDEX_ROOT", "/var/docqa");
    let settings = settings_from(
        "[data]\nsource_dir = \"~/docs\"\nindex_dir = \"${DOCQA_TEST_INDEX_ROOT}/idx\"\n\n[embedding]\nmodel_dir = \"$DOCQA_TEST_INDEX_ROOT/models\"\n",
    )
    .unwrap();
    assert_eq!(settings.data.index_dir, PathBuf::from("/var/docqa/idx"));
    assert_eq!(settings.embedding.model_dir, Some(PathBuf::from("/var/docqa/models")));
    assert!(!settings.data.source_dir.starts_with("~"), "got {:?}", settings.data.source_dir);
    assert!(settings.data.source_dir.ends_with("docs"));
}

#[test]
fn relative_paths_in_a_config_dir_resolve_against_it() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[data]\nsource_dir = \"pdfs\"\nindex_dir = \"/abs/index\"\n").unwrap();
    let settings = Config::load_in(tmp.path()).unwrap().settings().unwrap();
    assert_eq!(settings.data.source_dir, tmp.path().join("pdfs"));
    assert_eq!(settings.data.index_dir, PathBuf::from("/abs/index"));
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[chunking]\nchunk_size = 400\nchunk_overlap = 50\n\n[llm]\nprovider = \"ollama\"\nmodel = \"llama3\"\n",
    )
    .unwrap();
    let config = Config::load_in(tmp.path()).unwrap();
    let settings = config.settings().expect("settings");
    assert_eq!(settings.chunking.chunk_size, 400);
    assert_eq!(settings.chunking.chunk_overlap, 50);
    assert_eq!(settings.llm.provider, LlmProvider::Ollama);
    assert_eq!(config.get::<String>("llm.model").unwrap(), "llama3");
    assert_eq!(settings.retrieval.top_k, 5, "untouched keys keep defaults");
}

fn settings_from(toml: &str) -> Result<Settings, Error> {
    let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
    Config::from_figment(figment).settings()
}

#[test]
fn overlap_not_smaller_than_size_is_rejected() {
    let err = settings_from("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
}

#[test]
fn zero_top_k_is_rejected() {
    let err = settings_from("[retrieval]\ntop_k = 0\n").unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn nan_or_negative_temperature_is_rejected() {
    for value in ["nan", "-0.5", "inf"] {
        let err = settings_from(&format!("[llm]\ntemperature = {value}\n")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{value}: got {err:?}");
    }
}

#[test]
fn unknown_provider_is_a_configuration_error() {
    let err = settings_from("[llm]\nprovider = \"mystery\"\n").unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn missing_key_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let config = Config::load_in(tmp.path()).unwrap();
    assert!(matches!(config.get::<String>("no.such.key"), Err(Error::Configuration(_))));
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = Path::new("/srv/docqa");
    assert_eq!(resolve_with_base(base, "vectorstore/index"), PathBuf::from("/srv/docqa/vectorstore/index"));
    assert_eq!(resolve_with_base(base, "/abs/index"), PathBuf::from("/abs/index"));
}
