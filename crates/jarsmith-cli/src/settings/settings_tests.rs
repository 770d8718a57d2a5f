#![allow(non_snake_case)]

use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn Settings___parse___empty___uses_defaults() {
    let settings = Settings::parse("").unwrap();

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.archive.manifest_name, "META-INF/MANIFEST.MF");
}

#[test]
fn Settings___parse___archive_section___reads_fields() {
    let toml = r#"
[archive]
compression = "store"
reproducible = "2024-01-01T00:00:00Z"
digest_algorithms = ["SHA-256"]
"#;

    let settings = Settings::parse(toml).unwrap();

    assert_eq!(settings.archive.compression, Compression::Store);
    assert_eq!(settings.archive.reproducible.as_deref(), Some("2024-01-01T00:00:00Z"));
    assert_eq!(settings.archive.digest_algorithms, vec!["SHA-256"]);
    assert_eq!(settings.archive.do_not_copy, jarsmith_core::DEFAULT_DO_NOT_COPY);
}

#[test]
fn Settings___parse___unknown_compression___returns_error() {
    let result = Settings::parse("[archive]\ncompression = \"zstd\"\n");

    assert!(result.is_err());
}

#[test]
fn Settings___load___explicit_missing_file___returns_error() {
    let dir = TempDir::new().unwrap();

    let result = Settings::load(Some(&dir.path().join("nope.toml")), dir.path());

    assert!(result.is_err());
}

#[test]
fn Settings___load___finds_default_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(DEFAULT_SETTINGS_FILE), "[archive]\nreproducible = \"true\"\n").unwrap();

    let settings = Settings::load(None, dir.path()).unwrap();

    assert_eq!(settings.archive.reproducible.as_deref(), Some("true"));
}

#[test]
fn Settings___load___no_file___uses_defaults() {
    let dir = TempDir::new().unwrap();

    assert_eq!(Settings::load(None, dir.path()).unwrap(), Settings::default());
}

#[test]
fn Settings___apply___flags_take_precedence() {
    let settings = Settings::parse(
        "[archive]\nreproducible = \"false\"\ndigest_algorithms = [\"MD5\"]\n",
    )
    .unwrap();
    let overrides = Overrides {
        reproducible: Some("1700000000".into()),
        store: true,
        digests: vec!["SHA".into()],
    };

    let config = settings.apply(&overrides);

    assert_eq!(config.reproducible.as_deref(), Some("1700000000"));
    assert_eq!(config.compression, Compression::Store);
    assert_eq!(config.digest_algorithms, vec!["SHA"]);
}

#[test]
fn Settings___apply___no_flags___keeps_file_values() {
    let settings = Settings::parse("[archive]\ndigest_algorithms = [\"MD5\"]\n").unwrap();

    let config = settings.apply(&Overrides::default());

    assert_eq!(config.digest_algorithms, vec!["MD5"]);
    assert_eq!(config.compression, Compression::Deflate);
}

#[test]
fn validate___unknown_digest___returns_error() {
    let mut config = ArchiveConfig::default();
    config.digest_algorithms = vec!["CRC32".into()];

    let err = validate(&config).unwrap_err();

    assert!(err.to_string().contains("CRC32"));
}

#[test]
fn validate___empty_manifest_name___returns_error() {
    let mut config = ArchiveConfig::default();
    config.manifest_name = " ".into();

    assert!(validate(&config).is_err());
}

#[test]
fn validate___defaults___pass() {
    assert!(validate(&ArchiveConfig::default()).is_ok());
}
