//! Loading configuration from files on disk.

use docgate_config::{ConfigError, ConfigLoader, LogFormat, Verification};
use std::fs;

fn no_env() -> Vec<(String, String)> {
    Vec::new()
}

#[test]
fn test_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docgate.toml");
    fs::write(
        &path,
        r#"
            [server]
            http_addr = "127.0.0.1:8088"
            max_body_bytes = 1024

            [store]
            uri = "memory://"

            [identity]
            secret_key = "sk_test_toml"
            verification = "rs256"
            public_key_pem = "-----BEGIN PUBLIC KEY-----"

            [telemetry.logging]
            format = "pretty"
        "#,
    )
    .unwrap();

    let config = ConfigLoader::new()
        .with_env_vars(no_env())
        .with_file(&path)
        .unwrap()
        .load()
        .unwrap();

    assert_eq!(config.server.http_addr, "127.0.0.1:8088");
    assert_eq!(config.server.max_body_bytes, 1024);
    assert_eq!(config.server.request_timeout_ms, 30_000);
    assert_eq!(config.identity.verification, Verification::Rs256);
    assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
}

#[test]
fn test_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docgate.json");
    fs::write(
        &path,
        r#"{"store": {"uri": "mongodb://localhost:27017"}, "identity": {"secret_key": "sk"}}"#,
    )
    .unwrap();

    let config = ConfigLoader::new()
        .with_env_vars(no_env())
        .with_file(&path)
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(config.store.uri, "mongodb://localhost:27017");
}

#[test]
fn test_missing_and_unsupported_files() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        ConfigLoader::new().with_file(&missing),
        Err(ConfigError::FileNotFound { .. })
    ));
    assert!(ConfigLoader::new().with_optional_file(&missing).is_ok());

    let yaml = dir.path().join("docgate.yaml");
    fs::write(&yaml, "server: {}").unwrap();
    assert!(matches!(
        ConfigLoader::new().with_file(&yaml),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_typo_in_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docgate.toml");
    fs::write(&path, "[store]\nurl = \"memory://\"\n").unwrap();

    assert!(matches!(
        ConfigLoader::new().with_file(&path),
        Err(ConfigError::TomlError(_))
    ));
}

#[test]
fn test_env_file_layers_under_environment() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join(".env");
    fs::write(
        &env_file,
        "MONGO_URI=mongodb://from-dotenv:27017\n\
         CLERK_SECRET_KEY=sk_from_dotenv\n\
         DOCGATE__SERVER__HTTP_ADDR=127.0.0.1:7000\n",
    )
    .unwrap();

    let config = ConfigLoader::new()
        .with_dotenv_file(&env_file)
        .unwrap()
        .with_env_vars([("DOCGATE__SERVER__HTTP_ADDR", "127.0.0.1:7001")])
        .with_env_prefix("DOCGATE")
        .with_legacy_env()
        .load()
        .unwrap();

    assert_eq!(config.store.uri, "mongodb://from-dotenv:27017");
    assert_eq!(config.identity.secret_key.as_deref(), Some("sk_from_dotenv"));
    assert_eq!(config.server.http_addr, "127.0.0.1:7001");
}

#[test]
fn test_missing_env_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ConfigLoader::new().with_dotenv_file(dir.path().join(".env")),
        Err(ConfigError::FileNotFound { .. })
    ));
}
