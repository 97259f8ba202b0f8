//! Unit tests for the shared error type.

use job_caster::AppError;

#[test]
fn display_prefixes_the_failure_domain() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Persistence("x".into()), "persistence: x"),
        (AppError::Slack("x".into()), "slack: x"),
        (AppError::Fetch("x".into()), "fetch: x"),
        (AppError::Extraction("x".into()), "extraction: x"),
        (AppError::Io("x".into()), "io: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn io_errors_convert() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, AppError::Io(msg) if msg == "gone"));
}

#[test]
fn json_errors_are_persistence_errors() {
    let err: AppError = serde_json::from_str::<serde_json::Value>("{")
        .unwrap_err()
        .into();
    assert!(matches!(err, AppError::Persistence(msg) if msg.starts_with("invalid json document")));
}

#[test]
fn toml_errors_are_config_errors() {
    let err: AppError = toml::from_str::<toml::Table>("= nope").unwrap_err().into();
    assert!(matches!(err, AppError::Config(msg) if msg.starts_with("invalid config")));
}
