//! Unit tests for configuration parsing and validation.

use std::path::PathBuf;

use job_caster::config::{parse_team_channel_ids, GlobalConfig};
use job_caster::models::Team;
use job_caster::AppError;

const CHANNELS: &str = r#"
[channels]
art = "C_ART"
game_design = "C_DESIGN"
dev = "C_DEV"
others = "C_OTHERS"
"#;

fn config_err(toml: &str) -> String {
    match GlobalConfig::from_toml_str(toml) {
        Err(AppError::Config(msg)) => msg,
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn minimal_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str(CHANNELS).expect("config parses");

    assert_eq!(config.data_dir, PathBuf::from("data"));
    assert_eq!(config.command, "/jobbot");
    assert_eq!(config.max_scrape_bytes, 600_000);
    assert_eq!(config.max_image_bytes, 5_000_000);
    assert_eq!(config.request_timeout_seconds, 30);
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.resume_pause_millis, 1000);
    assert_eq!(config.health.port, 8080);
    assert_eq!(config.openai.model, "gpt-5.1-mini");
    assert_eq!(config.openai.image_model(), "gpt-5.1-mini");
    assert_eq!(config.channel_for(Team::GameDesign), Some("C_DESIGN"));
}

#[test]
fn storage_paths_live_under_data_dir() {
    let toml = format!("data_dir = '/srv/jobs'\n{CHANNELS}");
    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.history_path(), PathBuf::from("/srv/jobs/posted_jobs.log"));
    assert_eq!(config.ledger_path(), PathBuf::from("/srv/jobs/pending_requests.json"));
}

#[test]
fn explicit_image_model_is_used() {
    let toml = format!("[openai]\nmodel = \"m-text\"\nimage_model = \"m-vision\"\n{CHANNELS}");
    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.openai.model, "m-text");
    assert_eq!(config.openai.image_model(), "m-vision");
}

#[test]
fn every_missing_team_channel_is_reported_at_once() {
    let msg = config_err("[channels]\nart = \"C_ART\"\ndev = \"  \"\n");

    assert!(msg.contains("Missing: game_design, dev, others"), "{msg}");
}

#[test]
fn unknown_team_in_channels_is_rejected() {
    let msg = config_err(&format!("{CHANNELS}narrative = \"C_X\"\n"));

    assert!(msg.contains("unknown team 'narrative'"), "{msg}");
}

#[test]
fn command_must_start_with_slash() {
    let msg = config_err(&format!("command = \"jobbot\"\n{CHANNELS}"));

    assert!(msg.contains("slash command"), "{msg}");
}

#[test]
fn zero_attempts_is_rejected() {
    let msg = config_err(&format!("max_attempts = 0\n{CHANNELS}"));

    assert!(msg.contains("max_attempts"), "{msg}");
}

#[test]
fn invalid_toml_is_a_config_error() {
    let msg = config_err("max_attempts = \"three\"");

    assert!(msg.starts_with("invalid config"), "{msg}");
}

#[test]
fn channel_id_list_parses_and_skips_blank_items() {
    let parsed = parse_team_channel_ids("art:C1, dev : C3 ,,bogus, others:").expect("parses");

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed.get(&Team::Art).map(String::as_str), Some("C1"));
    assert_eq!(parsed.get(&Team::Dev).map(String::as_str), Some("C3"));
}

#[test]
fn channel_id_list_rejects_unknown_team() {
    let result = parse_team_channel_ids("art:C1,sound:C9");

    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("sound")));
}

#[test]
#[serial_test::serial]
fn env_overlay_fills_channels_and_models() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[channels]\nart = \"C_ART\"\n").expect("write config");

    std::env::set_var("JOB_TEAM_CHANNEL_IDS", "game_design:C_D,dev:C_V,others:C_O,art:C_ART2");
    std::env::set_var("OPENAI_MODEL", "model-from-env");
    let result = GlobalConfig::load_from_path(&path);
    std::env::remove_var("JOB_TEAM_CHANNEL_IDS");
    std::env::remove_var("OPENAI_MODEL");

    let config = result.expect("config loads");
    assert_eq!(config.channel_for(Team::Art), Some("C_ART2"));
    assert_eq!(config.channel_for(Team::Others), Some("C_O"));
    assert_eq!(config.openai.model, "model-from-env");
}

#[test]
#[serial_test::serial]
fn env_overlay_sets_numeric_limits() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, CHANNELS).expect("write config");

    std::env::set_var("OPENAI_TEMPERATURE", "0.7");
    std::env::set_var("MAX_SCRAPE_BYTES", "1000");
    std::env::set_var("MAX_IMAGE_BYTES", " 2000 ");
    std::env::set_var("REQUEST_TIMEOUT", "9");
    std::env::set_var("RESPONSE_TIMEOUT", "45");
    let result = GlobalConfig::load_from_path(&path);
    for key in ["OPENAI_TEMPERATURE", "MAX_SCRAPE_BYTES", "MAX_IMAGE_BYTES", "REQUEST_TIMEOUT", "RESPONSE_TIMEOUT"] {
        std::env::remove_var(key);
    }

    let config = result.expect("config loads");
    assert!((config.openai.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.max_scrape_bytes, 1000);
    assert_eq!(config.max_image_bytes, 2000);
    assert_eq!(config.request_timeout_seconds, 9);
    assert_eq!(config.openai.response_timeout_seconds, 45);
}

#[test]
#[serial_test::serial]
fn malformed_numeric_env_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, CHANNELS).expect("write config");

    std::env::set_var("MAX_SCRAPE_BYTES", "lots");
    let result = GlobalConfig::load_from_path(&path);
    std::env::remove_var("MAX_SCRAPE_BYTES");

    match result {
        Err(AppError::Config(msg)) => assert!(msg.contains("MAX_SCRAPE_BYTES"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
#[serial_test::serial]
fn missing_config_file_is_a_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let result = GlobalConfig::load_from_path(temp.path().join("absent.toml"));

    assert!(matches!(result, Err(AppError::Config(_))));
}
