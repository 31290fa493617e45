// Settings file discovery, loading and saving.
use gradecal::paths::{AppPaths, CONFIG_DIR_ENV, SETTINGS_FILE_NAME};
use gradecal::{EngineConfig, EngineSettings};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn setup_config_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    unsafe {
        env::set_var(CONFIG_DIR_ENV, dir.path());
    }
    dir
}

fn cleanup_config_dir() {
    unsafe {
        env::remove_var(CONFIG_DIR_ENV);
    }
}

#[test]
#[serial]
fn test_settings_path_follows_env_override() {
    let dir = setup_config_dir();
    let path = AppPaths::get_settings_file_path().unwrap();
    assert_eq!(path, dir.path().join(SETTINGS_FILE_NAME));
    cleanup_config_dir();
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let _dir = setup_config_dir();
    let settings = EngineSettings::load_or_default().unwrap();
    assert_eq!(settings, EngineSettings::default());
    cleanup_config_dir();
}

#[test]
#[serial]
fn test_partial_file_keeps_other_defaults() {
    let dir = setup_config_dir();
    fs::write(
        dir.path().join(SETTINGS_FILE_NAME),
        r#"
require_weight = true
class_hours_start = "08:00"

[course_abbreviations]
"Computer Science 101" = ["CS101", "CS"]
"#,
    )
    .unwrap();

    let settings = EngineSettings::load_or_default().unwrap();
    assert!(settings.require_weight);
    assert_eq!(settings.class_hours_start, "08:00");
    assert_eq!(settings.class_hours_end, "22:00");
    assert_eq!(
        settings.course_abbreviations["Computer Science 101"],
        vec!["CS101".to_string(), "CS".to_string()]
    );

    let config = EngineConfig::new(settings).unwrap();
    assert!(config.require_weight());
    cleanup_config_dir();
}

#[test]
#[serial]
fn test_broken_file_is_an_error() {
    let dir = setup_config_dir();
    fs::write(dir.path().join(SETTINGS_FILE_NAME), "require_weight = [oops").unwrap();
    let err = EngineSettings::load_or_default().unwrap_err();
    assert!(!EngineSettings::is_missing_config_error(&err));
    assert!(err.to_string().contains("Failed to parse settings file"));
    cleanup_config_dir();
}

#[test]
#[serial]
fn test_save_then_load() {
    let dir = setup_config_dir();
    let path = dir.path().join(SETTINGS_FILE_NAME);

    let mut settings = EngineSettings::default();
    settings.default_event_reminder = Some(15);
    settings.max_perturbations = 4;
    settings.save(&path).unwrap();

    let loaded = EngineSettings::load(&path).unwrap();
    assert_eq!(loaded, settings);
    assert!(!dir.path().join("engine.toml.tmp").exists());
    cleanup_config_dir();
}

#[test]
fn test_load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineSettings::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(EngineSettings::is_missing_config_error(&err));
}
