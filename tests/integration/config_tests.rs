use dupsweep::config::{Config, ConfigError, Overrides};
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.io_threads, 4);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("DUPSWEEP_KEEP_SINGLE_FILE", "true");
    std::env::set_var("DUPSWEEP_EXECUTION_TIMEOUT_SECS", "120");

    use figment::providers::Env;
    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("DUPSWEEP_"));
    let config: Config = figment.extract().unwrap();

    assert!(config.keep_single_file);
    assert_eq!(config.execution_timeout_secs, Some(120));

    std::env::remove_var("DUPSWEEP_KEEP_SINGLE_FILE");
    std::env::remove_var("DUPSWEEP_EXECUTION_TIMEOUT_SECS");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("dupsweep.toml");

    let toml_content = r#"
targets = ["/data/photos", "/backup/photos"]
search_pattern = "*.jpg"
duplicates_report = "/tmp/dups.txt"
delete_duplicates = true
deletion_masks = ["/backup/*", "*copy*"]
exclusion_masks = ["*/.thumbnails/*"]
keep_single_file = true
io_threads = 2
"#;
    fs::write(&config_path, toml_content).unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    let config: Config = figment.extract().unwrap();

    assert_eq!(
        config.targets,
        vec![PathBuf::from("/data/photos"), PathBuf::from("/backup/photos")]
    );
    assert_eq!(config.search_pattern, "*.jpg");
    assert_eq!(config.deletion_masks, vec!["/backup/*", "*copy*"]);
    assert!(config.keep_single_file);
    assert_eq!(config.io_threads, 2);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_invalid_toml_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("dupsweep.toml");
    fs::write(&config_path, "io_threads = \"many\"").unwrap();

    let result = Config::load(Some(&config_path), &Overrides::default());
    assert!(matches!(result, Err(ConfigError::Figment(_))));
}

#[test]
fn test_cli_overrides_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("dupsweep.toml");
    fs::write(&config_path, "targets = [\"/from/file\"]\nio_threads = 2\n").unwrap();

    let overrides = Overrides {
        targets: vec![PathBuf::from("/from/cli")],
        ..Overrides::default()
    };
    let config = Config::load(Some(&config_path), &overrides).unwrap();

    assert_eq!(config.targets, vec![PathBuf::from("/from/cli")]);
    assert_eq!(config.io_threads, 2);
}
