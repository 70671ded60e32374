use multiphase_analyzer::utils::error::AnalyzerError;
use multiphase_analyzer::utils::validation::Validate;
use multiphase_analyzer::AnalyzerConfig;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_shipped_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/process_config.toml");
    let config = AnalyzerConfig::from_file(&path).unwrap();

    assert_eq!(config, AnalyzerConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = AnalyzerConfig::load_or_default(temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.controller.scan_time_ms, 100);
    assert_eq!(config.communication.modbus_port, 502);
}

#[test]
fn test_config_file_with_env_substitution() {
    std::env::set_var("ANALYZER_IT_OPCUA_PORT", "48400");

    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[communication]
opcua_port = ${{ANALYZER_IT_OPCUA_PORT}}

[sampling]
interval_secs = 120
duration_secs = 10

[simulation]
seed = 7
process_response = 0.0
"#
    )
    .unwrap();

    let config = AnalyzerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.communication.opcua_port, 48400);
    assert_eq!(config.sampling.interval_secs, 120);
    assert_eq!(config.simulation.seed, Some(7));
    assert!(config.validate().is_ok());

    std::env::remove_var("ANALYZER_IT_OPCUA_PORT");
}

#[test]
fn test_unresolved_variable_is_a_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[controller]\nscan_time_ms = ${{ANALYZER_IT_UNSET_VARIABLE}}").unwrap();

    let err = AnalyzerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, AnalyzerError::ConfigValidationError { .. }));
    assert!(!err.recovery_suggestion().is_empty());
}

#[test]
fn test_unreadable_config_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = AnalyzerConfig::from_file(temp_dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, AnalyzerError::IoError(_)));
}
