//! Integration tests for logging bootstrap

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_second_initialization_is_rejected() {
    // The global subscriber can only be installed once per process.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    init_logging(config.clone()).expect("first initialization succeeds");

    tracing::info!(provider = "dropbox", "logging initialized");

    match init_logging(config) {
        Err(Error::Config(message)) => assert!(message.contains("Failed to initialize logging")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_invalid_filter_is_a_config_error() {
    let config = LoggingConfig::default().with_filter("core_sync=notalevel");

    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_credentials_never_survive_redaction() {
    for field in ["access_token", "refresh_token", "client_secret", "Authorization"] {
        assert_eq!(redact_if_sensitive(field, "value"), "[REDACTED]");
    }
    assert_eq!(redact_if_sensitive("photo_id", "42"), "42");
}

#[test]
fn test_photo_paths_are_reduced_to_file_names() {
    assert_eq!(
        strip_path("/var/mobile/Containers/Data/Application/ABC/Documents/IMG_0042.HEIC"),
        "IMG_0042.HEIC"
    );
}
