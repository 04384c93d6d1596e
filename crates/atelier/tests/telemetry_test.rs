//! Tests for subscriber installation.

use atelier::{DEFAULT_LOG_FILTER, FailureKind, TelemetryConfig, init_telemetry};

#[test]
fn bad_filter_is_a_configuration_error() {
    let config = TelemetryConfig::default().with_log_level("atelier=notalevel");
    let err = init_telemetry(&config).unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::Configuration);
}

#[test]
fn subscriber_installs_once() {
    let config = TelemetryConfig::default()
        .with_log_level(DEFAULT_LOG_FILTER)
        .with_json_logs(true);
    assert!(init_telemetry(&config).is_ok());
    assert!(init_telemetry(&config).is_err());
}
