//! tests/config_tests.rs

use std::time::Duration;

use crate::config::app_config::{env_parse, log_level_from_env, AppConfig};

#[test]
fn defaults_match_documented_values() {
    let config = AppConfig::default();

    assert_eq!(config.port, 5022);
    assert_eq!(config.database_url, "sqlite:data/crm.db");
    assert_eq!(config.scheduler_interval, Duration::from_secs(60));
    assert!(config.api_token.is_none());
    assert_eq!(config.transport.smtp_port, 587);
    assert_eq!(config.transport.max_connections, 5);
    assert_eq!(config.transport.rate_per_second, 14);
    assert_eq!(config.dispatch.batch_size, 10);
    assert_eq!(config.dispatch.batch_pause, Duration::from_millis(1000));
    assert_eq!(config.dispatch.default_sender_name, "Club de Golf");
}

// Nombres de variable únicos: los tests corren en paralelo sobre el mismo entorno.
#[test]
fn env_parse_reads_valid_values() {
    std::env::set_var("CRM_CAMPAIGNS_TEST_VALID_PORT", " 8080 ");
    assert_eq!(env_parse("CRM_CAMPAIGNS_TEST_VALID_PORT", 5022u16), 8080);
}

#[test]
fn env_parse_falls_back_on_garbage() {
    std::env::set_var("CRM_CAMPAIGNS_TEST_BAD_BATCH", "ten");
    assert_eq!(env_parse("CRM_CAMPAIGNS_TEST_BAD_BATCH", 10usize), 10);
    assert_eq!(env_parse("CRM_CAMPAIGNS_TEST_UNSET", 14u32), 14);
}

// Las dos pruebas siguientes leen variables reales de `from_env`; son las únicas
// que las tocan.
#[test]
fn zero_scheduler_interval_is_clamped() {
    std::env::set_var("SCHEDULER_INTERVAL_SECS", "0");
    let config = AppConfig::from_env();
    std::env::remove_var("SCHEDULER_INTERVAL_SECS");

    assert_eq!(config.scheduler_interval, Duration::from_secs(1));
}

#[test]
fn log_level_is_readable_before_the_rest_of_the_config() {
    std::env::set_var("LOG_LEVEL", "debug");
    let level = log_level_from_env();
    std::env::remove_var("LOG_LEVEL");

    assert_eq!(level, "debug");
}
