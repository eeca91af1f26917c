use archon_domain::config::Config;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn explicit_zero_host_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 3210
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
fn breaker_defaults_match_spec() {
    let config = Config::default();
    assert_eq!(config.breaker.failure_threshold, 5);
    assert_eq!(config.breaker.timeout_secs, 60);
    assert_eq!(config.breaker.success_threshold, 2);
}

#[test]
fn events_retry_schedule_matches_spec() {
    let config = Config::default();
    assert_eq!(config.events.retry_delays_mins, vec![5, 30, 120]);
    assert_eq!(config.events.max_retries, 3);
    assert_eq!(config.events.channel_name, "archon_events");
}

#[test]
fn record_store_decay_defaults_match_spec() {
    let config = Config::default();
    assert_eq!(config.record_store.decay_window_days, 90);
    assert_eq!(config.record_store.decay_factor, 0.9);
    assert_eq!(config.record_store.decay_floor, 0.1);
    assert_eq!(config.record_store.important_threshold, 0.7);
}

#[test]
fn workers_backoff_ceiling_matches_spec() {
    let config = Config::default();
    assert_eq!(config.workers.max_backoff_secs, 300);
}
