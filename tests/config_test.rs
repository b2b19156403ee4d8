use std::env;
use std::fs;
use tempfile::TempDir;

/// Test loading configuration from YAML file
#[test]
fn test_load_yaml_config() {
    let yaml = r#"
endpoints:
  - "10.0.0.1:7000"
  - "10.0.0.2:7000"
  - "broker.example.com:7001"

pool:
  size: 4
  acquire_timeout_secs: 2

connect_timeout_secs: 3
single_use: true
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = tcppool::config::load_from_yaml(&config_path).unwrap();

    assert_eq!(config.endpoints.len(), 3);
    assert_eq!(config.endpoints[0], "10.0.0.1:7000");
    assert_eq!(config.pool.size, 4);
    assert_eq!(config.pool.acquire_timeout_secs, 2);
    assert_eq!(config.connect_timeout_secs, 3);
    assert!(config.single_use);

    let parsed = config.parsed_endpoints().unwrap();
    assert_eq!(parsed[2], ("broker.example.com".to_string(), 7001));
}

/// Test loading configuration from environment variables
#[test]
fn test_load_env_config() {
    // Save original env vars
    let orig_endpoints = env::var("TCPPOOL_ENDPOINTS").ok();
    let orig_size = env::var("TCPPOOL_POOL_SIZE").ok();
    let orig_acquire = env::var("TCPPOOL_ACQUIRE_TIMEOUT").ok();
    let orig_connect = env::var("TCPPOOL_CONNECT_TIMEOUT").ok();
    let orig_single = env::var("TCPPOOL_SINGLE_USE").ok();

    // Set test env vars
    env::set_var("TCPPOOL_ENDPOINTS", "10.0.0.1:7000, 10.0.0.2:7000");
    env::set_var("TCPPOOL_POOL_SIZE", "8");
    env::set_var("TCPPOOL_ACQUIRE_TIMEOUT", "1");
    env::set_var("TCPPOOL_CONNECT_TIMEOUT", "4");
    env::set_var("TCPPOOL_SINGLE_USE", "true");

    let config = tcppool::config::load_from_env().unwrap();

    assert_eq!(config.endpoints.len(), 2);
    assert_eq!(config.endpoints[0], "10.0.0.1:7000");
    assert_eq!(config.endpoints[1], "10.0.0.2:7000");
    assert_eq!(config.pool.size, 8);
    assert_eq!(config.pool.acquire_timeout_secs, 1);
    assert_eq!(config.connect_timeout_secs, 4);
    assert!(config.single_use);

    // Restore original env vars
    cleanup_env("TCPPOOL_ENDPOINTS", orig_endpoints);
    cleanup_env("TCPPOOL_POOL_SIZE", orig_size);
    cleanup_env("TCPPOOL_ACQUIRE_TIMEOUT", orig_acquire);
    cleanup_env("TCPPOOL_CONNECT_TIMEOUT", orig_connect);
    cleanup_env("TCPPOOL_SINGLE_USE", orig_single);
}

/// Test default values
#[test]
fn test_default_values() {
    let yaml = r#"
endpoints:
  - "10.0.0.1:7000"
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = tcppool::config::load_from_yaml(&config_path).unwrap();

    assert_eq!(config.pool.size, 2);
    assert_eq!(config.pool.acquire_timeout_secs, 5);
    assert_eq!(config.connect_timeout_secs, 10);
    assert!(!config.single_use);
}

/// Test load_config preferring the file over the environment
#[test]
fn test_load_config_prefers_file() {
    let yaml = r#"
endpoints:
  - "10.0.0.9:9000"
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = tcppool::config::load_config(config_path.to_str()).unwrap();
    assert_eq!(config.endpoints, vec!["10.0.0.9:9000".to_string()]);
}

/// Helper function to cleanup environment variables
fn cleanup_env(key: &str, orig_val: Option<String>) {
    match orig_val {
        Some(val) => env::set_var(key, val),
        None => env::remove_var(key),
    }
}
