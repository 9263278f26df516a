use httpc_config::HttpcConfigLoader;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn loads_file_with_env_expansion() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
user_agent: "service/${SERVICE_VERSION}"
max_response_body: 2097152
retry:
  max_attempts: 5
  jitter: false
security:
  allow_private_ips: false
proxy:
  url: "${OUTBOUND_PROXY}"
  "#;
    let p = write_yaml(&tmp, "httpc.yaml", file_yaml);

    unsafe {
        std::env::set_var("SERVICE_VERSION", "3.2.1");
        std::env::set_var("OUTBOUND_PROXY", "http://proxy.internal:3128");
    }

    let config = HttpcConfigLoader::new()
        .with_file(p)
        .load()
        .expect("load httpc config");

    assert_eq!(config.user_agent, "service/3.2.1");
    assert_eq!(config.max_response_body, 2_097_152);
    assert_eq!(config.retry.max_attempts, 5);
    assert!(!config.retry.jitter);
    assert_eq!(
        config.proxy.url.as_deref(),
        Some("http://proxy.internal:3128")
    );

    unsafe {
        std::env::remove_var("SERVICE_VERSION");
        std::env::remove_var("OUTBOUND_PROXY");
    }
}

#[test]
#[serial]
fn env_overrides_win_over_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "httpc.yaml", "user_agent: from-file/1.0\n");

    unsafe {
        std::env::set_var("HTTPC__USER_AGENT", "from-env/1.0");
    }

    let config = HttpcConfigLoader::new()
        .with_file(p)
        .load()
        .expect("load httpc config");

    assert_eq!(config.user_agent, "from-env/1.0");

    unsafe {
        std::env::remove_var("HTTPC__USER_AGENT");
    }
}

#[test]
#[serial]
fn starts_from_named_preset_when_file_is_silent_on_a_field() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "httpc.yaml", "user_agent: custom/9.0\n");

    let config = HttpcConfigLoader::new()
        .with_preset(httpc::Config::secure())
        .with_file(p)
        .load()
        .expect("load httpc config");

    assert_eq!(config.user_agent, "custom/9.0");
    assert!(config.strict_content_length);
}
