//! One-shot `quotaroute complete` runs against a wiremock vendor
//!
//! The binary exits right after the call, so anything still waiting in the
//! debounce window has to be flushed before the process ends.

use quotaroute::persistence::QuotaState;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_ENV: &str = "QUOTAROUTE_CLI_TEST_KEYS";

/// Long debounce so only an explicit flush can put state on disk
fn write_config(dir: &Path, server: &MockServer) -> std::path::PathBuf {
    let config = format!(
        r#"
[persistence]
enabled = true
quota_path = "{quota}"
cooldown_path = "{cooldowns}"
debounce_ms = 60000

[observability]
log_level = "warn"

[[providers]]
name = "groq"
family = "openai_compatible"
credential_env = "{env}"
base_url = "{url}"

[[providers.models]]
name = "llama"
rpd = 20
capabilities = ["text"]
"#,
        quota = dir.join("quota.json").display(),
        cooldowns = dir.join("cooldowns.json").display(),
        env = KEY_ENV,
        url = server.uri(),
    );
    let path = dir.join("config.toml");
    std::fs::write(&path, config).expect("Failed to write config");
    path
}

async fn run_complete(config: &Path) -> std::process::Output {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_quotaroute"))
        .arg("--config")
        .arg(config)
        .args(["complete", "hello"])
        .env(KEY_ENV, "gsk_cli_test_key_0001")
        .env_remove("RUST_LOG")
        .output()
        .await
        .expect("binary should run")
}

fn read_quota(dir: &Path) -> QuotaState {
    let raw = std::fs::read_to_string(dir.join("quota.json")).expect("quota file should exist");
    serde_json::from_str(&raw).expect("quota file should be valid JSON")
}

#[tokio::test]
async fn test_failed_complete_still_flushes_exhausted_quota() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(
            json!({"error": {"message": "You exceeded your current quota"}}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = write_config(dir.path(), &server);
    let output = run_complete(&config).await;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());

    let state = read_quota(dir.path());
    assert_eq!(state["groq"].models["llama"], 20);
}

#[tokio::test]
async fn test_successful_complete_prints_json_and_flushes() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = write_config(dir.path(), &server);
    let output = run_complete(&config).await;

    assert!(output.status.success());
    let printed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(printed["text"], "hi there");
    assert_eq!(printed["meta"]["provider"], "groq");

    let state = read_quota(dir.path());
    assert_eq!(state["groq"].used, 1);
}
