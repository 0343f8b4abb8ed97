use advisor_host::DispatchMode;
use advisor_server::AdvisorConfig;
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_load_full_config_with_include() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "extra_tools.yaml",
        r#"
tools:
  - name: tuition_lookup
    description: Tuition for a school
    command: tuition
    args:
      - name: school
        required: true
mcp_servers:
  - name: campus-data
    command: campus-mcp
    args: ["--readonly"]
"#,
    );
    let path = write(
        &dir,
        "advisor.yaml",
        r#"
model:
  model: qwen2.5:14b
  temperature: 0.2
controller:
  max_turns: 4
  dispatch: sequential
system_prompt: You are a college admissions advisor.
transcript_log: /tmp/advisor-transcripts.jsonl
include:
  - extra_tools.yaml
tools:
  - name: search_programs
    description: Search degree programs
    command: programs
    static_flags: ["--json"]
    retries: 2
"#,
    );

    let config = AdvisorConfig::load_from_file(&path).await.unwrap();

    assert_eq!(config.model.model, "qwen2.5:14b");
    assert_eq!(config.model.base_url, "http://localhost:11434");
    assert_eq!(config.model.timeout_secs, 120);
    assert_eq!(config.model.temperature, Some(0.2));
    assert_eq!(config.controller.max_turns, 4);
    assert_eq!(config.controller.max_malformed_turns, 2);
    assert_eq!(config.controller.dispatch, DispatchMode::Sequential);
    assert_eq!(
        config.system_prompt.as_deref(),
        Some("You are a college admissions advisor.")
    );

    let names: Vec<_> = config.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["search_programs", "tuition_lookup"]);
    assert_eq!(config.tools[0].retries, 2);
    assert_eq!(config.tools[1].args[0].arg_type, "string");
    assert_eq!(config.mcp_servers.len(), 1);
    assert_eq!(config.mcp_servers[0].args, vec!["--readonly"]);
}

#[tokio::test]
async fn test_empty_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "advisor.yaml", "{}\n");

    let config = AdvisorConfig::load_from_file(&path).await.unwrap();
    assert_eq!(config.controller.max_turns, 8);
    assert_eq!(config.controller.dispatch, DispatchMode::Parallel);
    assert!(config.tools.is_empty());
    assert!(config.transcript_log.is_none());
}

#[tokio::test]
async fn test_missing_include_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "advisor.yaml", "include:\n  - nowhere.yaml\n");

    let err = AdvisorConfig::load_from_file(&path).await.unwrap_err();
    assert!(err.to_string().starts_with("Include file not found"));
}

#[tokio::test]
async fn test_invalid_yaml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "advisor.yaml", "tools: [name: 3\n");

    assert!(AdvisorConfig::load_from_file(&path).await.is_err());
}

#[tokio::test]
async fn test_explicit_path_wins() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "custom.yaml", "controller:\n  max_turns: 2\n");

    let config = AdvisorConfig::load_with_precedence(Some(path.display().to_string()))
        .await
        .unwrap();
    assert_eq!(config.controller.max_turns, 2);

    let missing = dir.path().join("missing.yaml").display().to_string();
    assert!(AdvisorConfig::load_with_precedence(Some(missing)).await.is_err());
}
