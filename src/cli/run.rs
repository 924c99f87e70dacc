//! Run command implementation

use crate::api::PipelineRequest;
use crate::cli::output::{format_result_json, format_result_table};
use crate::cli::serve::{build_orchestrator, load_config};
use crate::cli::RunArgs;
use std::path::Path;
use std::time::Duration;

/// Parse a pipeline file. `.json` files are JSON, anything else TOML:
///
/// ```toml
/// deadline_ms = 60000
///
/// [[stages]]
/// name = "draft"
/// primary = { service = "writer", payload = { topic = "rust" } }
/// fallback = { service = "backup-writer" }
/// ```
pub fn load_pipeline(path: &Path) -> Result<PipelineRequest, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read pipeline {}: {}", path.display(), e))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let request = if is_json {
        serde_json::from_str(&content)
            .map_err(|e| format!("Invalid pipeline {}: {}", path.display(), e))?
    } else {
        toml::from_str(&content)
            .map_err(|e| format!("Invalid pipeline {}: {}", path.display(), e))?
    };
    Ok(request)
}

/// Handle `augur run`: execute one pipeline and render its result.
pub async fn handle_run(args: &RunArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    config.validate()?;
    let pipeline = load_pipeline(&args.pipeline)?;

    let orchestrator = build_orchestrator(&config).await?;

    let mut scope = orchestrator.new_scope();
    if let Some(ms) = args
        .deadline_ms
        .or(pipeline.deadline_ms)
        .or(config.pipeline.default_deadline_ms)
    {
        scope = scope.with_timeout(Duration::from_millis(ms));
    }

    let result = orchestrator.run_with(&pipeline.stages, scope).await;
    orchestrator.shutdown().await;
    let result = result?;

    Ok(if args.json {
        format_result_json(&result)
    } else {
        format_result_table(&result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const CONFIG: &str = r#"
    [[services]]
    id = "writer"
    type = "echo"
    "#;

    #[test]
    fn test_load_pipeline_toml() {
        let file = write_file(
            ".toml",
            r#"
            deadline_ms = 1000
            [[stages]]
            name = "draft"
            primary = { service = "writer", payload = { topic = "rust" } }
            "#,
        );
        let pipeline = load_pipeline(file.path()).unwrap();
        assert_eq!(pipeline.deadline_ms, Some(1000));
        assert_eq!(pipeline.stages[0].primary.payload["topic"], "rust");
    }

    #[test]
    fn test_load_pipeline_json() {
        let file = write_file(
            ".json",
            r#"{"stages": [{"name": "draft", "primary": {"service": "writer"}}]}"#,
        );
        let pipeline = load_pipeline(file.path()).unwrap();
        assert_eq!(pipeline.stages.len(), 1);
        assert_eq!(pipeline.deadline_ms, None);
    }

    #[test]
    fn test_load_pipeline_invalid() {
        let file = write_file(".json", "{not json");
        let err = load_pipeline(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid pipeline"));
    }

    #[tokio::test]
    async fn test_handle_run_json_output() {
        let config = write_file(".toml", CONFIG);
        let pipeline = write_file(
            ".json",
            r#"{"stages": [{"name": "draft", "primary": {"service": "writer", "payload": {"n": 1}}}]}"#,
        );
        let args = RunArgs {
            pipeline: pipeline.path().to_path_buf(),
            config: config.path().to_path_buf(),
            deadline_ms: None,
            json: true,
        };

        let output = handle_run(&args).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["metadata"]["degraded"], false);
        assert_eq!(parsed["output"]["payload"]["n"], 1);
    }

    #[tokio::test]
    async fn test_handle_run_unknown_service() {
        let config = write_file(".toml", CONFIG);
        let pipeline = write_file(
            ".json",
            r#"{"stages": [{"name": "draft", "primary": {"service": "ghost"}}]}"#,
        );
        let args = RunArgs {
            pipeline: pipeline.path().to_path_buf(),
            config: config.path().to_path_buf(),
            deadline_ms: None,
            json: false,
        };

        let err = handle_run(&args).await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn test_handle_run_missing_pipeline_file() {
        let args = RunArgs {
            pipeline: PathBuf::from("/nonexistent/pipeline.toml"),
            config: PathBuf::from("/nonexistent/augur.toml"),
            deadline_ms: None,
            json: false,
        };
        assert!(handle_run(&args).await.is_err());
    }
}
