//! End-to-end pipeline tests against a local artifact server and a real
//! Python virtual environment.
//!
//! These run the whole sequence (catalog → validation → sandbox →
//! scaffold → fetch → launch → envelope) and are skipped on hosts where
//! `python -m venv` cannot produce a working environment.

use std::path::Path;
use std::process::Command;

use serde_json::json;
use toolcell_artifact::ArtifactFetcher;
use toolcell_core::catalog::{CatalogStore, ToolDescriptor};
use toolcell_core::config::{ArtifactRepoConfig, PipelineLimits, StoreConfig};
use toolcell_engine::ToolExecutor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ECHO_TOOL_SOURCE: &str = r#"
from Blueprint.Templates.Tools.python_base_tool import BaseTool


class EchoTool(BaseTool):
    name = "EchoTool"
    description = "Echoes its validated input back"
    dependencies = []
    input_schema = {"properties": {"naics_code": {"type": "string"}}}

    def run_sync(self, input_data):
        return {"status": "success", "echo": input_data}
"#;

/// A venv probe: creating one exercises ensurepip, which some minimal
/// hosts lack even when python3 itself is present.
fn venv_works() -> bool {
    let probe_dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(_) => return false,
    };
    for python in ["python3", "python"] {
        let created = Command::new(python)
            .arg("-m")
            .arg("venv")
            .arg(probe_dir.path().join("probe"))
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if created {
            return true;
        }
    }
    false
}

fn executor_for(dir: &tempfile::TempDir, repo_url: &str) -> ToolExecutor {
    let catalog = CatalogStore::new(&StoreConfig {
        db_path: dir.path().join("catalog.db"),
    });
    let fetcher = ArtifactFetcher::new(ArtifactRepoConfig {
        base_url: repo_url.to_string(),
        token: None,
    });
    ToolExecutor::new(catalog, fetcher, PipelineLimits::default())
}

fn seed_echo_tool(executor: &ToolExecutor) {
    executor
        .catalog()
        .upsert_tool(&ToolDescriptor {
            tool_name: "EchoTool".to_string(),
            description: "Echoes its validated input back".to_string(),
            version: 1,
            input_schema: json!({
                "properties": { "naics_code": { "type": "string" } },
                "required": ["naics_code"],
            }),
            output_schema: json!({}),
        })
        .unwrap();
}

#[test]
fn echo_tool_round_trips_through_the_pipeline() {
    if !venv_works() {
        eprintln!("skipping: no usable python venv on this host");
        return;
    }

    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Tools/EchoTool.py"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ECHO_TOOL_SOURCE))
            .mount(&server)
            .await;
        server
    });

    let dir = tempfile::tempdir().unwrap();
    let executor = executor_for(&dir, &server.uri());
    seed_echo_tool(&executor);

    let envelope = executor.execute("EchoTool", &json!({ "naics_code": "541511" }));
    assert_eq!(
        envelope.status, "success",
        "message: {} details: {:?}",
        envelope.message, envelope.details
    );

    // The tool echoes exactly the validated input.
    let result = envelope.result.as_ref().unwrap();
    assert_eq!(result["echo"]["naics_code"], "541511");

    let info = envelope.execution_info.as_ref().unwrap();
    assert_eq!(info.validated_input["naics_code"], "541511");
    assert!(info.dependencies_installed.is_empty());
    assert_eq!(info.tool_file_size, ECHO_TOOL_SOURCE.len() as u64);

    // The sandbox is gone by the time the envelope is returned.
    assert!(!Path::new(&info.environment_path).exists());
    assert!(executor.sandboxes().list_active().is_empty());
}

#[test]
fn missing_artifact_tears_the_sandbox_down() {
    if !venv_works() {
        eprintln!("skipping: no usable python venv on this host");
        return;
    }

    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Tools/EchoTool.py"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Tools/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["EchoToolV2.py"])))
            .mount(&server)
            .await;
        server
    });

    let dir = tempfile::tempdir().unwrap();
    let executor = executor_for(&dir, &server.uri());
    seed_echo_tool(&executor);

    let envelope = executor.execute("EchoTool", &json!({ "naics_code": "541511" }));
    assert_eq!(envelope.status, "error");
    assert!(envelope.message.contains("not found"));
    let details = envelope.details.unwrap();
    assert_eq!(details["kind"], "NotFound");
    assert_eq!(details["suggestions"][0], "EchoToolV2");

    // Error paths reclaim the sandbox too.
    assert!(executor.sandboxes().list_active().is_empty());
}
