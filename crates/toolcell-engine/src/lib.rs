//! The tool execution pipeline.
//!
//! Sequences catalog lookup → input validation → sandbox creation →
//! scaffolding → artifact fetch → dependency install → launch → envelope,
//! with short-circuit error composition and guaranteed sandbox teardown on
//! every exit path.

use std::time::Instant;

use serde_json::Value;
use toolcell_artifact::{ArtifactFetcher, FetchError};
use toolcell_core::catalog::{CatalogStore, StoreError, ToolDescriptor};
use toolcell_core::config::{ArtifactRepoConfig, PipelineLimits, StoreConfig};
use toolcell_core::envelope::{ExecutionEnvelope, ExecutionInfo};
use toolcell_core::error::ExecuteError;
use toolcell_core::observability;
use toolcell_core::tool::deps;
use toolcell_core::validate;
use toolcell_sandbox::launch::LaunchError;
use toolcell_sandbox::manager::{Sandbox, SandboxManager};
use toolcell_sandbox::{install, launch, scaffold};

/// Everything a request handler needs, owned by the application root and
/// shared by reference across requests. Each request's sandbox is exclusive
/// to it; the sandbox manager's active set is the only shared mutable state.
pub struct ToolExecutor {
    catalog: CatalogStore,
    fetcher: ArtifactFetcher,
    sandboxes: SandboxManager,
    limits: PipelineLimits,
}

/// Result of the sandbox-scoped stages (scaffold through launch).
struct StagedOutcome {
    result: Value,
    installed: Vec<String>,
    tool_file_size: u64,
}

impl ToolExecutor {
    pub fn new(
        catalog: CatalogStore,
        fetcher: ArtifactFetcher,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            sandboxes: SandboxManager::new(limits),
            limits,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            CatalogStore::new(&StoreConfig::from_env()),
            ArtifactFetcher::new(ArtifactRepoConfig::from_env()),
            PipelineLimits::from_env(),
        )
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn fetcher(&self) -> &ArtifactFetcher {
        &self.fetcher
    }

    pub fn sandboxes(&self) -> &SandboxManager {
        &self.sandboxes
    }

    /// Run the whole pipeline for one request and return the uniform
    /// envelope. Never panics across this boundary; every failure mode maps
    /// to an error envelope.
    pub fn execute(&self, tool_name: &str, input: &Value) -> ExecutionEnvelope {
        let start = Instant::now();
        tracing::info!(tool = %tool_name, "Starting tool execution pipeline");
        observability::audit_pipeline_started(tool_name);

        let envelope = match self.run_pipeline(tool_name, input, start) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(tool = %tool_name, error = %err, "Pipeline failed");
                ExecutionEnvelope::failure(tool_name, &err)
            }
        };

        observability::audit_pipeline_completed(
            tool_name,
            &envelope.status,
            start.elapsed().as_millis() as u64,
        );
        envelope
    }

    fn run_pipeline(
        &self,
        tool_name: &str,
        input: &Value,
        start: Instant,
    ) -> Result<ExecutionEnvelope, ExecuteError> {
        // Step 1: descriptor lookup.
        let descriptor = self
            .catalog
            .get_tool_details(tool_name)
            .map_err(map_store)?
            .ok_or_else(|| ExecuteError::ToolUnknown(tool_name.to_string()))?;
        tracing::debug!(tool = %tool_name, version = descriptor.version, "Descriptor found");

        // Step 2: validate and coerce the caller's input.
        let report = validate::validate_input(input, &descriptor.input_schema);
        if !report.valid {
            return Err(ExecuteError::InvalidInput {
                errors: report.errors,
            });
        }
        let validated = report.data;
        let mut warnings = report.warnings;

        // Step 3: sandbox. From here on, teardown is unconditional.
        let sandbox = self
            .sandboxes
            .create(tool_name)
            .map_err(|e| ExecuteError::SandboxFailure(format!("{:#}", e)))?;

        let staged = self.run_in_sandbox(&descriptor, &validated, &mut warnings, &sandbox);
        let environment_path = sandbox.root.display().to_string();
        self.sandboxes.destroy(&sandbox.root);
        let staged = staged?;

        // Step 9: success envelope.
        let elapsed = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        tracing::info!(tool = %tool_name, elapsed, "Pipeline completed");
        Ok(ExecutionEnvelope::success(
            tool_name,
            staged.result,
            ExecutionInfo {
                execution_time_seconds: elapsed,
                validated_input: validated,
                dependencies_installed: staged.installed,
                validation_warnings: warnings,
                environment_path,
                tool_file_size: staged.tool_file_size,
            },
        ))
    }

    /// Steps 4–8; the caller owns teardown of the sandbox.
    fn run_in_sandbox(
        &self,
        descriptor: &ToolDescriptor,
        validated: &Value,
        warnings: &mut Vec<String>,
        sandbox: &Sandbox,
    ) -> Result<StagedOutcome, ExecuteError> {
        // Step 4: base-class scaffolding.
        scaffold::stage_blueprint(sandbox)
            .map_err(|e| ExecuteError::ScaffoldFailure(format!("{:#}", e)))?;

        // Step 5: fetch the tool source.
        let artifact = self
            .fetcher
            .download(&descriptor.tool_name, &sandbox.tools_dir)
            .map_err(map_fetch)?;

        // Step 6: dependency extraction.
        let dependencies = deps::extract_from_file(&artifact.file_path)
            .map_err(|e| ExecuteError::Internal(format!("{:#}", e)))?;

        // Step 7: install, when anything was declared.
        let mut installed = Vec::new();
        if !dependencies.is_empty() {
            tracing::info!(
                tool = %descriptor.tool_name,
                count = dependencies.len(),
                "Installing dependencies"
            );
            let report = install::install_packages(
                sandbox,
                &dependencies,
                self.limits.install_timeout_secs,
            );
            observability::audit_install_completed(
                &descriptor.tool_name,
                &report.installed,
                &report.failed,
            );
            if report.all_failed() {
                return Err(ExecuteError::InstallFailed {
                    failed: report.failed,
                    errors: report.errors,
                });
            }
            if report.is_partial() {
                warnings.push(format!(
                    "Some dependencies failed to install: {}",
                    report.failed.join(", ")
                ));
            }
            installed = report.installed;
        }

        // Step 8: launch and collect the JSON result.
        let output = launch::run_tool(
            sandbox,
            &artifact.file_path,
            validated,
            self.limits.launch_timeout_secs,
        )
        .map_err(map_launch)?;

        Ok(StagedOutcome {
            result: output.result,
            installed,
            tool_file_size: artifact.size,
        })
    }
}

fn map_store(err: StoreError) -> ExecuteError {
    match err {
        StoreError::Unavailable(msg) => ExecuteError::StoreUnavailable(msg),
        other => ExecuteError::Internal(other.to_string()),
    }
}

fn map_fetch(err: FetchError) -> ExecuteError {
    match err {
        FetchError::NotFound {
            tool_name,
            suggestions,
        } => ExecuteError::NotFound {
            tool_name,
            suggestions,
        },
        FetchError::Unavailable(msg) => ExecuteError::FetchFailed(msg),
    }
}

fn map_launch(err: LaunchError) -> ExecuteError {
    match err {
        LaunchError::Execution {
            message,
            stdout,
            stderr,
        } => ExecuteError::ExecutionFailed {
            message,
            stdout,
            stderr,
        },
        LaunchError::InvalidOutput {
            message,
            stdout,
            stderr,
        } => ExecuteError::InvalidOutput {
            message,
            stdout,
            stderr,
        },
        LaunchError::Internal(e) => ExecuteError::Internal(format!("{:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor_with_catalog(dir: &tempfile::TempDir) -> ToolExecutor {
        let catalog = CatalogStore::new(&StoreConfig {
            db_path: dir.path().join("catalog.db"),
        });
        let fetcher = ArtifactFetcher::new(ArtifactRepoConfig {
            base_url: String::new(),
            token: None,
        });
        ToolExecutor::new(catalog, fetcher, PipelineLimits::default())
    }

    fn seed(executor: &ToolExecutor, name: &str, input_schema: Value) {
        executor
            .catalog()
            .upsert_tool(&ToolDescriptor {
                tool_name: name.to_string(),
                description: "test".to_string(),
                version: 1,
                input_schema,
                output_schema: json!({}),
            })
            .unwrap();
    }

    #[test]
    fn unknown_tool_produces_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with_catalog(&dir);

        let envelope = executor.execute("NoSuchTool", &json!({}));
        assert_eq!(envelope.status, "error");
        assert!(envelope.message.contains("not found"));
        assert_eq!(envelope.details.unwrap()["kind"], "ToolUnknown");
    }

    #[test]
    fn invalid_input_short_circuits_before_sandbox_creation() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with_catalog(&dir);
        seed(
            &executor,
            "NAICSTool",
            json!({
                "properties": { "naics_code": { "type": "string" } },
                "required": ["naics_code"],
            }),
        );

        let envelope = executor.execute("NAICSTool", &json!({}));
        assert_eq!(envelope.status, "error");
        assert!(envelope.message.starts_with("Input validation failed"));
        let details = envelope.details.unwrap();
        let errors = details["validation_errors"].as_array().unwrap();
        assert!(errors
            .iter()
            .any(|e| e == "Missing required field: naics_code"));
        // No sandbox was created for a rejected input.
        assert!(executor.sandboxes().list_active().is_empty());
    }

    #[test]
    fn constraint_violation_is_reported_in_the_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with_catalog(&dir);
        seed(
            &executor,
            "LocatorTool",
            json!({
                "properties": {
                    "max_locations": { "type": "integer", "maximum": 20 },
                },
            }),
        );

        let envelope = executor.execute("LocatorTool", &json!({ "max_locations": "25" }));
        assert_eq!(envelope.status, "error");
        let details = envelope.details.unwrap();
        let errors = details["validation_errors"].as_array().unwrap();
        assert!(errors
            .iter()
            .any(|e| e.as_str().unwrap().contains("must be <= 20")));
    }
}
