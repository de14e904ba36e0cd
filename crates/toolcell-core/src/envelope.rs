//! The uniform result envelope returned by every pipeline invocation.

use serde::Serialize;
use serde_json::Value;

use crate::error::ExecuteError;

/// Per-invocation execution metadata, attached to success envelopes.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionInfo {
    /// Elapsed wall-clock time, rounded to two decimals.
    pub execution_time_seconds: f64,
    /// Echo of the validated input that was handed to the tool.
    pub validated_input: Value,
    /// Packages actually installed into the sandbox.
    pub dependencies_installed: Vec<String>,
    /// Accumulated validator and installer warnings.
    pub validation_warnings: Vec<String>,
    /// Sandbox root path (already removed by the time the caller reads this).
    pub environment_path: String,
    /// Size in bytes of the downloaded tool source.
    pub tool_file_size: u64,
}

/// Uniform result of one pipeline invocation: success or error.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEnvelope {
    pub status: String,
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_info: Option<ExecutionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ExecutionEnvelope {
    pub fn success(tool_name: &str, result: Value, info: ExecutionInfo) -> Self {
        Self {
            status: "success".to_string(),
            tool_name: tool_name.to_string(),
            result: Some(result),
            message: format!("Tool '{}' executed successfully", tool_name),
            execution_info: Some(info),
            details: None,
        }
    }

    pub fn failure(tool_name: &str, err: &ExecuteError) -> Self {
        let mut details = err.details();
        if let Some(map) = details.as_object_mut() {
            map.insert("kind".to_string(), Value::String(err.kind().to_string()));
            map.insert(
                "timestamp".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        Self {
            status: "error".to_string(),
            tool_name: tool_name.to_string(),
            result: None,
            message: err.to_string(),
            execution_info: None,
            details: Some(details),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_envelope_carries_kind_and_details() {
        let err = ExecuteError::NotFound {
            tool_name: "NAICSTool".to_string(),
            suggestions: vec!["NAICSExcelTool".to_string()],
        };
        let env = ExecutionEnvelope::failure("NAICSTool", &err);
        assert_eq!(env.status, "error");
        let details = env.details.unwrap();
        assert_eq!(details["kind"], "NotFound");
        assert_eq!(details["suggestions"][0], "NAICSExcelTool");
    }

    #[test]
    fn success_envelope_serializes_without_details() {
        let info = ExecutionInfo {
            execution_time_seconds: 1.25,
            validated_input: json!({"q": "x"}),
            dependencies_installed: vec!["requests".to_string()],
            validation_warnings: vec![],
            environment_path: "/tmp/isolated_tool_x".to_string(),
            tool_file_size: 512,
        };
        let env = ExecutionEnvelope::success("EchoTool", json!({"ok": true}), info);
        let doc = serde_json::to_value(&env).unwrap();
        assert_eq!(doc["status"], "success");
        assert!(doc.get("details").is_none());
        assert_eq!(doc["execution_info"]["dependencies_installed"][0], "requests");
    }
}
