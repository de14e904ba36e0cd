//! Observability: tracing init and the pipeline audit log.
//!
//! Audit log path: TOOLCELL_AUDIT_LOG (JSON lines, append-only).

use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::env_keys::observability as keys;

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call at process startup.
/// When TOOLCELL_QUIET=1, only WARN and above are logged.
pub fn init_tracing() {
    let level: String = if is_quiet() {
        "toolcell=warn".to_string()
    } else {
        env::var(keys::TOOLCELL_LOG_LEVEL).unwrap_or_else(|_| "toolcell=info".to_string())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let json = env::var(keys::TOOLCELL_LOG_JSON)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);

    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn is_quiet() -> bool {
    env::var(keys::TOOLCELL_QUIET)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = env::var(keys::TOOLCELL_AUDIT_LOG).ok()?;
    if path.is_empty() {
        return None;
    }
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

/// Audit: pipeline_started (right before the first step runs).
pub fn audit_pipeline_started(tool_name: &str) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "pipeline_started",
            "tool_name": tool_name,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: pipeline_completed (success or error, with elapsed time).
pub fn audit_pipeline_completed(tool_name: &str, status: &str, duration_ms: u64) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "pipeline_completed",
            "tool_name": tool_name,
            "status": status,
            "duration_ms": duration_ms,
            "success": status == "success",
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: dependency install outcome for one pipeline invocation.
pub fn audit_install_completed(tool_name: &str, installed: &[String], failed: &[String]) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "install_completed",
            "tool_name": tool_name,
            "installed": installed,
            "failed": failed,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: sandbox directory could not be removed and was deferred.
pub fn audit_cleanup_deferred(root: &str) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "cleanup_deferred",
            "sandbox_root": root,
        });
        append_jsonl(&path, &record);
    }
}
