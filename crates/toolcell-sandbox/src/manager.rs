//! Sandbox lifecycle: create, destroy, track, forcibly reclaim.
//!
//! Each request gets a freshly provisioned directory with its own Python
//! virtual environment. The active set is the only shared state; it is
//! guarded by a mutex that is never held across the slow venv step, so
//! concurrent creates proceed in parallel.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use toolcell_core::config::PipelineLimits;
use toolcell_core::observability;

use crate::common::run_with_timeout;

/// Removal attempts before a sandbox directory is deferred.
const DESTROY_ATTEMPTS: u32 = 3;
/// Backoff between removal attempts.
const DESTROY_BACKOFF_SECS: u64 = 1;

/// An ephemeral workspace, exclusively owned by one request.
#[derive(Debug, Clone)]
pub struct Sandbox {
    /// Absolute root, named `isolated_tool_<name>_..._<timestamp>`.
    pub root: PathBuf,
    /// Python interpreter inside the sandbox venv.
    pub runtime_exe: PathBuf,
    /// pip inside the sandbox venv.
    pub installer_exe: PathBuf,
    /// Downloaded tool sources.
    pub tools_dir: PathBuf,
    /// Helper scripts.
    pub scripts_dir: PathBuf,
    /// Generated launchers and per-run files.
    pub scratch_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub tool_name: String,
}

/// Tracks live sandboxes and reclaims them. Owned by the application root.
pub struct SandboxManager {
    limits: PipelineLimits,
    active: Mutex<HashSet<PathBuf>>,
    deferred: Mutex<Vec<PathBuf>>,
}

impl SandboxManager {
    pub fn new(limits: PipelineLimits) -> Self {
        Self {
            limits,
            active: Mutex::new(HashSet::new()),
            deferred: Mutex::new(Vec::new()),
        }
    }

    /// Provision a fresh sandbox: unique root, isolated venv, verified
    /// interpreter and installer, working subdirectories.
    pub fn create(&self, tool_name: &str) -> Result<Sandbox> {
        let prefix = format!("isolated_tool_{}_", sanitize_name(tool_name));
        let suffix = format!("_{}", Utc::now().timestamp());
        let root = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempdir()
            .context("Allocate sandbox directory")?
            .keep();

        tracing::info!(root = %root.display(), tool = %tool_name, "Creating sandbox");

        match self.provision(&root, tool_name) {
            Ok(sandbox) => {
                self.active
                    .lock()
                    .map_err(|_| anyhow::anyhow!("sandbox registry poisoned"))?
                    .insert(root.clone());
                Ok(sandbox)
            }
            Err(e) => {
                // Partial sandbox: reclaim before surfacing the error.
                remove_dir_best_effort(&root);
                Err(e)
            }
        }
    }

    fn provision(&self, root: &Path, tool_name: &str) -> Result<Sandbox> {
        let venv_dir = root.join("runtime");
        let host_python = find_host_python(self.limits.verify_timeout_secs)?;

        let venv = run_with_timeout(
            Command::new(&host_python)
                .arg("-m")
                .arg("venv")
                .arg(&venv_dir)
                .arg("--clear"),
            self.limits.create_timeout_secs,
        )
        .context("Create virtual environment")?;
        if !venv.success() {
            anyhow::bail!("Failed to create virtual environment: {}", venv.stderr);
        }

        let (runtime_exe, installer_exe) = venv_binaries(&venv_dir);

        for (label, exe) in [("runtime", &runtime_exe), ("installer", &installer_exe)] {
            let check = run_with_timeout(
                Command::new(exe).arg("--version"),
                self.limits.verify_timeout_secs,
            )
            .with_context(|| format!("Verify sandbox {}", label))?;
            if !check.success() {
                anyhow::bail!("Sandbox {} verification failed: {}", label, check.stderr);
            }
            tracing::debug!(%label, version = %check.stdout.trim(), "Sandbox binary verified");
        }

        let tools_dir = root.join("tools");
        let scripts_dir = root.join("scripts");
        let scratch_dir = root.join("scratch");
        for dir in [&tools_dir, &scripts_dir, &scratch_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Create sandbox dir {}", dir.display()))?;
        }

        Ok(Sandbox {
            root: root.to_path_buf(),
            runtime_exe,
            installer_exe,
            tools_dir,
            scripts_dir,
            scratch_dir,
            created_at: Utc::now(),
            tool_name: tool_name.to_string(),
        })
    }

    /// Tear a sandbox down: unregister, then remove the directory with
    /// retries. A directory that survives all attempts is queued for
    /// best-effort deletion at process shutdown.
    pub fn destroy(&self, root: &Path) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(root);
        }

        if !root.exists() {
            return;
        }

        for attempt in 1..=DESTROY_ATTEMPTS {
            match std::fs::remove_dir_all(root) {
                Ok(()) => {
                    tracing::info!(root = %root.display(), "Sandbox removed");
                    return;
                }
                Err(e) if attempt < DESTROY_ATTEMPTS => {
                    tracing::warn!(
                        root = %root.display(),
                        attempt,
                        error = %e,
                        "Sandbox removal failed, retrying"
                    );
                    std::thread::sleep(Duration::from_secs(DESTROY_BACKOFF_SECS));
                }
                Err(e) => {
                    tracing::error!(
                        root = %root.display(),
                        error = %e,
                        "Sandbox removal failed after {} attempts, deferring",
                        DESTROY_ATTEMPTS
                    );
                    observability::audit_cleanup_deferred(&root.display().to_string());
                    if let Ok(mut deferred) = self.deferred.lock() {
                        deferred.push(root.to_path_buf());
                    }
                }
            }
        }
    }

    /// Roots of all currently registered sandboxes.
    pub fn list_active(&self) -> Vec<PathBuf> {
        self.active
            .lock()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Destroy every registered sandbox.
    pub fn destroy_all(&self) {
        for root in self.list_active() {
            self.destroy(&root);
        }
    }

    /// Final best-effort pass over directories whose removal was deferred.
    /// Call once at process shutdown.
    pub fn flush_deferred(&self) {
        let roots: Vec<PathBuf> = self
            .deferred
            .lock()
            .map(|mut v| v.drain(..).collect())
            .unwrap_or_default();
        for root in roots {
            remove_dir_best_effort(&root);
        }
    }
}

/// Platform venv binary layout: `Scripts/` on Windows, `bin/` elsewhere.
fn venv_binaries(venv_dir: &Path) -> (PathBuf, PathBuf) {
    if cfg!(windows) {
        (
            venv_dir.join("Scripts").join("python.exe"),
            venv_dir.join("Scripts").join("pip.exe"),
        )
    } else {
        (venv_dir.join("bin").join("python"), venv_dir.join("bin").join("pip"))
    }
}

/// Locate a host interpreter able to build the venv.
fn find_host_python(verify_timeout_secs: u64) -> Result<PathBuf> {
    for name in ["python3", "python"] {
        let probe = run_with_timeout(Command::new(name).arg("--version"), verify_timeout_secs);
        if probe.map(|o| o.success()).unwrap_or(false) {
            return Ok(PathBuf::from(name));
        }
    }
    anyhow::bail!("python3 or python not found in PATH")
}

/// Restrict the tool name to filesystem-safe characters for the dir tag.
fn sanitize_name(tool_name: &str) -> String {
    tool_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn remove_dir_best_effort(root: &Path) {
    if root.exists() {
        let _ = std::fs::remove_dir_all(root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_chars_only() {
        assert_eq!(sanitize_name("NAICSExcelTool"), "NAICSExcelTool");
        assert_eq!(sanitize_name("weird/name here"), "weird_name_here");
        assert_eq!(sanitize_name("a.b:c"), "a_b_c");
    }

    #[test]
    fn venv_layout_matches_platform() {
        let (python, pip) = venv_binaries(Path::new("/tmp/sb/runtime"));
        if cfg!(windows) {
            assert!(python.ends_with("Scripts/python.exe"));
            assert!(pip.ends_with("Scripts/pip.exe"));
        } else {
            assert!(python.ends_with("bin/python"));
            assert!(pip.ends_with("bin/pip"));
        }
    }

    #[test]
    fn destroy_unknown_root_is_a_noop() {
        let manager = SandboxManager::new(PipelineLimits::default());
        manager.destroy(Path::new("/nonexistent/isolated_tool_x_0"));
        assert!(manager.list_active().is_empty());
    }

    #[test]
    fn destroy_removes_directory_and_unregisters() {
        let manager = SandboxManager::new(PipelineLimits::default());
        let dir = tempfile::Builder::new()
            .prefix("isolated_tool_test_")
            .tempdir()
            .unwrap()
            .keep();
        manager.active.lock().unwrap().insert(dir.clone());
        assert_eq!(manager.list_active().len(), 1);

        manager.destroy(&dir);
        assert!(!dir.exists());
        assert!(manager.list_active().is_empty());
    }

    #[test]
    fn destroy_all_drains_the_active_set() {
        let manager = SandboxManager::new(PipelineLimits::default());
        let mut roots = Vec::new();
        for _ in 0..3 {
            let dir = tempfile::Builder::new()
                .prefix("isolated_tool_test_")
                .tempdir()
                .unwrap()
                .keep();
            manager.active.lock().unwrap().insert(dir.clone());
            roots.push(dir);
        }
        manager.destroy_all();
        assert!(manager.list_active().is_empty());
        assert!(roots.iter().all(|r| !r.exists()));
    }
}
