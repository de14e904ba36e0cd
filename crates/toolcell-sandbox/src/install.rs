//! Dependency installation through the sandbox's package installer.
//!
//! Each package is one `pip install` invocation with its own timeout.
//! Installs are never concurrent within a sandbox; the report leaves the
//! total/partial-failure policy to the orchestrator.

use std::process::Command;

use crate::common::run_with_timeout;
use crate::manager::Sandbox;

/// Accumulated outcome of installing one dependency set.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub failed: Vec<String>,
    pub errors: Vec<String>,
}

impl InstallReport {
    /// Packages were requested and none installed.
    pub fn all_failed(&self) -> bool {
        self.installed.is_empty() && !self.failed.is_empty()
    }

    /// Some installed, some failed.
    pub fn is_partial(&self) -> bool {
        !self.installed.is_empty() && !self.failed.is_empty()
    }
}

/// Install every package into the sandbox, one at a time.
pub fn install_packages(sandbox: &Sandbox, packages: &[String], timeout_secs: u64) -> InstallReport {
    let mut report = InstallReport::default();

    for package in packages {
        tracing::info!(package = %package, "Installing dependency");
        let outcome = run_with_timeout(
            Command::new(&sandbox.installer_exe)
                .arg("install")
                .arg(package)
                .current_dir(&sandbox.root),
            timeout_secs,
        );

        match outcome {
            Ok(out) if out.success() => {
                tracing::info!(package = %package, "Installed");
                report.installed.push(package.clone());
            }
            Ok(out) if out.timed_out => {
                tracing::error!(package = %package, "Installation timeout");
                report.failed.push(package.clone());
                report.errors.push(format!("{}: Installation timeout", package));
            }
            Ok(out) => {
                tracing::error!(package = %package, stderr = %out.stderr, "Installation failed");
                report.failed.push(package.clone());
                report.errors.push(format!("{}: {}", package, out.stderr.trim()));
            }
            Err(e) => {
                tracing::error!(package = %package, error = %e, "Installer did not start");
                report.failed.push(package.clone());
                report.errors.push(format!("{}: {}", package, e));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_flags_total_and_partial_failure() {
        let total = InstallReport {
            installed: vec![],
            failed: vec!["bogus".to_string()],
            errors: vec!["bogus: no matching distribution".to_string()],
        };
        assert!(total.all_failed());
        assert!(!total.is_partial());

        let partial = InstallReport {
            installed: vec!["requests".to_string()],
            failed: vec!["bogus".to_string()],
            errors: vec![],
        };
        assert!(!partial.all_failed());
        assert!(partial.is_partial());

        let empty = InstallReport::default();
        assert!(!empty.all_failed());
        assert!(!empty.is_partial());
    }
}
