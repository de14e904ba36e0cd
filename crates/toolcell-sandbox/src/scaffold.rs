//! Base-class staging inside a freshly created sandbox.
//!
//! Downloaded tools import their base class as
//! `Blueprint.Templates.Tools.python_base_tool`; the module and the package
//! markers along that path are materialized here before the tool source is
//! fetched.

use anyhow::{Context, Result};

use crate::manager::Sandbox;

/// The base-class module every tool expects to import.
const BASE_TOOL_SOURCE: &str = include_str!("../assets/python_base_tool.py");

/// Stage the Blueprint package tree under the sandbox root.
pub fn stage_blueprint(sandbox: &Sandbox) -> Result<()> {
    let blueprint = sandbox.root.join("Blueprint");
    let templates = blueprint.join("Templates");
    let tools = templates.join("Tools");
    std::fs::create_dir_all(&tools)
        .with_context(|| format!("Create {}", tools.display()))?;

    let base_tool_path = tools.join("python_base_tool.py");
    std::fs::write(&base_tool_path, BASE_TOOL_SOURCE)
        .with_context(|| format!("Write {}", base_tool_path.display()))?;

    // Package markers make Blueprint.Templates.Tools importable.
    for dir in [&blueprint, &templates, &tools] {
        std::fs::write(dir.join("__init__.py"), "")
            .with_context(|| format!("Write package marker in {}", dir.display()))?;
    }

    let staged = std::fs::read_to_string(&base_tool_path)
        .with_context(|| format!("Re-read {}", base_tool_path.display()))?;
    if !staged.contains("class BaseTool") {
        anyhow::bail!(
            "Staged base-class module is missing the BaseTool class: {}",
            base_tool_path.display()
        );
    }

    tracing::debug!(path = %base_tool_path.display(), "Blueprint scaffolding staged");
    Ok(())
}
