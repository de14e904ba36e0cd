//! CLI entry for the full execution pipeline.

use std::io::Read;

use anyhow::Result;
use serde_json::Value;
use toolcell_engine::ToolExecutor;

/// Run one tool through the pipeline and print the result envelope.
pub fn run(tool_name: &str, input_json: &str) -> Result<()> {
    let input_json = if input_json == "-" {
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s)?;
        s
    } else {
        input_json.to_string()
    };

    let input: Value = serde_json::from_str(&input_json)
        .map_err(|e| anyhow::anyhow!("Invalid input JSON: {}", e))?;

    let executor = ToolExecutor::from_env();
    let envelope = executor.execute(tool_name, &input);
    executor.sandboxes().flush_deferred();

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    if !envelope.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
