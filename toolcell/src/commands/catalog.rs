//! Catalog and repository commands: tools, remote, verify, catalog-import.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use toolcell_artifact::{verify_tool_file, ArtifactFetcher};
use toolcell_core::catalog::CatalogStore;
use toolcell_core::config::{ArtifactRepoConfig, StoreConfig};

/// Print tool names registered in the catalog, one per line.
pub fn list_tools() -> Result<()> {
    let store = CatalogStore::new(&StoreConfig::from_env());
    let names = store.get_all_tool_names().context("List catalog tools")?;
    if names.is_empty() {
        eprintln!("No tools registered in catalog ({})", store.db_path().display());
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

/// Print tool names available in the remote repository, one per line.
pub fn list_remote() -> Result<()> {
    let fetcher = ArtifactFetcher::new(ArtifactRepoConfig::from_env());
    let names = fetcher
        .list()
        .map_err(|e| anyhow::anyhow!("List remote tools: {}", e))?;
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

/// Structurally verify a tool source file and print the report.
pub fn verify(file_path: &str) -> Result<()> {
    let report = verify_tool_file(Path::new(file_path));
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "valid": report.ok,
            "file_size": report.file_size,
            "missing": report.missing,
        }))?
    );
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Import a JSON array of descriptors into the catalog.
pub fn import(file_path: &str) -> Result<()> {
    let store = CatalogStore::new(&StoreConfig::from_env());
    let count = store
        .import_file(Path::new(file_path))
        .map_err(|e| anyhow::anyhow!("Catalog import: {}", e))?;
    println!("Imported {} descriptor(s) into {}", count, store.db_path().display());
    Ok(())
}
