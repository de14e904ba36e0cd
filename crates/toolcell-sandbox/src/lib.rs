//! Ephemeral, hermetic execution sandboxes for dynamically fetched tools.
//!
//! - `manager`: sandbox lifecycle (create / destroy / track / reclaim)
//! - `scaffold`: base-class staging inside a sandbox
//! - `install`: dependency installation through the sandbox's installer
//! - `launch`: launcher generation, child execution, JSON result extraction
//! - `common`: shared subprocess plumbing (bounded waits, lossy decoding)

pub mod common;
pub mod install;
pub mod launch;
pub mod manager;
pub mod scaffold;
