//! Unified configuration layer.
//!
//! All environment variable reads are centralized here; business code goes
//! through structured configs instead of calling `std::env::var` directly.
//!
//! - `loader`: env_or / env_optional / env_bool helpers, `.env` loading
//! - `schema`: StoreConfig, ArtifactRepoConfig, GatewayConfig, PipelineLimits
//! - `env_keys`: key constants

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv};
pub use schema::{ArtifactRepoConfig, GatewayConfig, PipelineLimits, StoreConfig};
