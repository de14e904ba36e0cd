//! Remote tool artifact access.
//!
//! The repository is a file tree of the form `<base>/Tools/<name>.py`
//! behind optionally authenticated HTTP. One attempt per call, no retries;
//! an absent artifact comes back as [`FetchError::NotFound`] with name
//! suggestions, transport problems as [`FetchError::Unavailable`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use toolcell_core::config::ArtifactRepoConfig;

/// Directory inside the repository that holds tool sources.
const TOOLS_DIR: &str = "Tools";
/// Tool source file extension.
const TOOL_EXT: &str = "py";
/// Cap on "did you mean" suggestions.
const MAX_SUGGESTIONS: usize = 5;
/// Per-request transport timeout.
const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Tool '{tool_name}.py' not found in repository")]
    NotFound {
        tool_name: String,
        suggestions: Vec<String>,
    },

    #[error("Artifact repository unavailable: {0}")]
    Unavailable(String),
}

/// Successful download result.
#[derive(Debug)]
pub struct DownloadedArtifact {
    pub file_path: PathBuf,
    pub size: u64,
}

/// Structural verification of a downloaded tool file.
#[derive(Debug)]
pub struct VerificationReport {
    pub ok: bool,
    pub missing: Vec<String>,
    pub file_size: u64,
}

/// Client for the remote artifact repository. Owned by the application root.
pub struct ArtifactFetcher {
    config: ArtifactRepoConfig,
    client: Client,
}

impl ArtifactFetcher {
    pub fn new(config: ArtifactRepoConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn base(&self) -> Result<&str, FetchError> {
        let base = self.config.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(FetchError::Unavailable(
                "artifact repository URL is not configured".to_string(),
            ));
        }
        Ok(base)
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let mut request = self.client.get(url);
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .map_err(|e| FetchError::Unavailable(e.to_string()))
    }

    /// Download one tool source into `target_dir` (created if missing).
    pub fn download(
        &self,
        tool_name: &str,
        target_dir: &Path,
    ) -> Result<DownloadedArtifact, FetchError> {
        let url = format!("{}/{}/{}.{}", self.base()?, TOOLS_DIR, tool_name, TOOL_EXT);
        tracing::info!(tool = %tool_name, %url, "Downloading tool artifact");

        let response = self.get(&url)?;
        if response.status() == StatusCode::NOT_FOUND {
            let suggestions = self.suggest(tool_name);
            tracing::warn!(tool = %tool_name, ?suggestions, "Artifact not found");
            return Err(FetchError::NotFound {
                tool_name: tool_name.to_string(),
                suggestions,
            });
        }
        if !response.status().is_success() {
            return Err(FetchError::Unavailable(format!(
                "HTTP {} fetching {}",
                response.status(),
                url
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;

        std::fs::create_dir_all(target_dir)
            .map_err(|e| FetchError::Unavailable(format!("{}: {}", target_dir.display(), e)))?;
        let file_path = target_dir.join(format!("{}.{}", tool_name, TOOL_EXT));
        std::fs::write(&file_path, &body)
            .map_err(|e| FetchError::Unavailable(format!("{}: {}", file_path.display(), e)))?;

        tracing::info!(
            path = %file_path.display(),
            size = body.len(),
            "Tool artifact downloaded"
        );
        Ok(DownloadedArtifact {
            file_path,
            size: body.len() as u64,
        })
    }

    /// Names available in the repository's `Tools/` directory.
    ///
    /// The listing is a JSON array, either of plain names or of objects
    /// with a `name` field; entries are filtered on the tool extension.
    pub fn list(&self) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/{}/", self.base()?, TOOLS_DIR);
        let response = self.get(&url)?;
        if !response.status().is_success() {
            return Err(FetchError::Unavailable(format!(
                "HTTP {} listing {}",
                response.status(),
                url
            )));
        }

        let listing: Value = response
            .json()
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;
        let entries = listing
            .as_array()
            .ok_or_else(|| FetchError::Unavailable("listing is not a JSON array".to_string()))?;

        let suffix = format!(".{}", TOOL_EXT);
        let names = entries
            .iter()
            .filter_map(|entry| {
                entry
                    .as_str()
                    .or_else(|| entry.get("name").and_then(Value::as_str))
            })
            .filter_map(|name| name.strip_suffix(&suffix))
            .map(String::from)
            .collect();
        Ok(names)
    }

    /// Case-folded substring relation in either direction, capped.
    fn suggest(&self, tool_name: &str) -> Vec<String> {
        let available = match self.list() {
            Ok(names) => names,
            Err(_) => return Vec::new(),
        };
        let needle = tool_name.to_lowercase();
        available
            .into_iter()
            .filter(|candidate| {
                let folded = candidate.to_lowercase();
                folded.contains(&needle) || needle.contains(&folded)
            })
            .take(MAX_SUGGESTIONS)
            .collect()
    }
}

/// Structural check of a downloaded file: it must define a class, reference
/// the known base-class symbol, and expose the entry-method marker.
pub fn verify_tool_file(file_path: &Path) -> VerificationReport {
    let content = match std::fs::read_to_string(file_path) {
        Ok(content) => content,
        Err(_) => {
            return VerificationReport {
                ok: false,
                missing: vec!["file does not exist".to_string()],
                file_size: 0,
            };
        }
    };

    let mut missing = Vec::new();
    if !content.contains("class ") {
        missing.push("class definition".to_string());
    }
    if !content.contains("BaseTool") {
        missing.push("BaseTool inheritance".to_string());
    }
    if !content.contains("def run_sync") {
        missing.push("run_sync method".to_string());
    }

    VerificationReport {
        ok: missing.is_empty(),
        missing,
        file_size: content.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOOL_SOURCE: &str = r#"
from Blueprint.Templates.Tools.python_base_tool import BaseTool

class EchoTool(BaseTool):
    dependencies = ["requests"]

    def run_sync(self, input_data):
        return {"status": "success", "echo": input_data}
"#;

    fn fetcher_for(server_uri: &str) -> ArtifactFetcher {
        ArtifactFetcher::new(ArtifactRepoConfig {
            base_url: server_uri.to_string(),
            token: Some("test-token".to_string()),
        })
    }

    fn start_server() -> (tokio::runtime::Runtime, MockServer) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        (rt, server)
    }

    #[test]
    fn download_writes_the_tool_file() {
        let (rt, server) = start_server();
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/Tools/EchoTool.py"))
                .respond_with(ResponseTemplate::new(200).set_body_string(TOOL_SOURCE))
                .mount(&server),
        );

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_for(&server.uri());
        let artifact = fetcher.download("EchoTool", dir.path()).unwrap();

        assert_eq!(artifact.file_path, dir.path().join("EchoTool.py"));
        assert_eq!(artifact.size, TOOL_SOURCE.len() as u64);
        assert!(artifact.file_path.exists());
    }

    #[test]
    fn missing_tool_comes_back_with_suggestions() {
        let (rt, server) = start_server();
        rt.block_on(async {
            Mock::given(method("GET"))
                .and(path("/Tools/NAICSExcel.py"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/Tools/"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                    { "name": "NAICSExcelTool.py" },
                    { "name": "WeatherTool.py" },
                    { "name": "README.md" },
                ])))
                .mount(&server)
                .await;
        });

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_for(&server.uri());
        let err = fetcher.download("NAICSExcel", dir.path()).unwrap_err();

        match err {
            FetchError::NotFound {
                tool_name,
                suggestions,
            } => {
                assert_eq!(tool_name, "NAICSExcel");
                assert_eq!(suggestions, vec!["NAICSExcelTool"]);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn transport_failure_is_unavailable() {
        let fetcher = fetcher_for("http://127.0.0.1:1");
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            fetcher.download("AnyTool", dir.path()),
            Err(FetchError::Unavailable(_))
        ));
    }

    #[test]
    fn listing_accepts_plain_names_and_objects() {
        let (rt, server) = start_server();
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/Tools/"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                    "AlphaTool.py",
                    { "name": "BetaTool.py" },
                    "notes.txt",
                ])))
                .mount(&server),
        );

        let fetcher = fetcher_for(&server.uri());
        assert_eq!(fetcher.list().unwrap(), vec!["AlphaTool", "BetaTool"]);
    }

    #[test]
    fn unconfigured_repository_is_unavailable() {
        let fetcher = ArtifactFetcher::new(ArtifactRepoConfig {
            base_url: String::new(),
            token: None,
        });
        assert!(matches!(fetcher.list(), Err(FetchError::Unavailable(_))));
    }

    #[test]
    fn verify_accepts_a_well_formed_tool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EchoTool.py");
        std::fs::write(&path, TOOL_SOURCE).unwrap();

        let report = verify_tool_file(&path);
        assert!(report.ok);
        assert!(report.missing.is_empty());
        assert_eq!(report.file_size, TOOL_SOURCE.len() as u64);
    }

    #[test]
    fn verify_reports_missing_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("NotATool.py");
        std::fs::write(&path, "def helper():\n    return 1\n").unwrap();

        let report = verify_tool_file(&path);
        assert!(!report.ok);
        assert_eq!(
            report.missing,
            vec!["class definition", "BaseTool inheritance", "run_sync method"]
        );

        let gone = verify_tool_file(&dir.path().join("missing.py"));
        assert!(!gone.ok);
        assert_eq!(gone.missing, vec!["file does not exist"]);
    }
}
