//! Upstream package registry client
//!
//! Fetches package metadata from the documentation sources the server proxies
//! (PyPI, npm, GitHub). Base URLs are injectable so tests can point the
//! client at a local mock server.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::domain::DomainError;

/// Supported upstream registries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Registry {
    PyPi,
    Npm,
    GitHub,
}

impl Registry {
    /// Dependency name used for circuit breaker lookup
    pub fn dependency_name(&self) -> &'static str {
        match self {
            Self::PyPi => "pypi",
            Self::Npm => "npm",
            Self::GitHub => "github",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pypi" => Some(Self::PyPi),
            "npm" => Some(Self::Npm),
            "github" => Some(Self::GitHub),
            _ => None,
        }
    }
}

impl std::fmt::Display for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dependency_name())
    }
}

/// Normalized package metadata across registries
#[derive(Debug, Clone, Serialize)]
pub struct PackageMetadata {
    pub registry: Registry,
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
}

/// Base URLs for the upstream registries
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub pypi_base_url: String,
    pub npm_base_url: String,
    pub github_base_url: String,
    pub request_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            pypi_base_url: "https://pypi.org".to_string(),
            npm_base_url: "https://registry.npmjs.org".to_string(),
            github_base_url: "https://api.github.com".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("mcp-docs-gateway")
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    fn package_url(&self, registry: Registry, name: &str) -> String {
        match registry {
            Registry::PyPi => format!("{}/pypi/{}/json", self.config.pypi_base_url, name),
            Registry::Npm => format!("{}/{}", self.config.npm_base_url, name),
            // Name is "owner/repo" for GitHub
            Registry::GitHub => format!("{}/repos/{}", self.config.github_base_url, name),
        }
    }

    /// Fetch metadata for one package.
    ///
    /// Any non-success status, transport error or unparsable body maps to
    /// `DomainError::Upstream`, which the breaker records as a failure.
    pub async fn fetch_package(
        &self,
        registry: Registry,
        name: &str,
    ) -> Result<PackageMetadata, DomainError> {
        let dependency = registry.dependency_name();
        let url = self.package_url(registry, name);
        debug!("Fetching package metadata: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DomainError::upstream(dependency, format!("Request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DomainError::not_found(format!(
                "Package '{}' not found on {}",
                name, dependency
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::upstream(
                dependency,
                format!("HTTP {}: {}", status, error_body),
            ));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            DomainError::upstream(dependency, format!("Failed to parse response: {}", e))
        })?;

        Ok(Self::extract_metadata(registry, name, &body))
    }

    fn extract_metadata(
        registry: Registry,
        name: &str,
        body: &serde_json::Value,
    ) -> PackageMetadata {
        let str_at = |value: &serde_json::Value, path: &[&str]| -> Option<String> {
            let mut current = value;
            for segment in path {
                current = current.get(segment)?;
            }
            current.as_str().map(str::to_string)
        };

        let (version, description, homepage) = match registry {
            Registry::PyPi => (
                str_at(body, &["info", "version"]),
                str_at(body, &["info", "summary"]),
                str_at(body, &["info", "home_page"]),
            ),
            Registry::Npm => (
                str_at(body, &["dist-tags", "latest"]),
                str_at(body, &["description"]),
                str_at(body, &["homepage"]),
            ),
            Registry::GitHub => (
                str_at(body, &["default_branch"]),
                str_at(body, &["description"]),
                str_at(body, &["html_url"]),
            ),
        };

        PackageMetadata {
            registry,
            name: name.to_string(),
            version,
            description,
            homepage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_against(server: &MockServer) -> UpstreamClient {
        let config = UpstreamConfig {
            pypi_base_url: server.uri(),
            npm_base_url: server.uri(),
            github_base_url: server.uri(),
            request_timeout: Duration::from_secs(2),
        };
        UpstreamClient::new(config).unwrap()
    }

    #[test]
    fn test_registry_parse() {
        assert_eq!(Registry::parse("pypi"), Some(Registry::PyPi));
        assert_eq!(Registry::parse("npm"), Some(Registry::Npm));
        assert_eq!(Registry::parse("github"), Some(Registry::GitHub));
        assert_eq!(Registry::parse("crates"), None);
    }

    #[tokio::test]
    async fn test_fetch_pypi_package() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/requests/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "info": {
                    "version": "2.32.3",
                    "summary": "Python HTTP for Humans.",
                    "home_page": "https://requests.readthedocs.io"
                }
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let metadata = client.fetch_package(Registry::PyPi, "requests").await.unwrap();

        assert_eq!(metadata.name, "requests");
        assert_eq!(metadata.version.as_deref(), Some("2.32.3"));
        assert_eq!(metadata.description.as_deref(), Some("Python HTTP for Humans."));
    }

    #[tokio::test]
    async fn test_fetch_npm_package() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/express"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dist-tags": { "latest": "4.19.2" },
                "description": "Fast, unopinionated web framework",
                "homepage": "https://expressjs.com/"
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let metadata = client.fetch_package(Registry::Npm, "express").await.unwrap();

        assert_eq!(metadata.version.as_deref(), Some("4.19.2"));
        assert_eq!(metadata.homepage.as_deref(), Some("https://expressjs.com/"));
    }

    #[tokio::test]
    async fn test_missing_package_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/nope/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let err = client.fetch_package(Registry::PyPi, "nope").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/rust-lang/rust"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let err = client
            .fetch_package(Registry::GitHub, "rust-lang/rust")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Upstream { .. }));
    }
}
