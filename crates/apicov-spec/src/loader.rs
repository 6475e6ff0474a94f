use apicov_core::{ApiCovError, Result, SpecSource};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Spec document stored on the local filesystem (JSON or YAML).
#[derive(Debug, Clone)]
pub struct FileSpecSource {
    path: PathBuf,
}

impl FileSpecSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SpecSource for FileSpecSource {
    async fn load(&self) -> Result<Value> {
        SpecLoader::load_from_file(&self.path).await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Spec document served over HTTP(S).
#[derive(Debug, Clone)]
pub struct UrlSpecSource {
    url: String,
    client: reqwest::Client,
}

impl UrlSpecSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl SpecSource for UrlSpecSource {
    async fn load(&self) -> Result<Value> {
        SpecLoader::fetch(&self.client, &self.url).await
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Pick a file or URL source from a configured location string.
pub fn source_for(location: &str) -> Box<dyn SpecSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Box::new(UrlSpecSource::new(location))
    } else {
        Box::new(FileSpecSource::new(location))
    }
}

pub struct SpecLoader;

impl SpecLoader {
    const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

    pub async fn load_from_file(path: &Path) -> Result<Value> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ApiCovError::SpecLoad(format!("cannot read {}: {}", path.display(), e))
        })?;

        let yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        debug!(path = %path.display(), bytes = content.len(), yaml, "Read spec file");
        parse_document(&content, yaml, &path.display().to_string())
    }

    pub async fn load_from_url(url: &str) -> Result<Value> {
        let client = reqwest::Client::builder()
            .timeout(Self::FETCH_TIMEOUT)
            .build()
            .map_err(|e| ApiCovError::SpecLoad(format!("cannot build HTTP client: {}", e)))?;
        Self::fetch(&client, url).await
    }

    async fn fetch(client: &reqwest::Client, url: &str) -> Result<Value> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiCovError::SpecLoad(format!("cannot fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Spec fetch returned non-success status");
            return Err(ApiCovError::SpecLoad(format!(
                "fetching {} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiCovError::SpecLoad(format!("cannot read body of {}: {}", url, e)))?;
        let yaml = url.ends_with(".yaml") || url.ends_with(".yml");
        parse_document(&body, yaml, url)
    }
}

/// Parse JSON, falling back to YAML (or the reverse when `yaml_first`).
pub fn parse_document(text: &str, yaml_first: bool, origin: &str) -> Result<Value> {
    let parsed = if yaml_first {
        parse_yaml(text).or_else(|yaml_err| parse_json(text).map_err(|_| yaml_err))
    } else {
        parse_json(text).or_else(|json_err| parse_yaml(text).map_err(|_| json_err))
    };

    match parsed {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(ApiCovError::SpecLoad(format!(
            "{} is not an object document",
            origin
        ))),
        Err(reason) => Err(ApiCovError::SpecLoad(format!(
            "cannot parse {}: {}",
            origin, reason
        ))),
    }
}

fn parse_json(text: &str) -> std::result::Result<Value, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

fn parse_yaml(text: &str) -> std::result::Result<Value, String> {
    serde_yaml::from_str(text).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_and_yaml_documents_parse() {
        let json = parse_document(r#"{"paths": {"/a": {"get": {}}}}"#, false, "inline").unwrap();
        assert!(json["paths"]["/a"]["get"].is_object());

        let yaml = parse_document("paths:\n  /a:\n    get: {}\n", true, "inline").unwrap();
        assert!(yaml["paths"]["/a"]["get"].is_object());

        let yaml_without_hint =
            parse_document("openapi: 3.0.0\npaths: {}\n", false, "inline").unwrap();
        assert_eq!(yaml_without_hint["openapi"], "3.0.0");
    }

    #[test]
    fn scalars_and_garbage_are_load_errors() {
        assert!(matches!(
            parse_document("42", false, "inline"),
            Err(ApiCovError::SpecLoad(_))
        ));
        assert!(matches!(
            parse_document("{ not: [valid", false, "inline"),
            Err(ApiCovError::SpecLoad(_))
        ));
    }

    #[test]
    fn source_selection_by_scheme() {
        assert_eq!(
            source_for("https://h/openapi.json").describe(),
            "https://h/openapi.json"
        );
        assert_eq!(source_for("./openapi.yaml").describe(), "./openapi.yaml");
    }
}
