use apicov_core::{DeclaredOperation, HttpMethod, Result, SpecSource};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

use crate::loader::{FileSpecSource, UrlSpecSource};

/// Declared operations of one OpenAPI/Swagger document, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SpecCatalog {
    operations: Vec<DeclaredOperation>,
    base_url: Option<String>,
    title: Option<String>,
    version: Option<String>,
}

impl SpecCatalog {
    /// Build a catalog from a parsed document. Never fails: anything that is
    /// not shaped like an OpenAPI `paths` object is simply skipped.
    pub fn from_document(document: &Value) -> Self {
        let mut operations = Vec::new();

        if let Some(paths) = document.get("paths").and_then(Value::as_object) {
            for (template, item) in paths {
                let Some(item) = item.as_object() else {
                    continue;
                };
                for method in HttpMethod::ALL {
                    if let Some(op) = item.get(method.spec_key()) {
                        operations.push(declared_operation(template, method, op));
                    }
                }
            }
        }

        let info = document.get("info");
        let catalog = Self {
            operations,
            base_url: base_url_of(document),
            title: info
                .and_then(|i| i.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string),
            version: info
                .and_then(|i| i.get("version"))
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        debug!(
            operations = catalog.operations.len(),
            base_url = ?catalog.base_url,
            "Parsed API specification"
        );
        catalog
    }

    pub fn from_operations(operations: Vec<DeclaredOperation>) -> Self {
        Self {
            operations,
            ..Default::default()
        }
    }

    pub async fn from_source(source: &dyn SpecSource) -> Result<Self> {
        let document = source.load().await?;
        let catalog = Self::from_document(&document);
        info!(
            source = %source.describe(),
            operations = catalog.len(),
            "Loaded API specification"
        );
        Ok(catalog)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(&FileSpecSource::new(path.as_ref())).await
    }

    pub async fn from_url(url: &str) -> Result<Self> {
        Self::from_source(&UrlSpecSource::new(url)).await
    }

    pub fn list_operations(&self) -> &[DeclaredOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Path part of the base URL, without a trailing slash; `None` for root.
    pub fn base_path(&self) -> Option<String> {
        let base = self.base_url.as_deref()?;
        let path = url::Url::parse(base)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| apicov_core::url_path(base));
        let trimmed = path.trim_end_matches('/');
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn find(&self, method: HttpMethod, path_template: &str) -> Option<&DeclaredOperation> {
        self.operations
            .iter()
            .find(|op| op.method == method && op.path_template == path_template)
    }

    /// Operations grouped by tag; untagged operations are not listed.
    pub fn operations_by_tag(&self) -> BTreeMap<String, Vec<&DeclaredOperation>> {
        let mut grouped: BTreeMap<String, Vec<&DeclaredOperation>> = BTreeMap::new();
        for op in &self.operations {
            for tag in &op.tags {
                grouped.entry(tag.clone()).or_default().push(op);
            }
        }
        grouped
    }
}

fn declared_operation(template: &str, method: HttpMethod, op: &Value) -> DeclaredOperation {
    let mut declared = DeclaredOperation::new(method, template);
    declared.operation_id = op
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_string);
    declared.summary = op.get("summary").and_then(Value::as_str).map(str::to_string);
    declared.tags = op
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
        })
        .unwrap_or_default();
    declared
}

/// OpenAPI 3 `servers[0].url`, or the Swagger 2 `schemes`/`host`/`basePath` triple.
fn base_url_of(document: &Value) -> Option<String> {
    if let Some(url) = document
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
    {
        return Some(url.to_string());
    }

    let host = document.get("host").and_then(Value::as_str)?;
    let scheme = document
        .get("schemes")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(Value::as_str)
        .unwrap_or("https");
    let base_path = document
        .get("basePath")
        .and_then(Value::as_str)
        .unwrap_or("");
    Some(format!("{}://{}{}", scheme, host, base_path))
}
