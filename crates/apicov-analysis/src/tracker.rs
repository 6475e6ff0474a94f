use apicov_core::{
    ApiCovConfig, ConfigManager, HttpCollaborator, HttpResponse, Observation, RequestOptions,
    Result, Scope, SpecSource, TransportError,
};
use apicov_spec::{source_for, FileSpecSource, SpecCatalog, UrlSpecSource};
use apicov_tracker::CallInterceptor;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::coverage::{CoverageEngine, CoverageReport};
use crate::export::{export, ExportFormat, ExportOptions};
use crate::insights::{InsightEngine, Insights};

/// One-stop API coverage tracking: intercepts calls, holds the spec catalog
/// and produces reports, insights and exports.
///
/// ```no_run
/// # async fn demo() -> apicov_core::Result<()> {
/// use apicov_analysis::ApiCoverageTracker;
/// use apicov_core::{RequestOptions, Scope};
/// use apicov_tracker::ReqwestCollaborator;
/// use std::sync::Arc;
///
/// let tracker = ApiCoverageTracker::new(Arc::new(ReqwestCollaborator::default()));
/// tracker.load_spec_from_file("openapi.yaml").await?;
/// tracker.get("https://api.example.com/users", RequestOptions::default()).await?;
/// let report = tracker.coverage_report(Scope::Local)?;
/// println!("{:.1}% covered", report.coverage_pct);
/// # Ok(())
/// # }
/// ```
pub struct ApiCoverageTracker {
    interceptor: Arc<CallInterceptor>,
    coverage: CoverageEngine,
    config: ApiCovConfig,
}

impl ApiCoverageTracker {
    pub fn new(collaborator: Arc<dyn HttpCollaborator>) -> Self {
        Self::from_config(collaborator, ApiCovConfig::default())
    }

    pub fn from_config(collaborator: Arc<dyn HttpCollaborator>, config: ApiCovConfig) -> Self {
        let interceptor = Arc::new(CallInterceptor::from_config(collaborator, &config.tracking));
        Self::with_interceptor(interceptor, config)
    }

    /// Build from `.env`, the config file and `APICOV_*` overrides.
    pub fn from_environment(collaborator: Arc<dyn HttpCollaborator>) -> Result<Self> {
        let manager = ConfigManager::load()?;
        Ok(Self::from_config(collaborator, manager.config().clone()))
    }

    /// Build around an existing interceptor, e.g. one bound to an isolated shared log.
    pub fn with_interceptor(interceptor: Arc<CallInterceptor>, config: ApiCovConfig) -> Self {
        let coverage = CoverageEngine::new(interceptor.clone())
            .strip_base_path(config.spec.strip_base_path);
        Self {
            interceptor,
            coverage,
            config,
        }
    }

    pub async fn load_spec_from_file(&self, path: impl AsRef<Path>) -> Result<Arc<SpecCatalog>> {
        self.coverage
            .load_spec(&FileSpecSource::new(path.as_ref()))
            .await
    }

    pub async fn load_spec_from_url(&self, url: &str) -> Result<Arc<SpecCatalog>> {
        self.coverage.load_spec(&UrlSpecSource::new(url)).await
    }

    pub async fn load_spec(&self, source: &dyn SpecSource) -> Result<Arc<SpecCatalog>> {
        self.coverage.load_spec(source).await
    }

    /// Attach an already parsed OpenAPI/Swagger document.
    pub fn load_spec_document(&self, document: &Value) -> Arc<SpecCatalog> {
        self.coverage
            .attach_catalog(SpecCatalog::from_document(document))
    }

    /// Load the spec named by `spec.source` in the configuration, if any.
    pub async fn load_configured_spec(&self) -> Result<Option<Arc<SpecCatalog>>> {
        let Some(location) = self.config.spec.source.as_deref() else {
            return Ok(None);
        };
        let source = source_for(location);
        self.coverage.load_spec(source.as_ref()).await.map(Some)
    }

    pub fn catalog(&self) -> Option<Arc<SpecCatalog>> {
        self.coverage.catalog()
    }

    pub async fn get(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.interceptor.get(url, options).await
    }

    pub async fn post(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.interceptor.post(url, options).await
    }

    pub async fn put(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.interceptor.put(url, options).await
    }

    pub async fn patch(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.interceptor.patch(url, options).await
    }

    pub async fn delete(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.interceptor.delete(url, options).await
    }

    pub async fn head(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.interceptor.head(url, options).await
    }

    pub async fn options(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.interceptor.options(url, options).await
    }

    pub async fn fetch(
        &self,
        method: &str,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.interceptor.fetch(method, url, options).await
    }

    pub fn interceptor(&self) -> &Arc<CallInterceptor> {
        &self.interceptor
    }

    pub fn coverage_engine(&self) -> &CoverageEngine {
        &self.coverage
    }

    pub fn config(&self) -> &ApiCovConfig {
        &self.config
    }

    pub fn observations(&self, scope: Scope) -> Vec<Observation> {
        self.interceptor.observations(scope)
    }

    pub fn coverage_report(&self, scope: Scope) -> Result<CoverageReport> {
        self.coverage.analyze(scope)
    }

    pub fn insights(&self, scope: Scope) -> Result<Insights> {
        InsightEngine::with_config(&self.coverage, self.config.reporting.clone()).generate(scope)
    }

    /// Export one scope as `json`, `csv` or `junit`.
    pub fn export(&self, format: &str, scope: Scope) -> Result<String> {
        let format: ExportFormat = format.parse()?;
        let observations = self.observations(scope);
        let rendered = export(
            &observations,
            format,
            &ExportOptions::from(&self.config.reporting),
        )?;
        info!(?format, %scope, requests = observations.len(), "Exported observations");
        Ok(rendered)
    }

    pub fn set_shared_tracking(&self, enabled: bool) {
        self.interceptor.set_shared_tracking(enabled);
    }

    pub fn clear_local(&self) {
        self.interceptor.clear_local();
    }

    pub fn clear_shared(&self) {
        self.interceptor.clear_shared();
    }
}

