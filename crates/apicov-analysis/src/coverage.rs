use apicov_core::{
    ApiCovError, DeclaredOperation, Observation, ObservationSource, OperationKey, Result, Scope,
    SpecSource,
};
use apicov_spec::{PathMatcher, SpecCatalog};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coverage of a spec catalog by one scope of observations.
///
/// Derived on every call to [`CoverageEngine::analyze`]; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub scope: Scope,
    pub total_declared: usize,
    pub covered_count: usize,
    /// Unrounded percentage in `[0, 100]`.
    pub coverage_pct: f64,
    /// Covered operations with their hit counts, in catalog order.
    pub covered: Vec<CoveredOperation>,
    /// Operations without a single matching observation, in catalog order.
    pub uncovered: Vec<DeclaredOperation>,
    /// `"METHOD path"` of observations that match no declared operation.
    pub undeclared_observed: BTreeSet<String>,
    pub summary: CoverageSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoveredOperation {
    #[serde(flatten)]
    pub operation: DeclaredOperation,
    pub hits: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub total_requests: usize,
    pub unique_endpoints: usize,
    pub method_counts: BTreeMap<String, usize>,
    /// Keyed `"2xx"`, `"4xx"`, ...; observations without a status are not counted.
    pub status_class_counts: BTreeMap<String, usize>,
}

impl CoverageReport {
    pub fn is_fully_covered(&self) -> bool {
        self.total_declared > 0 && self.covered_count == self.total_declared
    }
}

/// `"2xx"`-style class label for a status code.
pub fn status_class(status: u16) -> String {
    format!("{}xx", status / 100)
}

/// Computes coverage reports for an observation source against the
/// currently attached spec catalog.
pub struct CoverageEngine {
    source: Arc<dyn ObservationSource>,
    matcher: RwLock<Option<Arc<PathMatcher>>>,
    strip_base_path: bool,
}

impl CoverageEngine {
    pub fn new(source: Arc<dyn ObservationSource>) -> Self {
        Self {
            source,
            matcher: RwLock::new(None),
            strip_base_path: false,
        }
    }

    pub fn with_catalog(source: Arc<dyn ObservationSource>, catalog: SpecCatalog) -> Self {
        let engine = Self::new(source);
        engine.attach_catalog(catalog);
        engine
    }

    /// Remove the catalog's server base path from observed paths before matching.
    pub fn strip_base_path(mut self, enabled: bool) -> Self {
        self.strip_base_path = enabled;
        self
    }

    pub fn attach_catalog(&self, catalog: SpecCatalog) -> Arc<SpecCatalog> {
        let catalog = Arc::new(catalog);
        let matcher = Arc::new(PathMatcher::new(catalog.clone()));
        *self.matcher.write() = Some(matcher);
        info!(operations = catalog.len(), "Attached spec catalog");
        catalog
    }

    /// Load and attach a catalog. On failure the previous catalog stays attached.
    pub async fn load_spec(&self, source: &dyn SpecSource) -> Result<Arc<SpecCatalog>> {
        match SpecCatalog::from_source(source).await {
            Ok(catalog) => Ok(self.attach_catalog(catalog)),
            Err(e) => {
                warn!(
                    source = %source.describe(),
                    error = %e,
                    "Spec load failed; keeping previous catalog"
                );
                Err(e)
            }
        }
    }

    pub fn catalog(&self) -> Option<Arc<SpecCatalog>> {
        self.matcher.read().as_ref().map(|m| m.catalog().clone())
    }

    pub fn observations(&self, scope: Scope) -> Vec<Observation> {
        self.source.snapshot(scope)
    }

    pub fn analyze(&self, scope: Scope) -> Result<CoverageReport> {
        let observations = self.source.snapshot(scope);
        self.analyze_observations(scope, &observations)
    }

    /// Analyze an explicit snapshot, labelled with `scope`.
    pub fn analyze_observations(
        &self,
        scope: Scope,
        observations: &[Observation],
    ) -> Result<CoverageReport> {
        let matcher = self
            .matcher
            .read()
            .clone()
            .ok_or(ApiCovError::SpecNotLoaded)?;
        let base_path = if self.strip_base_path {
            matcher.catalog().base_path()
        } else {
            None
        };
        let report = compute_coverage(&matcher, scope, observations, base_path.as_deref());
        debug!(
            %scope,
            observations = observations.len(),
            covered = report.covered_count,
            declared = report.total_declared,
            "Computed coverage report"
        );
        Ok(report)
    }
}

/// Pure coverage computation over one observation sequence.
pub fn compute_coverage(
    matcher: &PathMatcher,
    scope: Scope,
    observations: &[Observation],
    base_path: Option<&str>,
) -> CoverageReport {
    let mut hits: HashMap<OperationKey, usize> = HashMap::new();
    let mut undeclared_observed = BTreeSet::new();
    let mut method_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut status_class_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut endpoints: HashSet<String> = HashSet::new();

    for observation in observations {
        let method = observation.normalized_method();
        let path = observation.path();
        let match_path = strip_prefix(&path, base_path);

        match matcher.match_operation(&method, match_path) {
            Some(op) => *hits.entry(op.key()).or_insert(0) += 1,
            None => {
                undeclared_observed.insert(format!("{} {}", method, path));
            }
        }

        *method_counts.entry(method.clone()).or_insert(0) += 1;
        if let Some(status) = observation.status {
            *status_class_counts.entry(status_class(status)).or_insert(0) += 1;
        }
        endpoints.insert(format!("{} {}", method, path));
    }

    let mut covered = Vec::new();
    let mut uncovered = Vec::new();
    for op in matcher.catalog().list_operations() {
        match hits.get(&op.key()) {
            Some(&count) => covered.push(CoveredOperation {
                operation: op.clone(),
                hits: count,
            }),
            None => uncovered.push(op.clone()),
        }
    }

    let total_declared = matcher.catalog().len();
    let covered_count = covered.len();
    let coverage_pct = if total_declared == 0 {
        0.0
    } else {
        covered_count as f64 / total_declared as f64 * 100.0
    };

    CoverageReport {
        scope,
        total_declared,
        covered_count,
        coverage_pct,
        covered,
        uncovered,
        undeclared_observed,
        summary: CoverageSummary {
            total_requests: observations.len(),
            unique_endpoints: endpoints.len(),
            method_counts,
            status_class_counts,
        },
    }
}

fn strip_prefix<'a>(path: &'a str, base_path: Option<&str>) -> &'a str {
    let Some(base) = base_path else {
        return path;
    };
    match path.strip_prefix(base) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}
