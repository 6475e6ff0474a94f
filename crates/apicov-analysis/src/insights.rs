use apicov_core::{Observation, ReportingConfig, Result, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::coverage::{CoverageEngine, CoverageReport};

/// Analytics derived from a coverage report and the observations behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub scope: Scope,
    pub total_requests: usize,
    pub coverage_pct: f64,
    /// `None` when no observation carries a duration.
    pub latency: Option<LatencyStats>,
    pub error_rate: f64,
    pub errors: ErrorBreakdown,
    /// Per-endpoint aggregates in order of first appearance.
    pub endpoints: Vec<EndpointUsage>,
    pub most_used: Vec<String>,
    pub slowest: Vec<String>,
    pub coverage_by_tag: BTreeMap<String, TagCoverage>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyStats {
    pub samples: usize,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    /// Nearest-rank percentiles keyed `"p50"`, `"p95"`, ...
    pub percentiles: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBreakdown {
    pub total_errors: usize,
    pub client_errors: usize,
    pub server_errors: usize,
    /// Calls that never produced a status (transport failure, timeout, cancel).
    pub no_response: usize,
    pub by_status: BTreeMap<u16, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUsage {
    /// `"METHOD path"`
    pub endpoint: String,
    pub method: String,
    pub path: String,
    pub calls: usize,
    pub average_duration_ms: Option<f64>,
    pub status_codes: BTreeSet<u16>,
    pub first_seen: i64,
    pub last_seen: i64,
    #[serde(skip)]
    timed_calls: usize,
}

impl EndpointUsage {
    fn new(observation: &Observation) -> Self {
        let method = observation.normalized_method();
        let path = observation.path();
        Self {
            endpoint: format!("{} {}", method, path),
            method,
            path,
            calls: 0,
            average_duration_ms: None,
            status_codes: BTreeSet::new(),
            first_seen: observation.timestamp,
            last_seen: observation.timestamp,
            timed_calls: 0,
        }
    }

    fn record(&mut self, observation: &Observation) {
        self.calls += 1;
        if let Some(duration) = observation.duration_ms {
            self.timed_calls += 1;
            let avg = self.average_duration_ms.unwrap_or(0.0);
            self.average_duration_ms =
                Some(avg + (duration as f64 - avg) / self.timed_calls as f64);
        }
        if let Some(status) = observation.status {
            self.status_codes.insert(status);
        }
        self.first_seen = self.first_seen.min(observation.timestamp);
        self.last_seen = self.last_seen.max(observation.timestamp);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCoverage {
    pub declared: usize,
    pub covered: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationCategory {
    Coverage,
    Reliability,
    SpecDrift,
    MutatingOperations,
    AdminOperations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub message: String,
}

/// Nearest-rank percentile of an ascending slice; `None` when empty.
pub fn percentile(sorted: &[u64], p: f64) -> Option<u64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let rank = (p * n as f64 / 100.0).ceil() as i64 - 1;
    let index = rank.clamp(0, n as i64 - 1) as usize;
    Some(sorted[index])
}

/// Percentage of observations with status >= 400; 0 for an empty sequence.
pub fn error_rate(observations: &[Observation]) -> f64 {
    if observations.is_empty() {
        return 0.0;
    }
    let errors = observations.iter().filter(|o| o.is_error()).count();
    errors as f64 / observations.len() as f64 * 100.0
}

pub fn latency_stats(observations: &[Observation], percentiles: &[f64]) -> Option<LatencyStats> {
    let mut durations: Vec<u64> = observations.iter().filter_map(|o| o.duration_ms).collect();
    if durations.is_empty() {
        return None;
    }
    durations.sort_unstable();

    let sum: u64 = durations.iter().sum();
    Some(LatencyStats {
        samples: durations.len(),
        min_ms: durations[0],
        max_ms: durations[durations.len() - 1],
        mean_ms: sum as f64 / durations.len() as f64,
        percentiles: percentiles
            .iter()
            .filter_map(|&p| percentile(&durations, p).map(|v| (format!("p{}", p), v)))
            .collect(),
    })
}

pub fn error_breakdown(observations: &[Observation]) -> ErrorBreakdown {
    let mut breakdown = ErrorBreakdown::default();
    for observation in observations {
        match observation.status {
            None => breakdown.no_response += 1,
            Some(status) if status >= 400 => {
                breakdown.total_errors += 1;
                if status >= 500 {
                    breakdown.server_errors += 1;
                } else {
                    breakdown.client_errors += 1;
                }
                *breakdown.by_status.entry(status).or_insert(0) += 1;
            }
            Some(_) => {}
        }
    }
    breakdown
}

pub fn endpoint_usage(observations: &[Observation]) -> Vec<EndpointUsage> {
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut usage: Vec<EndpointUsage> = Vec::new();
    for observation in observations {
        let key = observation.endpoint_key();
        let slot = *order.entry(key).or_insert_with(|| {
            usage.push(EndpointUsage::new(observation));
            usage.len() - 1
        });
        usage[slot].record(observation);
    }
    usage
}

fn coverage_by_tag(report: &CoverageReport) -> BTreeMap<String, TagCoverage> {
    let mut by_tag: BTreeMap<String, TagCoverage> = BTreeMap::new();
    for covered in &report.covered {
        for tag in &covered.operation.tags {
            let entry = by_tag.entry(tag.clone()).or_default();
            entry.declared += 1;
            entry.covered += 1;
        }
    }
    for op in &report.uncovered {
        for tag in &op.tags {
            by_tag.entry(tag.clone()).or_default().declared += 1;
        }
    }
    by_tag
}

fn preview(items: &[String]) -> String {
    const SHOWN: usize = 5;
    let mut text = items.iter().take(SHOWN).cloned().collect::<Vec<_>>().join(", ");
    if items.len() > SHOWN {
        text.push_str(&format!(" and {} more", items.len() - SHOWN));
    }
    text
}

/// Fixed rule set; the output order is the rule order.
pub fn recommendations(
    report: &CoverageReport,
    error_rate: f64,
    error_rate_threshold: f64,
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    let pct = report.coverage_pct;
    let missing = report.uncovered.len();

    let (priority, message) = if report.total_declared == 0 {
        (
            Priority::Info,
            "The specification declares no operations; coverage cannot be measured".to_string(),
        )
    } else if pct < 50.0 {
        (
            Priority::High,
            format!(
                "Coverage is {:.1}%: {} of {} declared operations are never exercised. Add tests for the core endpoints first",
                pct, missing, report.total_declared
            ),
        )
    } else if pct < 80.0 {
        (
            Priority::Medium,
            format!(
                "Coverage is {:.1}%: {} declared operations remain untested",
                pct, missing
            ),
        )
    } else if missing == 0 {
        (
            Priority::Low,
            format!(
                "All {} declared operations are covered; keep tests in step with the specification",
                report.total_declared
            ),
        )
    } else {
        (
            Priority::Low,
            format!(
                "Coverage is {:.1}%; {} operations left to reach full coverage",
                pct, missing
            ),
        )
    };
    out.push(Recommendation {
        category: RecommendationCategory::Coverage,
        priority,
        message,
    });

    if error_rate > error_rate_threshold {
        out.push(Recommendation {
            category: RecommendationCategory::Reliability,
            priority: Priority::High,
            message: format!(
                "{:.1}% of requests failed with status >= 400 (threshold {:.1}%). Check test data and API health",
                error_rate, error_rate_threshold
            ),
        });
    }

    if !report.undeclared_observed.is_empty() {
        let undeclared: Vec<String> = report.undeclared_observed.iter().cloned().collect();
        out.push(Recommendation {
            category: RecommendationCategory::SpecDrift,
            priority: Priority::Medium,
            message: format!(
                "{} observed endpoints are not declared in the specification: {}",
                undeclared.len(),
                preview(&undeclared)
            ),
        });
    }

    let mutating: Vec<String> = report
        .uncovered
        .iter()
        .filter(|op| op.method.is_mutating())
        .map(|op| op.to_string())
        .collect();
    if !mutating.is_empty() {
        out.push(Recommendation {
            category: RecommendationCategory::MutatingOperations,
            priority: Priority::High,
            message: format!(
                "{} state-changing operations are untested: {}",
                mutating.len(),
                preview(&mutating)
            ),
        });
    }

    let admin: Vec<String> = report
        .uncovered
        .iter()
        .filter(|op| op.has_tag("admin"))
        .map(|op| op.to_string())
        .collect();
    if !admin.is_empty() {
        out.push(Recommendation {
            category: RecommendationCategory::AdminOperations,
            priority: Priority::Medium,
            message: format!(
                "{} admin operations are untested: {}",
                admin.len(),
                preview(&admin)
            ),
        });
    }

    out
}

/// Stable sort so ties keep first-appearance order.
fn top_endpoints<F>(endpoints: &[EndpointUsage], limit: usize, order: F) -> Vec<String>
where
    F: Fn(&EndpointUsage, &EndpointUsage) -> std::cmp::Ordering,
{
    let mut ranked: Vec<&EndpointUsage> = endpoints.iter().collect();
    ranked.sort_by(|a, b| order(a, b));
    ranked
        .into_iter()
        .take(limit)
        .map(|e| e.endpoint.clone())
        .collect()
}

/// Derive insights from a report and the exact observations it was built from.
pub fn derive_insights(
    report: &CoverageReport,
    observations: &[Observation],
    config: &ReportingConfig,
) -> Insights {
    let endpoints = endpoint_usage(observations);
    let rate = error_rate(observations);

    let most_used = top_endpoints(&endpoints, config.top_endpoints, |a, b| b.calls.cmp(&a.calls));
    let slowest = top_endpoints(
        &endpoints
            .iter()
            .filter(|e| e.average_duration_ms.is_some())
            .cloned()
            .collect::<Vec<_>>(),
        config.top_endpoints,
        |a, b| {
            b.average_duration_ms
                .partial_cmp(&a.average_duration_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
        },
    );

    Insights {
        scope: report.scope,
        total_requests: observations.len(),
        coverage_pct: report.coverage_pct,
        latency: latency_stats(observations, &config.percentiles),
        error_rate: rate,
        errors: error_breakdown(observations),
        most_used,
        slowest,
        coverage_by_tag: coverage_by_tag(report),
        recommendations: recommendations(report, rate, config.error_rate_threshold),
        endpoints,
    }
}

/// Insight generation on top of a [`CoverageEngine`].
pub struct InsightEngine<'a> {
    coverage: &'a CoverageEngine,
    config: ReportingConfig,
}

impl<'a> InsightEngine<'a> {
    pub fn new(coverage: &'a CoverageEngine) -> Self {
        Self::with_config(coverage, ReportingConfig::default())
    }

    pub fn with_config(coverage: &'a CoverageEngine, config: ReportingConfig) -> Self {
        Self { coverage, config }
    }

    pub fn generate(&self, scope: Scope) -> Result<Insights> {
        let observations = self.coverage.observations(scope);
        let report = self.coverage.analyze_observations(scope, &observations)?;
        let insights = derive_insights(&report, &observations, &self.config);
        debug!(
            %scope,
            recommendations = insights.recommendations.len(),
            error_rate = insights.error_rate,
            "Generated insights"
        );
        Ok(insights)
    }
}
