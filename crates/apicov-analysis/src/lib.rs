//! ApiCov analysis: coverage reports, usage insights and exports over
//! recorded observations, plus the [`ApiCoverageTracker`] facade tying the
//! spec catalog and call interceptor together.

pub mod coverage;
pub mod export;
pub mod insights;
pub mod tracker;

pub use coverage::{
    compute_coverage, status_class, CoverageEngine, CoverageReport, CoverageSummary,
    CoveredOperation,
};
pub use export::{
    export, to_csv, to_json, to_junit, ExportDocument, ExportFormat, ExportOptions, ExportSummary,
};
pub use insights::{
    derive_insights, EndpointUsage, ErrorBreakdown, InsightEngine, Insights, LatencyStats,
    Priority, Recommendation, RecommendationCategory, TagCoverage,
};
pub use tracker::ApiCoverageTracker;
