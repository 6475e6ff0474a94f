use apicov_analysis::{
    ApiCoverageTracker, CoverageEngine, InsightEngine, Priority, RecommendationCategory,
};
use apicov_core::{
    ApiCovConfig, ApiCovError, HttpMethod, Observation, ObservationSource, RequestOptions, Scope,
};
use apicov_spec::SpecCatalog;
use apicov_tracker::{CallInterceptor, MockCollaborator, ObservationLog};
use approx::assert_relative_eq;
use serde_json::json;
use std::sync::Arc;

struct Recorded(Vec<Observation>);

impl ObservationSource for Recorded {
    fn snapshot(&self, _scope: Scope) -> Vec<Observation> {
        self.0.clone()
    }
}

fn users_spec() -> serde_json::Value {
    json!({
        "openapi": "3.0.0",
        "info": {"title": "Users", "version": "1.0"},
        "servers": [{"url": "https://api.example.com/v1"}],
        "paths": {
            "/users": {
                "get": {"operationId": "listUsers", "tags": ["users"]},
                "post": {"operationId": "createUser", "tags": ["users"]}
            },
            "/users/{id}": {
                "get": {"operationId": "getUser", "tags": ["users"]},
                "delete": {"operationId": "deleteUser", "tags": ["users", "admin"]}
            }
        }
    })
}

fn tracker(mock: MockCollaborator) -> ApiCoverageTracker {
    let interceptor = CallInterceptor::new(Arc::new(mock))
        .with_shared_store(Arc::new(ObservationLog::new()));
    ApiCoverageTracker::with_interceptor(Arc::new(interceptor), ApiCovConfig::default())
}

#[tokio::test]
async fn full_coverage_of_two_operations() {
    let tracker = tracker(MockCollaborator::new().route("POST", "/users", 201));
    tracker.load_spec_document(&json!({
        "paths": {"/users": {"get": {}, "post": {}}}
    }));

    tracker.get("https://h/users", RequestOptions::default()).await.unwrap();
    tracker
        .get("https://h/users", RequestOptions::default().query("page", "2"))
        .await
        .unwrap();
    tracker
        .post("https://h/users", RequestOptions::default().json(json!({"name": "a"})))
        .await
        .unwrap();

    let report = tracker.coverage_report(Scope::Local).unwrap();
    assert_eq!(report.summary.total_requests, 3);
    assert_eq!(report.summary.unique_endpoints, 2);
    assert_eq!(report.summary.method_counts["GET"], 2);
    assert_eq!(report.summary.method_counts["POST"], 1);
    assert_eq!(report.summary.status_class_counts["2xx"], 3);
    assert_eq!(report.total_declared, 2);
    assert_eq!(report.covered_count, 2);
    assert_relative_eq!(report.coverage_pct, 100.0);
    assert!(report.uncovered.is_empty());
    assert!(report.undeclared_observed.is_empty());
    assert!(report.is_fully_covered());
}

#[tokio::test]
async fn undeclared_paths_are_reported() {
    let tracker = tracker(MockCollaborator::new());
    tracker.load_spec_document(&users_spec());

    tracker.get("https://h/users/42", RequestOptions::default()).await.unwrap();
    tracker.get("https://h/comments", RequestOptions::default()).await.unwrap();

    let report = tracker.coverage_report(Scope::Local).unwrap();
    assert_eq!(report.covered_count, 1);
    assert_eq!(report.covered[0].operation.operation_id.as_deref(), Some("getUser"));
    assert_relative_eq!(report.coverage_pct, 25.0);
    assert_eq!(
        report.undeclared_observed.iter().collect::<Vec<_>>(),
        vec!["GET /comments"]
    );
    assert_eq!(report.summary.unique_endpoints, 2);
}

#[tokio::test]
async fn failed_calls_without_status_still_cover() {
    let tracker = tracker(MockCollaborator::new().failing("GET", "/users", "connection reset"));
    tracker.load_spec_document(&users_spec());

    assert!(tracker.get("https://h/users", RequestOptions::default()).await.is_err());

    let report = tracker.coverage_report(Scope::Local).unwrap();
    assert_eq!(report.covered_count, 1);
    assert!(report.summary.status_class_counts.is_empty());
    assert_eq!(report.summary.total_requests, 1);
}

#[test]
fn only_undeclared_traffic_is_zero_percent() {
    let engine = CoverageEngine::with_catalog(
        Arc::new(Recorded(vec![Observation::new("GET", "https://h/comments").with_status(200)])),
        SpecCatalog::from_document(&json!({"paths": {"/users": {"get": {}}}})),
    );
    let report = engine.analyze(Scope::Local).unwrap();
    assert_eq!(report.covered_count, 0);
    assert_eq!(report.coverage_pct, 0.0);
    assert!(report.undeclared_observed.contains("GET /comments"));
}

#[test]
fn empty_catalog_reports_zero_percent() {
    let engine = CoverageEngine::with_catalog(
        Arc::new(Recorded(vec![Observation::new("GET", "/anything")])),
        SpecCatalog::from_document(&json!({"openapi": "3.0.0"})),
    );
    let report = engine.analyze(Scope::Local).unwrap();
    assert_eq!(report.total_declared, 0);
    assert_eq!(report.coverage_pct, 0.0);
    assert!(!report.is_fully_covered());
    assert_eq!(report.undeclared_observed.len(), 1);

    let insights = InsightEngine::new(&engine).generate(Scope::Local).unwrap();
    assert_eq!(insights.recommendations[0].priority, Priority::Info);
}

#[test]
fn analysis_requires_a_catalog() {
    let engine = CoverageEngine::new(Arc::new(Recorded(Vec::new())));
    assert!(matches!(engine.analyze(Scope::Shared), Err(ApiCovError::SpecNotLoaded)));
    assert!(matches!(
        InsightEngine::new(&engine).generate(Scope::Local),
        Err(ApiCovError::SpecNotLoaded)
    ));
}

#[test]
fn repeated_analysis_is_identical() {
    let observations = vec![
        Observation::new("GET", "https://h/users").with_status(200).with_duration_ms(12),
        Observation::new("DELETE", "https://h/users/7").with_status(500).with_duration_ms(40),
        Observation::new("PUT", "https://h/users/7"),
    ];
    let engine = CoverageEngine::with_catalog(
        Arc::new(Recorded(observations)),
        SpecCatalog::from_document(&users_spec()),
    );
    assert_eq!(engine.analyze(Scope::Local).unwrap(), engine.analyze(Scope::Local).unwrap());

    let insights = InsightEngine::new(&engine);
    assert_eq!(
        insights.generate(Scope::Local).unwrap(),
        insights.generate(Scope::Local).unwrap()
    );
}

#[test]
fn unique_endpoints_never_exceed_total_requests() {
    let observations: Vec<_> = (0..20)
        .map(|i| Observation::new("GET", format!("https://h/users/{}", i % 3)))
        .collect();
    let engine = CoverageEngine::with_catalog(
        Arc::new(Recorded(observations)),
        SpecCatalog::from_document(&users_spec()),
    );
    let report = engine.analyze(Scope::Local).unwrap();
    assert_eq!(report.summary.total_requests, 20);
    assert_eq!(report.summary.unique_endpoints, 3);
    assert_eq!(report.covered[0].hits, 20);
}

#[test]
fn base_path_stripping_is_opt_in() {
    let observations = vec![Observation::new("GET", "https://api.example.com/v1/users")];
    let catalog = SpecCatalog::from_document(&users_spec());

    let plain =
        CoverageEngine::with_catalog(Arc::new(Recorded(observations.clone())), catalog.clone());
    assert_eq!(plain.analyze(Scope::Local).unwrap().covered_count, 0);

    let stripped = CoverageEngine::with_catalog(Arc::new(Recorded(observations)), catalog)
        .strip_base_path(true);
    let report = stripped.analyze(Scope::Local).unwrap();
    assert_eq!(report.covered_count, 1);
    assert!(report.undeclared_observed.is_empty());
}

#[test]
fn insights_flag_errors_drift_and_untested_mutations() {
    let observations = vec![
        Observation::new("GET", "https://h/users").with_status(200).with_duration_ms(10),
        Observation::new("GET", "https://h/users").with_status(500).with_duration_ms(90),
        Observation::new("GET", "https://h/legacy").with_status(404).with_duration_ms(5),
    ];
    let engine = CoverageEngine::with_catalog(
        Arc::new(Recorded(observations)),
        SpecCatalog::from_document(&users_spec()),
    );
    let insights = InsightEngine::new(&engine).generate(Scope::Local).unwrap();

    assert_relative_eq!(insights.error_rate, 200.0 / 3.0, epsilon = 1e-9);
    assert_eq!(insights.most_used[0], "GET /users");
    assert_eq!(insights.slowest[0], "GET /users");
    assert_eq!(insights.latency.as_ref().unwrap().max_ms, 90);
    assert_eq!(insights.coverage_by_tag["admin"].declared, 1);
    assert_eq!(insights.coverage_by_tag["admin"].covered, 0);

    let categories: Vec<_> = insights.recommendations.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![
            RecommendationCategory::Coverage,
            RecommendationCategory::Reliability,
            RecommendationCategory::SpecDrift,
            RecommendationCategory::MutatingOperations,
            RecommendationCategory::AdminOperations,
        ]
    );
    assert_eq!(insights.recommendations[0].priority, Priority::High);
}

#[tokio::test]
async fn failed_spec_load_keeps_previous_catalog() {
    let tracker = tracker(MockCollaborator::new());
    tracker.load_spec_document(&users_spec());

    let err = tracker
        .load_spec_from_file("/definitely/not/here.yaml")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiCovError::SpecLoad(_)));

    let catalog = tracker.catalog().unwrap();
    assert_eq!(catalog.len(), 4);
    assert!(catalog.find(HttpMethod::Delete, "/users/{id}").is_some());
}

#[tokio::test]
async fn shared_scope_spans_trackers_on_one_log() {
    let shared = Arc::new(ObservationLog::new());
    let make = || {
        let interceptor = CallInterceptor::new(Arc::new(MockCollaborator::new()))
            .with_shared_store(shared.clone());
        let tracker =
            ApiCoverageTracker::with_interceptor(Arc::new(interceptor), ApiCovConfig::default());
        tracker.load_spec_document(&users_spec());
        tracker
    };
    let first = make();
    let second = make();

    first.get("https://h/users", RequestOptions::default()).await.unwrap();
    second.get("https://h/users/1", RequestOptions::default()).await.unwrap();

    assert_eq!(first.coverage_report(Scope::Local).unwrap().covered_count, 1);
    assert_eq!(first.coverage_report(Scope::Shared).unwrap().covered_count, 2);

    second.clear_shared();
    assert_eq!(first.coverage_report(Scope::Shared).unwrap().summary.total_requests, 0);
    assert_eq!(second.coverage_report(Scope::Local).unwrap().summary.total_requests, 1);
}
