use apicov_analysis::{ApiCoverageTracker, ExportDocument};
use apicov_core::{ApiCovConfig, ApiCovError, Observation, Scope};
use apicov_tracker::{CallInterceptor, MockCollaborator, ObservationLog};
use std::sync::Arc;

fn seeded_tracker(config: ApiCovConfig) -> ApiCoverageTracker {
    let interceptor = CallInterceptor::new(Arc::new(MockCollaborator::new()))
        .with_shared_store(Arc::new(ObservationLog::new()));
    interceptor.store().seed(
        vec![
            Observation::new("GET", "https://h/users?page=1")
                .at(1_700_000_000_000)
                .with_status(200)
                .with_duration_ms(120),
            Observation::new("DELETE", "https://h/users/9")
                .at(1_700_000_000_250)
                .with_status(404)
                .with_duration_ms(30),
        ],
        true,
    );
    ApiCoverageTracker::with_interceptor(Arc::new(interceptor), config)
}

#[test]
fn csv_export_is_byte_exact() {
    let tracker = seeded_tracker(ApiCovConfig::default());
    let csv = tracker.export("csv", Scope::Local).unwrap();
    assert_eq!(
        csv,
        "Method,URL,Status,Duration(ms),Timestamp\n\
         GET,\"https://h/users?page=1\",200,120,2023-11-14T22:13:20.000Z\n\
         DELETE,\"https://h/users/9\",404,30,2023-11-14T22:13:20.250Z"
    );
}

#[test]
fn junit_export_is_byte_exact() {
    let mut config = ApiCovConfig::default();
    config.reporting.junit_suite_name = "Users API".to_string();
    let tracker = seeded_tracker(config);

    let xml = tracker.export("JUnit", Scope::Shared).unwrap();
    assert_eq!(
        xml,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <testsuite name=\"Users API\" tests=\"2\" failures=\"1\" time=\"0.150\">\n  \
         <testcase name=\"GET /users\" time=\"0.120\" classname=\"API.GET\"/>\n  \
         <testcase name=\"DELETE /users/9\" time=\"0.030\" classname=\"API.DELETE\">\n    \
         <failure message=\"HTTP 404\" type=\"HttpError\">DELETE https://h/users/9 returned HTTP 404</failure>\n  \
         </testcase>\n\
         </testsuite>\n"
    );
}

#[test]
fn json_export_round_trips() {
    let tracker = seeded_tracker(ApiCovConfig::default());
    let json = tracker.export("json", Scope::Local).unwrap();
    let document: ExportDocument = serde_json::from_str(&json).unwrap();

    assert_eq!(document.requests, tracker.observations(Scope::Local));
    assert_eq!(document.summary.total_requests, 2);
    assert_eq!(document.summary.unique_endpoints, 2);
    assert_eq!(document.summary.success_rate, 50.0);
    assert_eq!(document.summary.average_duration, 75.0);
    assert!(document.summary.timestamp.ends_with('Z'));
}

#[test]
fn unsupported_format_is_rejected() {
    let tracker = seeded_tracker(ApiCovConfig::default());
    let err = tracker.export("pdf", Scope::Local).unwrap_err();
    assert!(matches!(err, ApiCovError::UnsupportedExportFormat(ref f) if f == "pdf"));
}

#[test]
fn csv_headers_follow_configuration() {
    let mut config = ApiCovConfig::default();
    config.reporting.csv_include_headers = false;
    let tracker = seeded_tracker(config);
    let csv = tracker.export("csv", Scope::Local).unwrap();
    assert!(csv.starts_with("GET,"));
}
