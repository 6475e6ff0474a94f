use apicov_core::{ApiCovError, Observation, ReportingConfig, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Junit,
}

impl FromStr for ExportFormat {
    type Err = ApiCovError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "junit" | "xml" => Ok(ExportFormat::Junit),
            other => Err(ApiCovError::UnsupportedExportFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub csv_include_headers: bool,
    pub junit_suite_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&ReportingConfig::default())
    }
}

impl From<&ReportingConfig> for ExportOptions {
    fn from(config: &ReportingConfig) -> Self {
        Self {
            csv_include_headers: config.csv_include_headers,
            junit_suite_name: config.junit_suite_name.clone(),
        }
    }
}

/// Top-level JSON export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub summary: ExportSummary,
    pub requests: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_requests: usize,
    pub unique_endpoints: usize,
    /// Percentage of requests answered with a status below 400.
    pub success_rate: f64,
    /// Mean duration in milliseconds over requests that carry one.
    pub average_duration: f64,
    pub timestamp: String,
}

impl ExportSummary {
    pub fn from_observations(observations: &[Observation]) -> Self {
        let total = observations.len();
        let unique: HashSet<String> = observations.iter().map(|o| o.endpoint_key()).collect();
        let successes = observations
            .iter()
            .filter(|o| o.status.is_some_and(|s| s < 400))
            .count();
        let durations: Vec<u64> = observations.iter().filter_map(|o| o.duration_ms).collect();

        Self {
            total_requests: total,
            unique_endpoints: unique.len(),
            success_rate: if total == 0 {
                0.0
            } else {
                successes as f64 / total as f64 * 100.0
            },
            average_duration: if durations.is_empty() {
                0.0
            } else {
                durations.iter().sum::<u64>() as f64 / durations.len() as f64
            },
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

pub fn export(
    observations: &[Observation],
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(observations),
        ExportFormat::Csv => Ok(to_csv(observations, options.csv_include_headers)),
        ExportFormat::Junit => Ok(to_junit(observations, &options.junit_suite_name)),
    }
}

pub fn to_json(observations: &[Observation]) -> Result<String> {
    let document = ExportDocument {
        summary: ExportSummary::from_observations(observations),
        requests: observations.to_vec(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn to_csv(observations: &[Observation], include_headers: bool) -> String {
    let mut lines = Vec::with_capacity(observations.len() + 1);
    if include_headers {
        lines.push("Method,URL,Status,Duration(ms),Timestamp".to_string());
    }
    for observation in observations {
        lines.push(format!(
            "{},\"{}\",{},{},{}",
            observation.method,
            observation.url.replace('"', "\"\""),
            observation
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            observation
                .duration_ms
                .map(|d| d.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            iso_timestamp(observation.timestamp),
        ));
    }
    lines.join("\n")
}

pub fn to_junit(observations: &[Observation], suite_name: &str) -> String {
    let failures = observations.iter().filter(|o| o.is_error()).count();
    let total_ms: u64 = observations.iter().filter_map(|o| o.duration_ms).sum();

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" time=\"{}\">",
        escape_xml(suite_name),
        observations.len(),
        failures,
        seconds(total_ms)
    );

    for observation in observations {
        let method = observation.normalized_method();
        let _ = write!(
            xml,
            "  <testcase name=\"{}\" time=\"{}\" classname=\"API.{}\"",
            escape_xml(&format!("{} {}", method, observation.path())),
            seconds(observation.duration_ms.unwrap_or(0)),
            escape_xml(&method)
        );
        match observation.status {
            Some(status) if status >= 400 => {
                xml.push_str(">\n");
                let _ = writeln!(
                    xml,
                    "    <failure message=\"HTTP {}\" type=\"HttpError\">{} {} returned HTTP {}</failure>",
                    status,
                    escape_xml(&method),
                    escape_xml(&observation.url),
                    status
                );
                xml.push_str("  </testcase>\n");
            }
            _ => xml.push_str("/>\n"),
        }
    }

    xml.push_str("</testsuite>\n");
    xml
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// ISO-8601 with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn iso_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Observation> {
        vec![
            Observation::new("GET", "https://h/users?page=1")
                .at(1_704_067_200_000)
                .with_status(200)
                .with_duration_ms(15),
            Observation::new("POST", "https://h/users")
                .at(1_704_067_201_500)
                .with_status(422)
                .with_duration_ms(1_250),
            Observation::new("GET", "https://h/health").at(1_704_067_202_000),
        ]
    }

    #[test]
    fn format_names() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("xml".parse::<ExportFormat>().unwrap(), ExportFormat::Junit);
        assert!(matches!(
            "yaml".parse::<ExportFormat>(),
            Err(ApiCovError::UnsupportedExportFormat(f)) if f == "yaml"
        ));
    }

    #[test]
    fn csv_layout() {
        let csv = to_csv(&sample(), true);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Method,URL,Status,Duration(ms),Timestamp");
        assert_eq!(
            lines[1],
            "GET,\"https://h/users?page=1\",200,15,2024-01-01T00:00:00.000Z"
        );
        assert_eq!(
            lines[3],
            "GET,\"https://h/health\",N/A,N/A,2024-01-01T00:00:02.000Z"
        );

        let headerless = to_csv(&sample(), false);
        assert!(headerless.starts_with("GET,"));
        assert_eq!(headerless.lines().count(), 3);
    }

    #[test]
    fn csv_escapes_quotes_in_urls() {
        let obs = vec![Observation::new("GET", "https://h/q?name=\"x\"").at(0)];
        assert!(to_csv(&obs, false).contains("\"https://h/q?name=\"\"x\"\"\""));
    }

    #[test]
    fn junit_layout() {
        let xml = to_junit(&sample(), "Users & Co");
        assert!(xml.contains(
            "<testsuite name=\"Users &amp; Co\" tests=\"3\" failures=\"1\" time=\"1.265\">"
        ));
        assert!(xml.contains(
            "<testcase name=\"GET /users\" time=\"0.015\" classname=\"API.GET\"/>"
        ));
        assert!(xml.contains("<failure message=\"HTTP 422\" type=\"HttpError\">"));
        assert!(xml.contains(
            "<testcase name=\"GET /health\" time=\"0.000\" classname=\"API.GET\"/>"
        ));
        assert!(xml.trim_end().ends_with("</testsuite>"));
    }

    #[test]
    fn json_summary() {
        let json = to_json(&sample()).unwrap();
        let doc: ExportDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(doc.requests.len(), doc.summary.total_requests);
        assert_eq!(doc.summary.unique_endpoints, 3);
        assert!((doc.summary.success_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(doc.summary.average_duration, 632.5);

        let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(raw["summary"]["totalRequests"].is_number());
        assert!(raw["requests"][0]["durationMs"].is_number());
    }

    #[test]
    fn empty_exports() {
        let doc: ExportDocument = serde_json::from_str(&to_json(&[]).unwrap()).unwrap();
        assert_eq!(doc.summary.total_requests, 0);
        assert_eq!(doc.summary.success_rate, 0.0);
        assert_eq!(to_csv(&[], true), "Method,URL,Status,Duration(ms),Timestamp");
        assert!(to_junit(&[], "s").contains("tests=\"0\" failures=\"0\" time=\"0.000\""));
    }
}
