//! File metadata for downloadable artifacts
//!
//! Downloads that lack `size` or `last-modified` get them from a HEAD request.

use crate::report::NormalizeReport;
use reqwest::header::{CONTENT_LENGTH, LAST_MODIFIED};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// Result of probing one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub size: Option<u64>,
    pub last_modified: Option<String>,
}

/// HEAD-request client for download URLs
#[derive(Clone)]
pub struct DownloadProber {
    client: reqwest::Client,
}

impl DownloadProber {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Fill in missing `size` and `last-modified` on every download of one record
    pub async fn fill_downloads(
        &self,
        id: &str,
        downloads: &mut [Map<String, Value>],
        report: &mut NormalizeReport,
    ) {
        for download in downloads.iter_mut() {
            let Some(url) = download.get("url").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            let needs_size = !download.contains_key("size");
            let needs_date = !download.contains_key("last-modified");
            if !needs_size && !needs_date {
                continue;
            }

            let outcome = self.probe(id, &url, report).await;
            if needs_size {
                download.insert("size".to_string(), json!(outcome.size.unwrap_or(0)));
            }
            if needs_date {
                if let Some(date) = outcome.last_modified {
                    download.insert("last-modified".to_string(), json!(date));
                }
            }
        }
    }

    /// HEAD one URL; failures are reported and yield an empty outcome
    pub async fn probe(&self, id: &str, url: &str, report: &mut NormalizeReport) -> ProbeOutcome {
        let empty = ProbeOutcome {
            size: None,
            last_modified: None,
        };

        let response = match self.client.head(url).send().await {
            Ok(response) => response,
            Err(e) => {
                report.warn(format!("Could not get downloadable for '{}' ({}): {}", id, url, e));
                return empty;
            }
        };

        if response.status() == StatusCode::NOT_FOUND {
            report.warn(format!("Could not find downloadable for '{}': {}", id, url));
            return empty;
        }
        if !response.status().is_success() {
            report.warn(format!(
                "Downloadable for '{}' answered {}: {}",
                id,
                response.status(),
                url
            ));
        }

        let headers = response.headers();
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let last_modified = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(format_http_date);

        ProbeOutcome { size, last_modified }
    }
}

impl Default for DownloadProber {
    fn default() -> Self {
        Self::new()
    }
}

/// `Wed, 21 Oct 2015 07:28:00 GMT` becomes `2015-10-21`
pub fn format_http_date(value: &str) -> Option<String> {
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_http_date() {
        assert_eq!(
            format_http_date("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some("2015-10-21".to_string())
        );
        assert_eq!(format_http_date("yesterday"), None);
    }

    #[tokio::test]
    async fn test_complete_downloads_are_not_probed() {
        let prober = DownloadProber::new();
        let mut report = NormalizeReport::default();
        let mut downloads = vec![
            serde_json::from_value::<Map<String, Value>>(json!({
                "url": "http://127.0.0.1:9/never-contacted.zip",
                "size": 12,
                "last-modified": "2020-01-01"
            }))
            .unwrap(),
            serde_json::from_value::<Map<String, Value>>(json!({"format": "XML"})).unwrap(),
        ];
        prober.fill_downloads("saldo", &mut downloads, &mut report).await;
        assert!(report.warnings.is_empty());
        assert_eq!(downloads[0]["size"], json!(12));
        assert!(!downloads[1].contains_key("size"));
    }

    #[tokio::test]
    async fn test_unreachable_url_gives_zero_size() {
        let prober = DownloadProber::new();
        let mut report = NormalizeReport::default();
        let mut downloads = vec![serde_json::from_value::<Map<String, Value>>(
            json!({"url": "http://127.0.0.1:9/missing.zip"}),
        )
        .unwrap()];
        prober.fill_downloads("saldo", &mut downloads, &mut report).await;
        assert_eq!(downloads[0]["size"], json!(0));
        assert!(!downloads[0].contains_key("last-modified"));
        assert_eq!(report.warnings.len(), 1);
    }
}
