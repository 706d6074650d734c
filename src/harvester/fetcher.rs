//! HTTP fetcher for single candidate IDs
//!
//! This module builds the shared HTTP client and classifies the raw
//! transport/HTTP result of one probe into a [`FetchOutcome`]:
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | 2xx with certificate markup | `Found` |
//! | HTTP 404 | `Absent` |
//! | HTTP 429 | `Transient` (rate-limited) |
//! | HTTP 5xx | `Transient` |
//! | other non-2xx | `Permanent` |
//! | 2xx without certificate markup | `Permanent` |
//! | timeout / connection error | `Transient` |
//!
//! Distinguishing the definitive "not found" signature from transient noise
//! is what keeps the harvester from infinite-retrying dead IDs or giving up
//! on merely rate-limited ones.

use crate::config::EndpointConfig;
use crate::harvester::parser::parse_certificate;
use crate::model::{CandidateId, FetchOutcome, Record};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// User agent presented to the upstream service
const USER_AGENT: &str = "certsweep/1.0 (certificate registry mirror)";

/// Builds the HTTP client shared by all resolutions
///
/// # Errors
///
/// Returns `reqwest::Error` if the client cannot be constructed.
pub fn build_http_client(config: &EndpointConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Canonical verification URL for a candidate ID
pub fn record_url(base_url: &str, id: CandidateId) -> String {
    format!("{}/{}/", base_url.trim_end_matches('/'), id)
}

/// Probes one candidate ID and classifies the result
///
/// `attempt` is the zero-based retry attempt, recorded on found records for
/// later retry statistics. Pure classification; the only side effect is the
/// network round-trip itself.
pub async fn fetch(
    client: &Client,
    base_url: &str,
    id: CandidateId,
    attempt: u32,
) -> FetchOutcome {
    let url = record_url(base_url, id);

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            let reason = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                "connection error".to_string()
            } else {
                format!("network error: {e}")
            };
            return FetchOutcome::Transient {
                reason,
                rate_limited: false,
            };
        }
    };

    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return FetchOutcome::Absent;
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return FetchOutcome::Transient {
            reason: "HTTP 429".to_string(),
            rate_limited: true,
        };
    }

    if status.is_server_error() {
        return FetchOutcome::Transient {
            reason: format!("HTTP {}", status.as_u16()),
            rate_limited: false,
        };
    }

    if !status.is_success() {
        return FetchOutcome::Permanent {
            reason: format!("HTTP {}", status.as_u16()),
        };
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return FetchOutcome::Transient {
                reason: format!("body read error: {e}"),
                rate_limited: false,
            }
        }
    };

    match parse_certificate(&body) {
        Some(fields) => FetchOutcome::Found(Record::new(
            id,
            fields.course_name,
            fields.student_name,
            fields.completion_date,
            fields.duration,
            url,
            attempt,
        )),
        None => FetchOutcome::Permanent {
            reason: "no certificate markup in response body".to_string(),
        },
    }
}
