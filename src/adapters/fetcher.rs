//! HTTP fetcher shared by the static and managed-crawl adapters
//!
//! This module handles:
//! - Building HTTP clients, one per request session
//! - GET requests with optional per-request headers
//! - Classifying failures into status, timeout and network errors

use crate::adapters::identity::ClientProfile;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::{Duration, Instant};

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Got a response body
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
        /// Time from send to full body
        latency: Duration,
    },

    /// The request did not complete within the client timeout
    Timeout {
        latency: Duration,
    },

    /// Connection refused, DNS failure, TLS error and the like
    NetworkError {
        error: String,
        latency: Duration,
    },
}

impl FetchResult {
    pub fn latency(&self) -> Duration {
        match self {
            Self::Success { latency, .. }
            | Self::Timeout { latency }
            | Self::NetworkError { latency, .. } => *latency,
        }
    }
}

/// Builds an HTTP client for one request session
///
/// Cookies set by one response are sent with later requests on the same
/// client.
///
/// # Arguments
///
/// * `timeout` - Whole-request timeout
/// * `profile` - Client signature sent as default headers; `None` leaves
///   headers to the caller
pub fn build_http_client(
    timeout: Duration,
    profile: Option<&ClientProfile>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .cookie_store(true);

    if let Some(profile) = profile {
        builder = builder.default_headers(profile.headers());
    }

    builder.build()
}

/// Fetches a URL and returns its body regardless of status
///
/// Status interpretation is left to the caller so the crawl middleware can
/// see non-success bodies.
pub async fn fetch_page(client: &Client, url: &str, headers: Option<HeaderMap>) -> FetchResult {
    let started = Instant::now();

    let mut request = client.get(url);
    if let Some(headers) = headers {
        request = request.headers(headers);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return classify_error(e, started.elapsed()),
    };

    let status_code = response.status().as_u16();
    let final_url = response.url().to_string();

    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code,
            body,
            latency: started.elapsed(),
        },
        Err(e) => classify_error(e, started.elapsed()),
    }
}

fn classify_error(error: reqwest::Error, latency: Duration) -> FetchResult {
    if error.is_timeout() {
        FetchResult::Timeout { latency }
    } else if error.is_connect() {
        FetchResult::NetworkError {
            error: format!("Connection failed: {}", error),
            latency,
        }
    } else {
        FetchResult::NetworkError {
            error: error.to_string(),
            latency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(Duration::from_secs(5), None).is_ok());
        assert!(
            build_http_client(Duration::from_secs(5), Some(&crate::adapters::identity::PROFILES[0]))
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_fetch_returns_error_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;

        let client = build_http_client(Duration::from_secs(5), None).unwrap();
        match fetch_page(&client, &format!("{}/busy", server.uri()), None).await {
            FetchResult::Success {
                status_code, body, ..
            } => {
                assert_eq!(status_code, 503);
                assert_eq!(body, "try later");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_profile_headers() {
        let server = MockServer::start().await;
        let profile = crate::adapters::identity::PROFILES
            .iter()
            .find(|p| !p.user_agent.contains(','))
            .unwrap();
        Mock::given(method("GET"))
            .and(header("user-agent", profile.user_agent))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = build_http_client(Duration::from_secs(5), Some(profile)).unwrap();
        let result = fetch_page(&client, &server.uri(), None).await;
        assert!(matches!(result, FetchResult::Success { status_code: 200, .. }));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = build_http_client(Duration::from_millis(100), None).unwrap();
        let result = fetch_page(&client, &server.uri(), None).await;
        assert!(matches!(result, FetchResult::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let client = build_http_client(Duration::from_secs(2), None).unwrap();
        let result = fetch_page(&client, "http://127.0.0.1:1/", None).await;
        assert!(matches!(result, FetchResult::NetworkError { .. }));
    }
}
