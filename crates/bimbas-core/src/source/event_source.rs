//! Paginated, rate-limit-aware fetcher over `https://api.github.com`.
//!
//! Shape grounded on `other_examples/.../IliasElQ-Atlas__src-github.rs`'s
//! `GitHubClient` (base URL constant, bearer header, per-request query
//! params, 30s timeout) generalized onto this crate's `RetryPolicy` and
//! error taxonomy instead of that example's inline retry loop, and onto
//! `async_stream::stream!` for pagination instead of a plain `Vec` return so
//! a caller can stop pulling at any page boundary (§5's cancellation model).

use std::time::Duration;

use async_stream::stream;
use chrono::{DateTime, TimeZone, Utc};
use futures::Stream;
use reqwest::{Client, Response, StatusCode};

use crate::error::BimbasError;
use crate::retry::RetryPolicy;

use super::types::{RawEvent, UserType};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EVENTS_PER_PAGE: u32 = 100;

/// Outcome of inspecting a 403/429 response for rate-limit information.
enum RateLimitSignal {
    /// A concrete reset instant is known.
    Reset(DateTime<Utc>),
    /// Unauthenticated traffic throttled with no usable reset information.
    UnknownReset,
    /// Not conclusively a rate limit; let the retry policy handle it.
    Indeterminate,
}

pub struct EventSource {
    client: Client,
    api_key: Option<String>,
    max_queries: u32,
    no_wait: bool,
    base_url: String,
    retry_policy: RetryPolicy,
}

impl EventSource {
    pub fn new(api_key: Option<String>, max_queries: u32, no_wait: bool) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        if api_key.is_none() {
            log::warn!(
                "no API token configured — unauthenticated requests are capped at 60/hour"
            );
        }

        Self {
            client,
            api_key,
            max_queries,
            no_wait,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry_policy: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| format!("token {key}"))
    }

    /// `GET /users/{login}` — resolves the account's declared type.
    ///
    /// Absorbs a known-reset rate limit the same way `query_events` does
    /// (unless `no_wait`): sleeps until reset and retries the same request.
    pub async fn query_user_type(&self, login: &str) -> Result<UserType, BimbasError> {
        let url = format!("{}/users/{login}", self.base_url);
        loop {
            match self.retry_policy.run(|| self.get_json(login, &url, &[])).await {
                Ok(body) => {
                    let kind = body.get("type").and_then(|v| v.as_str());
                    return Ok(UserType::from_api_str(kind));
                }
                Err(BimbasError::RateLimitExceeded { reset: Some(reset) }) if !self.no_wait => {
                    wait_until(reset).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// `GET /users/{login}/events` — a lazy sequence of event batches.
    ///
    /// Pages from 1 up to `max_queries`, stopping early when a page returns
    /// fewer than 100 events. Rate-limit waits are absorbed transparently
    /// and pagination resumes at the same page.
    pub fn query_events<'a>(
        &'a self,
        login: &'a str,
    ) -> impl Stream<Item = Result<Vec<RawEvent>, BimbasError>> + 'a {
        stream! {
            let mut page = 1u32;
            while page <= self.max_queries {
                let url = format!("{}/users/{login}/events", self.base_url);
                let params = [
                    ("per_page", EVENTS_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ];

                match self.retry_policy.run(|| self.get_json(login, &url, &params)).await {
                    Ok(body) => {
                        let events: Vec<RawEvent> = match serde_json::from_value(body) {
                            Ok(events) => events,
                            Err(err) => {
                                yield Err(BimbasError::from(err));
                                return;
                            }
                        };
                        let got = events.len();
                        yield Ok(events);
                        if got < EVENTS_PER_PAGE as usize {
                            break;
                        }
                        page += 1;
                    }
                    Err(BimbasError::RateLimitExceeded { reset: Some(reset) }) if !self.no_wait => {
                        wait_until(reset).await;
                        // resume pagination at the same page
                    }
                    Err(other) => {
                        yield Err(other);
                        return;
                    }
                }
            }
        }
    }

    async fn get_json(
        &self,
        login: &str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, BimbasError> {
        let mut req = self.client.get(url).query(params);
        if let Some(auth) = self.auth_header() {
            req = req.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = req
            .send()
            .await
            .map_err(|err| BimbasError::Retryable(err.to_string()))?;

        handle_response(login, self.api_key.is_none(), response).await
    }
}

async fn handle_response(
    login: &str,
    unauthenticated: bool,
    response: Response,
) -> Result<serde_json::Value, BimbasError> {
    match response.status() {
        StatusCode::OK => {
            if let Some(remaining) = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
            {
                log::debug!("GitHub API rate limit remaining: {remaining}");
            }
            response.json().await.map_err(BimbasError::from)
        }
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            let status = response.status();
            match rate_limit_signal(response, unauthenticated).await {
                RateLimitSignal::Reset(reset) => Err(BimbasError::RateLimitExceeded {
                    reset: Some(reset),
                }),
                RateLimitSignal::UnknownReset => {
                    Err(BimbasError::RateLimitExceeded { reset: None })
                }
                RateLimitSignal::Indeterminate => Err(BimbasError::Retryable(
                    status.canonical_reason().unwrap_or("rate limited").to_string(),
                )),
            }
        }
        StatusCode::NOT_FOUND => Err(BimbasError::NotFound(login.to_string())),
        StatusCode::REQUEST_TIMEOUT | StatusCode::INTERNAL_SERVER_ERROR | StatusCode::GATEWAY_TIMEOUT => {
            Err(BimbasError::Retryable(
                response
                    .status()
                    .canonical_reason()
                    .unwrap_or("server error")
                    .to_string(),
            ))
        }
        status => {
            let reason = response
                .status()
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string();
            Err(BimbasError::ApiRequest {
                status: status.as_u16(),
                reason,
            })
        }
    }
}

/// Implements §4.2's four-step rate-limit priority order. Step 3 only reads
/// the response body (the upstream doesn't expose a custom HTTP reason
/// phrase through `reqwest`, so the body message stands in for "response
/// reason") when steps 1-2 didn't already settle it.
async fn rate_limit_signal(response: Response, unauthenticated: bool) -> RateLimitSignal {
    if let Some(retry_after) = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
    {
        return RateLimitSignal::Reset(Utc::now() + chrono::Duration::seconds(retry_after));
    }

    let remaining_is_zero = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        == Some("0");

    if remaining_is_zero {
        if let Some(reset_epoch) = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
        {
            let reset = Utc.timestamp_opt(reset_epoch, 0).single();
            return match reset {
                Some(reset) => RateLimitSignal::Reset(reset),
                None => RateLimitSignal::UnknownReset,
            };
        }
        return RateLimitSignal::UnknownReset;
    }

    if unauthenticated {
        let body = response.text().await.unwrap_or_default();
        if body.to_ascii_lowercase().contains("rate limit") {
            return RateLimitSignal::UnknownReset;
        }
    }

    RateLimitSignal::Indeterminate
}

async fn wait_until(reset: DateTime<Utc>) {
    let now = Utc::now();
    if reset > now {
        let wait = (reset - now).to_std().unwrap_or(Duration::ZERO);
        log::warn!("rate limited — waiting {:.1}s until reset", wait.as_secs_f64());
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> EventSource {
        EventSource::new(None, 3, false).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn query_user_type_parses_organization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"type": "Organization"})))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let user_type = source.query_user_type("acme").await.unwrap();
        assert_eq!(user_type, UserType::Organization);
    }

    #[tokio::test]
    async fn query_user_type_defaults_to_unknown_without_type_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/ghost"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let user_type = source.query_user_type("ghost").await.unwrap();
        assert_eq!(user_type, UserType::Unknown);
    }

    #[tokio::test]
    async fn query_user_type_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source.query_user_type("ghost").await.unwrap_err();
        assert!(matches!(err, BimbasError::NotFound(login) if login == "ghost"));
    }

    #[tokio::test]
    async fn query_user_type_absorbs_rate_limit_and_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(ResponseTemplate::new(403).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"type": "User"})))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let user_type = source.query_user_type("octocat").await.unwrap();
        assert_eq!(user_type, UserType::User);
    }

    fn sample_events(n: usize) -> Vec<serde_json::Value> {
        (0..n)
            .map(|i| {
                serde_json::json!({
                    "type": "PushEvent",
                    "created_at": "2024-01-01T10:00:00Z",
                    "actor": {"login": "octocat"},
                    "repo": {"id": 1, "name": "octocat/repo"},
                    "id": i.to_string(),
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn query_events_stops_when_page_short_of_100() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/events"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_events(10)))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let batches: Vec<_> = source.query_events("octocat").collect().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].as_ref().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn query_events_caps_at_max_queries() {
        let server = MockServer::start().await;
        for page in 1..=3u32 {
            Mock::given(method("GET"))
                .and(path("/users/octocat/events"))
                .and(query_param("page", page.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(sample_events(100)))
                .mount(&server)
                .await;
        }

        let source = EventSource::new(None, 3, false).with_base_url(server.uri());
        let batches: Vec<_> = source.query_events("octocat").collect().await;
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.as_ref().unwrap().len() == 100));
    }

    #[tokio::test]
    async fn query_events_absorbs_rate_limit_and_resumes_same_page() {
        let server = MockServer::start().await;
        let reset = (Utc::now() + chrono::Duration::seconds(1)).timestamp();

        Mock::given(method("GET"))
            .and(path("/users/octocat/events"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("retry-after", "1"),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/users/octocat/events"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_events(50)))
            .mount(&server)
            .await;

        let _ = reset;
        let source = EventSource::new(None, 3, false).with_base_url(server.uri());
        let batches: Vec<_> = source.query_events("octocat").collect().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].as_ref().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn query_user_type_unauthenticated_rate_limit_reason_is_unknown_reset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string("API rate limit exceeded for octocat"),
            )
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source.query_user_type("octocat").await.unwrap_err();
        assert!(matches!(err, BimbasError::RateLimitExceeded { reset: None }));
    }

    #[tokio::test]
    async fn query_events_no_wait_propagates_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/events"))
            .respond_with(
                ResponseTemplate::new(403).insert_header("retry-after", "60"),
            )
            .mount(&server)
            .await;

        let source = EventSource::new(None, 3, true).with_base_url(server.uri());
        let batches: Vec<_> = source.query_events("octocat").collect().await;
        assert_eq!(batches.len(), 1);
        assert!(matches!(
            batches[0].as_ref().unwrap_err(),
            BimbasError::RateLimitExceeded { reset: Some(_) }
        ));
    }
}
