use http::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;
use url::Url;

use crate::metrics_defs::{REQUEST_DURATION, REQUEST_RATE_LIMITED, REQUEST_RETRY};
use crate::routes::Routes;
use shared::{counter, histogram};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Bounded backoff for rate-limited mutations. Before retry `n` the client
/// waits `base_delay * 2^n`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, retries: u32) -> Duration {
        self.base_delay * 2_u32.pow(retries)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CartApiError {
    #[error("storefront is rate limiting cart requests")]
    RateLimited,
    #[error("section {id:?} failed to load (status {status})")]
    Section { id: String, status: StatusCode },
    #[error("storefront rejected the request (status {status})")]
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(serde::Serialize)]
struct ChangePayload {
    line: u32,
    quantity: u32,
}

#[derive(serde::Serialize)]
struct UpdatePayload<'a> {
    updates: HashMap<&'a str, u32>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    description: Option<String>,
}

/// HTTP client for the storefront cart endpoints. Every request carries the
/// AJAX marker header and shares one cookie jar, matching what the
/// storefront expects from its own front end.
#[derive(Clone)]
pub struct CartClient {
    client: reqwest::Client,
    routes: Routes,
    retry: RetryPolicy,
}

impl CartClient {
    pub fn new(routes: Routes, retry: RetryPolicy) -> Result<Self, CartApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(CartClient {
            client,
            routes,
            retry,
        })
    }

    /// Fetches the rendered HTML of one section. The timestamp query
    /// parameter defeats intermediate caching of the fragment.
    pub async fn fetch_section(&self, section_id: &str) -> Result<String, CartApiError> {
        let buster = cache_buster();
        let started = Instant::now();
        let response = self
            .client
            .get(self.routes.cart().clone())
            .query(&[("section_id", section_id), ("_", buster.as_str())])
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;
        histogram!(REQUEST_DURATION).record(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            return Err(CartApiError::Section {
                id: section_id.to_string(),
                status: response.status(),
            });
        }
        Ok(response.text().await?)
    }

    /// Adds a product variant via the form endpoint.
    pub async fn add_item(&self, variant_id: u64, quantity: u32) -> Result<(), CartApiError> {
        let form = [
            ("id", variant_id.to_string()),
            ("quantity", quantity.to_string()),
        ];
        self.execute_mutation(self.routes.add().clone(), move |req| req.form(&form))
            .await
    }

    /// Changes a cart row addressed by its 1-based line number.
    pub async fn change_line(&self, line: u32, quantity: u32) -> Result<(), CartApiError> {
        let payload = ChangePayload { line, quantity };
        self.execute_mutation(self.routes.change().clone(), move |req| req.json(&payload))
            .await
    }

    /// Changes a cart row addressed by its stable line key.
    pub async fn update_line(&self, key: &str, quantity: u32) -> Result<(), CartApiError> {
        let mut updates = HashMap::new();
        updates.insert(key, quantity);
        let payload = UpdatePayload { updates };
        self.execute_mutation(self.routes.update().clone(), move |req| req.json(&payload))
            .await
    }

    /// Sends a mutation, retrying per policy while the storefront answers
    /// 429. The request is rebuilt for every attempt.
    async fn execute_mutation<F>(&self, url: Url, build: F) -> Result<(), CartApiError>
    where
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    {
        let mut retries = 0;
        loop {
            let started = Instant::now();
            let request = build(
                self.client
                    .post(url.clone())
                    .header("Accept", "application/json")
                    .header("X-Requested-With", "XMLHttpRequest"),
            );
            let response = request.send().await?;
            histogram!(REQUEST_DURATION).record(started.elapsed().as_secs_f64());

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                counter!(REQUEST_RATE_LIMITED).increment(1);
                if retries < self.retry.max_retries {
                    let delay = self.retry.delay_for(retries);
                    tracing::debug!(
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    sleep(delay).await;
                    retries += 1;
                    counter!(REQUEST_RETRY).increment(1);
                    continue;
                }
                return Err(CartApiError::RateLimited);
            }
            if !response.status().is_success() {
                let status = response.status();
                let message = error_message(response).await;
                return Err(CartApiError::Rejected { status, message });
            }
            return Ok(());
        }
    }
}

/// Server-provided failure text, when the error body is JSON carrying a
/// `message` or `description` field.
async fn error_message(response: reqwest::Response) -> Option<String> {
    let body = response.json::<ApiErrorBody>().await.ok()?;
    body.message.or(body.description)
}

fn cache_buster() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::RoutePaths;
    use wiremock::matchers::{
        body_json, body_string_contains, header, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, retry: RetryPolicy) -> CartClient {
        let base = Url::parse(&server.uri()).unwrap();
        let routes = Routes::resolve(&base, &RoutePaths::default()).unwrap();
        CartClient::new(routes, retry).unwrap()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(25),
        }
    }

    #[tokio::test]
    async fn test_fetch_section_returns_fragment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cart"))
            .and(query_param("section_id", "cart-drawer"))
            .and(header("X-Requested-With", "XMLHttpRequest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"<div id="CartDrawer"></div>"#),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::default());
        let fragment = client.fetch_section("cart-drawer").await.unwrap();
        assert!(fragment.contains("CartDrawer"));

        // The cache buster rides along on every section fetch.
        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].url.query_pairs().any(|(k, _)| k == "_"));
    }

    #[tokio::test]
    async fn test_failed_section_fetch_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cart"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::default());
        let err = client.fetch_section("cart-drawer").await.unwrap_err();
        assert!(matches!(
            err,
            CartApiError::Section { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn test_add_item_sends_form_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart/add.js"))
            .and(header("Accept", "application/json"))
            .and(header("X-Requested-With", "XMLHttpRequest"))
            .and(body_string_contains("id=42"))
            .and(body_string_contains("quantity=2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::default());
        client.add_item(42, 2).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_line_sends_positional_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart/change.js"))
            .and(body_json(serde_json::json!({"line": 2, "quantity": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::default());
        client.change_line(2, 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_line_sends_keyed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart/update.js"))
            .and(body_json(serde_json::json!({"updates": {"abc123": 0}})))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::default());
        client.update_line("abc123", 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejection_surfaces_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart/add.js"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_string(r#"{"description": "Out of stock"}"#),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::default());
        let err = client.add_item(1, 1).await.unwrap_err();
        assert!(matches!(
            err,
            CartApiError::Rejected { message: Some(ref m), .. } if m == "Out of stock"
        ));
    }

    #[tokio::test]
    async fn test_rejection_prefers_message_over_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart/change.js"))
            .respond_with(ResponseTemplate::new(422).set_body_string(
                r#"{"message": "Too many in cart", "description": "ignored"}"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::default());
        let err = client.change_line(1, 99).await.unwrap_err();
        assert!(matches!(
            err,
            CartApiError::Rejected { message: Some(ref m), .. } if m == "Too many in cart"
        ));
    }

    #[tokio::test]
    async fn test_rejection_without_json_body_has_no_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart/change.js"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>boom</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::default());
        let err = client.change_line(1, 1).await.unwrap_err();
        assert!(matches!(err, CartApiError::Rejected { message: None, .. }));
    }

    #[tokio::test]
    async fn test_rate_limited_mutation_retries_after_delay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart/change.js"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cart/change.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .with_priority(5)
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry());
        let started = Instant::now();
        client.change_line(1, 2).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(25));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart/update.js"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry());
        let err = client.update_line("k", 1).await.unwrap_err();
        assert!(matches!(err, CartApiError::RateLimited));

        // One initial attempt plus exactly one retry.
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn test_backoff_delay_doubles_per_retry() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}
