use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Transport(String),
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP GET abstraction used for document re-fetch and DoH queries.
pub trait HttpFetcher: Clone + Send + Sync + 'static {
    fn get(
        &self,
        url: &str,
        accept: Option<&str>,
    ) -> impl Future<Output = Result<HttpResponse, HttpError>> + Send;
}

/// reqwest-backed fetcher
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(connect_timeout: Duration, user_agent: &str) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    fn classify_error(e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Transport(format!("timeout: {}", e))
        } else {
            HttpError::Transport(e.to_string())
        }
    }
}

impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, accept: Option<&str>) -> Result<HttpResponse, HttpError> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }
        let response = request.send().await.map_err(Self::classify_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(Self::classify_error)?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// A request observed by [`MockFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub accept: Option<String>,
}

#[derive(Clone)]
struct MockReply {
    delay: Option<Duration>,
    result: Result<HttpResponse, HttpError>,
}

/// In-memory fetcher for tests and embedding callers.
#[derive(Clone, Default)]
pub struct MockFetcher {
    replies: Arc<Mutex<HashMap<String, MockReply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&self, url: &str, response: HttpResponse) {
        lock(&self.replies).insert(
            url.to_string(),
            MockReply {
                delay: None,
                result: Ok(response),
            },
        );
    }

    pub fn add_delayed(&self, url: &str, delay: Duration, response: HttpResponse) {
        lock(&self.replies).insert(
            url.to_string(),
            MockReply {
                delay: Some(delay),
                result: Ok(response),
            },
        );
    }

    pub fn add_error(&self, url: &str, error: HttpError) {
        lock(&self.replies).insert(
            url.to_string(),
            MockReply {
                delay: None,
                result: Err(error),
            },
        );
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }
}

impl HttpFetcher for MockFetcher {
    async fn get(&self, url: &str, accept: Option<&str>) -> Result<HttpResponse, HttpError> {
        lock(&self.requests).push(RecordedRequest {
            url: url.to_string(),
            accept: accept.map(str::to_string),
        });
        let reply = lock(&self.replies).get(url).cloned();
        match reply {
            Some(reply) => {
                if let Some(delay) = reply.delay {
                    tokio::time::sleep(delay).await;
                }
                reply.result
            }
            None => Ok(HttpResponse::new(404, Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fetcher_response() {
        let fetcher = MockFetcher::new();
        fetcher.add_response("https://example.org/", HttpResponse::ok("hello"));

        let resp = fetcher.get("https://example.org/", Some("text/html")).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.body, b"hello");
        assert_eq!(
            fetcher.requests(),
            vec![RecordedRequest {
                url: "https://example.org/".to_string(),
                accept: Some("text/html".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_mock_fetcher_unknown_url_is_404() {
        let fetcher = MockFetcher::new();
        let resp = fetcher.get("https://example.org/missing", None).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_mock_fetcher_error() {
        let fetcher = MockFetcher::new();
        fetcher.add_error("https://down.example/", HttpError::Transport("refused".into()));
        let err = fetcher.get("https://down.example/", None).await.unwrap_err();
        assert_eq!(err, HttpError::Transport("refused".into()));
    }
}
