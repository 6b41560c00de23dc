//! Request/response values passed through the cache manager and the network
//! seam it fetches through.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use meteora_core::ApiConfig;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FetchError;

/// An outgoing request as seen by the interceptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    /// Header names are lowercase
    pub headers: BTreeMap<String, String>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: BTreeMap::new(),
        }
    }

    /// A top-level document load
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_header("accept", "text/html,application/xhtml+xml")
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// True when the accept header mentions `media`
    pub fn accepts(&self, media: &str) -> bool {
        self.header("accept").is_some_and(|a| a.contains(media))
    }
}

/// A stored or fetched response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    /// Header names are lowercase
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Vec<u8>,
}

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Meteora - Offline</title>
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body { font-family: Arial, sans-serif; display: flex; justify-content: center;
               align-items: center; height: 100vh; margin: 0; text-align: center; }
    </style>
</head>
<body>
    <div class="offline-content">
        <h1>Meteora</h1>
        <p>You're currently offline. Please check your connection and try again.</p>
        <button onclick="window.location.reload()">Retry</button>
    </div>
</body>
</html>
"#;

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Synthesized 503 for data requests with neither network nor cache
    pub fn offline_data() -> Self {
        let body = serde_json::json!({
            "error": "Offline",
            "message": "Data not available offline",
        });
        Self::new(503, body.to_string()).with_header("content-type", "application/json")
    }

    /// Inline page shown when the shell document is unavailable
    pub fn offline_page() -> Self {
        Self::new(200, OFFLINE_PAGE).with_header("content-type", "text/html")
    }

    /// Blank success for non-critical assets such as fonts
    pub fn empty() -> Self {
        Self::new(200, Vec::new())
    }
}

/// Network seam used by the cache manager.
pub trait Fetch: Send + Sync {
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response, FetchError>> + Send;
}

/// [`Fetch`] over reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(api: &ApiConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .user_agent(api.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        tracing::debug!("{} {} -> {}", request.method, request.url, status);
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
