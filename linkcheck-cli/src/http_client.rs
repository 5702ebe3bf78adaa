use async_trait::async_trait;
use linkcheck_core::error::HttpError;
use linkcheck_core::interfaces::{HttpClient, HttpMethod};
use linkcheck_core::response::Response;
use reqwest::Method;

/// `HttpClient` backed by a real `reqwest::Client`. Follows redirects (the
/// default reqwest policy) and surfaces connect/TLS/timeout failures as
/// `HttpError::Network` rather than an HTTP status.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("linkcheck/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(
        &self,
        method: HttpMethod,
        uri: &str,
        headers: &[(String, String)],
    ) -> Result<Response, HttpError> {
        let method = match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
        };

        let mut builder = self.client.request(method, uri);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| HttpError::Network {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| HttpError::Network {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;

        Ok(Response::new(status, headers, body))
    }
}
