//! Test doubles for exercising `LinkStream` without a real HTTP server.
//!
//! Shared helpers kept out of the main build, enabled only for tests or via
//! the `testing` feature so downstream crates can reuse them too.

#[cfg(any(test, feature = "testing"))]
pub mod test_helpers {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use http::HeaderMap;

    use crate::error::HttpError;
    use crate::interfaces::{HttpClient, HttpMethod};
    use crate::response::Response;

    /// One canned outcome for a single HTTP attempt.
    pub enum Canned {
        Status(u16),
        StatusWithBody(u16, &'static str),
        StatusWithHeader(u16, &'static str, &'static str),
        Network(&'static str),
        /// Sleeps for `Duration` (real time) before resolving, so tests can
        /// exercise `overallTimeout` without mocking the clock.
        DelayedStatus(Duration, u16),
    }

    /// A `HttpClient` that replays a queue of canned responses per URI, in
    /// request order. Panics if a URI is requested more times than it has
    /// queued responses, so tests catch unexpected extra retries.
    pub struct ScriptedHttpClient {
        queues: Mutex<HashMap<String, Vec<Canned>>>,
    }

    impl ScriptedHttpClient {
        pub fn new() -> Self {
            Self {
                queues: Mutex::new(HashMap::new()),
            }
        }

        pub fn queue(&self, uri: impl Into<String>, response: Canned) -> &Self {
            self.queues
                .lock()
                .unwrap()
                .entry(uri.into())
                .or_default()
                .push(response);
            self
        }
    }

    impl Default for ScriptedHttpClient {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn request(
            &self,
            _method: HttpMethod,
            uri: &str,
            _headers: &[(String, String)],
        ) -> Result<Response, HttpError> {
            let next = {
                let mut queues = self.queues.lock().unwrap();
                let queue = queues
                    .get_mut(uri)
                    .unwrap_or_else(|| panic!("no scripted response queued for {uri}"));
                if queue.is_empty() {
                    panic!("scripted response queue exhausted for {uri}");
                }
                queue.remove(0)
            };

            match next {
                Canned::Status(status) => Ok(Response::new(status, HeaderMap::new(), Bytes::new())),
                Canned::StatusWithBody(status, body) => Ok(Response::new(
                    status,
                    HeaderMap::new(),
                    Bytes::from_static(body.as_bytes()),
                )),
                Canned::StatusWithHeader(status, name, value) => {
                    let mut headers = HeaderMap::new();
                    headers.insert(
                        http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                        value.parse().unwrap(),
                    );
                    Ok(Response::new(status, headers, Bytes::new()))
                }
                Canned::Network(message) => Err(HttpError::Network {
                    uri: uri.to_string(),
                    message: message.to_string(),
                }),
                Canned::DelayedStatus(delay, status) => {
                    tokio::time::sleep(delay).await;
                    Ok(Response::new(status, HeaderMap::new(), Bytes::new()))
                }
            }
        }
    }
}
