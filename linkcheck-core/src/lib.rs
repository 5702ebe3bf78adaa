//! # Link Validation Core
//!
//! Validates links extracted from a rendered documentation site: routes
//! each link to the first matching [`group::LinkGroup`], executes the
//! request under a per-group rate limit and a global deadline, classifies
//! the outcome, reschedules retries by ascending retry time, and evaluates
//! per-group continuation/final policies.
//!
//! Crawling a site, building it, and wiring up a real HTTP client are
//! external concerns; this crate only consumes them through the
//! [`interfaces::LinkSource`], [`interfaces::ResourceResolver`], and
//! [`interfaces::HttpClient`] traits.
//!
//! ## Usage
//! ```rust,no_run
//! use linkcheck_core::interfaces::LinkSource;
//! use linkcheck_core::link::Link;
//! use linkcheck_core::stream::LinkStream;
//! use std::sync::Arc;
//!
//! # struct MyHttpClient;
//! # #[async_trait::async_trait]
//! # impl linkcheck_core::interfaces::HttpClient for MyHttpClient {
//! #     async fn request(&self, _: linkcheck_core::interfaces::HttpMethod, _: &str, _: &[(String, String)])
//! #         -> Result<linkcheck_core::response::Response, linkcheck_core::error::HttpError> {
//! #         unimplemented!()
//! #     }
//! # }
//! struct Links(Vec<Link>);
//! impl LinkSource for Links {
//!     fn into_links(self: Box<Self>) -> Box<dyn Iterator<Item = Link>> {
//!         Box::new(self.0.into_iter())
//!     }
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let links = Links(vec![Link::resolved("https://example.test/")]);
//! let errors = LinkStream::new(Box::new(links))
//!     .with_http_client(Arc::new(MyHttpClient))
//!     .retry_attempts(2)
//!     .overall_timeout(10_000)
//!     .validate()
//!     .await?;
//! errors.assert_valid()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fragment;
pub mod group;
pub mod interfaces;
pub mod link;
pub mod policy;
pub mod rate_limit;
pub mod response;
pub mod result;
pub mod source;
pub mod stream;
pub mod validator;

#[cfg(any(test, feature = "testing"))]
pub mod test_support;
