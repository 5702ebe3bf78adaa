use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::HttpError;
use crate::link::Link;
use crate::response::Response;

/// A producer of links, typically a crawler over a rendered site. Crawling
/// itself is out of scope for this crate; `LinkStream` only consumes
/// whatever a `LinkSource` hands it.
pub trait LinkSource {
    /// Consumes the source into a lazy iterator of links. Implementations
    /// that already hold all links in memory (tests, a pre-crawled list)
    /// may simply return `vec.into_iter()`.
    fn into_links(self: Box<Self>) -> Box<dyn Iterator<Item = Link>>;
}

/// Maps original source URIs to resolved site URIs and on-disk paths.
/// Implemented by the site-building layer this crate doesn't own.
pub trait ResourceResolver: Send + Sync {
    /// Whether `link` points at raw AsciiDoc source rather than rendered
    /// output (used by `LinkStream::exclude_edit_this_page`).
    fn is_ascii_doc_source(&self, link: &Link) -> bool;

    /// The on-disk source path backing a resolved URI, if known, for
    /// pretty-printing error locations.
    fn source_path(&self, resolved_uri: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// Issues a single HTTP request and returns the response, or a network-level
/// error distinct from any HTTP status the server returned.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(
        &self,
        method: HttpMethod,
        uri: &str,
        headers: &[(String, String)],
    ) -> Result<Response, HttpError>;
}
