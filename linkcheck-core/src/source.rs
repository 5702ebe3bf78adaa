//! Reference `LinkSource` implementations. Crawling a real site is an
//! external concern; these exist so callers (and tests) have something
//! concrete to hand a `LinkStream` without writing a crawler.

use std::fs;
use std::path::Path;

use crate::interfaces::LinkSource;
use crate::link::Link;

/// Wraps an already-discovered, in-memory list of links.
pub struct StaticLinkSource {
    links: Vec<Link>,
}

impl StaticLinkSource {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }
}

impl LinkSource for StaticLinkSource {
    fn into_links(self: Box<Self>) -> Box<dyn Iterator<Item = Link>> {
        Box::new(self.links.into_iter())
    }
}

/// Reads one resolved URI per non-blank, non-comment line from a file —
/// the output format an external crawler is expected to produce.
/// Lines starting with `#` are treated as comments, not as URIs with a
/// bare fragment.
pub struct FileLinkSource {
    links: Vec<Link>,
}

impl FileLinkSource {
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let links = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(Link::resolved)
            .collect();
        Ok(Self { links })
    }
}

impl LinkSource for FileLinkSource {
    fn into_links(self: Box<Self>) -> Box<dyn Iterator<Item = Link>> {
        Box::new(self.links.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_source_preserves_order() {
        let links = vec![Link::resolved("https://a.test"), Link::resolved("https://b.test")];
        let source: Box<dyn LinkSource> = Box::new(StaticLinkSource::new(links));
        let collected: Vec<_> = source.into_links().map(|l| l.resolved_uri().to_string()).collect();
        assert_eq!(collected, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn file_source_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.txt");
        fs::write(&path, "https://a.test\n\n# a comment\nhttps://b.test\n").unwrap();

        let source: Box<dyn LinkSource> = Box::new(FileLinkSource::read(&path).unwrap());
        let collected: Vec<_> = source.into_links().map(|l| l.resolved_uri().to_string()).collect();
        assert_eq!(collected, vec!["https://a.test", "https://b.test"]);
    }
}
