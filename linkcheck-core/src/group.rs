use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::seq::SliceRandom;
use regex::Regex;

use crate::fragment::{FragmentValidator, HtmlFragmentValidator};
use crate::link::Link;
use crate::policy::AggregatePolicy;
use crate::rate_limit::{none, RateLimit};

/// Thread-safe per-status-code occurrence counts for one group. Mutated by
/// the validator on every completed attempt, read by continuation and
/// final policies.
#[derive(Default)]
pub struct LinkGroupStats {
    counts: Mutex<HashMap<u16, u64>>,
}

impl LinkGroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: u16) {
        let mut counts = self.counts.lock().expect("stats mutex poisoned");
        *counts.entry(status).or_insert(0) += 1;
    }

    pub fn count(&self, status: u16) -> u64 {
        self.counts
            .lock()
            .expect("stats mutex poisoned")
            .get(&status)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_successful(&self) -> u64 {
        self.counts
            .lock()
            .expect("stats mutex poisoned")
            .iter()
            .filter(|(status, _)| (200..300).contains(status))
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn snapshot(&self) -> HashMap<u16, u64> {
        self.counts.lock().expect("stats mutex poisoned").clone()
    }
}

/// Rewrites a link before it is requested (e.g. mapping a source-relative
/// URI to a mirror, or swapping hosts).
pub type LinkMapper = Arc<dyn Fn(Link) -> Link + Send + Sync>;

/// A pre-validation reordering of the links belonging to one group.
/// Receives only the links matching the owning group's pattern; the
/// non-matching complement is concatenated afterward, unaffected.
pub trait StreamTransformer: Send + Sync {
    fn transform(&self, matching: Vec<Link>) -> Vec<Link>;
}

/// Shuffles the group's own members while leaving every other link's
/// relative order untouched.
pub struct RandomOrder;

impl StreamTransformer for RandomOrder {
    fn transform(&self, mut matching: Vec<Link>) -> Vec<Link> {
        matching.shuffle(&mut rand::thread_rng());
        matching
    }
}

/// An immutable policy bundle matched against links via a regex on the
/// resolved URI. `stats` is the one field that is mutated in place after
/// construction; everything else is copy-on-write (rebuilt, not mutated,
/// by the owning builder).
pub struct LinkGroup {
    pattern: Regex,
    link_mapper: Option<LinkMapper>,
    headers: Vec<(String, String)>,
    rate_limit: Arc<dyn RateLimit>,
    stream_transformers: Vec<Arc<dyn StreamTransformer>>,
    continuation_policies: Vec<Arc<dyn AggregatePolicy>>,
    final_policies: Vec<Arc<dyn AggregatePolicy>>,
    fragment_validator: Arc<dyn FragmentValidator>,
    stats: LinkGroupStats,
}

impl LinkGroup {
    pub fn new(
        pattern: Regex,
        link_mapper: Option<LinkMapper>,
        headers: Vec<(String, String)>,
        rate_limit: Arc<dyn RateLimit>,
        stream_transformers: Vec<Arc<dyn StreamTransformer>>,
        continuation_policies: Vec<Arc<dyn AggregatePolicy>>,
        final_policies: Vec<Arc<dyn AggregatePolicy>>,
        fragment_validator: Arc<dyn FragmentValidator>,
    ) -> Self {
        Self {
            pattern,
            link_mapper,
            headers,
            rate_limit,
            stream_transformers,
            continuation_policies,
            final_policies,
            fragment_validator,
            stats: LinkGroupStats::new(),
        }
    }

    /// The sentinel group every group list ends with: pattern `.*`, no
    /// headers, no rate limit, the HTML fragment validator.
    pub fn sentinel() -> Self {
        Self::new(
            Regex::new(".*").expect("`.*` always compiles"),
            None,
            Vec::new(),
            Arc::new(none()),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Arc::new(HtmlFragmentValidator),
        )
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn matches(&self, resolved_uri: &str) -> bool {
        self.pattern.is_match(resolved_uri)
    }

    pub fn map_link(&self, link: Link) -> Link {
        match &self.link_mapper {
            Some(mapper) => mapper(link),
            None => link,
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn rate_limit(&self) -> &Arc<dyn RateLimit> {
        &self.rate_limit
    }

    pub fn stream_transformers(&self) -> &[Arc<dyn StreamTransformer>] {
        &self.stream_transformers
    }

    pub fn continuation_policies(&self) -> &[Arc<dyn AggregatePolicy>] {
        &self.continuation_policies
    }

    pub fn final_policies(&self) -> &[Arc<dyn AggregatePolicy>] {
        &self.final_policies
    }

    pub fn fragment_validator(&self) -> &Arc<dyn FragmentValidator> {
        &self.fragment_validator
    }

    pub fn stats(&self) -> &LinkGroupStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_matches_everything() {
        let sentinel = LinkGroup::sentinel();
        assert!(sentinel.matches("https://anything.example/x"));
    }

    #[test]
    fn stats_accumulate_across_group_clone() {
        let group = LinkGroup::sentinel();
        group.stats().record(200);
        group.stats().record(200);
        group.stats().record(404);
        assert_eq!(group.stats().count(200), 2);
        assert_eq!(group.stats().total_successful(), 2);
    }
}
