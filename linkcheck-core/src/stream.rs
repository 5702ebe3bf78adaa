use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::error::{LinkCheckAssertionError, ValidationFatalError};
use crate::fragment::{FragmentValidator, HtmlFragmentValidator};
use crate::group::{LinkGroup, LinkMapper, RandomOrder, StreamTransformer};
use crate::interfaces::{HttpClient, LinkSource, ResourceResolver};
use crate::link::Link;
use crate::policy::AggregatePolicy;
use crate::rate_limit::RateLimit;
use crate::result::{ValidationRequest, ValidationResult};
use crate::validator::{now_ms, LinkValidator};

type Predicate = Arc<dyn Fn(&Link) -> bool + Send + Sync>;

/// The validation pipeline. Every builder method returns a distinct
/// `LinkStream`; the receiver is never mutated, so a value held before a
/// builder call is still usable afterward.
#[derive(Clone)]
pub struct LinkStream {
    links: Vec<Link>,
    resolver: Option<Arc<dyn ResourceResolver>>,
    http_client: Option<Arc<dyn HttpClient>>,
    filters: Vec<Predicate>,
    tee_log: bool,
    /// Always ends with the `.*` sentinel so every link matches some group.
    groups: Vec<Arc<LinkGroup>>,
    retry_attempts: u32,
    overall_timeout: Duration,
}

impl LinkStream {
    pub fn new(link_source: Box<dyn LinkSource>) -> Self {
        Self {
            links: link_source.into_links().collect(),
            resolver: None,
            http_client: None,
            filters: Vec::new(),
            tee_log: false,
            groups: vec![Arc::new(LinkGroup::sentinel())],
            retry_attempts: 1,
            overall_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_resolver(&self, resolver: Arc<dyn ResourceResolver>) -> Self {
        let mut next = self.clone();
        next.resolver = Some(resolver);
        next
    }

    pub fn with_http_client(&self, client: Arc<dyn HttpClient>) -> Self {
        let mut next = self.clone();
        next.http_client = Some(client);
        next
    }

    /// Tees each surviving link through the `log` facade at info level.
    pub fn log(&self) -> Self {
        let mut next = self.clone();
        next.tee_log = true;
        next
    }

    pub fn exclude(&self, predicate: impl Fn(&Link) -> bool + Send + Sync + 'static) -> Self {
        let mut next = self.clone();
        next.filters.push(Arc::new(predicate));
        next
    }

    pub fn exclude_resolved(&self, pattern: &str) -> Self {
        let re = Regex::new(pattern).expect("valid exclude pattern");
        self.exclude(move |link: &Link| re.is_match(link.resolved_uri()))
    }

    pub fn include_resolved(&self, pattern: &str) -> Self {
        let re = Regex::new(pattern).expect("valid include pattern");
        self.exclude(move |link: &Link| !re.is_match(link.resolved_uri()))
    }

    /// Excludes links the `ResourceResolver` identifies as raw AsciiDoc
    /// source (an "edit this page" link has nothing to fetch).
    pub fn exclude_edit_this_page(&self) -> Self {
        let resolver = self.resolver.clone();
        self.exclude(move |link: &Link| {
            resolver
                .as_ref()
                .map(|r| r.is_ascii_doc_source(link))
                .unwrap_or(false)
        })
    }

    pub fn retry_attempts(&self, n: u32) -> Self {
        let mut next = self.clone();
        next.retry_attempts = n;
        next
    }

    pub fn overall_timeout(&self, ms: u64) -> Self {
        let mut next = self.clone();
        next.overall_timeout = Duration::from_millis(ms);
        next
    }

    pub fn group(&self, pattern: &str) -> LinkGroupBuilder {
        LinkGroupBuilder::new(self.clone(), Regex::new(pattern).expect("valid group pattern"))
    }

    /// First group (in insertion order) whose pattern matches. The
    /// sentinel is always last and always matches, so this never fails.
    fn route(&self, link: &Link) -> Arc<LinkGroup> {
        self.groups
            .iter()
            .find(|group| group.matches(link.resolved_uri()))
            .cloned()
            .expect("sentinel group matches every URI")
    }

    fn evaluate_continuation(group: &LinkGroup) -> bool {
        group
            .continuation_policies()
            .iter()
            .all(|policy| policy.evaluate(group.stats()).valid)
    }

    /// Runs the pipeline with a validator built from `with_http_client`.
    pub async fn validate(&self) -> Result<ValidationErrorStream, ValidationFatalError> {
        let client = self
            .http_client
            .clone()
            .expect("http_client must be set via LinkStream::with_http_client before validate()");
        let validator = LinkValidator::new(client);
        self.validate_with(&validator).await
    }

    /// Runs the pipeline with a caller-supplied validator (useful in tests
    /// to swap in a canned `HttpClient`).
    pub async fn validate_with(
        &self,
        validator: &LinkValidator,
    ) -> Result<ValidationErrorStream, ValidationFatalError> {
        let deadline = now_ms() + self.overall_timeout.as_millis() as u64;

        let mut sequence: Vec<Link> = self
            .links
            .iter()
            .cloned()
            .filter(|link| self.filters.iter().all(|predicate| !predicate(link)))
            .collect();

        if self.tee_log {
            for link in &sequence {
                log::info!(
                    "link: {} -> {}",
                    link.original_uri(),
                    link.resolved_uri()
                );
            }
        }

        for group in &self.groups {
            if group.stream_transformers().is_empty() {
                continue;
            }
            let (matching, mut non_matching): (Vec<Link>, Vec<Link>) = sequence
                .into_iter()
                .partition(|link| group.matches(link.resolved_uri()));
            let mut matching = matching;
            for transformer in group.stream_transformers() {
                matching = transformer.transform(matching);
            }
            non_matching.extend(matching);
            sequence = non_matching;
        }

        let mut terminal: Vec<ValidationResult> = Vec::new();
        let mut retryable: Vec<RetryEntry> = Vec::new();

        for link in sequence {
            let group = self.route(&link);
            let should_continue = Self::evaluate_continuation(&group);
            if !should_continue {
                log::warn!("group {} saturated, skipping {}", group.pattern(), link.resolved_uri());
                continue;
            }
            if now_ms() >= deadline {
                terminal.push(ValidationResult::invalid(
                    link,
                    0,
                    format!(
                        "Did not try, overall timeout of {} ms expired",
                        self.overall_timeout.as_millis()
                    ),
                ));
                continue;
            }
            let request = ValidationRequest::new(link, self.retry_attempts + 1, group.clone(), should_continue);
            let attempts_left = request.attempts_left();
            let result = validator.validate(&request).await?;
            match result {
                ValidationResult::Retry { .. } => retryable.push(RetryEntry {
                    result,
                    group,
                    attempts_left: attempts_left.saturating_sub(1),
                }),
                other => terminal.push(other),
            }
        }

        retryable.sort_by_key(|entry| entry.result.retry_at_epoch_ms().unwrap_or(0));

        while !retryable.is_empty() {
            let entry = retryable.remove(0);
            let should_continue = Self::evaluate_continuation(&entry.group);
            if !should_continue {
                continue;
            }
            let retry_at = entry.result.retry_at_epoch_ms().unwrap_or(0);
            if retry_at >= deadline {
                terminal.push(ValidationResult::invalid(
                    entry.result.link().clone(),
                    0,
                    format!(
                        "Did not try (again), overall timeout of {} ms expired",
                        self.overall_timeout.as_millis()
                    ),
                ));
                continue;
            }
            let now = now_ms();
            if retry_at > now {
                tokio::time::sleep(Duration::from_millis(retry_at - now)).await;
            }
            let request = ValidationRequest::new(
                entry.result.link().clone(),
                entry.attempts_left,
                entry.group.clone(),
                true,
            );
            let attempts_left = request.attempts_left();
            let result = validator.validate(&request).await?;
            match result {
                ValidationResult::Valid { .. } => {}
                ValidationResult::Retry { .. } => {
                    retryable.push(RetryEntry {
                        result,
                        group: entry.group,
                        attempts_left: attempts_left.saturating_sub(1),
                    });
                    retryable.sort_by_key(|e| e.result.retry_at_epoch_ms().unwrap_or(0));
                }
                ValidationResult::Invalid { .. } => terminal.push(result),
            }
        }

        for group in &self.groups {
            for policy in group.final_policies() {
                let verdict = policy.evaluate(group.stats());
                if !verdict.valid {
                    let placeholder = Link::resolved(group.pattern().as_str().to_string());
                    terminal.push(ValidationResult::invalid(placeholder, -5, verdict.message));
                }
            }
        }

        Ok(ValidationErrorStream::new(terminal, self.resolver.clone()))
    }
}

struct RetryEntry {
    result: ValidationResult,
    group: Arc<LinkGroup>,
    attempts_left: u32,
}

/// Builder for one `LinkGroup`, opened with `LinkStream::group` and closed
/// with `end_group`, which inserts the finished group immediately before
/// the sentinel and returns the (cloned) parent stream. The back-reference
/// to the parent is one-shot: it exists only to make `end_group` possible
/// and is consumed by it.
pub struct LinkGroupBuilder {
    parent: Option<LinkStream>,
    pattern: Regex,
    link_mapper: Option<LinkMapper>,
    headers: Vec<(String, String)>,
    rate_limit: Arc<dyn RateLimit>,
    stream_transformers: Vec<Arc<dyn StreamTransformer>>,
    continuation_policies: Vec<Arc<dyn AggregatePolicy>>,
    final_policies: Vec<Arc<dyn AggregatePolicy>>,
    fragment_validator: Arc<dyn FragmentValidator>,
}

impl LinkGroupBuilder {
    fn new(parent: LinkStream, pattern: Regex) -> Self {
        Self {
            parent: Some(parent),
            pattern,
            link_mapper: None,
            headers: Vec::new(),
            rate_limit: Arc::new(crate::rate_limit::none()),
            stream_transformers: Vec::new(),
            continuation_policies: Vec::new(),
            final_policies: Vec::new(),
            fragment_validator: Arc::new(HtmlFragmentValidator),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        use base64::Engine;
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        self.header("Authorization", format!("Basic {encoded}"))
    }

    pub fn bearer_auth(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn link_mapper(mut self, mapper: impl Fn(Link) -> Link + Send + Sync + 'static) -> Self {
        self.link_mapper = Some(Arc::new(mapper));
        self
    }

    pub fn rate_limit(mut self, rate_limit: impl RateLimit + 'static) -> Self {
        self.rate_limit = Arc::new(rate_limit);
        self
    }

    /// Shuffles this group's members while preserving the relative order
    /// of every other link.
    pub fn random_order(mut self) -> Self {
        self.stream_transformers.push(Arc::new(RandomOrder));
        self
    }

    pub fn continuation_policy(mut self, policy: impl AggregatePolicy + 'static) -> Self {
        self.continuation_policies.push(Arc::new(policy));
        self
    }

    pub fn final_policy(mut self, policy: impl AggregatePolicy + 'static) -> Self {
        self.final_policies.push(Arc::new(policy));
        self
    }

    pub fn fragment_validator(mut self, validator: impl FragmentValidator + 'static) -> Self {
        self.fragment_validator = Arc::new(validator);
        self
    }

    /// Inserts the finished group immediately before the sentinel and
    /// returns the parent stream. Fatal if this builder has already been
    /// closed.
    pub fn end_group(mut self) -> Result<LinkStream, ValidationFatalError> {
        let mut parent = self
            .parent
            .take()
            .ok_or(ValidationFatalError::DanglingGroupBuilder)?;
        let group = LinkGroup::new(
            self.pattern,
            self.link_mapper,
            self.headers,
            self.rate_limit,
            self.stream_transformers,
            self.continuation_policies,
            self.final_policies,
            self.fragment_validator,
        );
        let insert_at = parent.groups.len() - 1;
        parent.groups.insert(insert_at, Arc::new(group));
        Ok(parent)
    }
}

/// A post-filter over validation results keeping only the invalid ones,
/// with the resolver needed to pretty-print source locations.
pub struct ValidationErrorStream {
    errors: Vec<ValidationResult>,
    resolver: Option<Arc<dyn ResourceResolver>>,
}

impl ValidationErrorStream {
    fn new(results: Vec<ValidationResult>, resolver: Option<Arc<dyn ResourceResolver>>) -> Self {
        Self {
            errors: results.into_iter().filter(|r| r.is_invalid()).collect(),
            resolver,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationResult> {
        self.errors.iter()
    }

    pub fn to_list(&self) -> Vec<ValidationResult> {
        self.errors.clone()
    }

    pub fn count(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Renders one line per invalid result as
    /// `<resolvedUri>  [<statusCode>]  <message>  (from <sourceFile>:<sourceLine>)`
    pub fn format_line(&self, result: &ValidationResult) -> String {
        let link = result.link();
        let (file, line) = match link.source() {
            Some(loc) => (loc.file.display().to_string(), loc.line),
            None => {
                let path = self
                    .resolver
                    .as_ref()
                    .and_then(|resolver| resolver.source_path(link.resolved_uri()));
                match path {
                    Some(p) => (p.display().to_string(), 0),
                    None => ("<unknown>".to_string(), 0),
                }
            }
        };
        format!(
            "{}  [{}]  {}  (from {}:{})",
            link.resolved_uri(),
            result.status_code(),
            result.message().unwrap_or_default(),
            file,
            line
        )
    }

    pub fn assert_valid(&self) -> Result<(), LinkCheckAssertionError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(LinkCheckAssertionError::new(
                self.errors.iter().map(|e| self.format_line(e)).collect(),
            ))
        }
    }
}
