//! TOML configuration for [`linkcheck_core::stream::LinkStream`].
//!
//! Mirrors the domain-type/DTO split used elsewhere in this codebase:
//! [`TomlLinkCheckConfig`] and friends are plain `serde::Deserialize`
//! structs with field-level defaults; [`parse_toml_config`] converts them
//! into the validated [`LinkCheckConfig`] domain type, and [`build_stream`]
//! applies that domain config onto a caller-supplied `LinkStream` (already
//! carrying its link source, resolver and HTTP client).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use linkcheck_core::error::ValidationFatalError;
use linkcheck_core::fragment::{AlwaysValidFragmentValidator, GithubBlobFragmentValidator, HtmlFragmentValidator};
use linkcheck_core::policy::{MaxStatusOccurrences, MinSuccessfulCount};
use linkcheck_core::rate_limit::requests_per_time_interval;
use linkcheck_core::stream::LinkStream;
use regex::Regex;
use serde::Deserialize;

fn default_retry_attempts() -> u32 {
    1
}

fn default_overall_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Deserialize)]
pub struct TomlLinkCheckConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,
    #[serde(default)]
    pub groups: Vec<TomlGroupConfig>,
}

#[derive(Debug, Deserialize)]
pub struct TomlGroupConfig {
    pub pattern: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub basic_auth: Option<TomlBasicAuth>,
    #[serde(default)]
    pub bearer_auth: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<TomlRateLimit>,
    #[serde(default)]
    pub random_order: bool,
    #[serde(default)]
    pub fragment_validator: TomlFragmentValidatorKind,
    #[serde(default)]
    pub continuation_policies: Vec<TomlAggregatePolicy>,
    #[serde(default)]
    pub final_policies: Vec<TomlAggregatePolicy>,
}

#[derive(Debug, Deserialize)]
pub struct TomlBasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TomlRateLimit {
    pub max_requests: usize,
    pub interval_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TomlFragmentValidatorKind {
    #[default]
    Html,
    AlwaysValid,
    GithubBlob,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TomlAggregatePolicy {
    MaxStatusOccurrences { status: u16, max_occurrences: u64 },
    MinSuccessfulCount { min: u64 },
}

/// Validated, ready-to-apply configuration. `pattern` is pre-compiled so
/// applying it to a stream can't fail on a bad regex a second time.
pub struct LinkCheckConfig {
    pub retry_attempts: u32,
    pub overall_timeout_ms: u64,
    pub groups: Vec<GroupConfig>,
}

pub struct GroupConfig {
    pattern: Regex,
    headers: Vec<(String, String)>,
    basic_auth: Option<(String, String)>,
    bearer_auth: Option<String>,
    rate_limit: Option<(usize, Duration)>,
    random_order: bool,
    fragment_validator: TomlFragmentValidatorKind,
    continuation_policies: Vec<TomlAggregatePolicy>,
    final_policies: Vec<TomlAggregatePolicy>,
}

/// Parse a TOML document into a [`LinkCheckConfig`], compiling every
/// group's regex eagerly so malformed config fails fast.
pub fn parse_toml_config(config_str: &str) -> Result<LinkCheckConfig> {
    let toml_config: TomlLinkCheckConfig = toml::from_str(config_str)?;

    let groups = toml_config
        .groups
        .into_iter()
        .map(|g| {
            let pattern = Regex::new(&g.pattern)
                .with_context(|| format!("invalid group pattern {:?}", g.pattern))?;
            Ok(GroupConfig {
                pattern,
                headers: g.headers.into_iter().collect(),
                basic_auth: g.basic_auth.map(|a| (a.username, a.password)),
                bearer_auth: g.bearer_auth,
                rate_limit: g
                    .rate_limit
                    .map(|r| (r.max_requests, Duration::from_millis(r.interval_ms))),
                random_order: g.random_order,
                fragment_validator: g.fragment_validator,
                continuation_policies: g.continuation_policies,
                final_policies: g.final_policies,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LinkCheckConfig {
        retry_attempts: toml_config.retry_attempts,
        overall_timeout_ms: toml_config.overall_timeout_ms,
        groups,
    })
}

/// Read a TOML config file from disk and parse it.
pub fn load_config(path: impl AsRef<std::path::Path>) -> Result<LinkCheckConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("can't read config file {}", path.as_ref().display()))?;
    parse_toml_config(&content)
}

fn apply_policy(
    builder: linkcheck_core::stream::LinkGroupBuilder,
    policy: &TomlAggregatePolicy,
    continuation: bool,
) -> linkcheck_core::stream::LinkGroupBuilder {
    match policy {
        TomlAggregatePolicy::MaxStatusOccurrences {
            status,
            max_occurrences,
        } => {
            let policy = MaxStatusOccurrences::new(*status, *max_occurrences);
            if continuation {
                builder.continuation_policy(policy)
            } else {
                builder.final_policy(policy)
            }
        }
        TomlAggregatePolicy::MinSuccessfulCount { min } => {
            let policy = MinSuccessfulCount::new(*min);
            if continuation {
                builder.continuation_policy(policy)
            } else {
                builder.final_policy(policy)
            }
        }
    }
}

/// Applies a [`LinkCheckConfig`] onto a `LinkStream` that already has its
/// link source, resolver and HTTP client wired up.
pub fn build_stream(
    config: &LinkCheckConfig,
    stream: LinkStream,
) -> Result<LinkStream, ValidationFatalError> {
    let mut stream = stream
        .retry_attempts(config.retry_attempts)
        .overall_timeout(config.overall_timeout_ms);

    for group in &config.groups {
        let mut builder = stream.group(group.pattern.as_str());

        for (name, value) in &group.headers {
            builder = builder.header(name.clone(), value.clone());
        }
        if let Some((username, password)) = &group.basic_auth {
            builder = builder.basic_auth(username, password);
        }
        if let Some(token) = &group.bearer_auth {
            builder = builder.bearer_auth(token.clone());
        }
        if let Some((max_requests, interval)) = group.rate_limit {
            builder = builder.rate_limit(requests_per_time_interval(max_requests, interval));
        }
        if group.random_order {
            builder = builder.random_order();
        }
        builder = match group.fragment_validator {
            TomlFragmentValidatorKind::Html => builder.fragment_validator(HtmlFragmentValidator),
            TomlFragmentValidatorKind::AlwaysValid => {
                builder.fragment_validator(AlwaysValidFragmentValidator)
            }
            TomlFragmentValidatorKind::GithubBlob => {
                builder.fragment_validator(GithubBlobFragmentValidator)
            }
        };
        for policy in &group.continuation_policies {
            builder = apply_policy(builder, policy, true);
        }
        for policy in &group.final_policies {
            builder = apply_policy(builder, policy, false);
        }

        stream = builder.end_group()?;
    }

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkcheck_core::interfaces::LinkSource;
    use linkcheck_core::link::Link;
    use std::io::Write;

    struct NoLinks;
    impl LinkSource for NoLinks {
        fn into_links(self: Box<Self>) -> Box<dyn Iterator<Item = Link>> {
            Box::new(std::iter::empty())
        }
    }

    #[test]
    fn defaults_without_groups() {
        let config = parse_toml_config("").unwrap();
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.overall_timeout_ms, 30_000);
        assert!(config.groups.is_empty());
    }

    #[test]
    fn parses_group_with_rate_limit_and_policies() {
        let toml = r#"
            retry_attempts = 2
            overall_timeout_ms = 5000

            [[groups]]
            pattern = 'https://api\.example\.com/.*'
            random_order = true
            fragment_validator = "always_valid"

            [groups.rate_limit]
            max_requests = 5
            interval_ms = 1000

            [[groups.continuation_policies]]
            type = "max_status_occurrences"
            status = 429
            max_occurrences = 3

            [[groups.final_policies]]
            type = "min_successful_count"
            min = 1
        "#;

        let config = parse_toml_config(toml).unwrap();
        assert_eq!(config.retry_attempts, 2);
        assert_eq!(config.groups.len(), 1);
        let group = &config.groups[0];
        assert!(group.pattern.is_match("https://api.example.com/x"));
        assert_eq!(group.rate_limit, Some((5, Duration::from_millis(1000))));
        assert!(group.random_order);
        assert_eq!(group.continuation_policies.len(), 1);
        assert_eq!(group.final_policies.len(), 1);
    }

    #[test]
    fn rejects_invalid_pattern() {
        let toml = r#"
            [[groups]]
            pattern = "("
        "#;
        assert!(parse_toml_config(toml).is_err());
    }

    #[test]
    fn build_stream_applies_config_to_link_stream() {
        let config = parse_toml_config(
            r#"
            [[groups]]
            pattern = '.*'
            fragment_validator = "always_valid"
            "#,
        )
        .unwrap();

        let stream = LinkStream::new(Box::new(NoLinks));
        let stream = build_stream(&config, stream).unwrap();
        let _ = stream; // builds without error; behavior covered in linkcheck-core tests
    }

    #[test]
    fn load_config_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkcheck.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "retry_attempts = 3").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.retry_attempts, 3);
    }
}
