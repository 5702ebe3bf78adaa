use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::ValidationFatalError;
use crate::link::Link;
use crate::response::Response;
use crate::result::ValidationResult;

/// Decides whether a link's fragment resolves inside a response body.
///
/// Every implementation must return `valid` when `link.fragment()` is
/// `None` — there is nothing to check.
pub trait FragmentValidator: Send + Sync {
    fn validate(
        &self,
        link: &Link,
        response: &Response,
    ) -> Result<ValidationResult, ValidationFatalError>;
}

/// Never checks the fragment; used by groups that don't care (e.g. a
/// group matching non-HTML, non-GitHub assets).
pub struct AlwaysValidFragmentValidator;

impl FragmentValidator for AlwaysValidFragmentValidator {
    fn validate(
        &self,
        link: &Link,
        _response: &Response,
    ) -> Result<ValidationResult, ValidationFatalError> {
        Ok(ValidationResult::valid(link.clone(), 0))
    }
}

/// Default fragment validator for rendered HTML documents.
///
/// Javadoc-style anchors such as `#foo(int,long)` contain characters that
/// are illegal in CSS selector syntax; those are looked up as a raw
/// element id instead of being parsed as a selector.
pub struct HtmlFragmentValidator;

const ILLEGAL_SELECTOR_CHARS: &[char] = &['(', ')', ',', '.'];

impl FragmentValidator for HtmlFragmentValidator {
    fn validate(
        &self,
        link: &Link,
        response: &Response,
    ) -> Result<ValidationResult, ValidationFatalError> {
        let Some(fragment) = link.fragment() else {
            return Ok(ValidationResult::valid(link.clone(), response.status_code() as i32));
        };
        let id = &fragment[1..]; // strip leading '#'

        let document = response
            .body_as::<Html, std::convert::Infallible>(|body| {
                Ok(Html::parse_document(&String::from_utf8_lossy(body)))
            })
            .expect("parsing HTML never fails");

        if id.contains(ILLEGAL_SELECTOR_CHARS) {
            let found = find_by_id(&document, id);
            return Ok(finish(link, response, found, fragment));
        }

        let selector_query = Selector::parse(fragment).map_err(|e| {
            ValidationFatalError::SelectorParse {
                selector: fragment.to_string(),
                source: anyhow::anyhow!("{e}"),
            }
        })?;
        let mut found = document.select(&selector_query).next().is_some();

        if !found {
            let name_selector = format!("a[name=\"{id}\"]");
            let name_query = Selector::parse(&name_selector).map_err(|e| {
                ValidationFatalError::SelectorParse {
                    selector: name_selector.clone(),
                    source: anyhow::anyhow!("{e}"),
                }
            })?;
            found = document.select(&name_query).next().is_some();
        }

        Ok(finish(link, response, found, fragment))
    }
}

fn find_by_id(document: &Html, id: &str) -> bool {
    document
        .tree
        .nodes()
        .filter_map(|node| node.value().as_element())
        .any(|el| el.attr("id") == Some(id))
}

fn finish(link: &Link, response: &Response, found: bool, fragment: &str) -> ValidationResult {
    let status = response.status_code() as i32;
    if found {
        ValidationResult::valid(link.clone(), status)
    } else {
        ValidationResult::invalid(link.clone(), status, format!("Could not find {fragment}"))
    }
}

#[derive(serde::Deserialize)]
struct GithubBlobBody {
    content: String,
}

static LINE_SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#L(\d+)$").unwrap());
static LINE_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#L(\d+)-L(\d+)$").unwrap());

/// Fragment validator for the GitHub "get blob" API, whose body is
/// `{ "content": <base64> }`. Fragments are GitHub's line-anchor syntax:
/// `#L<n>` or `#L<a>-L<b>`.
pub struct GithubBlobFragmentValidator;

impl FragmentValidator for GithubBlobFragmentValidator {
    fn validate(
        &self,
        link: &Link,
        response: &Response,
    ) -> Result<ValidationResult, ValidationFatalError> {
        let Some(fragment) = link.fragment() else {
            return Ok(ValidationResult::valid(link.clone(), response.status_code() as i32));
        };
        let status = response.status_code() as i32;

        let last_line = *response
            .body_as::<Option<usize>, std::convert::Infallible>(|body| Ok(decode_last_line_number(body)))
            .expect("decoder is infallible");

        let Some(last_line) = last_line else {
            return Ok(ValidationResult::invalid(
                link.clone(),
                status,
                "Could not decode GitHub blob body".to_string(),
            ));
        };

        if let Some(caps) = LINE_SINGLE.captures(fragment) {
            let n: usize = caps[1].parse().unwrap_or(0);
            return Ok(if n >= 1 && n <= last_line {
                ValidationResult::valid(link.clone(), status)
            } else {
                ValidationResult::invalid(
                    link.clone(),
                    status,
                    format!("Fragment {fragment} is out of range (file has {last_line} lines)"),
                )
            });
        }

        if let Some(caps) = LINE_RANGE.captures(fragment) {
            let a: usize = caps[1].parse().unwrap_or(0);
            let b: usize = caps[2].parse().unwrap_or(0);
            return Ok(if a >= 1 && a <= b && b <= last_line {
                ValidationResult::valid(link.clone(), status)
            } else {
                ValidationResult::invalid(
                    link.clone(),
                    status,
                    format!("Fragment {fragment} is out of range (file has {last_line} lines)"),
                )
            });
        }

        Ok(ValidationResult::invalid(
            link.clone(),
            status,
            format!("Fragment {fragment} is not supported"),
        ))
    }
}

fn decode_last_line_number(body: &bytes::Bytes) -> Option<usize> {
    let parsed: GithubBlobBody = serde_json::from_slice(body).ok()?;
    let cleaned: String = parsed.content.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .ok()?;
    let text = String::from_utf8_lossy(&decoded);
    Some(text.lines().count())
}
