use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{HttpError, ValidationFatalError};
use crate::interfaces::{HttpClient, HttpMethod};
use crate::link::Link;
use crate::response::Response;
use crate::result::{ValidationRequest, ValidationResult};

/// HTTP statuses that trigger a scheduled retry rather than immediate
/// terminal failure.
pub const RETRYABLE_STATUSES: &[u16] = &[301, 429, 500, 501, 502, 503, 504];

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(120);

/// Executes one `ValidationRequest`: acquires a rate-limit credit, issues
/// the HTTP request, classifies the outcome, and (on success) runs the
/// group's fragment validator.
pub struct LinkValidator {
    http_client: Arc<dyn HttpClient>,
}

impl LinkValidator {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    pub async fn validate(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, ValidationFatalError> {
        let group = request.group();
        log::debug!("group {} matched {}", group.pattern(), request.link().resolved_uri());
        group.rate_limit().acquire().await;

        let link = group.map_link(request.link().clone());
        let headers = group.headers().to_vec();

        match self
            .http_client
            .request(HttpMethod::Get, link.resolved_uri(), &headers)
            .await
        {
            Ok(response) => {
                group.stats().record(response.status_code());
                if response.is_success() {
                    group.fragment_validator().validate(&link, &response)
                } else {
                    Ok(classify_http_status(&link, &response, request.attempts_left()))
                }
            }
            Err(HttpError::Network { message, .. }) => Ok(classify_network_error(
                &link,
                &message,
                request.attempts_left(),
            )),
        }
    }
}

fn classify_http_status(link: &Link, response: &Response, attempts_left: u32) -> ValidationResult {
    let status = response.status_code();
    if RETRYABLE_STATUSES.contains(&status) {
        if attempts_left <= 1 {
            return ValidationResult::invalid(link.clone(), status as i32, format!("HTTP {status}"));
        }
        let retry_at = now_ms() + retry_delay(response).as_millis() as u64;
        log::debug!("retry scheduled for {} at {}", link.resolved_uri(), retry_at);
        ValidationResult::retry(link.clone(), status as i32, format!("HTTP {status}"), retry_at)
    } else {
        ValidationResult::invalid(link.clone(), status as i32, format!("HTTP {status}"))
    }
}

fn classify_network_error(link: &Link, message: &str, attempts_left: u32) -> ValidationResult {
    if attempts_left > 1 {
        let retry_at = now_ms() + DEFAULT_RETRY_DELAY.as_millis() as u64;
        ValidationResult::retry(link.clone(), 0, message.to_string(), retry_at)
    } else {
        ValidationResult::invalid(link.clone(), 0, message.to_string())
    }
}

/// `delay` defaults to `DEFAULT_RETRY_DELAY`; a `Retry-After` header (either
/// integer seconds or an HTTP-date) is honored but capped at
/// `MAX_RETRY_DELAY`.
fn retry_delay(response: &Response) -> Duration {
    let Some(raw) = response.header("retry-after") else {
        return DEFAULT_RETRY_DELAY;
    };
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .or_else(|_| {
            httpdate::parse_http_date(raw.trim())
                .map(|when| {
                    when.duration_since(SystemTime::now())
                        .unwrap_or(Duration::ZERO)
                })
        });
    match parsed {
        Ok(delay) => delay.min(MAX_RETRY_DELAY),
        Err(_) => DEFAULT_RETRY_DELAY,
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the epoch")
        .as_millis() as u64
}
