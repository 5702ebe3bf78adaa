use std::sync::Arc;

use crate::group::LinkGroup;
use crate::link::Link;

/// Outcome of attempting to validate one link.
///
/// `retry_at_epoch_ms` is always an absolute wall-clock millisecond
/// timestamp; a retry whose time has already passed is still a `Retry` —
/// the scheduler, not this type, decides whether to execute or abandon it.
/// A `status_code` of `0` means "never attempted" (deadline expired or a
/// continuation policy skipped it); negative codes are synthetic results
/// produced by a final policy.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    Valid {
        link: Link,
        status_code: i32,
    },
    Invalid {
        link: Link,
        status_code: i32,
        message: String,
    },
    Retry {
        link: Link,
        status_code: i32,
        message: String,
        retry_at_epoch_ms: u64,
    },
}

impl ValidationResult {
    pub fn valid(link: Link, status_code: i32) -> Self {
        ValidationResult::Valid { link, status_code }
    }

    pub fn invalid(link: Link, status_code: i32, message: impl Into<String>) -> Self {
        ValidationResult::Invalid {
            link,
            status_code,
            message: message.into(),
        }
    }

    pub fn retry(
        link: Link,
        status_code: i32,
        message: impl Into<String>,
        retry_at_epoch_ms: u64,
    ) -> Self {
        ValidationResult::Retry {
            link,
            status_code,
            message: message.into(),
            retry_at_epoch_ms,
        }
    }

    pub fn link(&self) -> &Link {
        match self {
            ValidationResult::Valid { link, .. }
            | ValidationResult::Invalid { link, .. }
            | ValidationResult::Retry { link, .. } => link,
        }
    }

    pub fn status_code(&self) -> i32 {
        match self {
            ValidationResult::Valid { status_code, .. }
            | ValidationResult::Invalid { status_code, .. }
            | ValidationResult::Retry { status_code, .. } => *status_code,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, ValidationResult::Retry { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationResult::Invalid { .. })
    }

    pub fn retry_at_epoch_ms(&self) -> Option<u64> {
        match self {
            ValidationResult::Retry {
                retry_at_epoch_ms, ..
            } => Some(*retry_at_epoch_ms),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ValidationResult::Invalid { message, .. } | ValidationResult::Retry { message, .. } => {
                Some(message)
            }
            ValidationResult::Valid { .. } => None,
        }
    }
}

/// A single attempt-in-waiting: the (possibly rewritten) link, attempts
/// remaining, the group whose rules govern it, and whether the group's
/// continuation policies still allow it to run.
pub struct ValidationRequest {
    link: Link,
    attempts_left: u32,
    group: Arc<LinkGroup>,
    should_continue: bool,
}

impl ValidationRequest {
    pub fn new(link: Link, attempts_left: u32, group: Arc<LinkGroup>, should_continue: bool) -> Self {
        Self {
            link,
            attempts_left,
            group,
            should_continue,
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn attempts_left(&self) -> u32 {
        self.attempts_left
    }

    pub fn group(&self) -> &Arc<LinkGroup> {
        &self.group
    }

    pub fn should_continue(&self) -> bool {
        self.should_continue
    }

    /// A fresh request for the same link with one attempt consumed,
    /// re-latched against whatever the continuation policies say now.
    pub fn retried(self, should_continue: bool) -> Self {
        Self {
            attempts_left: self.attempts_left.saturating_sub(1),
            should_continue,
            ..self
        }
    }
}
