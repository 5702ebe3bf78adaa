use crate::group::LinkGroupStats;

/// The verdict of an `AggregatePolicy` evaluation.
#[derive(Debug, Clone)]
pub struct AggregatePolicyResult {
    pub valid: bool,
    pub message: String,
}

impl AggregatePolicyResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// A pure predicate over a group's statistics.
///
/// Used two ways: as a *continuation* policy, evaluated before every
/// request in the group (a failing one short-circuits the rest of the
/// group's links without recording them as errors); and as a *final*
/// policy, evaluated once after all retries drain (a failing one produces
/// a synthetic invalid result keyed on the group's pattern).
pub trait AggregatePolicy: Send + Sync {
    fn evaluate(&self, stats: &LinkGroupStats) -> AggregatePolicyResult;
}

/// Fails once a given status code has occurred `max_occurrences` times or
/// more. The canonical continuation policy: "stop after N 429s".
pub struct MaxStatusOccurrences {
    status: u16,
    max_occurrences: u64,
}

impl MaxStatusOccurrences {
    pub fn new(status: u16, max_occurrences: u64) -> Self {
        Self {
            status,
            max_occurrences,
        }
    }
}

impl AggregatePolicy for MaxStatusOccurrences {
    fn evaluate(&self, stats: &LinkGroupStats) -> AggregatePolicyResult {
        let count = stats.count(self.status);
        if count >= self.max_occurrences {
            AggregatePolicyResult::failed(format!(
                "status {} occurred {} times (limit {})",
                self.status, count, self.max_occurrences
            ))
        } else {
            AggregatePolicyResult::ok()
        }
    }
}

/// Fails unless at least `min` 2xx responses were observed. The canonical
/// final policy: "assert at least K valid links in this group".
pub struct MinSuccessfulCount {
    min: u64,
}

impl MinSuccessfulCount {
    pub fn new(min: u64) -> Self {
        Self { min }
    }
}

impl AggregatePolicy for MinSuccessfulCount {
    fn evaluate(&self, stats: &LinkGroupStats) -> AggregatePolicyResult {
        let successes = stats.total_successful();
        if successes >= self.min {
            AggregatePolicyResult::ok()
        } else {
            AggregatePolicyResult::failed(format!(
                "only {successes} successful links, expected at least {}",
                self.min
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_status_occurrences_trips_at_threshold() {
        let stats = LinkGroupStats::new();
        let policy = MaxStatusOccurrences::new(429, 3);

        for _ in 0..2 {
            stats.record(429);
            assert!(policy.evaluate(&stats).valid);
        }
        stats.record(429);
        assert!(!policy.evaluate(&stats).valid);
    }

    #[test]
    fn min_successful_count() {
        let stats = LinkGroupStats::new();
        let policy = MinSuccessfulCount::new(2);
        assert!(!policy.evaluate(&stats).valid);
        stats.record(200);
        stats.record(204);
        assert!(policy.evaluate(&stats).valid);
    }
}
