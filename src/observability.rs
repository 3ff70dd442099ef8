//! Correlation ids for workflow runs and relay requests
//!
//! Every deployment, every fee collection pass and every HTTP connection gets
//! one id. It is recorded on the tracing span the work runs under, so all log
//! lines of one run can be grepped together.

use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Span named after `operation`, carrying this id
    pub fn span(&self, operation: &'static str) -> tracing::Span {
        tracing::info_span!("op", operation, correlation_id = %self.0)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_run_gets_a_distinct_v4_id() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
        assert_eq!(a.uuid().get_version_num(), 4);
        assert_eq!(a.to_string().len(), 36);
    }
}
