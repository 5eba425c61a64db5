//! Operation timeouts and deadlines
//!
//! Each resource carries an optional `timeouts` block. The configured string
//! wins; anything missing or unparsable falls back to the resource default.
//! The resulting [`Deadline`] is threaded through the operation and bounds
//! every vendor call made on its behalf.

use crate::error::{FrameworkError, Result};
use crate::operation::Operation;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

pub const TIMEOUT_5MIN: Duration = Duration::from_secs(5 * 60);
pub const TIMEOUT_20MIN: Duration = Duration::from_secs(20 * 60);
pub const TIMEOUT_60MIN: Duration = Duration::from_secs(60 * 60);
pub const TIMEOUT_24HOUR: Duration = Duration::from_secs(24 * 60 * 60);

/// User supplied `timeouts` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub create: Value<String>,
    pub read: Value<String>,
    pub update: Value<String>,
    pub delete: Value<String>,
}

impl Timeouts {
    fn field(&self, op: Operation) -> &Value<String> {
        match op {
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
            Operation::Read | Operation::Import => &self.read,
        }
    }

    /// Budget for `op`, falling back to `default` when unset or invalid
    pub fn resolve(&self, op: Operation, default: Option<Duration>) -> Option<Duration> {
        let Some(raw) = self.field(op).as_str() else {
            return default;
        };
        match parse_duration(raw) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::info!(
                    "Failed to get {} timeout ({}). Use default timeout: {:?}",
                    op,
                    e,
                    default
                );
                default
            }
        }
    }
}

/// Parse duration strings such as `20m`, `1h30m` or `90s`
pub fn parse_duration(s: &str) -> Result<Duration> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(FrameworkError::InvalidDuration {
            value: s.to_string(),
            reason: "empty".to_string(),
        });
    }
    humantime::parse_duration(trimmed).map_err(|e| FrameworkError::InvalidDuration {
        value: s.to_string(),
        reason: e.to_string(),
    })
}

/// The operation ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("context deadline exceeded (after {budget:?})")]
pub struct DeadlineExceeded {
    pub budget: Duration,
}

/// Deadline bounding the vendor calls of one operation
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget: Option<Duration>,
    at: Option<Instant>,
}

impl Deadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            budget: Some(budget),
            at: Some(Instant::now() + budget),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            budget: None,
            at: None,
        }
    }

    pub fn from_budget(budget: Option<Duration>) -> Self {
        budget.map_or_else(Self::unbounded, Self::after)
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Time left, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|d| d.is_zero())
    }

    /// Run `fut`, cancelling it once the deadline passes
    pub async fn run<F, T, E>(&self, fut: F) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: From<DeadlineExceeded>,
    {
        let (Some(at), Some(budget)) = (self.at, self.budget) else {
            return fut.await;
        };
        match tokio::time::timeout_at(at, fut).await {
            Ok(result) => result,
            Err(_) => Err(DeadlineExceeded { budget }.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("20m").unwrap(), TIMEOUT_20MIN);
        assert_eq!(
            parse_duration("1h30m").unwrap(),
            Duration::from_secs(90 * 60)
        );
        assert_eq!(parse_duration(" 90s ").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_resolve_falls_back() {
        let timeouts = Timeouts {
            create: Value::known("1h"),
            update: Value::known("not a duration"),
            ..Default::default()
        };
        assert_eq!(
            timeouts.resolve(Operation::Create, Some(TIMEOUT_20MIN)),
            Some(TIMEOUT_60MIN)
        );
        assert_eq!(
            timeouts.resolve(Operation::Update, Some(TIMEOUT_20MIN)),
            Some(TIMEOUT_20MIN)
        );
        assert_eq!(timeouts.resolve(Operation::Read, None), None);
        assert_eq!(
            timeouts.resolve(Operation::Delete, Some(TIMEOUT_5MIN)),
            Some(TIMEOUT_5MIN)
        );
    }

    #[derive(Debug, PartialEq)]
    enum TestError {
        Deadline,
    }

    impl From<DeadlineExceeded> for TestError {
        fn from(_: DeadlineExceeded) -> Self {
            TestError::Deadline
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_slow_call() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let result: std::result::Result<(), TestError> = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(TestError::Deadline));
        assert!(deadline.is_expired());
    }

    #[tokio::test]
    async fn test_unbounded_runs_to_completion() {
        let deadline = Deadline::unbounded();
        let result: std::result::Result<u32, TestError> = deadline.run(async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(deadline.remaining(), None);
    }
}
