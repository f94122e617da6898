//! Run-wide time limit.

use std::time::Duration;
use std::time::Instant;

use crate::CompareError;
use crate::Result;

/// Overall time budget for a comparison, shared by every node and every
/// external command.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// Starts the clock now.
    #[must_use]
    pub fn start(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    /// A deadline that never expires.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::start(None)
    }

    /// Time since the clock started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left, or `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.limit
            .map(|limit| limit.saturating_sub(self.start.elapsed()))
    }

    /// Fails once the limit has passed.
    ///
    /// # Errors
    ///
    /// Returns [`CompareError::DeadlineExceeded`] when no time is left.
    pub fn check(&self) -> Result<()> {
        match (self.limit, self.remaining()) {
            (Some(limit), Some(left)) if left.is_zero() => {
                Err(CompareError::DeadlineExceeded { limit })
            }
            _ => Ok(()),
        }
    }

    /// The configured limit.
    #[must_use]
    pub const fn limit(&self) -> Option<Duration> {
        self.limit
    }
}
