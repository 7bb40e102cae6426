use crate::error::{Result, WrapupError};
use std::time::{Duration, Instant};

/// Overall time budget of a run, checked between steps
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self { started: Instant::now(), budget }
    }

    /// A deadline that never expires
    pub fn unbounded() -> Self {
        Self::after(Duration::MAX)
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            return Err(WrapupError::Timeout(self.budget));
        }
        Ok(())
    }
}
