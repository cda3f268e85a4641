use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Cancelled;

/// Cooperative cancellation flag shared between the caller and a running
/// analysis. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Shared flag handed to the parser so it can stop mid-document.
    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutExceeded {
    pub budget: Duration,
    pub elapsed: Duration,
}

/// Wall-clock budget. A checker without a budget never expires.
#[derive(Debug, Clone)]
pub struct TimeoutChecker {
    start: Instant,
    budget: Option<Duration>,
}

impl TimeoutChecker {
    pub fn new(budget: Option<Duration>) -> Self {
        Self { start: Instant::now(), budget }
    }

    pub fn check(&self) -> Result<(), TimeoutExceeded> {
        let Some(budget) = self.budget else {
            return Ok(());
        };
        let elapsed = self.start.elapsed();
        if elapsed > budget {
            return Err(TimeoutExceeded { budget, elapsed });
        }
        Ok(())
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Instant at which the budget runs out, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.budget.and_then(|budget| self.start.checked_add(budget))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());
        token.cancel();
        assert!(observer.check().is_err());
    }

    #[test]
    fn zero_budget_expires() {
        let checker = TimeoutChecker::new(Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(1));
        assert!(checker.check().is_err());
        assert!(TimeoutChecker::new(None).check().is_ok());
    }

    #[test]
    fn deadline_follows_the_budget() {
        let checker = TimeoutChecker::new(Some(Duration::from_secs(5)));
        let deadline = checker.deadline().expect("deadline");
        assert!(deadline > Instant::now());
        assert_eq!(TimeoutChecker::new(None).deadline(), None);
    }

    #[test]
    fn parser_flag_tracks_the_token() {
        let token = CancelToken::new();
        let flag = token.flag();
        token.cancel();
        assert!(flag.load(Ordering::Relaxed));
    }
}
