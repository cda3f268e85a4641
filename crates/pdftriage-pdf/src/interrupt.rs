use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Why a parsing loop stopped before reaching the end of its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupted::Cancelled => f.write_str("parsing cancelled"),
            Interrupted::DeadlineExceeded => f.write_str("parse deadline exceeded"),
        }
    }
}

impl std::error::Error for Interrupted {}

/// Stop signals polled inside the object scan and object-stream expansion.
/// Cancellation wins over the deadline when both are set.
#[derive(Debug, Clone, Default)]
pub struct ParseInterrupt {
    pub cancel: Option<Arc<AtomicBool>>,
    pub deadline: Option<Instant>,
}

impl ParseInterrupt {
    pub fn check(&self) -> Option<Interrupted> {
        if self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Some(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }
}
