//! Cooperative cancellation and wall-clock ceiling.
//!
//! Cancellation is a flag observed at pipeline checkpoints, never an
//! exception injected from outside: between frontier pops, before each
//! summarizer call, before composition, and before the final status flip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::GenerationError;

/// Checkpoint token shared between the job manager and the orchestrator.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Create a token with an optional wall-clock ceiling from now.
    pub fn new(flag: Arc<AtomicBool>, timeout: Option<Duration>) -> Self {
        Self {
            flag,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// Token that never cancels and never times out.
    pub fn unlimited() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Request cancellation; observed at the next checkpoint.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Checkpoint: error out if cancelled or past the deadline.
    ///
    /// Cancellation wins over timeout when both hold, matching the
    /// user-initiated intent.
    pub fn check(&self) -> Result<(), GenerationError> {
        if self.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(GenerationError::Timeout);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_fires() {
        let token = CancelToken::unlimited();
        assert!(token.check().is_ok());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_observed_at_checkpoint() {
        let token = CancelToken::unlimited();
        token.cancel();
        assert!(matches!(token.check(), Err(GenerationError::Cancelled)));
    }

    #[test]
    fn test_deadline_fires_as_timeout() {
        let flag = Arc::new(AtomicBool::new(false));
        let token = CancelToken::new(flag, Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(token.check(), Err(GenerationError::Timeout)));
    }

    #[test]
    fn test_cancel_wins_over_timeout() {
        let flag = Arc::new(AtomicBool::new(true));
        let token = CancelToken::new(flag, Some(Duration::ZERO));
        assert!(matches!(token.check(), Err(GenerationError::Cancelled)));
    }
}
