//! Cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{UelError, UelResult};

/// Shared interruption flag.
///
/// Clones observe the same flag, so the caller can keep one clone and hand
/// another to a running enumerator (possibly on another thread). Solvers
/// poll it at their step boundaries: between SAT solves, inside the DPLL
/// search, at every rule-engine choice point and while waiting for an
/// external process.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the token can be reused
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// `Err(Cancelled)` once cancellation has been requested
    pub fn check(&self) -> UelResult<()> {
        if self.is_cancelled() {
            Err(UelError::cancelled())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());

        other.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check().unwrap_err().code, ErrorCode::Cancelled);

        token.reset();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
