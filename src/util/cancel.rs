//! Cooperative cancellation for blocking storage calls.
//!
//! A `CancellationSource` owns the flag; any number of `CancellationToken`s
//! observe it. Tokens are checked between polls of client futures and between
//! buffer fills when copying streams.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Default)]
pub struct CancellationSource {
    flag: Arc<AtomicBool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Some(self.flag.clone()),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Cheap to clone. `CancellationToken::none()` is never cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Option<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn none() -> Self {
        Self { flag: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_observes_source() {
        let source = CancellationSource::new();
        let token = source.token();
        let cloned = token.clone();

        assert!(!token.is_cancelled());
        source.cancel();
        assert!(token.is_cancelled());
        assert!(cloned.is_cancelled());
    }

    #[test]
    fn test_none_is_never_cancelled() {
        assert!(!CancellationToken::none().is_cancelled());
        assert!(!CancellationToken::default().is_cancelled());
    }
}
