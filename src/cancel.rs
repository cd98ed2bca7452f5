//! Cooperative cancellation: a cheap flag checked at adapter call boundaries
//! rather than an async runtime in the core (`git2` and the compiler
//! abstraction are both blocking).

use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("operation was cancelled")]
pub struct Cancelled;

/// Clone-and-share cooperative cancellation flag. Cloning shares the same
/// underlying flag; call [`CancellationToken::cancel`] from any clone to
/// signal every holder.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancelling_a_clone_is_visible_on_the_original() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert_eq!(token.check(), Err(Cancelled));
    }
}
