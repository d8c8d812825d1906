//! Cooperative cancellation shared between a running loop and its controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable flag checked by long-running loops at well-defined points.
///
/// The continuous diffusion run checks it once per tick and the genetic
/// search once per generation. Work already in flight when the flag is raised
/// runs to completion.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create a lowered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Lower the signal so the loop may run again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether the signal has been raised.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        assert!(!signal.is_stopped());

        remote.stop();
        assert!(signal.is_stopped());

        signal.reset();
        assert!(!remote.is_stopped());
    }
}
