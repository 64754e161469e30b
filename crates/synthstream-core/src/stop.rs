//! Cooperative stop flag shared between a signal handler and the generator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable "stop requested" flag.
///
/// Clones share one flag. The generator checks it between rows, never in the
/// middle of one.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this signal to stop.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let a = StopSignal::new();
        let b = a.clone();
        assert!(!b.is_stop_requested());
        a.request_stop();
        assert!(b.is_stop_requested());
    }

    #[test]
    fn test_visible_across_threads() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        std::thread::spawn(move || remote.request_stop())
            .join()
            .unwrap();
        assert!(signal.is_stop_requested());
    }
}
