//! Time source for discovery polling, reconnect delay and cache freshness.

use async_trait::async_trait;

#[async_trait(?Send)]
pub trait Timer {
    /// Monotonic milliseconds; only differences are meaningful.
    fn now_ms(&self) -> u64;
    async fn sleep(&self, ms: u64);
}

#[cfg(feature = "native")]
pub use tokio_timer::TokioTimer;

#[cfg(feature = "native")]
mod tokio_timer {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Tokio clock. Honors `tokio::time::pause`, so tests can drive it with `advance`.
    #[derive(Debug, Clone)]
    pub struct TokioTimer {
        origin: Instant,
    }

    impl Default for TokioTimer {
        fn default() -> Self { Self::new() }
    }

    impl TokioTimer {
        pub fn new() -> Self {
            Self { origin: Instant::now() }
        }
    }

    #[async_trait(?Send)]
    impl Timer for TokioTimer {
        fn now_ms(&self) -> u64 {
            Instant::now().duration_since(self.origin).as_millis() as u64
        }

        async fn sleep(&self, ms: u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}
