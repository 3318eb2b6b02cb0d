//! Sleep and jitter seams for retry and polling loops
//!
//! Production code sleeps on the tokio timer; tests inject
//! [`RecordingSleeper`] and a fixed jitter so delays are observable and
//! instantaneous.

use async_trait::async_trait;
use rand::Rng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Upper bound on the loader's exponential exponent
const MAX_EXPONENT: u32 = 10;

/// Async sleep abstraction
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and only yields to the scheduler
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        tokio::task::yield_now().await;
    }
}

/// Source of backoff jitter factors
pub type Jitter = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Uniform factor in [0.5, 1.5)
pub fn random_jitter() -> Jitter {
    Arc::new(|| rand::thread_rng().gen_range(0.5..1.5))
}

/// Constant factor, for deterministic tests
pub fn fixed_jitter(factor: f64) -> Jitter {
    Arc::new(move || factor)
}

/// Loader delay after a failed attempt (0-based): 2^attempt seconds
pub fn loader_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(MAX_EXPONENT))
}

/// Per-chapter delay after a failed attempt (1-based):
/// base × 2^(attempt−1) × jitter
pub fn chapter_backoff(base: Duration, attempt: u32, jitter: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
    base.mul_f64(f64::from(1u32 << exponent) * jitter)
}
