//! Deterministic [`Environment`] for simulation testing.
//!
//! Wall-clock time and OS randomness are exactly the two things a
//! reproducible test run cannot depend on. `SimEnv` replaces both with a
//! virtual clock advanced only by explicit [`SimEnv::advance`] calls and a
//! seeded `ChaCha8Rng`, so the same seed and the same sequence of operations
//! always produce the same run.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use termstream_core::env::Environment;

/// A virtual instant: an offset from a fixed, otherwise meaningless origin.
///
/// Kept distinct from `std::time::Instant` so the simulation clock can never
/// accidentally be compared against wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(Duration);

impl std::ops::Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

#[derive(Debug)]
struct Inner {
    elapsed: Duration,
    rng: ChaCha8Rng,
}

/// Deterministic, seeded [`Environment`] for `termstream_core`.
///
/// Time only moves when [`SimEnv::advance`] is called; `sleep` resolves
/// immediately rather than actually waiting, since a simulation driver
/// advances the clock itself between steps.
#[derive(Debug, Clone)]
pub struct SimEnv {
    inner: Arc<Mutex<Inner>>,
}

impl SimEnv {
    /// Create a simulation environment seeded for reproducibility.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { elapsed: Duration::ZERO, rng: ChaCha8Rng::seed_from_u64(seed) })) }
    }

    /// Advance the virtual clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.elapsed += duration;
    }

    /// Elapsed virtual time since this environment was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).elapsed
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> Self::Instant {
        SimInstant(self.elapsed())
    }

    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.rng.fill_bytes(buffer);
    }
}

/// Convert a virtual instant into a millisecond timestamp relative to a
/// fixed epoch, the form the protocol layer's `timestamp_ms` fields expect.
#[must_use]
pub fn timestamp_ms(epoch: SimInstant, now: SimInstant) -> u64 {
    (now - epoch).as_millis().try_into().unwrap_or(u64::MAX)
}

impl SimInstant {
    /// The environment's starting instant (zero elapsed virtual time).
    pub const ORIGIN: Self = Self(Duration::ZERO);
}
