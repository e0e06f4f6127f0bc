//! Wall-clock abstraction used to timestamp results.

use chrono::{DateTime, Duration, Utc};

/// Source of "now" for result timestamps; fixed in tests so compiled
/// results are reproducible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WallClock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl WallClock {
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            WallClock::System => Utc::now(),
            WallClock::Fixed(t) => *t,
        }
    }

    /// Advance a fixed clock. No effect on the system clock.
    pub fn advance(&mut self, delta: Duration) {
        if let WallClock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// 2023-11-14T22:13:20Z, for tests and doc examples.
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// A `WallClock` fixed at [`FIXED_TEST_TIMESTAMP`].
pub fn fixed_clock() -> WallClock {
    WallClock::Fixed(DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0).unwrap_or_default())
}
