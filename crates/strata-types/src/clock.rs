use std::sync::{Mutex, PoisonError};

use crate::temporal::Timestamp;

/// Injected time source.
///
/// Everything in strata that needs "now" takes a `Clock` (or an explicit
/// [`Timestamp`]) instead of reading the wall clock, so builds are
/// reproducible under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Internal mutable state of the Hybrid Logical Clock.
struct HlcState {
    physical_ms: u64,
    logical: u32,
}

/// Hybrid Logical Clock backed by the system wall clock.
///
/// - `physical = max(wall_clock, state.physical)`
/// - if physical advanced, `logical = 0`; otherwise `logical += 1`
///
/// Every returned [`Timestamp`] is strictly greater than the previous one,
/// even across threads.
pub struct HybridLogicalClock {
    node_id: u16,
    state: Mutex<HlcState>,
}

impl HybridLogicalClock {
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id,
            state: Mutex::new(HlcState {
                physical_ms: 0,
                logical: 0,
            }),
        }
    }

    /// The node identifier this clock stamps into every timestamp.
    pub fn node_id(&self) -> u16 {
        self.node_id
    }
}

impl Default for HybridLogicalClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for HybridLogicalClock {
    fn now(&self) -> Timestamp {
        let wall = Timestamp::wall_clock(self.node_id).physical_ms;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let physical = wall.max(state.physical_ms);
        // A full logical counter carries into the physical component.
        let (physical, logical) = if physical > state.physical_ms {
            (physical, 0)
        } else if let Some(logical) = state.logical.checked_add(1) {
            (physical, logical)
        } else if let Some(next_ms) = physical.checked_add(1) {
            (next_ms, 0)
        } else {
            (physical, u32::MAX)
        };

        state.physical_ms = physical;
        state.logical = logical;

        Timestamp::new(physical, logical, self.node_id)
    }
}

/// Clock that always returns the same timestamp.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub Timestamp);

impl FixedClock {
    pub fn at_millis(physical_ms: u64) -> Self {
        Self(Timestamp::from_millis(physical_ms))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Clock that returns its current value and then advances by `step_ms`.
pub struct ManualClock {
    current: Mutex<Timestamp>,
    step_ms: u64,
}

impl ManualClock {
    pub fn new(start: Timestamp, step_ms: u64) -> Self {
        Self {
            current: Mutex::new(start),
            step_ms,
        }
    }

    /// Move the clock to an explicit value.
    pub fn set(&self, ts: Timestamp) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = ts;
    }

    /// The value the next call to [`Clock::now`] will return.
    pub fn peek(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let ts = *current;
        current.physical_ms = current.physical_ms.saturating_add(self.step_ms);
        ts
    }
}
