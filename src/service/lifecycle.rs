//! Start/stop state shared by the service, its dispatcher, and its workers
//!
//! The state is a single atomic word: the low bit says whether the service is
//! running, the remaining bits count how many times it has been started.
//! Work is tagged with the generation it was dispatched under and is only
//! "alive" while that exact generation is running, so a stop followed by a
//! quick restart still silences everything from before the stop.

use std::sync::atomic::{AtomicU64, Ordering};

const RUNNING_BIT: u64 = 1;

#[derive(Debug, Default)]
pub struct Lifecycle {
    state: AtomicU64,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    fn encode(generation: u64) -> u64 {
        (generation << 1) | RUNNING_BIT
    }

    /// Enter a new running generation; `None` if already running
    pub fn begin(&self) -> Option<u64> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & RUNNING_BIT != 0 {
                return None;
            }
            let generation = (current >> 1) + 1;
            match self.state.compare_exchange_weak(
                current,
                Self::encode(generation),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(generation),
                Err(actual) => current = actual,
            }
        }
    }

    /// Leave the running state; `false` if it was not running
    pub fn end(&self) -> bool {
        let previous = self.state.fetch_and(!RUNNING_BIT, Ordering::AcqRel);
        previous & RUNNING_BIT != 0
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) & RUNNING_BIT != 0
    }

    /// Whether `generation` is the one currently running
    pub fn is_current(&self, generation: u64) -> bool {
        self.state.load(Ordering::Acquire) == Self::encode(generation)
    }

    /// Most recently started generation (0 before the first start)
    pub fn generation(&self) -> u64 {
        self.state.load(Ordering::Acquire) >> 1
    }
}
