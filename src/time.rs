//! Fixed-timestep simulation clock using an accumulator pattern.
//!
//! The host feeds wall-clock milliseconds at whatever cadence it likes;
//! the clock converts them into discrete 1 Hz simulation ticks for idle
//! production and the effect sweep. Gaps longer than the clamp are not
//! simulated live — that is offline time, settled by the reconciler.

pub struct SimClock {
    ms_per_tick: u64,
    accumulator: u64,
    /// Total elapsed ticks since creation.
    pub total_ticks: u64,
    last_timestamp: Option<u64>,
    max_frame_ms: u64,
}

impl SimClock {
    /// One tick per second, with live catch-up capped at 5 seconds.
    pub fn new() -> Self {
        Self::with_tick_ms(1000, 5000)
    }

    pub fn with_tick_ms(ms_per_tick: u64, max_frame_ms: u64) -> Self {
        SimClock {
            ms_per_tick,
            accumulator: 0,
            total_ticks: 0,
            last_timestamp: None,
            max_frame_ms,
        }
    }

    /// Feed a wall-clock timestamp. Returns the number of whole ticks to
    /// simulate now.
    pub fn update(&mut self, now_ms: u64) -> u64 {
        let delta = match self.last_timestamp {
            // A clock that goes backwards contributes nothing.
            Some(prev) => now_ms.saturating_sub(prev).min(self.max_frame_ms),
            None => 0,
        };
        self.last_timestamp = Some(now_ms);

        self.accumulator += delta;
        let ticks = self.accumulator / self.ms_per_tick;
        self.accumulator -= ticks * self.ms_per_tick;
        self.total_ticks += ticks;
        ticks
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}
