//! Reference clock shared by the bus, CPU and devices.
//!
//! The IIgs runs two cycle rates concurrently: "fast" cycles (the FPI, up to
//! 2.8MHz on a ROM03 machine) and "Mega2" cycles (the fixed ~1MHz rate that
//! Mega2-owned memory and all MMIO are always accessed at, regardless of the
//! FPI speed setting). `Clock` counts time in abstract "clocks" at a fixed
//! per-cycle rate high enough that both fast and Mega2 cycle lengths are
//! whole numbers of clocks, mirroring `clem_clocks_time_t` /
//! `clem_clocks_duration_t` in the original source.

/// Clocks per Mega2 (1MHz) cycle. Chosen so the fast-cycle duration below is
/// also an integral number of clocks at every supported speed.
pub const CLOCKS_PER_MEGA2_CYCLE: u32 = 1024;

/// Clocks per fast (2.8MHz) cycle when the accelerator is enabled.
pub const CLOCKS_PER_FAST_CYCLE: u32 = 366;

/// Microseconds represented by one Mega2 cycle at the nominal 1.020484MHz rate.
pub const MEGA2_CYCLES_PER_USEC: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemSpeed {
    /// 1.020484MHz, matching the Mega2 bus everywhere.
    Slow,
    /// ~2.8MHz FPI fast mode (the `SPEED` soft switch's normal operating mode).
    Fast,
}

/// Monotonic clock plus the current fast/slow speed selection.
#[derive(Debug, Clone)]
pub struct Clock {
    /// Total clocks elapsed since machine reset.
    pub ts: u64,
    speed: SystemSpeed,
}

impl Clock {
    pub fn new() -> Self {
        Self { ts: 0, speed: SystemSpeed::Fast }
    }

    pub fn reset(&mut self) {
        self.ts = 0;
        self.speed = SystemSpeed::Fast;
    }

    pub fn speed(&self) -> SystemSpeed {
        self.speed
    }

    pub fn set_speed(&mut self, speed: SystemSpeed) {
        self.speed = speed;
    }

    /// Duration, in clocks, of a single access at the current FPI speed.
    pub fn fast_cycle_duration(&self) -> u32 {
        match self.speed {
            SystemSpeed::Fast => CLOCKS_PER_FAST_CYCLE,
            SystemSpeed::Slow => CLOCKS_PER_MEGA2_CYCLE,
        }
    }

    /// Advance time by one access to FPI-owned memory, honoring the current speed.
    pub fn step_fast(&mut self) {
        self.ts += self.fast_cycle_duration() as u64;
    }

    /// Advance time by one access to Mega2-owned memory or MMIO, always at 1MHz.
    pub fn step_mega2(&mut self) {
        self.ts += CLOCKS_PER_MEGA2_CYCLE as u64;
    }

    /// Microseconds elapsed since reset (for device `sync` accounting).
    pub fn total_micros(&self) -> u64 {
        self.ts / CLOCKS_PER_MEGA2_CYCLE as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clock_starts_at_zero() {
        let clock = Clock::new();
        assert_eq!(clock.ts, 0);
        assert_eq!(clock.speed(), SystemSpeed::Fast);
    }

    #[test]
    fn fast_step_uses_selected_speed() {
        let mut clock = Clock::new();
        clock.step_fast();
        assert_eq!(clock.ts, CLOCKS_PER_FAST_CYCLE as u64);

        clock.set_speed(SystemSpeed::Slow);
        clock.step_fast();
        assert_eq!(clock.ts, (CLOCKS_PER_FAST_CYCLE + CLOCKS_PER_MEGA2_CYCLE) as u64);
    }

    #[test]
    fn mega2_step_ignores_speed() {
        let mut clock = Clock::new();
        clock.set_speed(SystemSpeed::Fast);
        clock.step_mega2();
        assert_eq!(clock.ts, CLOCKS_PER_MEGA2_CYCLE as u64);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut clock = Clock::new();
        clock.step_mega2();
        clock.set_speed(SystemSpeed::Slow);
        clock.reset();
        assert_eq!(clock.ts, 0);
        assert_eq!(clock.speed(), SystemSpeed::Fast);
    }

    #[test]
    fn total_micros_tracks_mega2_cycles() {
        let mut clock = Clock::new();
        for _ in 0..10 {
            clock.step_mega2();
        }
        assert_eq!(clock.total_micros(), 10);
    }
}
