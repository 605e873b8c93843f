//! Converts free-running cycle counts into seconds without a known clock rate.

use std::time::Duration;

use tracing::{debug, warn};

/// Consecutive unchanged OS clock reads after which calibration gives up.
const MAX_STALLED_READS: u32 = 1_000_000;

/// The two time sources calibration needs. Implementations live next to the
/// platform code that reads them.
pub trait CycleClock {
    fn read_cycle_counter(&self) -> u64;
    fn read_os_clock(&self) -> u64;
    fn os_clock_ticks_per_second(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSample {
    pub os_freq: u64,
    pub cpu_start: u64,
    pub cpu_end: u64,
    pub os_start: u64,
    pub os_end: u64,
}

impl CalibrationSample {
    /// Stamps both counters, spins on the OS clock until `wait` has passed,
    /// then stamps them again. A clock that stops advancing ends the spin
    /// early.
    pub fn take<C: CycleClock + ?Sized>(clock: &C, wait: Duration) -> Self {
        let os_freq = clock.os_clock_ticks_per_second();
        let wait_ticks = (os_freq as u128 * wait.as_nanos() / 1_000_000_000) as u64;

        let cpu_start = clock.read_cycle_counter();
        let os_start = clock.read_os_clock();
        let mut os_end = os_start;
        let mut stalled = 0u32;
        while os_end.wrapping_sub(os_start) < wait_ticks {
            std::hint::spin_loop();
            let now = clock.read_os_clock();
            if now == os_end {
                stalled += 1;
                if stalled == MAX_STALLED_READS {
                    warn!(os_end, "OS clock stopped advancing during calibration");
                    break;
                }
            } else {
                stalled = 0;
            }
            os_end = now;
        }
        let cpu_end = clock.read_cycle_counter();

        Self {
            os_freq,
            cpu_start,
            cpu_end,
            os_start,
            os_end,
        }
    }

    /// `0` when no OS time elapsed.
    pub fn cycles_per_second(&self) -> u64 {
        let os_elapsed = self.os_end.wrapping_sub(self.os_start);
        if os_elapsed == 0 {
            return 0;
        }
        let cpu_elapsed = self.cpu_end.wrapping_sub(self.cpu_start);
        (self.os_freq as u128 * cpu_elapsed as u128 / os_elapsed as u128) as u64
    }
}

pub fn calibrate<C: CycleClock + ?Sized>(clock: &C, wait: Duration) -> u64 {
    let sample = CalibrationSample::take(clock, wait);
    let cps = sample.cycles_per_second();
    debug!(?sample, cycles_per_second = cps, "calibrated cycle counter");
    cps
}

/// Seconds between two cycle stamps; `0.0` for an uncalibrated (zero) rate.
pub fn measure(start_cycles: u64, end_cycles: u64, cycles_per_second: u64) -> f64 {
    if cycles_per_second == 0 {
        return 0.0;
    }
    end_cycles.wrapping_sub(start_cycles) as f64 / cycles_per_second as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timed<T> {
    pub value: T,
    pub start_cycles: u64,
    pub end_cycles: u64,
}

impl<T> Timed<T> {
    pub fn cycles(&self) -> u64 {
        self.end_cycles.wrapping_sub(self.start_cycles)
    }

    pub fn seconds(&self, cycles_per_second: u64) -> f64 {
        measure(self.start_cycles, self.end_cycles, cycles_per_second)
    }
}

/// Runs `f` between two cycle stamps.
pub fn time_cycles<C, F, T>(clock: &C, f: F) -> Timed<T>
where
    C: CycleClock + ?Sized,
    F: FnOnce() -> T,
{
    let start_cycles = clock.read_cycle_counter();
    let value = f();
    let end_cycles = clock.read_cycle_counter();
    Timed {
        value,
        start_cycles,
        end_cycles,
    }
}
