use haversine_core::constants::OS_CLOCK_NS_PER_SEC;
use haversine_core::CycleClock;

/// Hardware cycle counter paired with `CLOCK_MONOTONIC`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareClock;

impl HardwareClock {
    pub fn new() -> Self {
        Self
    }
}

impl CycleClock for HardwareClock {
    fn read_cycle_counter(&self) -> u64 {
        read_cycle_counter()
    }

    fn read_os_clock(&self) -> u64 {
        monotonic_now_ns()
    }

    fn os_clock_ticks_per_second(&self) -> u64 {
        OS_CLOCK_NS_PER_SEC
    }
}

pub fn monotonic_now_ns() -> u64 {
    unsafe {
        let mut ts: libc::timespec = std::mem::zeroed();
        if libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) != 0 {
            return 0;
        }
        (ts.tv_sec as u64) * OS_CLOCK_NS_PER_SEC + (ts.tv_nsec as u64)
    }
}

#[cfg(target_arch = "x86_64")]
pub fn read_cycle_counter() -> u64 {
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(target_arch = "aarch64")]
pub fn read_cycle_counter() -> u64 {
    let cnt: u64;
    unsafe {
        core::arch::asm!("mrs {}, cntvct_el0", out(reg) cnt, options(nomem, nostack));
    }
    cnt
}

/// No dedicated counter: the monotonic clock stands in, so calibration
/// reports roughly 1 GHz.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub fn read_cycle_counter() -> u64 {
    monotonic_now_ns()
}
