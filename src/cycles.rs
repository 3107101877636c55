//! Hardware cycle counter access.

/// A monotonic counter of CPU cycles.
pub trait CycleSource {
    fn now(&mut self) -> u64;
}

/// The x86 time stamp counter.
#[derive(Debug, Clone, Copy)]
pub struct Tsc {
    _private: (),
}

impl Tsc {
    /// The counter, when this target has one.
    pub fn detect() -> Option<Tsc> {
        if cfg!(any(target_arch = "x86", target_arch = "x86_64")) {
            Some(Tsc { _private: () })
        } else {
            None
        }
    }
}

impl CycleSource for Tsc {
    #[cfg(target_arch = "x86_64")]
    fn now(&mut self) -> u64 {
        // SAFETY: rdtsc has no preconditions on x86_64.
        unsafe { core::arch::x86_64::_rdtsc() }
    }

    #[cfg(target_arch = "x86")]
    fn now(&mut self) -> u64 {
        // SAFETY: rdtsc has no preconditions on x86.
        unsafe { core::arch::x86::_rdtsc() }
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn now(&mut self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn tsc_moves_forward() {
        let mut tsc = Tsc::detect().unwrap();
        let a = tsc.now();
        let b = tsc.now();
        assert!(b >= a);
    }
}
