use crate::WaitResult;
use crate::kind::WaitKind;
use crate::sync::{AtomicU32, Ordering, spin_loop};

/// A spin-wait policy.
///
/// Implementations are zero-sized and interchangeable: they differ only in
/// latency and power draw, never in what they return. Callers are expected to
/// be generic over `S: Spin` (see [`with_strategy`](crate::with_strategy)) so
/// that the loop is inlined into the barrier instead of called indirectly.
///
/// None of the methods time out. They return once, and only once, the
/// condition holds; a caller needing a deadline must arrange for another
/// thread to change `counter`.
pub trait Spin: Copy + Send + Sync {
    fn kind(&self) -> WaitKind;

    /// Spins until `counter != previous` and returns the new value along with
    /// the number of failed polls.
    fn until_different(&self, previous: u32, counter: &AtomicU32) -> WaitResult;

    /// Spins until `counter == expected` and returns the number of failed polls.
    fn until_equal(&self, expected: u32, counter: &AtomicU32) -> usize;
}

/// Plain spin loop with a pause hint between polls.
///
/// Always available; use it as the reference for the [`Spin`] contract. The
/// cost of the hint varies across CPUs, from a no-op to ~140 cycles.
#[derive(Clone, Copy, Debug, Default)]
pub struct PauseSpin;

impl Spin for PauseSpin {
    #[inline]
    fn kind(&self) -> WaitKind {
        WaitKind::Baseline
    }

    #[inline]
    fn until_different(&self, previous: u32, counter: &AtomicU32) -> WaitResult {
        let mut iterations = 0u32;
        loop {
            let current = counter.load(Ordering::Acquire);
            if current != previous {
                return WaitResult::new(current, iterations);
            }
            spin_loop();
            iterations = iterations.saturating_add(1);
        }
    }

    #[inline]
    fn until_equal(&self, expected: u32, counter: &AtomicU32) -> usize {
        let mut iterations = 0usize;
        loop {
            if counter.load(Ordering::Acquire) == expected {
                return iterations;
            }
            spin_loop();
            iterations = iterations.saturating_add(1);
        }
    }
}
