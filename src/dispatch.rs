use crate::WaitResult;
#[cfg(any(spinx_monitorx, spinx_umonitor))]
use crate::detect::native_supports;
use crate::kind::WaitKind;
#[cfg(spinx_monitorx)]
use crate::monitor::MonitorXSpin;
#[cfg(spinx_umonitor)]
use crate::monitor::UMonitorSpin;
use crate::spin::{PauseSpin, Spin};
use crate::sync::AtomicU32;

/// An operation generic over the spin strategy, run by [`with_strategy`].
///
/// Closures cannot be generic, hence a trait: `run` is monomorphized for each
/// strategy, so the spin loop inlines into the caller.
///
/// ```
/// # #[cfg(not(feature = "loom"))] {
/// use spinx::{AtomicU32, Spin, SpinOp, WaitResult, with_strategy};
///
/// struct Barrier<'a> {
///     epoch: &'a AtomicU32,
///     seen: u32,
/// }
///
/// impl SpinOp for Barrier<'_> {
///     type Output = WaitResult;
///
///     fn run<S: Spin>(self, spin: S) -> WaitResult {
///         spin.until_different(self.seen, self.epoch)
///     }
/// }
///
/// let epoch = AtomicU32::new(1);
/// let kind = spinx::detect(0);
/// let result = with_strategy(kind, Barrier { epoch: &epoch, seen: 0 });
/// assert_eq!(result.current, 1);
/// # }
/// ```
pub trait SpinOp {
    type Output;

    fn run<S: Spin>(self, spin: S) -> Self::Output;
}

/// Calls `op.run(spin)` with the strategy for `kind`.
///
/// Kinds not compiled into this build, or not supported by the running
/// processor, fall back to [`PauseSpin`]. The support check is a single
/// relaxed load once CPUID has been read.
#[inline]
pub fn with_strategy<F: SpinOp>(kind: WaitKind, op: F) -> F::Output {
    match kind {
        #[cfg(spinx_monitorx)]
        // SAFETY: the guard confirmed MONITORX support.
        WaitKind::VendorMonitorA if native_supports(kind) => {
            op.run(unsafe { MonitorXSpin::new_unchecked() })
        }
        #[cfg(spinx_umonitor)]
        // SAFETY: the guard confirmed WAITPKG support.
        WaitKind::VendorMonitorB if native_supports(kind) => {
            op.run(unsafe { UMonitorSpin::new_unchecked() })
        }
        _ => op.run(PauseSpin),
    }
}

/// The strategies compiled into this build, resolved from a [`WaitKind`].
///
/// Prefer [`with_strategy`] in hot loops: matching on a `Strategy` costs a
/// branch per call, whereas `with_strategy` resolves once per call site.
#[derive(Clone, Copy, Debug)]
pub enum Strategy {
    #[cfg(spinx_monitorx)]
    MonitorX(MonitorXSpin),
    #[cfg(spinx_umonitor)]
    UMonitor(UMonitorSpin),
    Pause(PauseSpin),
}

impl Strategy {
    /// Same fallback rules as [`with_strategy`].
    #[inline]
    pub fn from_kind(kind: WaitKind) -> Self {
        match kind {
            #[cfg(spinx_monitorx)]
            // SAFETY: the guard confirmed MONITORX support.
            WaitKind::VendorMonitorA if native_supports(kind) => {
                Strategy::MonitorX(unsafe { MonitorXSpin::new_unchecked() })
            }
            #[cfg(spinx_umonitor)]
            // SAFETY: the guard confirmed WAITPKG support.
            WaitKind::VendorMonitorB if native_supports(kind) => {
                Strategy::UMonitor(unsafe { UMonitorSpin::new_unchecked() })
            }
            _ => Strategy::Pause(PauseSpin),
        }
    }
}

impl From<WaitKind> for Strategy {
    fn from(kind: WaitKind) -> Self {
        Strategy::from_kind(kind)
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Pause(PauseSpin)
    }
}

impl Spin for Strategy {
    #[inline]
    fn kind(&self) -> WaitKind {
        match self {
            #[cfg(spinx_monitorx)]
            Strategy::MonitorX(spin) => spin.kind(),
            #[cfg(spinx_umonitor)]
            Strategy::UMonitor(spin) => spin.kind(),
            Strategy::Pause(spin) => spin.kind(),
        }
    }

    #[inline]
    fn until_different(&self, previous: u32, counter: &AtomicU32) -> WaitResult {
        match self {
            #[cfg(spinx_monitorx)]
            Strategy::MonitorX(spin) => spin.until_different(previous, counter),
            #[cfg(spinx_umonitor)]
            Strategy::UMonitor(spin) => spin.until_different(previous, counter),
            Strategy::Pause(spin) => spin.until_different(previous, counter),
        }
    }

    #[inline]
    fn until_equal(&self, expected: u32, counter: &AtomicU32) -> usize {
        match self {
            #[cfg(spinx_monitorx)]
            Strategy::MonitorX(spin) => spin.until_equal(expected, counter),
            #[cfg(spinx_umonitor)]
            Strategy::UMonitor(spin) => spin.until_equal(expected, counter),
            Strategy::Pause(spin) => spin.until_equal(expected, counter),
        }
    }
}
