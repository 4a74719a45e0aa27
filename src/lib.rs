//! Power-aware spin waits for low-latency barriers.
//!
//! A thread pool calls [`detect()`] once, keeps the returned [`WaitKind`], and
//! then runs each barrier wait through [`with_strategy`], which hands a
//! concrete [`Spin`] implementation to the caller's [`SpinOp`]:
//!
//! - [`WaitKind::VendorMonitorA`]: AMD `MONITORX`/`MWAITX`
//! - [`WaitKind::VendorMonitorB`]: Intel `UMONITOR`/`UMWAIT`
//! - [`WaitKind::Baseline`]: a `PAUSE` loop, always available
//!
//! The hardware strategies are compiled only with the `monitorx`/`umonitor`
//! features (on by default) on x86 targets. Setting `SPINX_MONITORX=0` or
//! `SPINX_UMONITOR=0` at build time turns them off as well.

mod detect;
mod dispatch;
mod kind;
#[cfg(any(spinx_monitorx, spinx_umonitor))]
mod monitor;
mod spin;
mod sync;

pub use detect::{CpuFeatures, NativeCpu, detect, detect_with};
pub use dispatch::{SpinOp, Strategy, with_strategy};
pub use kind::{WaitKind, name};
#[cfg(spinx_monitorx)]
pub use monitor::MonitorXSpin;
#[cfg(spinx_umonitor)]
pub use monitor::UMonitorSpin;
pub use spin::{PauseSpin, Spin};
pub use sync::AtomicU32;

/// Returned by [`Spin::until_different`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitResult {
    /// The value that differed from `previous`.
    pub current: u32,
    /// Polls that failed before returning. Useful to check that a
    /// monitor/wait did not just return immediately.
    pub iterations: u32,
}

impl WaitResult {
    #[inline(always)]
    pub const fn new(current: u32, iterations: u32) -> Self {
        Self {
            current,
            iterations,
        }
    }
}
