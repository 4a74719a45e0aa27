//! User-mode monitor/wait strategies.
//!
//! Both strategies arm a hardware watch on the counter's cache line and then
//! sleep until it is written. They request no timeout: the memory subsystem is
//! assumed never to let a store to an armed address go unnoticed (see
//! <https://www.usenix.org/system/files/usenixsecurity23-zhang-ruiyi.pdf>).
//! That is a precondition of using them, not something verified here.
//!
//! The instructions are emitted by their encodings so that neither the
//! assembler nor the enabled target features need to know about them.

use crate::WaitResult;
use crate::detect;
use crate::kind::WaitKind;
use crate::spin::Spin;
use crate::sync::{AtomicU32, Ordering};
use core::arch::asm;

/// Shared loop for both strategies.
///
/// Polls, arms the monitor, then polls again before sleeping: a store landing
/// between the first load and `arm` would otherwise never wake `sleep`.
#[inline(always)]
fn monitor_loop(
    counter: &AtomicU32,
    done: impl Fn(u32) -> bool,
    arm: impl Fn(*const u32),
    sleep: impl Fn(),
) -> (u32, usize) {
    let mut iterations = 0usize;
    loop {
        let current = counter.load(Ordering::Acquire);
        if done(current) {
            return (current, iterations);
        }

        arm(counter.as_ptr().cast_const());

        let current = counter.load(Ordering::Acquire);
        if done(current) {
            return (current, iterations);
        }

        // Spurious wakeups just go around again.
        sleep();
        iterations = iterations.saturating_add(1);
    }
}

/// Narrows a loop count for [`WaitResult`], saturating like [`PauseSpin`](crate::PauseSpin).
#[inline(always)]
fn saturate(iterations: usize) -> u32 {
    u32::try_from(iterations).unwrap_or(u32::MAX)
}

/// AMD `MONITORX`/`MWAITX` (Zen 2 and later).
///
/// Sleeps in C1, a bit deeper than C0. C0 (hint `0xF`) wakes less than 0.1us
/// sooner, sometimes draws more package power than `PAUSE`, and does not
/// meaningfully reduce spurious wakeups.
#[cfg(spinx_monitorx)]
#[derive(Clone, Copy, Debug)]
pub struct MonitorXSpin(());

#[cfg(spinx_monitorx)]
impl MonitorXSpin {
    /// C1.
    const HINTS: u32 = 0x0;
    /// No extensions, so the `EBX` timer is ignored and there is no timeout.
    const EXTENSIONS: u32 = 0;

    /// Returns the strategy if the running processor supports `MONITORX`.
    pub fn new() -> Option<Self> {
        detect::native_supports(WaitKind::VendorMonitorA).then_some(Self(()))
    }

    /// # Safety
    ///
    /// The processor must support `MONITORX`/`MWAITX`, as reported by
    /// [`detect()`](crate::detect()) or [`WaitKind::is_supported`].
    #[inline(always)]
    pub const unsafe fn new_unchecked() -> Self {
        Self(())
    }

    #[inline(always)]
    fn arm(addr: *const u32) {
        // SAFETY: constructing `Self` established MONITORX support; the
        // instruction only records the address and never dereferences it.
        unsafe {
            // monitorx rax, ecx, edx
            asm!(
                ".byte 0x0f, 0x01, 0xfa",
                in("eax") addr,
                in("ecx") Self::EXTENSIONS,
                in("edx") Self::HINTS,
                options(nostack, preserves_flags),
            );
        }
    }

    #[inline(always)]
    fn sleep() {
        // SAFETY: as in `arm`.
        unsafe {
            // mwaitx eax, ecx
            asm!(
                ".byte 0x0f, 0x01, 0xfb",
                in("eax") Self::HINTS,
                in("ecx") Self::EXTENSIONS,
                options(nostack, preserves_flags),
            );
        }
    }
}

#[cfg(spinx_monitorx)]
impl Spin for MonitorXSpin {
    #[inline]
    fn kind(&self) -> WaitKind {
        WaitKind::VendorMonitorA
    }

    #[inline]
    fn until_different(&self, previous: u32, counter: &AtomicU32) -> WaitResult {
        let (current, iterations) =
            monitor_loop(counter, |v| v != previous, Self::arm, Self::sleep);
        WaitResult::new(current, saturate(iterations))
    }

    #[inline]
    fn until_equal(&self, expected: u32, counter: &AtomicU32) -> usize {
        let (_, iterations) = monitor_loop(counter, |v| v == expected, Self::arm, Self::sleep);
        iterations
    }
}

/// Intel `UMONITOR`/`UMWAIT` (Sapphire Rapids and later).
///
/// Sleeps in C0.2 rather than C0.1: about 20x fewer spurious wakeups and a
/// further 4% package power saving over `PAUSE`, for 0.4-0.6us of extra wake
/// latency. The OS may still cap each wait (`IA32_UMWAIT_CONTROL`), which only
/// shows up as a spurious wakeup.
#[cfg(spinx_umonitor)]
#[derive(Clone, Copy, Debug)]
pub struct UMonitorSpin(());

#[cfg(spinx_umonitor)]
impl UMonitorSpin {
    /// C0.2.
    const CONTROL: u32 = 0;
    /// TSC deadline, never reached.
    const DEADLINE: u64 = u64::MAX;

    /// Returns the strategy if the running processor supports `WAITPKG`.
    pub fn new() -> Option<Self> {
        detect::native_supports(WaitKind::VendorMonitorB).then_some(Self(()))
    }

    /// # Safety
    ///
    /// The processor must support `UMONITOR`/`UMWAIT`, as reported by
    /// [`detect()`](crate::detect()) or [`WaitKind::is_supported`].
    #[inline(always)]
    pub const unsafe fn new_unchecked() -> Self {
        Self(())
    }

    #[inline(always)]
    fn arm(addr: *const u32) {
        // SAFETY: constructing `Self` established WAITPKG support; the
        // instruction only records the address and never dereferences it.
        unsafe {
            // umonitor rax
            asm!(
                ".byte 0xf3, 0x0f, 0xae, 0xf0",
                in("eax") addr,
                options(nostack, preserves_flags),
            );
        }
    }

    #[inline(always)]
    fn sleep() {
        // SAFETY: as in `arm`. UMWAIT reports a timeout in CF, so flags are
        // clobbered.
        unsafe {
            // umwait ecx
            asm!(
                ".byte 0xf2, 0x0f, 0xae, 0xf1",
                in("ecx") Self::CONTROL,
                in("edx") (Self::DEADLINE >> 32) as u32,
                in("eax") Self::DEADLINE as u32,
                options(nostack),
            );
        }
    }
}

#[cfg(spinx_umonitor)]
impl Spin for UMonitorSpin {
    #[inline]
    fn kind(&self) -> WaitKind {
        WaitKind::VendorMonitorB
    }

    #[inline]
    fn until_different(&self, previous: u32, counter: &AtomicU32) -> WaitResult {
        let (current, iterations) =
            monitor_loop(counter, |v| v != previous, Self::arm, Self::sleep);
        WaitResult::new(current, saturate(iterations))
    }

    #[inline]
    fn until_equal(&self, expected: u32, counter: &AtomicU32) -> usize {
        let (_, iterations) = monitor_loop(counter, |v| v == expected, Self::arm, Self::sleep);
        iterations
    }
}
