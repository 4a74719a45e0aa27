use crate::kind::WaitKind;
use std::sync::atomic::{AtomicU8, Ordering};

/// Processor capabilities consulted by [`detect_with`].
///
/// [`NativeCpu`] answers from CPUID; tests substitute their own processor.
pub trait CpuFeatures {
    /// The vendor string is `AuthenticAMD`.
    fn is_amd(&self) -> bool;

    /// CPUID `0x8000_0001` ECX bit 29.
    fn has_monitorx(&self) -> bool;

    /// CPUID leaf 7 is available and its ECX bit 5 is set.
    fn has_waitpkg(&self) -> bool;
}

/// The processor this thread is running on.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeCpu(());

impl NativeCpu {
    pub const fn new() -> Self {
        Self(())
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl CpuFeatures for NativeCpu {
    fn is_amd(&self) -> bool {
        raw_cpuid::CpuId::new()
            .get_vendor_info()
            .map(|vendor| vendor.as_str() == "AuthenticAMD")
            .unwrap_or(false)
    }

    fn has_monitorx(&self) -> bool {
        raw_cpuid::CpuId::new()
            .get_extended_processor_and_feature_identifiers()
            .map(|features| features.has_monitorx_mwaitx())
            .unwrap_or(false)
    }

    fn has_waitpkg(&self) -> bool {
        // `None` when the maximum basic leaf is below 7.
        raw_cpuid::CpuId::new()
            .get_extended_feature_info()
            .map(|features| features.has_waitpkg())
            .unwrap_or(false)
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
impl CpuFeatures for NativeCpu {
    fn is_amd(&self) -> bool {
        false
    }

    fn has_monitorx(&self) -> bool {
        false
    }

    fn has_waitpkg(&self) -> bool {
        false
    }
}

/// Whether `kind` is compiled in and `cpu` can run it.
pub(crate) fn supports<C: CpuFeatures + ?Sized>(cpu: &C, kind: WaitKind) -> bool {
    if !kind.is_compiled() {
        return false;
    }
    match kind {
        WaitKind::VendorMonitorA => cpu.is_amd() && cpu.has_monitorx(),
        WaitKind::VendorMonitorB => cpu.has_waitpkg(),
        WaitKind::Baseline => true,
    }
}

/// Kinds the running processor supports, one bit per [`WaitKind::bit`], plus
/// [`CACHED`] once CPUID has been read.
static NATIVE: AtomicU8 = AtomicU8::new(0);
const CACHED: u8 = 1 << 7;

/// Whether `kind` is compiled in and this processor can run it.
///
/// One relaxed load after the first call, so the dispatcher can afford it.
/// Racing first calls both read CPUID and store the same bits.
#[inline]
pub(crate) fn native_supports(kind: WaitKind) -> bool {
    let mut bits = NATIVE.load(Ordering::Relaxed);
    if bits & CACHED == 0 {
        bits = read_native();
    }
    bits & kind.bit() as u8 != 0
}

#[cold]
fn read_native() -> u8 {
    let cpu = NativeCpu::new();
    let bits = WaitKind::ALL
        .into_iter()
        .filter(|&kind| supports(&cpu, kind))
        .fold(CACHED, |bits, kind| bits | kind.bit() as u8);
    NATIVE.store(bits, Ordering::Relaxed);
    bits
}

/// Returns the best available [`WaitKind`] whose bit in `excluded` is clear.
///
/// For example, to rule out `UMWAIT`, pass
/// [`WaitKind::VendorMonitorB.bit()`](WaitKind::bit). Excluding
/// [`WaitKind::Baseline`] is ignored, with a warning, when nothing else
/// qualifies, since something must be returned.
///
/// Queries CPUID several times; call it once during initialization and keep
/// the result.
pub fn detect(excluded: u32) -> WaitKind {
    detect_with(&NativeCpu::new(), excluded)
}

/// [`detect()`] against an arbitrary processor description.
pub fn detect_with<C: CpuFeatures + ?Sized>(cpu: &C, excluded: u32) -> WaitKind {
    let enabled = |kind: WaitKind| excluded & kind.bit() == 0;

    let kind = [WaitKind::VendorMonitorA, WaitKind::VendorMonitorB]
        .into_iter()
        .find(|&kind| enabled(kind) && supports(cpu, kind))
        .unwrap_or(WaitKind::Baseline);

    if kind == WaitKind::Baseline && !enabled(WaitKind::Baseline) {
        tracing::warn!(
            excluded = format_args!("{excluded:#b}"),
            "ignoring attempt to disable {}, it is the only option left",
            WaitKind::Baseline,
        );
    }

    tracing::debug!(kind = %kind, excluded, "selected spin strategy");
    kind
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Copy, Default)]
    struct FakeCpu {
        amd: bool,
        monitorx: bool,
        waitpkg: bool,
    }

    impl CpuFeatures for FakeCpu {
        fn is_amd(&self) -> bool {
            self.amd
        }

        fn has_monitorx(&self) -> bool {
            self.monitorx
        }

        fn has_waitpkg(&self) -> bool {
            self.waitpkg
        }
    }

    const EVERYTHING: FakeCpu = FakeCpu {
        amd: true,
        monitorx: true,
        waitpkg: true,
    };

    const ALL_BITS: u32 = 0b111;

    /// Collects formatted `tracing` output for the duration of `f`.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();

        let value = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8_lossy(&out.0.lock()).into_owned();
        (value, text)
    }

    /// What detection should yield for `kind` given how this crate was built.
    fn if_compiled(kind: WaitKind) -> WaitKind {
        if kind.is_compiled() {
            kind
        } else {
            WaitKind::Baseline
        }
    }

    #[test]
    fn prefers_monitorx() {
        let expected = if WaitKind::VendorMonitorA.is_compiled() {
            WaitKind::VendorMonitorA
        } else {
            if_compiled(WaitKind::VendorMonitorB)
        };
        assert_eq!(detect_with(&EVERYTHING, 0), expected);
    }

    #[test]
    fn monitorx_requires_amd() {
        let cpu = FakeCpu {
            amd: false,
            monitorx: true,
            waitpkg: false,
        };
        assert_eq!(detect_with(&cpu, 0), WaitKind::Baseline);
    }

    #[test]
    fn excluded_monitorx_falls_to_umonitor() {
        let mask = WaitKind::VendorMonitorA.bit();
        assert_eq!(
            detect_with(&EVERYTHING, mask),
            if_compiled(WaitKind::VendorMonitorB)
        );
    }

    #[test]
    fn umonitor_without_amd() {
        let cpu = FakeCpu {
            waitpkg: true,
            ..FakeCpu::default()
        };
        assert_eq!(detect_with(&cpu, 0), if_compiled(WaitKind::VendorMonitorB));
    }

    #[test]
    fn no_capabilities_is_baseline() {
        assert_eq!(detect_with(&FakeCpu::default(), 0), WaitKind::Baseline);
    }

    #[test]
    fn excluding_hardware_kinds_is_baseline() {
        let mask = WaitKind::VendorMonitorA.bit() | WaitKind::VendorMonitorB.bit();
        assert_eq!(detect_with(&EVERYTHING, mask), WaitKind::Baseline);
        assert_eq!(detect(mask), WaitKind::Baseline);
    }

    #[test]
    fn excluding_everything_warns() {
        let (kind, logs) = capture(|| detect_with(&EVERYTHING, ALL_BITS));
        assert_eq!(kind, WaitKind::Baseline);
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("only option left"), "{logs}");
    }

    #[test]
    fn excluding_baseline_alone_is_silent_when_hardware_qualifies() {
        let (kind, logs) = capture(|| detect_with(&EVERYTHING, WaitKind::Baseline.bit()));
        if WaitKind::VendorMonitorA.is_compiled() || WaitKind::VendorMonitorB.is_compiled() {
            assert_ne!(kind, WaitKind::Baseline);
            assert!(logs.is_empty(), "{logs}");
        } else {
            assert_eq!(kind, WaitKind::Baseline);
            assert!(logs.contains("only option left"), "{logs}");
        }
    }

    #[test]
    fn unknown_bits_are_ignored() {
        let cpu = FakeCpu::default();
        assert_eq!(detect_with(&cpu, !ALL_BITS), WaitKind::Baseline);
        let (_, logs) = capture(|| detect_with(&cpu, !ALL_BITS));
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn native_support_is_cached() {
        for kind in WaitKind::ALL {
            assert_eq!(native_supports(kind), supports(&NativeCpu::new(), kind));
        }
        assert_ne!(NATIVE.load(Ordering::Relaxed) & CACHED, 0);
        assert!(native_supports(WaitKind::Baseline));
    }

    #[test]
    fn native_detection_is_stable() {
        assert_eq!(detect(0), detect(0));
        assert!(detect(0).is_supported());
    }
}
