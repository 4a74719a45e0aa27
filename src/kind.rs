use crate::detect;
use std::fmt;

/// Identifies a spin-wait strategy.
///
/// Returned by [`detect()`](crate::detect()) and [`Spin::kind`](crate::Spin::kind).
/// The discriminant doubles as the bit index in the exclusion mask passed to
/// [`detect()`](crate::detect()); see [`WaitKind::bit`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WaitKind {
    /// AMD `MONITORX`/`MWAITX` (Zen 2 and later), sleeping in C1.
    VendorMonitorA = 0,
    /// Intel `UMONITOR`/`UMWAIT` (Sapphire Rapids and later), sleeping in C0.2.
    VendorMonitorB = 1,
    /// `PAUSE`-style spin loop. Always available.
    #[default]
    Baseline = 2,
}

impl WaitKind {
    /// Every kind, in detection preference order.
    pub const ALL: [WaitKind; 3] = [
        WaitKind::VendorMonitorA,
        WaitKind::VendorMonitorB,
        WaitKind::Baseline,
    ];

    /// Maps a bit index back to a kind. Unknown indices resolve to
    /// [`WaitKind::Baseline`].
    pub const fn from_index(index: u32) -> Self {
        match index {
            0 => WaitKind::VendorMonitorA,
            1 => WaitKind::VendorMonitorB,
            _ => WaitKind::Baseline,
        }
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Mask bit that excludes this kind from [`detect()`](crate::detect()).
    ///
    /// ```
    /// use spinx::WaitKind;
    ///
    /// let mask = WaitKind::VendorMonitorA.bit() | WaitKind::VendorMonitorB.bit();
    /// assert_eq!(spinx::detect(mask), WaitKind::Baseline);
    /// ```
    #[inline]
    pub const fn bit(self) -> u32 {
        1 << self.index()
    }

    /// Display name, mirroring the power state the strategy sleeps in.
    pub const fn name(self) -> &'static str {
        match self {
            WaitKind::VendorMonitorA => "VendorMonitorA_C1",
            WaitKind::VendorMonitorB => "VendorMonitorB_C0.2",
            WaitKind::Baseline => "Baseline",
        }
    }

    /// Whether this build carries an implementation for the kind.
    pub const fn is_compiled(self) -> bool {
        match self {
            WaitKind::VendorMonitorA => cfg!(spinx_monitorx),
            WaitKind::VendorMonitorB => cfg!(spinx_umonitor),
            WaitKind::Baseline => true,
        }
    }

    /// Whether the kind is compiled in and usable on the running processor.
    ///
    /// Queries CPUID on the first call only.
    pub fn is_supported(self) -> bool {
        detect::native_supports(self)
    }
}

impl fmt::Display for WaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the display name of `kind`, for logging which strategy is in use.
#[inline]
pub const fn name(kind: WaitKind) -> &'static str {
    kind.name()
}
