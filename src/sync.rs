//! Atomics and spin hints, swapped for their loom counterparts under the
//! `loom` feature.

#[cfg(feature = "loom")]
pub use loom::{
    hint::spin_loop,
    sync::atomic::{AtomicU32, Ordering},
};

#[cfg(not(feature = "loom"))]
pub use std::{
    hint::spin_loop,
    sync::atomic::{AtomicU32, Ordering},
};
