//! Hardware-abstracted rendering device core.
//!
//! A [`Device`] owns every resource behind generational handles, tracks
//! per-resource hazards to insert barriers, drives draw and compute
//! command lists through their state machine and paces submitted frames.
//! Native work is delegated to a [`gpu::Backend`]; [`NullBackend`] runs
//! everything headless.

pub mod driver;
pub mod gpu;
pub mod sync;
pub mod utils;

pub use gpu::*;
pub use sync::{Access, BarrierMask, Layout, Stage};
pub use utils::{Handle, RawHandle};
