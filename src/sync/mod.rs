pub mod barrier_builder;
pub mod state;
pub mod tracker;

pub use barrier_builder::BarrierBuilder;
pub use state::{Access, BarrierMask, Layout, ResState, Stage};
pub use tracker::StateTracker;
