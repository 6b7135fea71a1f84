pub mod handle;
pub mod per_frame;

pub use handle::{Handle, Pool, RawHandle, Tagged};
pub use per_frame::PerFrame;
