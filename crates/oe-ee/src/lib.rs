//! Emotion Engine (R5900) state for oxidized-ee
//!
//! Recompiled guest functions run as native code against the [`CpuContext`]
//! defined here; no instruction decoding happens at runtime.

pub mod context;
pub mod exception;
pub mod vu0;

pub use context::CpuContext;
pub use exception::Exception;
pub use vu0::Vu0;
