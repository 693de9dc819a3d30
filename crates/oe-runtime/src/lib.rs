//! Runtime orchestration for oxidized-ee
//!
//! Loads a recompiled guest's ELF image, resolves guest PCs to native
//! functions through the registry, and runs the guest on a worker thread
//! while the main thread scans the GS framebuffer out to the host display.

pub mod display;
pub mod elf;
pub mod registry;
pub mod runtime;

pub use display::{DisplayBackend, NullBackend, TextureId};
pub use elf::ElfLoader;
pub use registry::{FunctionRegistry, RecompiledFunction};
pub use runtime::{LoadedModule, Runtime};
