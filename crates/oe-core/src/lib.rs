//! Core infrastructure for the oxidized-ee runtime

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{EmulatorError, KernelError, LoaderError, Result};
