//! Error types shared across the runtime

use thiserror::Error;

/// Errors raised while loading a guest executable
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The input is not a well-formed ELF file
    #[error("invalid ELF: {0}")]
    InvalidElf(String),
    /// The ELF is well-formed but not a loadable PS2 executable
    #[error("unsupported ELF: {0}")]
    Unsupported(String),
    /// I/O failure while reading the executable
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the kernel service tables
#[derive(Debug, Error)]
pub enum KernelError {
    /// Referenced thread id does not exist
    #[error("no such thread {0}")]
    NoSuchThread(u32),
    /// Referenced semaphore id does not exist
    #[error("no such semaphore {0}")]
    NoSuchSemaphore(u32),
}

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// Startup failed before the guest could run
    #[error("initialization failed: {0}")]
    Init(String),
    /// Executable loading failed
    #[error("loader error: {0}")]
    Loader(#[from] LoaderError),
    /// Kernel bookkeeping failure
    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),
}

/// Result alias used throughout the workspace
pub type Result<T> = std::result::Result<T, EmulatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_error_display() {
        let err = LoaderError::InvalidElf("bad magic".to_string());
        assert_eq!(err.to_string(), "invalid ELF: bad magic");

        let err: EmulatorError = err.into();
        assert!(err.to_string().contains("bad magic"));
    }
}
