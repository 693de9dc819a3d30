//! Logging infrastructure for the oxidized-ee runtime

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, LogLevel};

/// Initialize the logging system based on configuration
pub fn init(config: &Config) {
    let level = match config.log_level {
        LogLevel::Off => return,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Initialize logging with default settings (for tests and quick starts)
pub fn init_default() {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

// Convenience macros for component-specific logging

/// Log an EE trace message
#[macro_export]
macro_rules! ee_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "ee", $($arg)*)
    };
}

/// Log an EE debug message
#[macro_export]
macro_rules! ee_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "ee", $($arg)*)
    };
}

/// Log a GS trace message
#[macro_export]
macro_rules! gs_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "gs", $($arg)*)
    };
}

/// Log a GS debug message
#[macro_export]
macro_rules! gs_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "gs", $($arg)*)
    };
}

/// Log a DMA trace message
#[macro_export]
macro_rules! dma_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "dma", $($arg)*)
    };
}

/// Log a DMA debug message
#[macro_export]
macro_rules! dma_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "dma", $($arg)*)
    };
}

/// Log a kernel trace message
#[macro_export]
macro_rules! kernel_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "kernel", $($arg)*)
    };
}

/// Log a kernel debug message
#[macro_export]
macro_rules! kernel_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "kernel", $($arg)*)
    };
}
