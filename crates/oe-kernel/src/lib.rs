//! Kernel services for oxidized-ee
//!
//! Guest syscalls dispatch through [`Kernel::handle_syscall`]; the
//! bookkeeping the recognized calls need lives in small service tables
//! behind the kernel aggregate. Nothing here suspends the worker thread.

pub mod alarm;
pub mod intc;
pub mod semaphore;
pub mod syscall;
pub mod thread;

use std::sync::atomic::AtomicU32;

use parking_lot::Mutex;

use alarm::AlarmQueue;
use intc::IntcState;
use semaphore::SemaphoreTable;
use thread::ThreadTable;

/// Aggregate of the kernel service tables.
///
/// The syscall dispatcher itself owns no state; each recognized case
/// delegates here.
pub struct Kernel {
    threads: Mutex<ThreadTable>,
    semaphores: Mutex<SemaphoreTable>,
    intc: Mutex<IntcState>,
    alarms: Mutex<AlarmQueue>,
    syscall_log_count: AtomicU32,
}

impl Kernel {
    /// Create a kernel with empty tables and the main thread registered
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(ThreadTable::new()),
            semaphores: Mutex::new(SemaphoreTable::new()),
            intc: Mutex::new(IntcState::new()),
            alarms: Mutex::new(AlarmQueue::new()),
            syscall_log_count: AtomicU32::new(0),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
