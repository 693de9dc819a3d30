//! Thread bookkeeping
//!
//! Guest thread syscalls update this table; actual scheduling does not
//! happen — recompiled code runs on the single worker thread and the table
//! records what the guest believes about its threads.

use oe_core::error::KernelError;

/// Guest-visible thread states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Run,
    Ready,
    Wait,
    Suspend,
    Dormant,
}

impl ThreadStatus {
    /// Numeric status written into guest status records
    pub fn as_guest(self) -> u32 {
        match self {
            Self::Run => 0x01,
            Self::Ready => 0x02,
            Self::Wait => 0x04,
            Self::Suspend => 0x08,
            Self::Dormant => 0x10,
        }
    }
}

/// Creation parameters as read from the guest param block
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadParam {
    pub entry: u32,
    pub stack: u32,
    pub stack_size: u32,
    pub gp: u32,
    pub priority: u32,
}

/// One guest thread
#[derive(Debug, Clone)]
pub struct Thread {
    pub id: u32,
    pub entry: u32,
    pub stack: u32,
    pub stack_size: u32,
    pub gp: u32,
    pub priority: u32,
    pub status: ThreadStatus,
    /// Wakeups delivered while the thread was not sleeping
    pub wakeup_pending: u32,
}

/// Table of guest threads; id 1 is the main thread
pub struct ThreadTable {
    threads: Vec<Thread>,
    next_id: u32,
    current: u32,
}

pub const MAIN_THREAD_ID: u32 = 1;

impl ThreadTable {
    /// Create a table holding only the main thread
    pub fn new() -> Self {
        let main = Thread {
            id: MAIN_THREAD_ID,
            entry: 0,
            stack: 0,
            stack_size: 0,
            gp: 0,
            priority: 0,
            status: ThreadStatus::Run,
            wakeup_pending: 0,
        };
        Self {
            threads: vec![main],
            next_id: MAIN_THREAD_ID + 1,
            current: MAIN_THREAD_ID,
        }
    }

    fn get_mut(&mut self, id: u32) -> Result<&mut Thread, KernelError> {
        self.threads
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(KernelError::NoSuchThread(id))
    }

    /// Id of the thread the guest believes is running
    pub fn current_id(&self) -> u32 {
        self.current
    }

    /// Register a new thread in the dormant state
    pub fn create(&mut self, param: ThreadParam) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.threads.push(Thread {
            id,
            entry: param.entry,
            stack: param.stack,
            stack_size: param.stack_size,
            gp: param.gp,
            priority: param.priority,
            status: ThreadStatus::Dormant,
            wakeup_pending: 0,
        });
        id
    }

    /// Remove a thread; the current thread cannot be deleted
    pub fn delete(&mut self, id: u32) -> Result<(), KernelError> {
        if id == self.current {
            return Err(KernelError::NoSuchThread(id));
        }
        let before = self.threads.len();
        self.threads.retain(|t| t.id != id);
        if self.threads.len() == before {
            return Err(KernelError::NoSuchThread(id));
        }
        Ok(())
    }

    /// Move a dormant thread to the ready queue
    pub fn start(&mut self, id: u32) -> Result<(), KernelError> {
        self.get_mut(id)?.status = ThreadStatus::Ready;
        Ok(())
    }

    /// Terminate the current thread
    pub fn exit_current(&mut self) {
        let current = self.current;
        if let Ok(thread) = self.get_mut(current) {
            thread.status = ThreadStatus::Dormant;
        }
    }

    /// Force a thread dormant
    pub fn terminate(&mut self, id: u32) -> Result<(), KernelError> {
        self.get_mut(id)?.status = ThreadStatus::Dormant;
        Ok(())
    }

    /// Change a thread's priority, returning the previous value
    pub fn change_priority(&mut self, id: u32, priority: u32) -> Result<u32, KernelError> {
        let thread = self.get_mut(id)?;
        let old = thread.priority;
        thread.priority = priority;
        Ok(old)
    }

    /// Put the current thread to sleep, or absorb a pending wakeup
    pub fn sleep_current(&mut self) {
        let current = self.current;
        if let Ok(thread) = self.get_mut(current) {
            if thread.wakeup_pending > 0 {
                thread.wakeup_pending -= 1;
            } else {
                thread.status = ThreadStatus::Wait;
            }
        }
    }

    /// Wake a sleeping thread, or bank the wakeup for its next sleep
    pub fn wakeup(&mut self, id: u32) -> Result<(), KernelError> {
        let thread = self.get_mut(id)?;
        if thread.status == ThreadStatus::Wait {
            thread.status = ThreadStatus::Run;
        } else {
            thread.wakeup_pending += 1;
        }
        Ok(())
    }

    /// Release a waiting thread without a wakeup
    pub fn release_wait(&mut self, id: u32) -> Result<(), KernelError> {
        let thread = self.get_mut(id)?;
        if thread.status == ThreadStatus::Wait {
            thread.status = ThreadStatus::Run;
        }
        Ok(())
    }

    /// Suspend a thread
    pub fn suspend(&mut self, id: u32) -> Result<(), KernelError> {
        self.get_mut(id)?.status = ThreadStatus::Suspend;
        Ok(())
    }

    /// Resume a suspended thread
    pub fn resume(&mut self, id: u32) -> Result<(), KernelError> {
        let thread = self.get_mut(id)?;
        if thread.status == ThreadStatus::Suspend {
            thread.status = ThreadStatus::Run;
        }
        Ok(())
    }

    /// Record the main thread's runtime parameters from SetupThread
    pub fn setup_main(&mut self, gp: u32, stack: u32, stack_size: u32) {
        if let Ok(thread) = self.get_mut(MAIN_THREAD_ID) {
            thread.gp = gp;
            thread.stack = stack;
            thread.stack_size = stack_size;
        }
    }

    /// Snapshot a thread for a guest status record
    pub fn refer(&self, id: u32) -> Result<Thread, KernelError> {
        self.threads
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(KernelError::NoSuchThread(id))
    }
}

impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_thread_exists() {
        let table = ThreadTable::new();
        assert_eq!(table.current_id(), MAIN_THREAD_ID);
        assert_eq!(table.refer(MAIN_THREAD_ID).unwrap().status, ThreadStatus::Run);
    }

    #[test]
    fn test_create_start_terminate() {
        let mut table = ThreadTable::new();
        let id = table.create(ThreadParam {
            entry: 0x0010_0000,
            stack: 0x01F0_0000,
            stack_size: 0x1000,
            gp: 0,
            priority: 32,
        });
        assert_eq!(id, 2);
        assert_eq!(table.refer(id).unwrap().status, ThreadStatus::Dormant);

        table.start(id).unwrap();
        assert_eq!(table.refer(id).unwrap().status, ThreadStatus::Ready);

        table.terminate(id).unwrap();
        assert_eq!(table.refer(id).unwrap().status, ThreadStatus::Dormant);

        table.delete(id).unwrap();
        assert!(table.refer(id).is_err());
    }

    #[test]
    fn test_sleep_wakeup_ordering() {
        let mut table = ThreadTable::new();

        table.sleep_current();
        assert_eq!(table.refer(MAIN_THREAD_ID).unwrap().status, ThreadStatus::Wait);

        table.wakeup(MAIN_THREAD_ID).unwrap();
        assert_eq!(table.refer(MAIN_THREAD_ID).unwrap().status, ThreadStatus::Run);

        // A wakeup before the sleep is banked and absorbs the next sleep.
        table.wakeup(MAIN_THREAD_ID).unwrap();
        table.sleep_current();
        assert_eq!(table.refer(MAIN_THREAD_ID).unwrap().status, ThreadStatus::Run);
    }

    #[test]
    fn test_current_thread_cannot_be_deleted() {
        let mut table = ThreadTable::new();
        assert!(table.delete(MAIN_THREAD_ID).is_err());
    }

    #[test]
    fn test_priority_change_returns_previous() {
        let mut table = ThreadTable::new();
        let id = table.create(ThreadParam {
            priority: 10,
            ..Default::default()
        });
        assert_eq!(table.change_priority(id, 20).unwrap(), 10);
        assert_eq!(table.refer(id).unwrap().priority, 20);
    }
}
