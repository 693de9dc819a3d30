//! Semaphore bookkeeping
//!
//! Counting semaphores without real blocking; a wait that cannot be
//! satisfied records a waiter and returns, matching the non-suspending
//! worker model.

use oe_core::error::KernelError;

/// One guest semaphore
#[derive(Debug, Clone)]
pub struct Semaphore {
    pub id: u32,
    pub count: i32,
    pub max_count: i32,
    pub init_count: i32,
    pub wait_threads: u32,
}

/// Table of guest semaphores; ids start at 1
pub struct SemaphoreTable {
    semaphores: Vec<Semaphore>,
    next_id: u32,
}

impl SemaphoreTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            semaphores: Vec::new(),
            next_id: 1,
        }
    }

    fn get_mut(&mut self, id: u32) -> Result<&mut Semaphore, KernelError> {
        self.semaphores
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(KernelError::NoSuchSemaphore(id))
    }

    /// Create a semaphore with the given initial and maximum counts
    pub fn create(&mut self, init_count: i32, max_count: i32) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.semaphores.push(Semaphore {
            id,
            count: init_count,
            max_count,
            init_count,
            wait_threads: 0,
        });
        id
    }

    /// Delete a semaphore
    pub fn delete(&mut self, id: u32) -> Result<(), KernelError> {
        let before = self.semaphores.len();
        self.semaphores.retain(|s| s.id != id);
        if self.semaphores.len() == before {
            return Err(KernelError::NoSuchSemaphore(id));
        }
        Ok(())
    }

    /// Signal: release a recorded waiter if any, otherwise increment up to
    /// the maximum
    pub fn signal(&mut self, id: u32) -> Result<(), KernelError> {
        let sema = self.get_mut(id)?;
        if sema.wait_threads > 0 {
            sema.wait_threads -= 1;
        } else if sema.count < sema.max_count {
            sema.count += 1;
        }
        Ok(())
    }

    /// Wait: decrement when available, otherwise record a waiter
    pub fn wait(&mut self, id: u32) -> Result<(), KernelError> {
        let sema = self.get_mut(id)?;
        if sema.count > 0 {
            sema.count -= 1;
        } else {
            sema.wait_threads += 1;
        }
        Ok(())
    }

    /// Poll: decrement when available, `Ok(false)` when it would block
    pub fn poll(&mut self, id: u32) -> Result<bool, KernelError> {
        let sema = self.get_mut(id)?;
        if sema.count > 0 {
            sema.count -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Snapshot a semaphore for a guest status record
    pub fn refer(&self, id: u32) -> Result<Semaphore, KernelError> {
        self.semaphores
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(KernelError::NoSuchSemaphore(id))
    }
}

impl Default for SemaphoreTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_wait_signal() {
        let mut table = SemaphoreTable::new();
        let id = table.create(1, 2);

        table.wait(id).unwrap();
        assert_eq!(table.refer(id).unwrap().count, 0);

        // Unavailable: the wait is recorded, not blocked on.
        table.wait(id).unwrap();
        let sema = table.refer(id).unwrap();
        assert_eq!(sema.count, 0);
        assert_eq!(sema.wait_threads, 1);

        // Signal releases the recorded waiter before incrementing.
        table.signal(id).unwrap();
        let sema = table.refer(id).unwrap();
        assert_eq!(sema.count, 0);
        assert_eq!(sema.wait_threads, 0);

        table.signal(id).unwrap();
        assert_eq!(table.refer(id).unwrap().count, 1);
    }

    #[test]
    fn test_signal_clamps_at_max() {
        let mut table = SemaphoreTable::new();
        let id = table.create(2, 2);

        table.signal(id).unwrap();
        assert_eq!(table.refer(id).unwrap().count, 2);
    }

    #[test]
    fn test_poll() {
        let mut table = SemaphoreTable::new();
        let id = table.create(1, 1);

        assert!(table.poll(id).unwrap());
        assert!(!table.poll(id).unwrap());
        assert_eq!(table.refer(id).unwrap().wait_threads, 0);
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let mut table = SemaphoreTable::new();
        assert!(table.signal(99).is_err());
        assert!(table.delete(99).is_err());
    }
}
