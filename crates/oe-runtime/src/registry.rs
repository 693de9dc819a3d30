//! Function registry
//!
//! The recompiler hands the runtime native functions keyed by guest PC; a
//! compiled call instruction resolves its target here. The runtime is passed
//! as a parameter so callables never hold a reference back into it.

use std::collections::HashMap;
use std::sync::Arc;

use oe_ee::CpuContext;
use oe_memory::Memory;
use parking_lot::RwLock;
use tracing::{error, warn};

use crate::runtime::Runtime;

/// A recompiled guest function
pub type RecompiledFunction = Arc<dyn Fn(&Memory, &mut CpuContext, &Runtime) + Send + Sync>;

/// Guest PC → native function table
pub struct FunctionRegistry {
    table: RwLock<HashMap<u32, RecompiledFunction>>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Register `func` as the code at `address`, replacing any previous entry
    pub fn register(&self, address: u32, func: RecompiledFunction) {
        self.table.write().insert(address, func);
    }

    /// Whether an implementation is registered at `address`
    pub fn contains(&self, address: u32) -> bool {
        self.table.read().contains_key(&address)
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Resolve the function at `address`.
    ///
    /// A miss resolves to a stub that logs the call and returns, so an
    /// incomplete recompilation degrades instead of aborting.
    pub fn lookup(&self, address: u32) -> RecompiledFunction {
        if let Some(func) = self.table.read().get(&address) {
            return Arc::clone(func);
        }

        warn!("no function registered at {address:#010x}");

        Arc::new(|_mem: &Memory, ctx: &mut CpuContext, _rt: &Runtime| {
            error!("called unimplemented function at {:#010x}", ctx.pc);
        })
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oe_core::Config;
    use oe_memory::constants::EE_RAM_SIZE;

    #[test]
    fn test_register_and_lookup() {
        let registry = FunctionRegistry::new();
        assert!(registry.is_empty());

        registry.register(
            0x0010_0000,
            Arc::new(|_mem, ctx, _rt| {
                ctx.set_gpr64(2, 42);
            }),
        );

        assert!(registry.contains(0x0010_0000));
        assert_eq!(registry.len(), 1);

        let runtime = Runtime::new(Config::default()).unwrap();
        let mem = Memory::new(EE_RAM_SIZE).unwrap();
        let mut ctx = CpuContext::new();

        registry.lookup(0x0010_0000)(&mem, &mut ctx, &runtime);
        assert_eq!(ctx.gpr64(2), 42);
    }

    #[test]
    fn test_missing_function_resolves_to_stub() {
        let registry = FunctionRegistry::new();
        let runtime = Runtime::new(Config::default()).unwrap();
        let mem = Memory::new(EE_RAM_SIZE).unwrap();
        let mut ctx = CpuContext::new();
        ctx.pc = 0x0033_0000;

        // The stub logs and leaves the context alone.
        registry.lookup(0x0033_0000)(&mem, &mut ctx, &runtime);
        assert_eq!(ctx.gpr64(2), 0);
        assert_eq!(ctx.pc, 0x0033_0000);
    }
}
