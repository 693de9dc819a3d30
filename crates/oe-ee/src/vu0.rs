//! VU0 microprogram invocation stubs
//!
//! Microcode is not executed; an invocation resets the VU0 scratch state a
//! recompiled caller might read back.

use std::collections::HashMap;

use oe_core::ee_trace;
use parking_lot::Mutex;

use crate::context::CpuContext;

/// Invocations per microprogram address that are traced before going quiet
const INVOKE_TRACE_QUOTA: u32 = 3;

/// VU0 co-processor stub
pub struct Vu0 {
    seen: Mutex<HashMap<u32, u32>>,
}

impl Vu0 {
    /// Create a stub with an empty invocation log
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Invoke the microprogram at `address`.
    ///
    /// Resets clip flags and status, and leaves Q at 1.0 as a divide-free
    /// default.
    pub fn execute_microprogram(&self, ctx: &mut CpuContext, address: u32) {
        {
            let mut seen = self.seen.lock();
            let count = seen.entry(address).or_insert(0);
            if *count < INVOKE_TRACE_QUOTA {
                ee_trace!("VU0 microprogram @{address:#010x} pc={:#010x}", ctx.pc);
            }
            *count += 1;
        }

        ctx.vu0_clip_flags = 0;
        ctx.vu0_status = 0;
        ctx.vu0_q = 1.0;
    }

    /// VCALLMS-style entry point; identical to `execute_microprogram`
    pub fn start_microprogram(&self, ctx: &mut CpuContext, address: u32) {
        self.execute_microprogram(ctx, address);
    }
}

impl Default for Vu0 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microprogram_resets_scratch_state() {
        let vu0 = Vu0::new();
        let mut ctx = CpuContext::new();
        ctx.vu0_clip_flags = 0xFFF;
        ctx.vu0_status = 0x30;
        ctx.vu0_q = 0.5;

        vu0.execute_microprogram(&mut ctx, 0x1000);

        assert_eq!(ctx.vu0_clip_flags, 0);
        assert_eq!(ctx.vu0_status, 0);
        assert_eq!(ctx.vu0_q, 1.0);
    }

    #[test]
    fn test_repeat_invocations_counted_per_address() {
        let vu0 = Vu0::new();
        let mut ctx = CpuContext::new();

        for _ in 0..5 {
            vu0.start_microprogram(&mut ctx, 0x2000);
        }
        assert_eq!(vu0.seen.lock().get(&0x2000), Some(&5));
    }
}
