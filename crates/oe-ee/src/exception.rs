//! Architectural exception handling
//!
//! Only integer overflow changes control flow in this runtime; the remaining
//! exceptions are trace-logged so recompiled guests that raise them keep
//! running.

use oe_core::ee_debug;
use tracing::error;

use crate::context::CpuContext;

/// General exception vector
const EXCEPTION_VECTOR: u32 = 0x8000_0000;

/// R5900 exceptions a recompiled guest can signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IntegerOverflow,
    Break,
    Trap,
    TlbRead,
    TlbWriteIndexed,
    TlbWriteRandom,
    TlbProbe,
}

impl Exception {
    /// COP0 cause code for this exception
    pub fn cause_code(self) -> u32 {
        match self {
            Self::IntegerOverflow => 12,
            Self::Break => 9,
            Self::Trap => 13,
            // TLB instructions are COP0 ops, not faults; no cause code is
            // recorded for them here.
            Self::TlbRead | Self::TlbWriteIndexed | Self::TlbWriteRandom | Self::TlbProbe => 0,
        }
    }
}

/// Signal an exception from recompiled guest code.
///
/// Integer overflow records the faulting PC in COP0 and redirects execution
/// to the general exception vector; everything else is logged and ignored.
pub fn signal(ctx: &mut CpuContext, exception: Exception) {
    match exception {
        Exception::IntegerOverflow => {
            error!("integer overflow exception at pc {:#010x}", ctx.pc);
            ctx.cop0_epc = ctx.pc;
            ctx.cop0_cause |= exception.cause_code() << 2;
            ctx.pc = EXCEPTION_VECTOR;
        }
        other => {
            ee_debug!("{other:?} at pc {:#010x}", ctx.pc);
        }
    }
}

/// Clear the load-linked bit in COP0 status
pub fn clear_ll_bit(ctx: &mut CpuContext) {
    ctx.cop0_status &= !0x0000_0002;
    ee_debug!("LL bit cleared at pc {:#010x}", ctx.pc);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_overflow_redirects() {
        let mut ctx = CpuContext::new();
        ctx.pc = 0x0010_2000;

        signal(&mut ctx, Exception::IntegerOverflow);

        assert_eq!(ctx.cop0_epc, 0x0010_2000);
        assert_eq!(ctx.cop0_cause & (0x1F << 2), 12 << 2);
        assert_eq!(ctx.pc, EXCEPTION_VECTOR);
    }

    #[test]
    fn test_break_is_a_no_op() {
        let mut ctx = CpuContext::new();
        ctx.pc = 0x0010_2000;

        signal(&mut ctx, Exception::Break);

        assert_eq!(ctx.pc, 0x0010_2000);
        assert_eq!(ctx.cop0_epc, 0);
    }

    #[test]
    fn test_clear_ll_bit() {
        let mut ctx = CpuContext::new();
        ctx.cop0_status = 0xFFFF_FFFF;

        clear_ll_bit(&mut ctx);
        assert_eq!(ctx.cop0_status, 0xFFFF_FFFD);
    }
}
