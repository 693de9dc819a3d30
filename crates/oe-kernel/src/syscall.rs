//! Syscall dispatch
//!
//! The syscall number arrives in GPR 3 (V1), arguments in GPRs 4..7
//! (A0..A3), and the result goes to GPR 2 (V0), sign-extended when it is a
//! 32-bit signed value. Unrecognized numbers warn and return 0 so guests
//! keep running.

use std::sync::atomic::Ordering;

use oe_core::{kernel_debug, kernel_trace};
use oe_ee::CpuContext;
use oe_memory::Memory;
use tracing::{info, warn};

use crate::thread::ThreadParam;
use crate::Kernel;

/// Syscalls that are info-logged before the log goes quiet
const SYSCALL_LOG_QUOTA: u32 = 20;

impl Kernel {
    /// Dispatch the syscall currently described by `ctx`
    pub fn handle_syscall(&self, mem: &Memory, ctx: &mut CpuContext) {
        let num = ctx.gpr32(3);
        let a0 = ctx.gpr32(4);
        let a1 = ctx.gpr32(5);
        let a2 = ctx.gpr32(6);

        if self.syscall_log_count.fetch_add(1, Ordering::Relaxed) < SYSCALL_LOG_QUOTA {
            info!(target: "kernel", "syscall #{num} at pc {:#010x}", ctx.pc);
        }

        match num {
            // GsSetCrt(interlace, mode, ffmd)
            2 => {
                mem.gs_mut()
                    .set_smode2(u64::from(a0 & 1) | (u64::from(a2 & 1) << 1));
                kernel_debug!("GsSetCrt interlace={} mode={a1} ffmd={}", a0 & 1, a2 & 1);
                ctx.set_return_s32(0);
            }
            // Exit
            4 => {
                kernel_debug!("Exit called");
                ctx.set_return_s32(0);
            }
            // ExecPS2 slot doubles as SleepThread in this kernel subset
            7 | 50 => {
                self.threads.lock().sleep_current();
                ctx.set_return_s32(0);
            }
            // _EnableIntc / _DisableIntc
            20 => {
                let was = self.intc.lock().enable_intc(a0);
                ctx.set_return_s32(i32::from(was));
            }
            21 => {
                let was = self.intc.lock().disable_intc(a0);
                ctx.set_return_s32(i32::from(was));
            }
            // _EnableDmac / _DisableDmac
            22 => {
                let was = self.intc.lock().enable_dmac(a0);
                ctx.set_return_s32(i32::from(was));
            }
            23 => {
                let was = self.intc.lock().disable_dmac(a0);
                ctx.set_return_s32(i32::from(was));
            }
            // SetAlarm / iSetAlarm (time, handler, arg)
            24 | 25 => {
                let id = self.alarms.lock().set(a0, a1, a2);
                ctx.set_return_s32(id as i32);
            }
            // ReleaseAlarm / iReleaseAlarm (id)
            26 | 27 => {
                let result = if self.alarms.lock().release(a0) {
                    a0 as i32
                } else {
                    -1
                };
                ctx.set_return_s32(result);
            }
            // CreateThread(param*)
            32 => {
                let param = ThreadParam {
                    entry: mem.read32(a0 + 4),
                    stack: mem.read32(a0 + 8),
                    stack_size: mem.read32(a0 + 12),
                    gp: mem.read32(a0 + 16),
                    priority: mem.read32(a0 + 20),
                };
                let id = self.threads.lock().create(param);
                kernel_trace!("CreateThread entry={:#010x} -> id {id}", param.entry);
                ctx.set_return_s32(id as i32);
            }
            // DeleteThread(id)
            33 => ctx.set_return_s32(status_result(self.threads.lock().delete(a0))),
            // StartThread(id, arg)
            34 => ctx.set_return_s32(status_result(self.threads.lock().start(a0))),
            // ExitThread / ExitDeleteThread
            35 | 36 => {
                self.threads.lock().exit_current();
                ctx.set_return_s32(0);
            }
            // TerminateThread(id)
            37 => ctx.set_return_s32(status_result(self.threads.lock().terminate(a0))),
            // ChangeThreadPriority(id, priority)
            41 => {
                let result = match self.threads.lock().change_priority(a0, a1) {
                    Ok(old) => old as i32,
                    Err(_) => -1,
                };
                ctx.set_return_s32(result);
            }
            // RotateThreadReadyQueue(priority): nothing to rotate here
            43 => ctx.set_return_s32(0),
            // ReleaseWaitThread(id)
            45 => ctx.set_return_s32(status_result(self.threads.lock().release_wait(a0))),
            // GetThreadId
            47 => ctx.set_return_s32(self.threads.lock().current_id() as i32),
            // ReferThreadStatus(id, status*)
            48 => {
                let threads = self.threads.lock();
                let id = if a0 == 0 { threads.current_id() } else { a0 };
                match threads.refer(id) {
                    Ok(thread) => {
                        if a1 != 0 {
                            mem.write32(a1, thread.status.as_guest());
                            mem.write32(a1 + 4, thread.entry);
                            mem.write32(a1 + 8, thread.stack);
                            mem.write32(a1 + 12, thread.stack_size);
                            mem.write32(a1 + 16, thread.gp);
                            mem.write32(a1 + 20, thread.priority);
                            mem.write32(a1 + 24, thread.priority);
                        }
                        ctx.set_return_s32(0);
                    }
                    Err(_) => ctx.set_return_s32(-1),
                }
            }
            // WakeupThread / iWakeupThread
            51 | 52 => ctx.set_return_s32(status_result(self.threads.lock().wakeup(a0))),
            // SuspendThread(id)
            55 => ctx.set_return_s32(status_result(self.threads.lock().suspend(a0))),
            // ResumeThread(id)
            57 => ctx.set_return_s32(status_result(self.threads.lock().resume(a0))),
            // SetupThread(gp, stack, stack_size, args, root): V0 = stack top
            60 => {
                self.threads.lock().setup_main(a0, a1, a2);
                ctx.set_return_s32(a1.wrapping_add(a2) as i32);
            }
            // SetupHeap(start, size): V0 = end of heap
            61 => {
                let heap_end = a0.wrapping_add(a1);
                kernel_debug!("SetupHeap start={a0:#010x} size={a1:#x} end={heap_end:#010x}");
                ctx.set_return_s32(heap_end as i32);
            }
            // EndOfHeap(end)
            62 => {
                kernel_debug!("EndOfHeap {a0:#010x}");
                ctx.set_return_s32(a0 as i32);
            }
            // CreateSema(param*): max count at +4, initial count at +8
            64 => {
                let max = mem.read32(a0 + 4) as i32;
                let init = mem.read32(a0 + 8) as i32;
                let id = self.semaphores.lock().create(init, max);
                ctx.set_return_s32(id as i32);
            }
            // DeleteSema(id)
            65 => ctx.set_return_s32(status_result(self.semaphores.lock().delete(a0))),
            // SignalSema / iSignalSema
            66 | 67 => ctx.set_return_s32(status_result(self.semaphores.lock().signal(a0))),
            // WaitSema(id)
            68 => ctx.set_return_s32(status_result(self.semaphores.lock().wait(a0))),
            // PollSema / iPollSema
            69 | 70 => {
                let result = match self.semaphores.lock().poll(a0) {
                    Ok(true) => 0,
                    Ok(false) | Err(_) => -1,
                };
                ctx.set_return_s32(result);
            }
            // ReferSemaStatus(id, status*)
            71 => match self.semaphores.lock().refer(a0) {
                Ok(sema) => {
                    if a1 != 0 {
                        mem.write32(a1, sema.count as u32);
                        mem.write32(a1 + 4, sema.max_count as u32);
                        mem.write32(a1 + 8, sema.init_count as u32);
                        mem.write32(a1 + 12, sema.wait_threads);
                    }
                    ctx.set_return_s32(0);
                }
                Err(_) => ctx.set_return_s32(-1),
            },
            // FlushCache: nothing is cached
            100 => {
                kernel_trace!("FlushCache");
                ctx.set_return_s32(0);
            }
            // GsGetIMR
            112 => {
                let imr = mem.gs().imr();
                ctx.set_gpr64(2, imr);
            }
            // GsPutIMR(imr)
            113 => {
                mem.gs_mut().set_imr(ctx.gpr64(4));
                ctx.set_return_s32(0);
            }
            _ => {
                warn!(target: "kernel", "unhandled syscall #{num} at pc {:#010x}", ctx.pc);
                ctx.set_return_s32(0);
            }
        }
    }
}

fn status_result<E>(result: Result<(), E>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oe_memory::constants::EE_RAM_SIZE;

    fn setup() -> (Kernel, std::sync::Arc<Memory>, CpuContext) {
        (
            Kernel::new(),
            Memory::new(EE_RAM_SIZE).unwrap(),
            CpuContext::new(),
        )
    }

    fn syscall(kernel: &Kernel, mem: &Memory, ctx: &mut CpuContext, num: u32, args: [u32; 4]) {
        ctx.set_gpr64(3, u64::from(num));
        for (i, arg) in args.iter().enumerate() {
            ctx.set_gpr64(4 + i, u64::from(*arg));
        }
        kernel.handle_syscall(mem, ctx);
    }

    #[test]
    fn test_setup_heap_returns_end() {
        let (kernel, mem, mut ctx) = setup();
        syscall(&kernel, &mem, &mut ctx, 61, [0x0010_0000, 0x1000, 0, 0]);
        assert_eq!(ctx.gpr32(2), 0x0010_1000);
    }

    #[test]
    fn test_end_of_heap_echoes() {
        let (kernel, mem, mut ctx) = setup();
        syscall(&kernel, &mem, &mut ctx, 62, [0x01FF_0000, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), 0x01FF_0000);
    }

    #[test]
    fn test_unknown_syscall_returns_zero() {
        let (kernel, mem, mut ctx) = setup();
        ctx.set_gpr64(2, 0x5555);
        syscall(&kernel, &mem, &mut ctx, 999, [0, 0, 0, 0]);
        assert_eq!(ctx.gpr64(2), 0);
    }

    #[test]
    fn test_get_thread_id() {
        let (kernel, mem, mut ctx) = setup();
        syscall(&kernel, &mem, &mut ctx, 47, [0, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), 1);
    }

    #[test]
    fn test_create_thread_reads_param_block() {
        let (kernel, mem, mut ctx) = setup();

        let param = 0x0030_0000;
        mem.write32(param + 4, 0x0010_2000); // entry
        mem.write32(param + 8, 0x01F0_0000); // stack
        mem.write32(param + 12, 0x4000); // stack size
        mem.write32(param + 20, 32); // priority

        syscall(&kernel, &mem, &mut ctx, 32, [param, 0, 0, 0]);
        let id = ctx.gpr32(2);
        assert_eq!(id, 2);

        // Status record round-trips through guest memory.
        let status = 0x0031_0000;
        syscall(&kernel, &mem, &mut ctx, 48, [id, status, 0, 0]);
        assert_eq!(ctx.gpr32(2), 0);
        assert_eq!(mem.read32(status + 4), 0x0010_2000);
        assert_eq!(mem.read32(status + 20), 32);
    }

    #[test]
    fn test_semaphore_lifecycle_via_syscalls() {
        let (kernel, mem, mut ctx) = setup();

        let param = 0x0030_0000;
        mem.write32(param + 4, 2); // max count
        mem.write32(param + 8, 1); // initial count

        syscall(&kernel, &mem, &mut ctx, 64, [param, 0, 0, 0]);
        let id = ctx.gpr32(2);
        assert_eq!(id, 1);

        syscall(&kernel, &mem, &mut ctx, 69, [id, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), 0);
        syscall(&kernel, &mem, &mut ctx, 69, [id, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2) as i32, -1);

        syscall(&kernel, &mem, &mut ctx, 66, [id, 0, 0, 0]);
        syscall(&kernel, &mem, &mut ctx, 69, [id, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), 0);

        syscall(&kernel, &mem, &mut ctx, 65, [id, 0, 0, 0]);
        syscall(&kernel, &mem, &mut ctx, 66, [id, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2) as i32, -1);
    }

    #[test]
    fn test_gs_imr_round_trip() {
        let (kernel, mem, mut ctx) = setup();

        // GsPutIMR takes the full 64-bit A0.
        ctx.set_gpr64(3, 113);
        ctx.set_gpr64(4, 0x0000_7F00_0000_0000);
        kernel.handle_syscall(&mem, &mut ctx);

        syscall(&kernel, &mem, &mut ctx, 112, [0, 0, 0, 0]);
        assert_eq!(ctx.gpr64(2), 0x0000_7F00_0000_0000);
    }

    #[test]
    fn test_alarm_set_and_release_via_syscalls() {
        let (kernel, mem, mut ctx) = setup();

        syscall(&kernel, &mem, &mut ctx, 24, [1000, 0x0010_0000, 7, 0]);
        let id = ctx.gpr32(2);

        syscall(&kernel, &mem, &mut ctx, 26, [id, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), id);

        // Releasing the same alarm again fails.
        syscall(&kernel, &mem, &mut ctx, 27, [id, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2) as i32, -1);
    }

    #[test]
    fn test_intc_enable_reports_previous_state() {
        let (kernel, mem, mut ctx) = setup();

        syscall(&kernel, &mem, &mut ctx, 20, [2, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), 0);
        syscall(&kernel, &mem, &mut ctx, 20, [2, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), 1);
        syscall(&kernel, &mem, &mut ctx, 21, [2, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), 1);
    }

    #[test]
    fn test_sleep_and_wakeup_thread() {
        let (kernel, mem, mut ctx) = setup();

        syscall(&kernel, &mem, &mut ctx, 50, [0, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), 0);

        syscall(&kernel, &mem, &mut ctx, 51, [1, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2), 0);

        syscall(&kernel, &mem, &mut ctx, 51, [99, 0, 0, 0]);
        assert_eq!(ctx.gpr32(2) as i32, -1);
    }
}
