//! Runtime orchestrator
//!
//! Owns the address space, the function registry, and the kernel tables.
//! `run` moves the CPU context onto a worker thread that executes the
//! recompiled entry point while the main thread scans the framebuffer out
//! at the configured rate. An atomic thread counter gates termination.

use std::fs::File;
use std::io::BufReader;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use oe_core::error::{EmulatorError, Result};
use oe_core::Config;
use oe_ee::{exception, CpuContext, Exception, Vu0};
use oe_gs::{FramebufferConfig, FramebufferRenderer, FB_HEIGHT, FB_WIDTH};
use oe_kernel::Kernel;
use oe_memory::constants::STACK_TOP;
use oe_memory::Memory;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::display::DisplayBackend;
use crate::elf::ElfLoader;
use crate::registry::{FunctionRegistry, RecompiledFunction};

/// Descriptive record of a loaded guest image; the code itself lives in the
/// function registry
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub name: String,
    pub base_address: u32,
    pub size: u32,
    pub active: bool,
}

/// The runtime: address space, registry, kernel, and the run loop
pub struct Runtime {
    memory: Arc<Memory>,
    registry: FunctionRegistry,
    kernel: Kernel,
    vu0: Vu0,
    modules: Mutex<Vec<LoadedModule>>,
    entry_point: AtomicU32,
    active_threads: AtomicI32,
    config: Config,
}

impl Runtime {
    /// Allocate the address space and empty tables
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let memory = Memory::new(config.ram_size)?;

        Ok(Arc::new(Self {
            memory,
            registry: FunctionRegistry::new(),
            kernel: Kernel::new(),
            vu0: Vu0::new(),
            modules: Mutex::new(Vec::new()),
            entry_point: AtomicU32::new(0),
            active_threads: AtomicI32::new(0),
            config,
        }))
    }

    /// The guest address space
    pub fn memory(&self) -> &Arc<Memory> {
        &self.memory
    }

    /// Load a guest ELF image and record its entry point
    pub fn load_elf<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EmulatorError::Loader(e.into())
        })?;
        let mut reader = BufReader::new(file);

        let entry = ElfLoader::load(&mut reader, &self.memory)?;
        self.entry_point.store(entry, Ordering::Relaxed);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.modules.lock().push(LoadedModule {
            name,
            base_address: 0x0010_0000,
            size: 0,
            active: true,
        });

        Ok(())
    }

    /// Override the guest entry point (hosts that preload memory themselves)
    pub fn set_entry_point(&self, address: u32) {
        self.entry_point.store(address, Ordering::Relaxed);
    }

    /// Current guest entry point
    pub fn entry_point(&self) -> u32 {
        self.entry_point.load(Ordering::Relaxed)
    }

    /// Snapshot of the loaded module records
    pub fn loaded_modules(&self) -> Vec<LoadedModule> {
        self.modules.lock().clone()
    }

    /// Register a recompiled function at a guest address
    pub fn register_function(&self, address: u32, func: RecompiledFunction) {
        self.registry.register(address, func);
    }

    /// Whether a function is registered at `address`
    pub fn has_function(&self, address: u32) -> bool {
        self.registry.contains(address)
    }

    /// Resolve the function at `address`, falling back to a logging stub
    pub fn lookup_function(&self, address: u32) -> RecompiledFunction {
        self.registry.lookup(address)
    }

    /// Dispatch a guest syscall
    pub fn handle_syscall(&self, ctx: &mut CpuContext) {
        self.kernel.handle_syscall(&self.memory, ctx);
    }

    /// Signal an architectural exception from guest code
    pub fn signal_exception(&self, ctx: &mut CpuContext, e: Exception) {
        exception::signal(ctx, e);
    }

    /// Invoke a VU0 microprogram
    pub fn execute_vu0_microprogram(&self, ctx: &mut CpuContext, address: u32) {
        self.vu0.execute_microprogram(ctx, address);
    }

    /// VCALLMS-style VU0 entry
    pub fn vu0_start_microprogram(&self, ctx: &mut CpuContext, address: u32) {
        self.vu0.start_microprogram(ctx, address);
    }

    /// Run the guest to completion.
    ///
    /// Spawns the worker that executes the recompiled entry point, then
    /// scans the framebuffer out until the guest exits or the host window
    /// closes. Joins the worker before returning.
    pub fn run(&self, display: &mut dyn DisplayBackend) -> Result<()> {
        let entry = self.entry_point();
        let entry_fn = self.registry.lookup(entry);

        let mut ctx = CpuContext::new();
        ctx.pc = entry;
        ctx.set_gpr64(4, 0); // argc
        ctx.set_gpr64(5, 0); // argv
        ctx.set_gpr64(29, u64::from(STACK_TOP)); // stack pointer

        info!("starting execution at {entry:#010x}");

        let texture = display.create_texture(FB_WIDTH, FB_HEIGHT);
        display.set_target_fps(self.config.target_fps);

        self.active_threads.store(1, Ordering::Relaxed);

        thread::scope(|s| -> Result<()> {
            let worker = thread::Builder::new()
                .name("ee-worker".to_string())
                .spawn_scoped(s, move || {
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        entry_fn(&self.memory, &mut ctx, self);
                    }));
                    if outcome.is_err() {
                        error!("guest execution panicked");
                    }
                    self.active_threads.fetch_sub(1, Ordering::Relaxed);
                })
                .map_err(|e| EmulatorError::Init(format!("failed to spawn worker: {e}")))?;

            let mut renderer = FramebufferRenderer::new(FB_WIDTH, FB_HEIGHT);
            let frame_budget =
                Duration::from_secs_f64(1.0 / f64::from(self.config.target_fps.max(1)));

            while self.active_threads.load(Ordering::Relaxed) > 0 {
                let frame_start = Instant::now();

                let config = FramebufferConfig::from_registers(&self.memory.gs());
                renderer.update_framebuffer(&self.memory.vram(), &config);
                if renderer.is_framebuffer_dirty() {
                    display.upload_rgba(texture, renderer.framebuffer_rgba());
                    renderer.clear_framebuffer_dirty();
                }
                display.present();

                if display.should_close() {
                    break;
                }

                let elapsed = frame_start.elapsed();
                if elapsed < frame_budget {
                    thread::sleep(frame_budget - elapsed);
                }
            }

            if worker.join().is_err() {
                error!("worker thread terminated abnormally");
            }

            Ok(())
        })
    }
}
