//! EE memory map constants

/// Main RAM size (32 MB, retail configuration)
pub const EE_RAM_SIZE: usize = 32 * 1024 * 1024;

/// Scratchpad base address in the guest virtual map
pub const SCRATCHPAD_BASE: u32 = 0x7000_0000;
/// Scratchpad size (16 KB)
pub const SCRATCHPAD_SIZE: u32 = 16 * 1024;

/// Memory-mapped I/O window base (DMA, INTC, timers)
pub const MMIO_BASE: u32 = 0x1000_0000;
/// Memory-mapped I/O window size
pub const MMIO_SIZE: u32 = 0x1_0000;

/// Timer register block
pub const TIMER_REG_BASE: u32 = 0x1000_0000;
pub const TIMER_REG_END: u32 = 0x1000_0100;

/// Interrupt controller register block
pub const INTC_REG_BASE: u32 = 0x1000_0200;
pub const INTC_REG_END: u32 = 0x1000_0300;

/// DMA per-channel register region
pub const DMA_CHANNEL_REGION_START: u32 = 0x1000_8000;
pub const DMA_CHANNEL_REGION_END: u32 = 0x1000_F000;

/// VIF1 channel base (channel 1, geometry uploads)
pub const DMA_CHANNEL_VIF1: u32 = 0x1000_9000;
/// GIF channel base (channel 2, GS uploads)
pub const DMA_CHANNEL_GIF: u32 = 0x1000_A000;

/// Per-channel register offsets
pub const DMA_CHCR: u32 = 0x00;
pub const DMA_MADR: u32 = 0x10;
pub const DMA_QWC: u32 = 0x20;
pub const DMA_TADR: u32 = 0x30;

/// CHCR start bit
pub const CHCR_STR: u32 = 1 << 8;

/// Initial guest stack pointer (top of the 32 MB RAM)
pub const STACK_TOP: u32 = 0x0200_0000;

/// Guest scheduler bookkeeping area traced by the bus diagnostics
pub const SCHED_TRACE_BASE: u32 = 0x0036_3A10;
/// Span of the traced scheduler area
pub const SCHED_TRACE_SPAN: u32 = 0x420;
/// Messages the scheduler trace sink emits before going quiet
pub const SCHED_TRACE_QUOTA: u32 = 64;
