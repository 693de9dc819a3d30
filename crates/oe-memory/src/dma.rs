//! DMA controller
//!
//! The MMIO window is a sparse register map; the only modeled behavior is
//! channel control. A CHCR write with the STR bit set performs a synchronous
//! IMAGE transfer from EE RAM into GS VRAM for the VIF1 and GIF channels,
//! either as a linear copy (`QWC > 0`) or by walking a single chain tag from
//! TADR. Interrupt and timer registers are acknowledged but inert.

use std::sync::atomic::{AtomicU64, Ordering};

use oe_core::{dma_debug, dma_trace};
use tracing::trace;

use crate::constants::*;
use crate::Memory;

/// Performs IMAGE transfers into GS VRAM when a channel is started
pub struct DmaEngine {
    gif_copies: AtomicU64,
}

impl DmaEngine {
    /// Create an engine with a zeroed transfer counter
    pub fn new() -> Self {
        Self {
            gif_copies: AtomicU64::new(0),
        }
    }

    /// Completed IMAGE copies since startup
    pub fn gif_copy_count(&self) -> u64 {
        self.gif_copies.load(Ordering::Relaxed)
    }

    /// Start a transfer on the channel at `channel_base` using the current
    /// MADR/QWC/TADR values
    pub(crate) fn start(&self, mem: &Memory, channel_base: u32, madr: u32, qwc: u32, tadr: u32) {
        if qwc > 0 {
            self.copy_image(mem, channel_base, madr, qwc);
        } else {
            self.walk_chain(mem, channel_base, tadr);
        }
    }

    /// Linear IMAGE copy of `qw_count` quadwords from RAM to the VRAM page
    /// currently selected by DISPFB1
    fn copy_image(&self, mem: &Memory, channel_base: u32, src_vaddr: u32, qw_count: u32) {
        let src = mem.translate(src_vaddr) as usize;
        let base_page = (mem.gs.read().dispfb1() & 0x1FF) as usize;
        let dest = base_page * 2048;

        let rdram = mem.rdram.read();
        let mut vram = mem.vram.write();

        // Clamp to what remains of both address spaces.
        let bytes = ((qw_count as usize) * 16)
            .min(rdram.len().saturating_sub(src))
            .min(vram.len().saturating_sub(dest));

        dma_debug!(
            "IMAGE copy ch={} bytes={bytes} src={src_vaddr:#010x} phys={src:#x} fbp={base_page:#x} dest={dest:#x}",
            Self::channel_number(channel_base),
        );

        if bytes > 0 {
            vram[dest..dest + bytes].copy_from_slice(&rdram[src..src + bytes]);
        }
        self.gif_copies.fetch_add(1, Ordering::Relaxed);
    }

    /// Process one chain-mode tag from TADR.
    ///
    /// Only the ids that resolve to a plain data copy (refe/cnt/next) are
    /// handled, and the chain is not followed further.
    fn walk_chain(&self, mem: &Memory, channel_base: u32, tadr: u32) {
        let phys_tag = mem.translate(tadr) as usize;
        let tag = {
            let rdram = mem.rdram.read();
            if phys_tag + 16 > rdram.len() {
                return;
            }
            u64::from_le_bytes(rdram[phys_tag..phys_tag + 8].try_into().unwrap())
        };

        let tag_qwc = (tag & 0xFFFF) as u32;
        let id = ((tag >> 28) & 0x7) as u32;
        let addr = ((tag >> 32) & 0x7FF_FFFF) as u32;

        dma_debug!(
            "chain tag ch={} id={id} qwc={tag_qwc} addr={addr:#010x} raw={tag:#018x}",
            Self::channel_number(channel_base),
        );

        match id {
            0..=2 => self.copy_image(mem, channel_base, addr, tag_qwc),
            other => dma_trace!("ignoring chain tag id {other}"),
        }
    }

    fn channel_number(channel_base: u32) -> u32 {
        (channel_base >> 8) & 0xF
    }
}

impl Default for DmaEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_chcr(addr: u32) -> bool {
    (DMA_CHANNEL_REGION_START..DMA_CHANNEL_REGION_END).contains(&addr) && addr & 0xFF == DMA_CHCR
}

impl Memory {
    /// Raw stored value of an MMIO register (diagnostics and tests)
    pub fn io_register(&self, addr: u32) -> u32 {
        self.io_registers.read().get(&addr).copied().unwrap_or(0)
    }

    /// Completed DMA IMAGE copies since startup
    pub fn gif_copy_count(&self) -> u64 {
        self.dma.gif_copy_count()
    }

    /// 32-bit MMIO store; detects channel starts and delegates to the DMA
    /// engine
    pub(crate) fn write_io_register(&self, addr: u32, value: u32) {
        self.io_registers.write().insert(addr, value);

        if is_chcr(addr) && value & CHCR_STR != 0 {
            let channel_base = addr & !0xFF;
            let (madr, qwc, tadr) = {
                let io = self.io_registers.read();
                (
                    io.get(&(channel_base + DMA_MADR)).copied().unwrap_or(0),
                    io.get(&(channel_base + DMA_QWC)).copied().unwrap_or(0) & 0xFFFF,
                    io.get(&(channel_base + DMA_TADR)).copied().unwrap_or(0),
                )
            };

            dma_debug!(
                "start ch={} madr={madr:#010x} qwc={qwc} tadr={tadr:#010x}",
                (channel_base >> 8) & 0xF,
            );

            // Only VIF1 and GIF move data in this model.
            if channel_base == DMA_CHANNEL_VIF1 || channel_base == DMA_CHANNEL_GIF {
                self.dma.start(self, channel_base, madr, qwc, tadr);

                // The transfer completed synchronously; report the channel idle.
                if let Some(chcr) = self.io_registers.write().get_mut(&addr) {
                    *chcr &= !CHCR_STR;
                }
            }
        }

        if (INTC_REG_BASE..INTC_REG_END).contains(&addr) {
            trace!(target: "intc", "register write {addr:#010x} = {value:#x}");
        }
    }

    /// 32-bit MMIO load
    pub(crate) fn read_io_register(&self, addr: u32) -> u32 {
        if let Some(&value) = self.io_registers.read().get(&addr) {
            // CHCR reads always report the channel idle.
            if is_chcr(addr) {
                return value & !CHCR_STR;
            }
            return value;
        }

        if (TIMER_REG_BASE..TIMER_REG_END).contains(&addr) && addr & 0xF == 0 {
            trace!(target: "timer", "COUNT read {addr:#010x}");
            return 0;
        }

        if is_chcr(addr) {
            trace!(target: "dma", "status read {addr:#010x}");
            return 0;
        }

        if (INTC_REG_BASE..INTC_REG_END).contains(&addr) {
            trace!(target: "intc", "status read {addr:#010x}");
            return 0;
        }

        0
    }
}
