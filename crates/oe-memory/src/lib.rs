//! EE address space and memory bus for oxidized-ee
//!
//! Owns every physical backing store the guest can reach: main RAM, the
//! scratchpad, GS VRAM, the sparse MMIO register map, and the GS privileged
//! register bank. Sized loads and stores dispatch across them; RAM writes
//! feed the self-modifying-code tracker.
//!
//! Backing stores sit behind their own locks so the scan-out thread can read
//! VRAM and the GS registers while the worker runs guest code.

pub mod constants;
pub mod dma;
pub mod smc;
pub mod tlb;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use oe_core::error::{EmulatorError, Result};
use oe_gs::{GsRegisterBank, GS_PRIV_REG_BASE, GS_PRIV_REG_SIZE, GS_VRAM_SIZE};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

use constants::*;
use dma::DmaEngine;
use smc::SmcTracker;
use tlb::TlbEntry;

/// The guest-visible address space and its backing stores
pub struct Memory {
    ram_size: usize,
    rdram: RwLock<Vec<u8>>,
    scratchpad: RwLock<Vec<u8>>,
    vram: RwLock<Vec<u8>>,
    io_registers: RwLock<HashMap<u32, u32>>,
    gs: RwLock<GsRegisterBank>,
    tlb: RwLock<Vec<TlbEntry>>,
    smc: SmcTracker,
    dma: DmaEngine,
    sched_trace_count: AtomicU32,
}

impl Memory {
    /// Allocate the backing stores for a guest with `ram_size` bytes of main
    /// RAM. All stores start zeroed.
    pub fn new(ram_size: usize) -> Result<Arc<Self>> {
        if ram_size == 0 {
            return Err(EmulatorError::Init("RAM size must be non-zero".to_string()));
        }

        Ok(Arc::new(Self {
            ram_size,
            rdram: RwLock::new(vec![0; ram_size]),
            scratchpad: RwLock::new(vec![0; SCRATCHPAD_SIZE as usize]),
            vram: RwLock::new(vec![0; GS_VRAM_SIZE]),
            io_registers: RwLock::new(HashMap::new()),
            gs: RwLock::new(GsRegisterBank::new()),
            tlb: RwLock::new(Vec::new()),
            smc: SmcTracker::new(),
            dma: DmaEngine::new(),
            sched_trace_count: AtomicU32::new(0),
        }))
    }

    /// Main RAM size in bytes
    pub fn ram_size(&self) -> usize {
        self.ram_size
    }

    /// Whether `vaddr` falls inside the scratchpad window
    pub fn is_scratchpad(vaddr: u32) -> bool {
        (SCRATCHPAD_BASE..SCRATCHPAD_BASE + SCRATCHPAD_SIZE).contains(&vaddr)
    }

    fn in_gs_window(vaddr: u32) -> bool {
        (GS_PRIV_REG_BASE..GS_PRIV_REG_BASE + GS_PRIV_REG_SIZE).contains(&vaddr)
    }

    fn in_mmio_window(vaddr: u32) -> bool {
        (MMIO_BASE..MMIO_BASE + MMIO_SIZE).contains(&vaddr)
    }

    /// Map a guest virtual address to a physical address.
    ///
    /// Scratchpad addresses map to offsets within the scratchpad backing
    /// (callers distinguish the scratchpad via [`Memory::is_scratchpad`]);
    /// KSEG0/KSEG1 and the user segment mask to the low 512 MB; anything
    /// else goes through the TLB, falling back to the same masking. Never
    /// faults.
    pub fn translate(&self, vaddr: u32) -> u32 {
        if Self::is_scratchpad(vaddr) {
            return vaddr - SCRATCHPAD_BASE;
        }

        // Direct mapping for KSEG0/KSEG1
        let segment = vaddr & 0xE000_0000;
        if segment == 0x8000_0000 || segment == 0xA000_0000 {
            return vaddr & 0x1FFF_FFFF;
        }

        // User segment, identity within the low 512 MB
        if vaddr < 0x8000_0000 {
            return vaddr & 0x1FFF_FFFF;
        }

        if let Some(paddr) = tlb::lookup(&self.tlb.read(), vaddr) {
            return paddr;
        }

        vaddr & 0x1FFF_FFFF
    }

    /// Append a TLB entry; lookup is first-match in insertion order
    pub fn push_tlb_entry(&self, entry: TlbEntry) {
        self.tlb.write().push(entry);
    }

    /// Drop all TLB entries
    pub fn clear_tlb(&self) {
        self.tlb.write().clear();
    }

    // --- sized loads ---

    /// 8-bit load
    pub fn read8(&self, vaddr: u32) -> u8 {
        if Self::in_gs_window(vaddr) {
            return self.gs.read().read8(vaddr);
        }
        if Self::is_scratchpad(vaddr) {
            return self.load_le::<1>(&self.scratchpad.read(), vaddr - SCRATCHPAD_BASE)[0];
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            return self.load_le::<1>(&self.rdram.read(), phys)[0];
        }
        0
    }

    /// 16-bit load
    pub fn read16(&self, vaddr: u32) -> u16 {
        if Self::in_gs_window(vaddr) {
            return self.gs.read().read16(vaddr);
        }
        if Self::is_scratchpad(vaddr) {
            return u16::from_le_bytes(self.load_le(&self.scratchpad.read(), vaddr - SCRATCHPAD_BASE));
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            return u16::from_le_bytes(self.load_le(&self.rdram.read(), phys));
        }
        0
    }

    /// 32-bit load; the only width served by the MMIO window
    pub fn read32(&self, vaddr: u32) -> u32 {
        if Self::in_mmio_window(vaddr) {
            return self.read_io_register(vaddr);
        }
        if Self::in_gs_window(vaddr) {
            return self.gs.read().read32(vaddr);
        }
        if Self::is_scratchpad(vaddr) {
            return u32::from_le_bytes(self.load_le(&self.scratchpad.read(), vaddr - SCRATCHPAD_BASE));
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            return u32::from_le_bytes(self.load_le(&self.rdram.read(), phys));
        }
        0
    }

    /// 64-bit load
    pub fn read64(&self, vaddr: u32) -> u64 {
        if Self::in_gs_window(vaddr) {
            return self.gs.read().read64(vaddr);
        }
        if Self::is_scratchpad(vaddr) {
            return u64::from_le_bytes(self.load_le(&self.scratchpad.read(), vaddr - SCRATCHPAD_BASE));
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            return u64::from_le_bytes(self.load_le(&self.rdram.read(), phys));
        }
        0
    }

    /// 128-bit (quadword) load
    pub fn read128(&self, vaddr: u32) -> u128 {
        if Self::is_scratchpad(vaddr) {
            return u128::from_le_bytes(self.load_le(&self.scratchpad.read(), vaddr - SCRATCHPAD_BASE));
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            return u128::from_le_bytes(self.load_le(&self.rdram.read(), phys));
        }
        0
    }

    // --- sized stores ---

    /// 8-bit store
    pub fn write8(&self, vaddr: u32, value: u8) {
        if Self::in_gs_window(vaddr) {
            self.gs.write().write8(vaddr, value);
            return;
        }
        if Self::is_scratchpad(vaddr) {
            self.store_le(&mut self.scratchpad.write(), vaddr - SCRATCHPAD_BASE, [value]);
            return;
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            self.store_le(&mut self.rdram.write(), phys, [value]);
            self.smc.mark_modified(vaddr, 1);
            self.trace_scheduler_write(phys, 8, u64::from(value));
        }
    }

    /// 16-bit store
    pub fn write16(&self, vaddr: u32, value: u16) {
        if Self::in_gs_window(vaddr) {
            self.gs.write().write16(vaddr, value);
            return;
        }
        if Self::is_scratchpad(vaddr) {
            self.store_le(&mut self.scratchpad.write(), vaddr - SCRATCHPAD_BASE, value.to_le_bytes());
            return;
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            self.store_le(&mut self.rdram.write(), phys, value.to_le_bytes());
            self.smc.mark_modified(vaddr, 2);
            self.trace_scheduler_write(phys, 16, u64::from(value));
        }
    }

    /// 32-bit store; the only width served by the MMIO window
    pub fn write32(&self, vaddr: u32, value: u32) {
        if Self::in_mmio_window(vaddr) {
            self.write_io_register(vaddr, value);
            return;
        }
        if Self::in_gs_window(vaddr) {
            self.gs.write().write32(vaddr, value);
            return;
        }
        if Self::is_scratchpad(vaddr) {
            self.store_le(&mut self.scratchpad.write(), vaddr - SCRATCHPAD_BASE, value.to_le_bytes());
            return;
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            self.store_le(&mut self.rdram.write(), phys, value.to_le_bytes());
            self.smc.mark_modified(vaddr, 4);
            self.trace_scheduler_write(phys, 32, u64::from(value));
        }
    }

    /// 64-bit store
    pub fn write64(&self, vaddr: u32, value: u64) {
        if Self::in_gs_window(vaddr) {
            self.gs.write().write64(vaddr, value);
            return;
        }
        if Self::is_scratchpad(vaddr) {
            self.store_le(&mut self.scratchpad.write(), vaddr - SCRATCHPAD_BASE, value.to_le_bytes());
            return;
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            self.store_le(&mut self.rdram.write(), phys, value.to_le_bytes());
            self.smc.mark_modified(vaddr, 8);
            self.trace_scheduler_write(phys, 64, value);
        }
    }

    /// 128-bit (quadword) store.
    ///
    /// A translated address that is neither RAM nor scratchpad but falls
    /// below the VRAM size lands in VRAM; the GIF image path depends on this
    /// spill. Anything else splits into two 64-bit stores.
    pub fn write128(&self, vaddr: u32, value: u128) {
        if Self::is_scratchpad(vaddr) {
            self.store_le(&mut self.scratchpad.write(), vaddr - SCRATCHPAD_BASE, value.to_le_bytes());
            return;
        }
        let phys = self.translate(vaddr);
        if (phys as usize) < self.ram_size {
            self.store_le(&mut self.rdram.write(), phys, value.to_le_bytes());
            self.smc.mark_modified(vaddr, 16);
            return;
        }
        if (phys as usize) < GS_VRAM_SIZE {
            self.store_le(&mut self.vram.write(), phys, value.to_le_bytes());
            return;
        }
        self.write64(vaddr, value as u64);
        self.write64(vaddr.wrapping_add(8), (value >> 64) as u64);
    }

    // --- backing store access for the loader, DMA, and scan-out ---

    /// Copy an executable segment into the backing chosen by its virtual
    /// address window and zero-fill up to `memsz` bytes
    pub fn load_segment(&self, vaddr: u32, data: &[u8], memsz: usize) {
        let phys = self.translate(vaddr) as usize;
        if Self::is_scratchpad(vaddr) {
            Self::fill(&mut self.scratchpad.write(), phys, data, memsz);
        } else {
            Self::fill(&mut self.rdram.write(), phys, data, memsz);
        }
    }

    fn fill(buf: &mut [u8], offset: usize, data: &[u8], memsz: usize) {
        if offset >= buf.len() {
            return;
        }
        let copy_len = data.len().min(buf.len() - offset);
        buf[offset..offset + copy_len].copy_from_slice(&data[..copy_len]);

        let zero_end = (offset + memsz).min(buf.len());
        if zero_end > offset + copy_len {
            buf[offset + copy_len..zero_end].fill(0);
        }
    }

    /// Read access to GS VRAM for the scan-out decoder
    pub fn vram(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.vram.read()
    }

    /// Read access to the GS privileged registers
    pub fn gs(&self) -> RwLockReadGuard<'_, GsRegisterBank> {
        self.gs.read()
    }

    /// Write access to the GS privileged registers (syscall paths)
    pub fn gs_mut(&self) -> RwLockWriteGuard<'_, GsRegisterBank> {
        self.gs.write()
    }

    // --- SMC tracking ---

    /// Register `[start, end)` as executable for SMC tracking
    pub fn register_code_region(&self, start: u32, end: u32) {
        self.smc.register_region(start, end);
    }

    /// Whether code in `[addr, addr + size)` has been written since load or
    /// the last clear
    pub fn is_code_modified(&self, addr: u32, size: u32) -> bool {
        self.smc.is_modified(addr, size)
    }

    /// Acknowledge re-translation of `[addr, addr + size)`
    pub fn clear_modified(&self, addr: u32, size: u32) {
        self.smc.clear_modified(addr, size)
    }

    // --- helpers ---

    fn load_le<const N: usize>(&self, buf: &[u8], offset: u32) -> [u8; N] {
        let offset = offset as usize;
        let mut out = [0u8; N];
        if offset + N <= buf.len() {
            out.copy_from_slice(&buf[offset..offset + N]);
        }
        out
    }

    fn store_le<const N: usize>(&self, buf: &mut [u8], offset: u32, bytes: [u8; N]) {
        let offset = offset as usize;
        if offset + N <= buf.len() {
            buf[offset..offset + N].copy_from_slice(&bytes);
        }
    }

    /// Bounded trace of writes landing in the guest scheduler's bookkeeping
    /// area; goes quiet after [`SCHED_TRACE_QUOTA`] messages.
    fn trace_scheduler_write(&self, phys: u32, bits: u32, value: u64) {
        if !(SCHED_TRACE_BASE..SCHED_TRACE_BASE + SCHED_TRACE_SPAN).contains(&phys) {
            return;
        }
        if self.sched_trace_count.fetch_add(1, Ordering::Relaxed) < SCHED_TRACE_QUOTA {
            trace!(target: "bus", "sched write{bits} addr={phys:#010x} val={value:#x}");
        }
    }
}
