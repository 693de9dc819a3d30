//! INTC/DMAC interrupt enable state
//!
//! Tracks which interrupt causes the guest has enabled. No interrupts are
//! ever delivered; the state exists so enable/disable pairs observe each
//! other.

/// Interrupt-enable masks for the INTC and DMAC controllers
pub struct IntcState {
    intc_mask: u64,
    dmac_mask: u64,
}

impl IntcState {
    /// Create with every cause disabled
    pub fn new() -> Self {
        Self {
            intc_mask: 0,
            dmac_mask: 0,
        }
    }

    /// Enable an INTC cause; returns whether it was enabled before
    pub fn enable_intc(&mut self, cause: u32) -> bool {
        let bit = 1u64 << (cause & 63);
        let was = self.intc_mask & bit != 0;
        self.intc_mask |= bit;
        was
    }

    /// Disable an INTC cause; returns whether it was enabled before
    pub fn disable_intc(&mut self, cause: u32) -> bool {
        let bit = 1u64 << (cause & 63);
        let was = self.intc_mask & bit != 0;
        self.intc_mask &= !bit;
        was
    }

    /// Enable a DMAC channel interrupt; returns whether it was enabled before
    pub fn enable_dmac(&mut self, channel: u32) -> bool {
        let bit = 1u64 << (channel & 63);
        let was = self.dmac_mask & bit != 0;
        self.dmac_mask |= bit;
        was
    }

    /// Disable a DMAC channel interrupt; returns whether it was enabled before
    pub fn disable_dmac(&mut self, channel: u32) -> bool {
        let bit = 1u64 << (channel & 63);
        let was = self.dmac_mask & bit != 0;
        self.dmac_mask &= !bit;
        was
    }
}

impl Default for IntcState {
    fn default() -> Self {
        Self::new()
    }
}
