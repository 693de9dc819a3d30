//! TLB lookup
//!
//! The EE TLB is modeled as an ordered list of entries searched first-match;
//! the page-size mask widens the virtual page number comparison.

/// A single TLB entry
#[derive(Debug, Clone, Copy, Default)]
pub struct TlbEntry {
    pub valid: bool,
    /// Virtual page number
    pub vpn: u32,
    /// Physical frame number
    pub pfn: u32,
    /// Page-size mask applied to the VPN comparison
    pub mask: u32,
}

/// Translate through the TLB; `None` when no valid entry matches
pub fn lookup(entries: &[TlbEntry], vaddr: u32) -> Option<u32> {
    let vpn = vaddr >> 12;
    for entry in entries.iter().filter(|e| e.valid) {
        if vpn & !entry.mask == entry.vpn & !entry.mask {
            let page = entry.pfn | (vpn & entry.mask);
            return Some((page << 12) | (vaddr & 0xFFF));
        }
    }
    None
}
