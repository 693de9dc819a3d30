//! Framebuffer readout
//!
//! Decodes the current GS display framebuffer out of VRAM into host RGBA32
//! pixels. Only linear PSMCT32 and PSMCT16(S) layouts are decoded; indexed
//! formats produce a magenta sentinel so a wrong PSM is visible on screen.

use oe_core::gs_debug;
use tracing::warn;

use crate::registers::GsRegisterBank;
use crate::{FB_HEIGHT, FB_WIDTH};

/// PS2 pixel storage modes understood by the readout path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit ABGR
    Psmct32,
    /// 16-bit ABGR1555
    Psmct16,
    /// 16-bit ABGR1555, alternate block layout (decoded identically)
    Psmct16s,
    /// 8-bit indexed
    Psmt8,
    /// 4-bit indexed
    Psmt4,
}

/// Display framebuffer geometry derived from DISPFB1/DISPLAY1
#[derive(Debug, Clone, Copy)]
pub struct FramebufferConfig {
    /// FBP: base pointer in 2048-byte pages
    pub base_pointer: u32,
    /// FBW: width in 64-pixel blocks
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// Pixel storage mode
    pub format: PixelFormat,
}

impl FramebufferConfig {
    /// Derive the display configuration from the GS register bank.
    ///
    /// Zeroed registers fall back to a 640x448 PSMCT32 display.
    pub fn from_registers(gs: &GsRegisterBank) -> Self {
        let dispfb = gs.dispfb1() as u32;
        let fbp = dispfb & 0x1FF;
        let fbw = (dispfb >> 10) & 0x3F;
        let psm = (dispfb >> 16) & 0x1F;

        let display = gs.display1();
        // DW is derived for completeness but the scan-out path sizes from FBW.
        let dw = ((display >> 23) & 0x7FF) as u32;
        let dh = ((display >> 34) & 0x7FF) as u32;

        let format = match psm {
            0 => PixelFormat::Psmct32,
            2 => PixelFormat::Psmct16,
            other => {
                warn!("unhandled display PSM {other}, assuming PSMCT32");
                PixelFormat::Psmct32
            }
        };

        gs_debug!("display config fbp={fbp:#x} fbw={fbw} dw={dw} dh={dh} psm={psm}");

        Self {
            base_pointer: fbp,
            width: if fbw != 0 { fbw } else { FB_WIDTH / 64 },
            height: if dh != 0 { dh + 1 } else { FB_HEIGHT },
            format,
        }
    }
}

/// Convert a PSMCT32 pixel (ABGR8888) to host RGBA8888
pub fn convert_psmct32_to_rgba(ps_color: u32) -> u32 {
    let a = (ps_color >> 24) & 0xFF;
    let b = (ps_color >> 16) & 0xFF;
    let g = (ps_color >> 8) & 0xFF;
    let r = ps_color & 0xFF;

    (r << 24) | (g << 16) | (b << 8) | a
}

/// Convert a PSMCT16 pixel (ABGR1555) to host RGBA8888
pub fn convert_psmct16_to_rgba(ps_color: u16) -> u32 {
    let expand = |c: u32| (c << 3) | (c >> 2);

    let r = expand(u32::from(ps_color) & 0x1F);
    let g = expand((u32::from(ps_color) >> 5) & 0x1F);
    let b = expand((u32::from(ps_color) >> 10) & 0x1F);
    let a: u32 = if ps_color & 0x8000 != 0 { 0xFF } else { 0x00 };

    (r << 24) | (g << 16) | (b << 8) | a
}

/// Byte offset of a pixel within the framebuffer, relative to the FBP page
fn vram_offset(x: u32, y: u32, fbw: u32, format: PixelFormat) -> u32 {
    // FBW is in 64-pixel blocks.
    let pixel_width = fbw * 64;
    let index = y * pixel_width + x;

    match format {
        PixelFormat::Psmct32 => index * 4,
        PixelFormat::Psmct16 | PixelFormat::Psmct16s => index * 2,
        PixelFormat::Psmt8 => index,
        PixelFormat::Psmt4 => index / 2,
    }
}

fn bytes_per_pixel(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Psmct32 => 4,
        PixelFormat::Psmct16 | PixelFormat::Psmct16s => 2,
        PixelFormat::Psmt8 | PixelFormat::Psmt4 => 1,
    }
}

/// Sentinel emitted for pixel formats the readout cannot decode
const UNSUPPORTED_FORMAT_SENTINEL: u32 = 0xFF00_FFFF;

/// Host-side framebuffer, refreshed from VRAM once per scan-out frame
pub struct FramebufferRenderer {
    display_width: u32,
    display_height: u32,
    rgba: Vec<u32>,
    dirty: bool,
}

impl FramebufferRenderer {
    /// Create a renderer with a host buffer of the given dimensions,
    /// initialized to opaque black.
    pub fn new(display_width: u32, display_height: u32) -> Self {
        let pixel_count = (display_width * display_height) as usize;
        Self {
            display_width,
            display_height,
            rgba: vec![0x0000_00FF; pixel_count],
            dirty: false,
        }
    }

    /// Host buffer width in pixels
    pub fn width(&self) -> u32 {
        self.display_width
    }

    /// Host buffer height in pixels
    pub fn height(&self) -> u32 {
        self.display_height
    }

    /// The decoded RGBA32 pixels, row-major at the host buffer width
    pub fn framebuffer_rgba(&self) -> &[u32] {
        &self.rgba
    }

    /// Whether the buffer changed since the dirty flag was last cleared
    pub fn is_framebuffer_dirty(&self) -> bool {
        self.dirty
    }

    /// Acknowledge a texture upload
    pub fn clear_framebuffer_dirty(&mut self) {
        self.dirty = false;
    }

    /// Decode the configured framebuffer region of `vram` into the host
    /// buffer and mark it dirty.
    ///
    /// Pixels whose source bytes fall outside `vram` are left unchanged.
    pub fn update_framebuffer(&mut self, vram: &[u8], config: &FramebufferConfig) {
        if self.rgba.is_empty() {
            return;
        }

        let display_width = self.display_width.min(config.width * 64);
        let display_height = self.display_height.min(config.height);
        // FBP counts 2048-byte pages.
        let fbp_offset = config.base_pointer * 2048;
        let bpp = bytes_per_pixel(config.format);

        for y in 0..display_height {
            for x in 0..display_width {
                let offset = (fbp_offset + vram_offset(x, y, config.width, config.format)) as usize;
                if offset + bpp as usize > vram.len() {
                    continue;
                }

                let pixel_index = (y * self.display_width + x) as usize;
                if pixel_index >= self.rgba.len() {
                    continue;
                }

                self.rgba[pixel_index] = match config.format {
                    PixelFormat::Psmct32 => {
                        let ps_color = u32::from_le_bytes([
                            vram[offset],
                            vram[offset + 1],
                            vram[offset + 2],
                            vram[offset + 3],
                        ]);
                        convert_psmct32_to_rgba(ps_color)
                    }
                    PixelFormat::Psmct16 | PixelFormat::Psmct16s => {
                        let ps_color = u16::from_le_bytes([vram[offset], vram[offset + 1]]);
                        convert_psmct16_to_rgba(ps_color)
                    }
                    PixelFormat::Psmt8 | PixelFormat::Psmt4 => UNSUPPORTED_FORMAT_SENTINEL,
                };
            }
        }

        self.dirty = true;
    }
}
