//! Host display interface
//!
//! The runtime draws through this trait only; windowing and texture upload
//! live in the embedding application. The null backend satisfies headless
//! runs and tests.

use tracing::debug;

/// Handle to a texture created by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureId(pub u32);

/// Host windowing/texture backend consumed by the scan-out loop
pub trait DisplayBackend {
    /// Initialize the backend with the window dimensions and title
    fn init(&mut self, width: u32, height: u32, title: &str) -> Result<(), String>;

    /// Create a texture for framebuffer upload
    fn create_texture(&mut self, width: u32, height: u32) -> TextureId;

    /// Upload RGBA32 pixels to a texture
    fn upload_rgba(&mut self, texture: TextureId, pixels: &[u32]);

    /// Present the current frame
    fn present(&mut self);

    /// Whether the host window requested close
    fn should_close(&self) -> bool;

    /// Hint the presentation rate
    fn set_target_fps(&mut self, fps: u32);
}

/// Backend that renders nowhere; used for headless runs and tests
pub struct NullBackend {
    next_texture: u32,
    uploads: u64,
    frames: u64,
    target_fps: u32,
}

impl NullBackend {
    /// Create a null backend
    pub fn new() -> Self {
        Self {
            next_texture: 0,
            uploads: 0,
            frames: 0,
            target_fps: 60,
        }
    }

    /// Number of texture uploads performed
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    /// Number of frames presented
    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}

impl DisplayBackend for NullBackend {
    fn init(&mut self, width: u32, height: u32, title: &str) -> Result<(), String> {
        debug!("null display {width}x{height} \"{title}\"");
        Ok(())
    }

    fn create_texture(&mut self, _width: u32, _height: u32) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        id
    }

    fn upload_rgba(&mut self, _texture: TextureId, _pixels: &[u32]) {
        self.uploads += 1;
    }

    fn present(&mut self) {
        self.frames += 1;
    }

    fn should_close(&self) -> bool {
        false
    }

    fn set_target_fps(&mut self, fps: u32) {
        self.target_fps = fps;
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend_counts_work() {
        let mut backend = NullBackend::new();
        backend.init(640, 448, "test").unwrap();

        let tex = backend.create_texture(640, 448);
        backend.upload_rgba(tex, &[0; 4]);
        backend.present();
        backend.present();

        assert_eq!(backend.upload_count(), 1);
        assert_eq!(backend.frame_count(), 2);
        assert!(!backend.should_close());
    }
}
