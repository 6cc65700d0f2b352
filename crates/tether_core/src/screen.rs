//! Screen metrics

use serde::{Deserialize, Serialize};

/// Current output surface size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
    pub dpi: f32,
}

impl Screen {
    pub fn new(width: u32, height: u32, dpi: f32) -> Self {
        Self { width, height, dpi }
    }

    /// Width over height; zero when the surface has no height.
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            dpi: 96.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect() {
        assert!((Screen::default().aspect() - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(Screen::new(100, 0, 96.0).aspect(), 0.0);
    }
}
