//! Tether Core
//!
//! Host-side state that scripts reach through the interop layer:
//! - Frame clock (delta time, elapsed time, frame count)
//! - Transforms, colors and deterministic math
//! - Screen metrics

pub mod math;
pub mod screen;
pub mod time;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
