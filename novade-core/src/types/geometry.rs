//! Geometric primitives shared by the windowing and renderer layers.

use serde::{Deserialize, Serialize};

/// A 2D pixel size (width and height).
///
/// Compositor configure events, swapchain extents and monitor modes all
/// travel through this type so the crates never need each other's
/// protocol-specific size types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent {
    /// The width component of the size.
    pub width: u32,
    /// The height component of the size.
    pub height: u32,
}

impl Extent {
    /// A size of (0,0).
    pub const ZERO: Extent = Extent::new(0, 0);

    /// Creates a new size with the given width and height.
    pub const fn new(width: u32, height: u32) -> Self {
        Extent { width, height }
    }

    /// Checks if the area is zero (width or height is zero).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Builds a size from a compositor-reported signed pair.
    ///
    /// Returns `None` unless both dimensions are strictly positive; the
    /// protocol uses zero to mean "client decides".
    pub fn from_signed(width: i32, height: i32) -> Option<Self> {
        if width > 0 && height > 0 {
            Some(Extent::new(width as u32, height as u32))
        } else {
            None
        }
    }

    /// Clamps each dimension into `[min, max]` and never below one pixel.
    pub fn clamp(&self, min: Extent, max: Extent) -> Extent {
        Extent {
            width: self.width.clamp(min.width, max.width.max(min.width)).max(1),
            height: self.height.clamp(min.height, max.height.max(min.height)).max(1),
        }
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
