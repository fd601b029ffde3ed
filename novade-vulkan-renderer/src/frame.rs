//! Frame pacing counters.

/// Tracks which frame slot drives the next frame and which swapchain image
/// the last acquisition returned.
///
/// Frame slots rotate through the elements in order, one per frame. Their
/// acquire semaphore and fence are used regardless of the image the
/// presentation engine hands back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCursor {
    frame_slot: usize,
    image_index: u32,
}

impl FrameCursor {
    pub fn frame_slot(&self) -> usize {
        self.frame_slot
    }

    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub(crate) fn set_image_index(&mut self, image_index: u32) {
        self.image_index = image_index;
    }

    /// Moves to the next slot, wrapping at `image_count`.
    pub(crate) fn advance(&mut self, image_count: usize) {
        if image_count > 0 {
            self.frame_slot = (self.frame_slot + 1) % image_count;
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
