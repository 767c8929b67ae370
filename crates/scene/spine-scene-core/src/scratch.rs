//! Reusable per-frame buffers.

use crate::clipping::ClipRegion;
use crate::config::Config;

/// Transient storage reused across frames.
#[derive(Debug, Default)]
pub struct Scratch {
    /// World-space positions of the attachment being skinned.
    pub positions: Vec<[f32; 2]>,
    pub clip: ClipRegion,
}

impl Scratch {
    pub fn new(cfg: &Config) -> Self {
        Self {
            positions: Vec::with_capacity(cfg.scratch_vertices.min(4096)),
            clip: ClipRegion::default(),
        }
    }

    #[inline]
    pub fn begin_attachment(&mut self) {
        self.positions.clear();
    }
}
