//! Scene configuration.

use serde::{Deserialize, Serialize};

use crate::animation::LoopMode;
use crate::data::{Color, WHITE};
use crate::math::Transform2D;
use crate::state::StencilState;

/// Per-scene playback and output settings. Every field has a default, so a
/// partial JSON object is accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loop_mode: LoopMode,
    /// Upper bound on vertices per render object, rounded down to whole triangles.
    pub max_vertices_per_object: Option<u32>,
    /// Skeleton-wide tint multiplied into every vertex color.
    pub color: Color,
    /// Stencil test applied to every render object when set.
    pub stencil: Option<StencilState>,
    /// Placement of the whole skeleton, applied to every emitted vertex.
    pub world_transform: Transform2D,

    /// Initial capacity hints for per-frame buffers.
    pub scratch_vertices: usize,
    pub scratch_render_objects: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loop_mode: LoopMode::Loop,
            max_vertices_per_object: None,
            color: WHITE,
            stencil: None,
            world_transform: Transform2D::default(),
            scratch_vertices: 1024,
            scratch_render_objects: 16,
        }
    }
}
