//! Render-batch compilation.
//!
//! Draw descriptors are merged greedily in emission order: a descriptor joins
//! the previous render object only when it is adjacent in the vertex buffer and
//! carries an identical render state. Nothing is ever reordered, so the output
//! ranges are disjoint, ordered and cover every emitted vertex.

use serde::{Deserialize, Serialize};

use crate::math::Transform2D;
use crate::records::{RenderObjectRecord, ShaderConstantRecord, StencilTestParamsRecord};
use crate::skinning::DrawDesc;
use crate::state::{FaceWinding, RenderState, MAX_CONSTANT_COUNT};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Optional cap on vertices per object, rounded down to whole triangles.
    pub max_vertices_per_object: Option<u32>,
}

impl BatchConfig {
    fn limit(&self) -> Option<u32> {
        self.max_vertices_per_object.map(|m| (m / 3 * 3).max(3))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderObject {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub state: RenderState,
    /// Column-major; vertices are already in world space, so this is identity.
    pub world_transform: [f32; 16],
    pub use_index_buffer: bool,
    pub is_triangle_strip: bool,
}

impl RenderObject {
    pub fn new(vertex_start: u32, vertex_count: u32, state: RenderState) -> Self {
        Self {
            vertex_start,
            vertex_count,
            state,
            world_transform: Transform2D::IDENTITY.to_mat4(),
            use_index_buffer: false,
            is_triangle_strip: false,
        }
    }

    /// Set a named shader constant, replacing one with the same hash. At most
    /// `MAX_CONSTANT_COUNT` distinct constants are kept; extra ones are dropped
    /// with a warning.
    pub fn add_constant(&mut self, name_hash: u64, value: [f32; 4]) -> bool {
        self.state.constants.insert(name_hash, value)
    }

    pub fn to_record(&self) -> RenderObjectRecord {
        let mut constants = [ShaderConstantRecord::default(); MAX_CONSTANT_COUNT];
        for (dst, src) in constants.iter_mut().zip(self.state.constants.as_slice()) {
            *dst = (*src).into();
        }
        RenderObjectRecord {
            stencil: StencilTestParamsRecord::from(self.state.stencil.unwrap_or_default()),
            world_transform: self.world_transform,
            constants,
            num_constants: self.state.constants.len() as u32,
            vertex_start: self.vertex_start,
            vertex_count: self.vertex_count,
            blend_factor: self.state.blend.factor(),
            set_blend_factors: 1,
            set_stencil_test: self.state.stencil.is_some() as u8,
            set_face_winding: 1,
            face_winding_ccw: (self.state.winding == FaceWinding::Ccw) as u8,
            use_index_buffer: self.use_index_buffer as u8,
            is_triangle_strip: self.is_triangle_strip as u8,
            _pad: [0; 10],
        }
    }
}

/// Merge `draws` into `out` (cleared first).
pub fn compile_render_objects(draws: &[DrawDesc], cfg: &BatchConfig, out: &mut Vec<RenderObject>) {
    out.clear();
    let limit = cfg.limit();
    for draw in draws {
        if draw.vertex_count == 0 {
            continue;
        }
        if let Some(last) = out.last_mut() {
            let adjacent = last.vertex_start + last.vertex_count == draw.vertex_start;
            let fits = limit.map_or(true, |l| last.vertex_count + draw.vertex_count <= l);
            if adjacent && fits && last.state == draw.state {
                last.vertex_count += draw.vertex_count;
                continue;
            }
        }
        // split only descriptors that exceed the limit on their own
        let mut start = draw.vertex_start;
        let mut remaining = draw.vertex_count;
        while remaining > 0 {
            let n = limit.map_or(remaining, |l| remaining.min(l));
            out.push(RenderObject::new(start, n, draw.state));
            start += n;
            remaining -= n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BlendMode;
    use crate::hash::hash_name;

    fn draw(start: u32, count: u32, page: u32) -> DrawDesc {
        DrawDesc {
            vertex_start: start,
            vertex_count: count,
            state: RenderState {
                page,
                ..RenderState::default()
            },
        }
    }

    fn compile(draws: &[DrawDesc], cfg: BatchConfig) -> Vec<RenderObject> {
        let mut out = Vec::new();
        compile_render_objects(draws, &cfg, &mut out);
        out
    }

    #[test]
    fn identical_state_merges() {
        let out = compile(&[draw(0, 6, 0), draw(6, 6, 0), draw(12, 3, 0)], BatchConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].vertex_start, out[0].vertex_count), (0, 15));
    }

    #[test]
    fn page_change_splits_without_reordering() {
        let out = compile(&[draw(0, 6, 0), draw(6, 6, 1), draw(12, 6, 0)], BatchConfig::default());
        let ranges: Vec<_> = out.iter().map(|o| (o.vertex_start, o.vertex_count, o.state.page)).collect();
        assert_eq!(ranges, vec![(0, 6, 0), (6, 6, 1), (12, 6, 0)]);
    }

    #[test]
    fn blend_change_splits() {
        let mut additive = draw(6, 6, 0);
        additive.state.blend = BlendMode::Additive;
        let out = compile(&[draw(0, 6, 0), additive], BatchConfig::default());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn vertex_limit_rounds_to_triangles() {
        let cfg = BatchConfig {
            max_vertices_per_object: Some(13),
        };
        let out = compile(&[draw(0, 6, 0), draw(6, 6, 0), draw(12, 6, 0)], cfg);
        let counts: Vec<u32> = out.iter().map(|o| o.vertex_count).collect();
        assert_eq!(counts, vec![12, 6]);

        // a single oversized descriptor is cut into whole-triangle pieces
        let out = compile(&[draw(0, 30, 0)], cfg);
        let counts: Vec<u32> = out.iter().map(|o| o.vertex_count).collect();
        assert_eq!(counts, vec![12, 12, 6]);
        assert_eq!(out[2].vertex_start, 24);
    }

    #[test]
    fn record_carries_state() {
        let mut obj = RenderObject::new(6, 12, RenderState::default());
        assert!(obj.add_constant(hash_name("tint"), [1.0, 0.5, 0.5, 1.0]));
        assert!(obj.add_constant(hash_name("tint"), [0.0, 0.0, 0.0, 1.0]));
        let rec = obj.to_record();
        assert_eq!(rec.num_constants, 1);
        assert_eq!(rec.constants[0].name_hash, hash_name("tint"));
        assert_eq!(rec.constants[0].value, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!((rec.vertex_start, rec.vertex_count), (6, 12));
        assert_eq!(rec.face_winding_ccw, 1);
        assert_eq!(rec.set_stencil_test, 0);
        assert_eq!(rec.world_transform[0], 1.0);
        assert_eq!(rec.world_transform[12], 0.0);
    }

    #[test]
    fn constant_overflow_is_dropped() {
        let mut obj = RenderObject::new(0, 3, RenderState::default());
        for name in ["a", "b", "c", "d"] {
            assert!(obj.add_constant(hash_name(name), [1.0; 4]));
        }
        assert!(!obj.add_constant(hash_name("e"), [1.0; 4]));
        assert_eq!(obj.to_record().num_constants, MAX_CONSTANT_COUNT as u32);
    }
}
