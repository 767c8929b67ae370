//! Vertex skinning: posed attachments into a flat, non-indexed triangle list.

use crate::animation::Pose;
use crate::bones::BoneWorld;
use crate::data::{Attachment, Color, MeshVertices, SkeletonData, QUAD_TRIANGLES};
use crate::math::Transform2D;
use crate::records::VertexRecord;
use crate::scratch::Scratch;
use crate::state::{FaceWinding, RenderState, ShaderConstants, StencilState};

/// Contiguous vertex range produced by one slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawDesc {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub state: RenderState,
}

#[derive(Clone, Debug, Default)]
pub struct VertexBuffer {
    pub vertices: Vec<VertexRecord>,
    /// One entry per drawn slot, in draw order.
    pub draws: Vec<DrawDesc>,
}

impl VertexBuffer {
    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            draws: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.draws.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Scene-wide inputs to skinning that are not part of the pose.
#[derive(Clone, Copy, Debug, Default)]
pub struct SkinContext {
    pub active_skin: Option<usize>,
    /// Skeleton tint.
    pub color: Color,
    pub stencil: Option<StencilState>,
    pub constants: ShaderConstants,
    /// Placement of the skeleton, applied after the bone transforms.
    pub world: Transform2D,
}

#[inline]
fn mul_color(a: Color, b: Color) -> Color {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2], a[3] * b[3]]
}

fn skin_positions(
    vertices: &MeshVertices,
    bone: &BoneWorld,
    world: &[BoneWorld],
    placement: &Transform2D,
    out: &mut Vec<[f32; 2]>,
) {
    match vertices {
        MeshVertices::Unweighted(local) => out.extend(local.iter().map(|&[x, y]| {
            let [wx, wy] = bone.local_to_world(x, y);
            placement.apply(wx, wy)
        })),
        MeshVertices::Weighted(weights) => out.extend(weights.iter().map(|influences| {
            let [x, y] = influences.iter().fold([0.0f32; 2], |acc, w| {
                let p = world
                    .get(w.bone)
                    .map(|b| b.local_to_world(w.x, w.y))
                    .unwrap_or([w.x, w.y]);
                [acc[0] + p[0] * w.weight, acc[1] + p[1] * w.weight]
            });
            placement.apply(x, y)
        })),
    }
}

/// Rebuild `out` from the posed skeleton. Slots without an attachment
/// contribute nothing; an empty buffer is a valid result. A clipping
/// attachment clips every following slot up to and including its end slot.
pub fn compute_vertices(
    data: &SkeletonData,
    pose: &Pose,
    world: &[BoneWorld],
    ctx: &SkinContext,
    scratch: &mut Scratch,
    out: &mut VertexBuffer,
) {
    out.clear();
    scratch.clip.clear();
    for &slot_index in &pose.draw_order {
        emit_slot(data, pose, world, ctx, slot_index, scratch, out);
        scratch.clip.end_after(slot_index);
    }
    scratch.clip.clear();
}

fn emit_slot(
    data: &SkeletonData,
    pose: &Pose,
    world: &[BoneWorld],
    ctx: &SkinContext,
    slot_index: usize,
    scratch: &mut Scratch,
    out: &mut VertexBuffer,
) {
    let (Some(slot), Some(slot_pose)) = (data.slots.get(slot_index), pose.slots.get(slot_index))
    else {
        return;
    };
    let Some(name) = slot_pose.attachment.as_deref() else {
        return;
    };
    let Some(attachment) = data.find_attachment(ctx.active_skin, slot_index, name) else {
        return;
    };
    let Some(bone) = world.get(slot.bone) else {
        return;
    };
    // fully transparent slots are still emitted
    let color = mul_color(mul_color(ctx.color, slot_pose.color), attachment.color());

    scratch.begin_attachment();
    let (indices, uvs): (&[u16], &[[f32; 2]]) = match attachment {
        Attachment::Region(region) => {
            scratch.positions.extend(region.offsets.iter().map(|&[x, y]| {
                let [wx, wy] = bone.local_to_world(x, y);
                ctx.world.apply(wx, wy)
            }));
            (&QUAD_TRIANGLES[..], &region.uvs[..])
        }
        Attachment::Mesh(mesh) => {
            skin_positions(&mesh.vertices, bone, world, &ctx.world, &mut scratch.positions);
            (&mesh.triangles[..], &mesh.uvs[..])
        }
        Attachment::Clipping(clip) => {
            if !scratch.clip.is_active() {
                skin_positions(&clip.vertices, bone, world, &ctx.world, &mut scratch.positions);
                scratch.clip.begin(&scratch.positions, clip.end);
            }
            return;
        }
    };

    let vertex_start = out.vertices.len() as u32;
    let page = attachment.page();
    let page_index = page as f32;
    let [r, g, b, a] = color;
    let mut push = |[x, y]: [f32; 2], [u, v]: [f32; 2]| {
        out.vertices.push(VertexRecord {
            x,
            y,
            z: 0.0,
            u,
            v,
            r,
            g,
            b,
            a,
            page_index,
        });
    };
    for tri in indices.chunks_exact(3) {
        let corner = |i: u16| {
            let i = i as usize;
            Some((*scratch.positions.get(i)?, *uvs.get(i)?))
        };
        let (Some(p0), Some(p1), Some(p2)) = (corner(tri[0]), corner(tri[1]), corner(tri[2])) else {
            continue;
        };
        if scratch.clip.is_active() {
            let pos = [p0.0, p1.0, p2.0];
            let uv = [p0.1, p1.1, p2.1];
            scratch.clip.clip_triangle(pos, uv, &mut push);
        } else {
            for (p, uv) in [p0, p1, p2] {
                push(p, uv);
            }
        }
    }

    let vertex_count = out.vertices.len() as u32 - vertex_start;
    if vertex_count == 0 {
        return;
    }
    let winding = if ctx.world.mul(&bone.world).determinant() < 0.0 {
        FaceWinding::Cw
    } else {
        FaceWinding::Ccw
    };
    out.draws.push(DrawDesc {
        vertex_start,
        vertex_count,
        state: RenderState {
            page,
            blend: slot.blend,
            stencil: ctx.stencil,
            winding,
            constants: ctx.constants,
        },
    });
}
