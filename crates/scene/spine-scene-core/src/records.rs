//! Fixed-layout records exported to hosts.
//!
//! Both records are `#[repr(C)]` plain-old-data with explicit padding, so a
//! buffer of them can be handed across a language boundary as raw bytes.
//! Consumers pass the record size they were built against to
//! [`cast_records`] / [`read_records`], which refuse mismatched layouts.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::state::{FaceWinding, ShaderConstant, StencilFaceState, StencilState, MAX_CONSTANT_COUNT};

/// One skinned vertex: world position, texture coordinate, tint and atlas page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct VertexRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub u: f32,
    pub v: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
    pub page_index: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StencilFuncRecord {
    pub func: u32,
    pub op_sfail: u32,
    pub op_dpfail: u32,
    pub op_dppass: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StencilTestParamsRecord {
    pub front: StencilFuncRecord,
    pub back: StencilFuncRecord,
    pub reference: u8,
    pub ref_mask: u8,
    pub buffer_mask: u8,
    pub color_buffer_mask: u8,
    pub clear_buffer: u8,
    pub separate_face_states: u8,
    pub _pad: [u8; 26],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ShaderConstantRecord {
    pub value: [f32; 4],
    pub name_hash: u64,
    pub _pad: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RenderObjectRecord {
    pub stencil: StencilTestParamsRecord,
    /// Column-major 4x4.
    pub world_transform: [f32; 16],
    pub constants: [ShaderConstantRecord; MAX_CONSTANT_COUNT],
    pub num_constants: u32,
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub blend_factor: u32,
    pub set_blend_factors: u8,
    pub set_stencil_test: u8,
    pub set_face_winding: u8,
    pub face_winding_ccw: u8,
    pub use_index_buffer: u8,
    pub is_triangle_strip: u8,
    pub _pad: [u8; 10],
}

pub const VERTEX_RECORD_SIZE: usize = 40;
pub const RENDER_OBJECT_RECORD_SIZE: usize = 288;

const _: () = assert!(std::mem::size_of::<VertexRecord>() == VERTEX_RECORD_SIZE);
const _: () = assert!(std::mem::size_of::<StencilTestParamsRecord>() == 64);
const _: () = assert!(std::mem::size_of::<ShaderConstantRecord>() == 32);
const _: () = assert!(std::mem::size_of::<RenderObjectRecord>() == RENDER_OBJECT_RECORD_SIZE);

impl From<StencilFaceState> for StencilFuncRecord {
    fn from(s: StencilFaceState) -> Self {
        Self {
            func: s.func as u32,
            op_sfail: s.op_sfail as u32,
            op_dpfail: s.op_dpfail as u32,
            op_dppass: s.op_dppass as u32,
        }
    }
}

impl From<StencilState> for StencilTestParamsRecord {
    fn from(s: StencilState) -> Self {
        Self {
            front: s.front.into(),
            back: s.back.into(),
            reference: s.reference,
            ref_mask: s.ref_mask,
            buffer_mask: s.buffer_mask,
            color_buffer_mask: s.color_buffer_mask,
            clear_buffer: s.clear_buffer as u8,
            separate_face_states: s.separate_face_states as u8,
            _pad: [0; 26],
        }
    }
}

impl From<ShaderConstant> for ShaderConstantRecord {
    fn from(c: ShaderConstant) -> Self {
        Self {
            value: c.value,
            name_hash: c.name_hash,
            _pad: 0,
        }
    }
}

impl RenderObjectRecord {
    pub fn face_winding(&self) -> FaceWinding {
        if self.face_winding_ccw != 0 {
            FaceWinding::Ccw
        } else {
            FaceWinding::Cw
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("record size mismatch: buffer reports {reported} bytes, expected {expected}")]
    RecordSize { reported: usize, expected: usize },
    #[error("buffer length {len} is not a multiple of the record size {record}")]
    Length { len: usize, record: usize },
    #[error("buffer is not aligned for the record type")]
    Misaligned,
}

fn check_layout<T: Pod>(bytes: &[u8], reported_size: usize) -> Result<usize, LayoutError> {
    let expected = std::mem::size_of::<T>();
    if reported_size != expected {
        return Err(LayoutError::RecordSize {
            reported: reported_size,
            expected,
        });
    }
    if bytes.len() % expected != 0 {
        return Err(LayoutError::Length {
            len: bytes.len(),
            record: expected,
        });
    }
    Ok(expected)
}

/// Borrow `bytes` as records without copying. Fails on a layout mismatch or
/// when the buffer is not aligned for `T`.
pub fn cast_records<T: Pod>(bytes: &[u8], reported_size: usize) -> Result<&[T], LayoutError> {
    check_layout::<T>(bytes, reported_size)?;
    bytemuck::try_cast_slice(bytes).map_err(|_| LayoutError::Misaligned)
}

/// Copy records out of `bytes` regardless of alignment.
pub fn read_records<T: Pod>(bytes: &[u8], reported_size: usize) -> Result<Vec<T>, LayoutError> {
    let size = check_layout::<T>(bytes, reported_size)?;
    Ok(bytes
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_offsets_match_the_exported_layout() {
        let rec = RenderObjectRecord::zeroed();
        let base = &rec as *const _ as usize;
        let off = |p: *const u8| p as usize - base;
        assert_eq!(off(rec.world_transform.as_ptr() as *const u8), 64);
        assert_eq!(off(rec.constants.as_ptr() as *const u8), 128);
        assert_eq!(off(&rec.num_constants as *const u32 as *const u8), 256);
        assert_eq!(off(&rec.blend_factor as *const u32 as *const u8), 268);
        assert_eq!(off(&rec.set_blend_factors as *const u8), 272);
    }

    #[test]
    fn read_rejects_wrong_record_size() {
        let verts = [VertexRecord::default(); 3];
        let bytes: &[u8] = bytemuck::cast_slice(&verts);
        assert_eq!(
            read_records::<VertexRecord>(bytes, 36),
            Err(LayoutError::RecordSize {
                reported: 36,
                expected: 40
            })
        );
        assert_eq!(
            read_records::<VertexRecord>(&bytes[..50], VERTEX_RECORD_SIZE),
            Err(LayoutError::Length { len: 50, record: 40 })
        );
        let back = read_records::<VertexRecord>(bytes, VERTEX_RECORD_SIZE).expect("read");
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn cast_borrows_aligned_buffers() {
        let verts = [VertexRecord {
            x: 1.0,
            page_index: 2.0,
            ..VertexRecord::default()
        }];
        let bytes: &[u8] = bytemuck::cast_slice(&verts);
        let view = cast_records::<VertexRecord>(bytes, VERTEX_RECORD_SIZE).expect("cast");
        assert_eq!(view[0].page_index, 2.0);
    }

    #[test]
    fn stencil_conversion_keeps_masks() {
        let rec = StencilTestParamsRecord::from(StencilState::default());
        assert_eq!(rec.front.func, 7);
        assert_eq!(rec.ref_mask, 0xff);
        assert_eq!(rec.color_buffer_mask, 0x0f);
    }
}
