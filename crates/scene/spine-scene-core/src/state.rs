//! Render state carried by draw descriptors and render objects.
//!
//! Two adjacent draws may share a render object only when their whole
//! `RenderState` compares equal.

use serde::{Deserialize, Serialize};

use crate::data::BlendMode;

/// Maximum number of shader constants attached to one render object.
pub const MAX_CONSTANT_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum CompareFunc {
    Never = 0,
    Less = 1,
    LessEqual = 2,
    Greater = 3,
    GreaterEqual = 4,
    Equal = 5,
    NotEqual = 6,
    #[default]
    Always = 7,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum StencilOp {
    #[default]
    Keep = 0,
    Zero = 1,
    Replace = 2,
    IncrSat = 3,
    DecrSat = 4,
    Invert = 5,
    Incr = 6,
    Decr = 7,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StencilFaceState {
    pub func: CompareFunc,
    pub op_sfail: StencilOp,
    pub op_dpfail: StencilOp,
    pub op_dppass: StencilOp,
}

/// Stencil test parameters forwarded untouched to the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StencilState {
    pub front: StencilFaceState,
    pub back: StencilFaceState,
    pub reference: u8,
    pub ref_mask: u8,
    pub buffer_mask: u8,
    pub color_buffer_mask: u8,
    pub clear_buffer: bool,
    pub separate_face_states: bool,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            front: StencilFaceState::default(),
            back: StencilFaceState::default(),
            reference: 0,
            ref_mask: 0xff,
            buffer_mask: 0xff,
            color_buffer_mask: 0x0f,
            clear_buffer: false,
            separate_face_states: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceWinding {
    #[default]
    Ccw,
    Cw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderConstant {
    pub name_hash: u64,
    pub value: [f32; 4],
}

/// Fixed-capacity set of shader constants keyed by name hash.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShaderConstants {
    slots: [ShaderConstant; MAX_CONSTANT_COUNT],
    len: usize,
}

impl ShaderConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the constant with the same hash, or append it. Returns `false`
    /// (and logs) when all slots are taken by other names.
    pub fn insert(&mut self, name_hash: u64, value: [f32; 4]) -> bool {
        if let Some(existing) = self.slots[..self.len]
            .iter_mut()
            .find(|c| c.name_hash == name_hash)
        {
            existing.value = value;
            return true;
        }
        if self.len == MAX_CONSTANT_COUNT {
            log::warn!(
                "shader constant {name_hash:#018x} dropped: already {MAX_CONSTANT_COUNT} constants"
            );
            return false;
        }
        self.slots[self.len] = ShaderConstant { name_hash, value };
        self.len += 1;
        true
    }

    /// Drop the constant with this hash, keeping the others in order.
    pub fn remove(&mut self, name_hash: u64) -> bool {
        let Some(pos) = self.as_slice().iter().position(|c| c.name_hash == name_hash) else {
            return false;
        };
        self.slots.copy_within(pos + 1..self.len, pos);
        self.len -= 1;
        self.slots[self.len] = ShaderConstant::default();
        true
    }

    pub fn get(&self, name_hash: u64) -> Option<[f32; 4]> {
        self.as_slice()
            .iter()
            .find(|c| c.name_hash == name_hash)
            .map(|c| c.value)
    }

    pub fn as_slice(&self) -> &[ShaderConstant] {
        &self.slots[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialEq for ShaderConstants {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

/// Everything besides the vertex range that a render object is keyed on.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderState {
    /// Atlas page (texture) index.
    pub page: u32,
    pub blend: BlendMode,
    pub stencil: Option<StencilState>,
    pub winding: FaceWinding,
    pub constants: ShaderConstants,
}
