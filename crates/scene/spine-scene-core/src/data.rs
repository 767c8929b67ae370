//! Canonical skeleton data model produced by the loader.
//!
//! Bones form an arena: `parent` and `children` are indices into
//! `SkeletonData::bones`, and a parent always precedes its children.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::atlas::Atlas;

/// Linear RGBA in 0..1.
pub type Color = [f32; 4];

pub const WHITE: Color = [1.0, 1.0, 1.0, 1.0];

/// Parent-relative bone transform. Rotation is in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoneData {
    pub index: usize,
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub setup: LocalTransform,
    pub length: f32,
    /// When false, the world scale is the bone's own local scale.
    pub inherit_scale: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(BlendMode::Normal),
            "additive" => Some(BlendMode::Additive),
            "multiply" => Some(BlendMode::Multiply),
            "screen" => Some(BlendMode::Screen),
            _ => None,
        }
    }

    /// Numeric blend factor exported in render-object records.
    #[inline]
    pub fn factor(self) -> u32 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Additive => 1,
            BlendMode::Multiply => 2,
            BlendMode::Screen => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlotData {
    pub index: usize,
    pub name: String,
    pub bone: usize,
    pub color: Color,
    /// Attachment shown in the setup pose.
    pub attachment: Option<String>,
    pub blend: BlendMode,
}

/// Textured quad positioned relative to its slot's bone.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionAttachment {
    pub name: String,
    /// Atlas region name.
    pub path: String,
    pub color: Color,
    /// Bone-local corners, in the order bottom-left, top-left, top-right, bottom-right.
    pub offsets: [[f32; 2]; 4],
    /// Atlas texture coordinates for the corners above.
    pub uvs: [[f32; 2]; 4],
    pub page: u32,
}

/// One bone influence of a weighted mesh vertex; `x`/`y` are in that bone's space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneWeight {
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MeshVertices {
    /// Positions in the slot bone's space.
    Unweighted(Vec<[f32; 2]>),
    /// Per-vertex bone influences.
    Weighted(Vec<Vec<BoneWeight>>),
}

impl MeshVertices {
    pub fn len(&self) -> usize {
        match self {
            MeshVertices::Unweighted(v) => v.len(),
            MeshVertices::Weighted(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshAttachment {
    pub name: String,
    pub path: String,
    pub color: Color,
    pub vertices: MeshVertices,
    /// Atlas texture coordinates, one per vertex.
    pub uvs: Vec<[f32; 2]>,
    pub triangles: Vec<u16>,
    pub hull: u32,
    pub page: u32,
}

/// Polygon masking every slot drawn after it, up to and including `end`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClippingAttachment {
    pub name: String,
    /// Last clipped slot; `None` clips to the end of the draw order.
    pub end: Option<usize>,
    /// Polygon outline, in order.
    pub vertices: MeshVertices,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    Clipping(ClippingAttachment),
}

/// Quad triangulation used for region attachments.
pub const QUAD_TRIANGLES: [u16; 6] = [0, 1, 2, 2, 3, 0];

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Region(r) => &r.name,
            Attachment::Mesh(m) => &m.name,
            Attachment::Clipping(c) => &c.name,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Attachment::Region(r) => r.color,
            Attachment::Mesh(m) => m.color,
            Attachment::Clipping(c) => c.color,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Attachment::Region(r) => r.page,
            Attachment::Mesh(m) => m.page,
            Attachment::Clipping(_) => 0,
        }
    }
}

/// Named mapping from (slot index, placeholder name) to an attachment.
#[derive(Clone, Debug, Default)]
pub struct Skin {
    pub name: String,
    attachments: HashMap<usize, HashMap<String, Attachment>>,
}

impl Skin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attachments: HashMap::new(),
        }
    }

    pub fn get(&self, slot: usize, name: &str) -> Option<&Attachment> {
        self.attachments.get(&slot).and_then(|m| m.get(name))
    }

    pub fn insert(&mut self, slot: usize, name: String, attachment: Attachment) {
        self.attachments
            .entry(slot)
            .or_default()
            .insert(name, attachment);
    }

    pub fn len(&self) -> usize {
        self.attachments.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interpolation from one keyframe to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Curve {
    #[default]
    Linear,
    /// Hold the left keyframe until the next one.
    Stepped,
    /// Normalized cubic-bezier timing control points (x1, y1, x2, y2).
    Bezier([f32; 4]),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe<T> {
    /// Seconds from the start of the animation.
    pub time: f32,
    pub value: T,
    /// Curve towards the next keyframe.
    pub curve: Curve,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Timeline {
    /// Degrees added to the setup rotation.
    Rotate { bone: usize, frames: Vec<Keyframe<f32>> },
    /// Offset added to the setup position.
    Translate {
        bone: usize,
        frames: Vec<Keyframe<[f32; 2]>>,
    },
    /// Factor multiplied with the setup scale.
    Scale {
        bone: usize,
        frames: Vec<Keyframe<[f32; 2]>>,
    },
    /// Single-axis translate (4.x `translatex` / `translatey`).
    TranslateAxis {
        bone: usize,
        axis: Axis,
        frames: Vec<Keyframe<f32>>,
    },
    /// Single-axis scale (4.x `scalex` / `scaley`).
    ScaleAxis {
        bone: usize,
        axis: Axis,
        frames: Vec<Keyframe<f32>>,
    },
    Color {
        slot: usize,
        frames: Vec<Keyframe<Color>>,
    },
    /// Stepped; `None` hides the slot's attachment.
    Attachment {
        slot: usize,
        frames: Vec<Keyframe<Option<String>>>,
    },
    /// Stepped; `None` restores the setup draw order.
    DrawOrder {
        frames: Vec<Keyframe<Option<Vec<usize>>>>,
    },
}

impl Timeline {
    /// Time of the last keyframe.
    pub fn end_time(&self) -> f32 {
        fn last<T>(frames: &[Keyframe<T>]) -> f32 {
            frames.last().map(|f| f.time).unwrap_or(0.0)
        }
        match self {
            Timeline::Rotate { frames, .. } => last(frames),
            Timeline::TranslateAxis { frames, .. } | Timeline::ScaleAxis { frames, .. } => {
                last(frames)
            }
            Timeline::Translate { frames, .. } | Timeline::Scale { frames, .. } => last(frames),
            Timeline::Color { frames, .. } => last(frames),
            Timeline::Attachment { frames, .. } => last(frames),
            Timeline::DrawOrder { frames } => last(frames),
        }
    }
}

/// Skeleton-level event declaration with default payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub name: String,
    pub int: i32,
    pub float: f32,
    pub string: Option<String>,
}

/// An event fired when playback passes `time`. Payload overrides the declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct EventKey {
    pub time: f32,
    /// Index into `SkeletonData::events`.
    pub event: usize,
    pub int: i32,
    pub float: f32,
    pub string: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    pub name: String,
    /// Seconds; the latest keyframe time over all timelines and events.
    pub duration: f32,
    pub timelines: Vec<Timeline>,
    /// Sorted by time.
    pub events: Vec<EventKey>,
}

/// Everything loaded from a skeleton (+ atlas) document. Immutable after load.
#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    pub name: String,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: Vec<Skin>,
    /// Index into `skins` of the skin named "default", the fallback for every lookup.
    pub default_skin: Option<usize>,
    pub animations: Vec<Animation>,
    pub events: Vec<EventData>,
    pub atlas: Option<Atlas>,
    /// Non-fatal diagnostics collected while loading (e.g. dropped attachments).
    pub warnings: Vec<String>,
    pub(crate) bone_index: HashMap<String, usize>,
    pub(crate) slot_index: HashMap<String, usize>,
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bone_index.get(name).copied()
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slot_index.get(name).copied()
    }

    pub fn find_skin(&self, name: &str) -> Option<usize> {
        self.skins.iter().position(|s| s.name == name)
    }

    pub fn find_animation(&self, name: &str) -> Option<usize> {
        self.animations.iter().position(|a| a.name == name)
    }

    /// Resolve a slot's attachment through the active skin, falling back to the default skin.
    pub fn find_attachment(
        &self,
        active_skin: Option<usize>,
        slot: usize,
        name: &str,
    ) -> Option<&Attachment> {
        active_skin
            .and_then(|s| self.skins.get(s))
            .and_then(|skin| skin.get(slot, name))
            .or_else(|| {
                self.default_skin
                    .and_then(|s| self.skins.get(s))
                    .and_then(|skin| skin.get(slot, name))
            })
    }
}
