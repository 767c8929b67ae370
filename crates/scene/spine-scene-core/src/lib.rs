//! Spine Scene Core (engine-agnostic)
//!
//! Loads a skeleton description plus an optional texture atlas into a [`Scene`],
//! then evaluates it frame by frame:
//!
//! load → resolve setup pose → per frame: update (animation) → world transforms →
//! skinning and clipping (vertex buffer) → batching (render objects).
//!
//! Exported vertex and render-object data use the fixed-layout records in
//! [`records`]; hosts that cross a language boundary go through [`host::SceneHost`].

pub mod animation;
pub mod atlas;
pub mod batching;
pub mod bones;
pub mod clipping;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod hash;
pub mod host;
pub mod ids;
pub mod interp;
pub mod loader;
pub mod math;
pub mod records;
pub mod sampling;
pub mod scene;
pub mod scratch;
pub mod skinning;
pub mod state;

// Re-exports for consumers (adapters)
pub use animation::{AttachmentOverrides, LoopMode, Pose, SlotPose};
pub use atlas::{Atlas, AtlasPage, AtlasRegion};
pub use batching::{compile_render_objects, BatchConfig, RenderObject};
pub use bones::BoneWorld;
pub use config::Config;
pub use data::{
    Animation, Attachment, Axis, BlendMode, BoneData, ClippingAttachment, Color, Curve, EventData,
    EventKey, Keyframe, LocalTransform, SkeletonData, Skin, SlotData, Timeline,
};
pub use error::{LoadError, SceneError};
pub use events::SceneEvent;
pub use hash::hash_name;
pub use host::{BoneInfo, HostError, SceneHandle, SceneHost};
pub use loader::{load_skeleton, AtlasSource};
pub use math::Transform2D;
pub use records::{
    cast_records, read_records, LayoutError, RenderObjectRecord, VertexRecord, RENDER_OBJECT_RECORD_SIZE,
    VERTEX_RECORD_SIZE,
};
pub use scene::{Aabb, Scene};
pub use skinning::{compute_vertices, DrawDesc, SkinContext, VertexBuffer};
pub use state::{
    CompareFunc, FaceWinding, RenderState, ShaderConstant, ShaderConstants, StencilFaceState,
    StencilOp, StencilState, MAX_CONSTANT_COUNT,
};
