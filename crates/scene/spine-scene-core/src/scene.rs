//! The scene: immutable skeleton data plus per-instance playback state and the
//! buffers exported every frame.
//!
//! Exported slices borrow the scene, so they stay valid exactly until the next
//! mutating call.

use serde::{Deserialize, Serialize};

use crate::animation::{animation_time, AnimationState, AttachmentOverrides, LoopMode, Pose};
use crate::batching::{compile_render_objects, BatchConfig, RenderObject};
use crate::bones::{self, BoneWorld};
use crate::config::Config;
use crate::data::{BoneData, SkeletonData};
use crate::error::{LoadError, SceneError};
use crate::events::SceneEvent;
use crate::hash::hash_name;
use crate::loader::{load_skeleton, AtlasSource};
use crate::math::Transform2D;
use crate::records::{RenderObjectRecord, VertexRecord};
use crate::scratch::Scratch;
use crate::skinning::{compute_vertices, DrawDesc, SkinContext, VertexBuffer};
use crate::state::ShaderConstants;

/// Axis-aligned bounds of the current vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

#[derive(Debug)]
pub struct Scene {
    cfg: Config,
    data: SkeletonData,
    setup_world: Vec<BoneWorld>,
    world: Vec<BoneWorld>,
    anim: AnimationState,
    skin: Option<usize>,
    overrides: AttachmentOverrides,
    constants: ShaderConstants,
    events: Vec<SceneEvent>,
    pose: Pose,
    scratch: Scratch,
    vertices: VertexBuffer,
    objects: Vec<RenderObject>,
    records: Vec<RenderObjectRecord>,
}

impl Scene {
    /// Load a skeleton (and optional atlas) and evaluate the setup pose.
    pub fn load(
        skeleton: &[u8],
        path: &str,
        atlas: Option<AtlasSource<'_>>,
        cfg: Config,
    ) -> Result<Self, LoadError> {
        let data = load_skeleton(skeleton, path, atlas)?;
        Self::from_data(data, cfg)
    }

    /// Build a scene around already loaded data.
    pub fn from_data(data: SkeletonData, cfg: Config) -> Result<Self, LoadError> {
        let setup_world = bones::resolve_setup(&data.bones)?;
        let mut scene = Self {
            anim: AnimationState::new(cfg.loop_mode),
            skin: data.default_skin,
            overrides: AttachmentOverrides::new(),
            constants: ShaderConstants::new(),
            events: Vec::new(),
            pose: Pose::setup(&data),
            scratch: Scratch::new(&cfg),
            vertices: VertexBuffer::with_capacity(cfg.scratch_vertices),
            objects: Vec::with_capacity(cfg.scratch_render_objects),
            records: Vec::with_capacity(cfg.scratch_render_objects),
            world: setup_world.clone(),
            setup_world,
            data,
            cfg,
        };
        scene.refresh();
        Ok(scene)
    }

    // ----- introspection -----

    pub fn data(&self) -> &SkeletonData {
        &self.data
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Animation names in document order.
    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.data.animations.iter().map(|a| a.name.as_str())
    }

    pub fn skin_names(&self) -> impl Iterator<Item = &str> {
        self.data.skins.iter().map(|s| s.name.as_str())
    }

    pub fn bones(&self) -> &[BoneData] {
        &self.data.bones
    }

    pub fn bone_children(&self, bone: usize) -> Option<&[usize]> {
        self.data.bones.get(bone).map(|b| b.children.as_slice())
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.data.find_bone(name)
    }

    /// Current world transform of a bone.
    pub fn world(&self, bone: usize) -> Option<&BoneWorld> {
        self.world.get(bone)
    }

    pub fn world_transforms(&self) -> &[BoneWorld] {
        &self.world
    }

    /// World transforms of the setup pose, resolved once at load.
    pub fn setup_world(&self) -> &[BoneWorld] {
        &self.setup_world
    }

    pub fn current_animation(&self) -> Option<&str> {
        self.anim
            .current
            .and_then(|i| self.data.animations.get(i))
            .map(|a| a.name.as_str())
    }

    pub fn current_skin(&self) -> Option<&str> {
        self.skin
            .and_then(|i| self.data.skins.get(i))
            .map(|s| s.name.as_str())
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.anim.mode
    }

    pub fn playback_rate(&self) -> f32 {
        self.anim.rate
    }

    /// Seconds since the current animation was selected.
    pub fn cursor(&self) -> f32 {
        self.anim.cursor
    }

    /// Cursor mapped into the current animation's range.
    pub fn animation_time(&self) -> f32 {
        self.anim
            .current
            .and_then(|i| self.data.animations.get(i))
            .map(|a| animation_time(self.anim.cursor, a.duration, self.anim.mode))
            .unwrap_or(0.0)
    }

    /// Non-fatal diagnostics from loading.
    pub fn warnings(&self) -> &[String] {
        &self.data.warnings
    }

    // ----- mutation -----

    /// Select an animation and start it `offset` of the way in (a fraction of
    /// its duration, clamped to `[0, 1]`). Re-selecting the active one is a no-op.
    pub fn set_animation(&mut self, name: &str, offset: f32) -> Result<(), SceneError> {
        let index = self
            .data
            .find_animation(name)
            .ok_or_else(|| SceneError::animation(name))?;
        let offset = if offset.is_finite() {
            offset.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let cursor = offset * self.data.animations[index].duration;
        if self.anim.select(index, cursor) {
            log::debug!("scene '{}': animation '{name}'", self.data.name);
            self.refresh();
        }
        Ok(())
    }

    /// Back to the setup pose with no animation selected.
    pub fn clear_animation(&mut self) {
        if self.anim.current.is_some() {
            self.anim.clear();
            self.refresh();
        }
    }

    /// Switch skins. Slots return to their setup attachments; selecting the
    /// active skin is a no-op.
    pub fn set_skin(&mut self, name: &str) -> Result<(), SceneError> {
        let index = self
            .data
            .find_skin(name)
            .ok_or_else(|| SceneError::skin(name))?;
        if self.skin != Some(index) {
            log::debug!("scene '{}': skin '{name}'", self.data.name);
            self.skin = Some(index);
            self.overrides.clear();
            self.refresh();
        }
        Ok(())
    }

    /// Show `attachment` in `slot` (or nothing for `None`) until the next skin
    /// change. Attachment keys of the playing animation still take precedence.
    pub fn set_attachment(&mut self, slot: &str, attachment: Option<&str>) -> Result<(), SceneError> {
        let index = self.data.find_slot(slot).ok_or_else(|| SceneError::slot(slot))?;
        if let Some(name) = attachment {
            if self.data.find_attachment(self.skin, index, name).is_none() {
                return Err(SceneError::attachment(name));
            }
        }
        self.overrides.insert(index, attachment.map(str::to_string));
        self.refresh();
        Ok(())
    }

    /// Scale applied to every later `update` step.
    pub fn set_playback_rate(&mut self, rate: f32) -> Result<(), SceneError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(SceneError::InvalidPlaybackRate(rate));
        }
        self.anim.rate = rate;
        Ok(())
    }

    pub fn world_transform(&self) -> &Transform2D {
        &self.cfg.world_transform
    }

    /// Place the whole skeleton; vertices are re-emitted immediately.
    pub fn set_world_transform(&mut self, transform: Transform2D) {
        if self.cfg.world_transform != transform {
            self.cfg.world_transform = transform;
            self.refresh();
        }
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        if self.anim.mode != mode {
            self.anim.mode = mode;
            self.cfg.loop_mode = mode;
            self.refresh();
        }
    }

    /// Set a shader constant on every render object. Returns `false` when the
    /// constant did not fit.
    pub fn set_constant(&mut self, name: &str, value: [f32; 4]) -> bool {
        let stored = self.constants.insert(hash_name(name), value);
        if stored {
            self.refresh();
        }
        stored
    }

    /// Remove a shader constant. Returns `false` when it was not set.
    pub fn reset_constant(&mut self, name: &str) -> bool {
        let removed = self.constants.remove(hash_name(name));
        if removed {
            self.refresh();
        }
        removed
    }

    // ----- per frame -----

    /// Advance the cursor by `dt` seconds (times the playback rate) and rebuild
    /// pose, vertices and render objects. Returns the events of this step.
    /// Negative or non-finite `dt` is rejected without side effects.
    pub fn update(&mut self, dt: f32) -> Result<&[SceneEvent], SceneError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SceneError::InvalidTimeDelta(dt));
        }
        self.events.clear();
        self.anim.step(&self.data, dt, &mut self.events);
        self.refresh();
        for event in &self.events {
            log::trace!("scene '{}': {event:?}", self.data.name);
        }
        Ok(&self.events)
    }

    /// Events reported by the last `update`.
    pub fn events(&self) -> &[SceneEvent] {
        &self.events
    }

    fn refresh(&mut self) {
        self.anim.evaluate(&self.data, &self.overrides, &mut self.pose);
        bones::update_world(&self.data.bones, &self.pose.bones, &mut self.world);
        let ctx = SkinContext {
            active_skin: self.skin,
            color: self.cfg.color,
            stencil: self.cfg.stencil,
            constants: self.constants,
            world: self.cfg.world_transform,
        };
        compute_vertices(
            &self.data,
            &self.pose,
            &self.world,
            &ctx,
            &mut self.scratch,
            &mut self.vertices,
        );
        let batch = BatchConfig {
            max_vertices_per_object: self.cfg.max_vertices_per_object,
        };
        compile_render_objects(&self.vertices.draws, &batch, &mut self.objects);
        self.records.clear();
        self.records
            .extend(self.objects.iter().map(RenderObject::to_record));
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn vertices(&self) -> &[VertexRecord] {
        &self.vertices.vertices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        self.vertices.as_bytes()
    }

    pub fn draw_descs(&self) -> &[DrawDesc] {
        &self.vertices.draws
    }

    pub fn render_objects(&self) -> &[RenderObject] {
        &self.objects
    }

    pub fn render_object_records(&self) -> &[RenderObjectRecord] {
        &self.records
    }

    pub fn render_object_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }

    /// Bounds of the emitted vertices, `None` when nothing is visible.
    pub fn aabb(&self) -> Option<Aabb> {
        let mut it = self.vertices.vertices.iter();
        let first = it.next()?;
        let init = Aabb {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(it.fold(init, |b, v| Aabb {
            min_x: b.min_x.min(v.x),
            min_y: b.min_y.min(v.y),
            max_x: b.max_x.max(v.x),
            max_y: b.max_y.max(v.y),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BONES: &str = r#"{
        "bones": [ { "name": "root" }, { "name": "tip", "parent": "root", "x": 10 } ],
        "slots": [ { "name": "s", "bone": "tip", "attachment": "img" } ],
        "skins": [ { "name": "default", "attachments": { "s": { "img": { "width": 4, "height": 2 } } } } ],
        "animations": { "slide": { "bones": { "root": { "translate": [
            { "time": 0, "x": 0 }, { "time": 1, "x": 10 }
        ] } } } }
    }"#;

    fn scene() -> Scene {
        Scene::load(TWO_BONES.as_bytes(), "two.json", None, Config::default()).expect("load")
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn scene_is_send() {
        assert_send::<Scene>();
    }

    #[test]
    fn setup_pose_is_exported_at_load() {
        let s = scene();
        assert_eq!(s.current_skin(), Some("default"));
        assert_eq!(s.vertices().len(), 6);
        assert_eq!(s.render_objects().len(), 1);
        assert_eq!(s.render_object_bytes().len(), crate::records::RENDER_OBJECT_RECORD_SIZE);
        let b = s.aabb().expect("bounds");
        assert_eq!((b.min_x, b.max_x, b.min_y, b.max_y), (8.0, 12.0, -1.0, 1.0));
    }

    #[test]
    fn update_moves_bones_and_rejects_bad_dt() {
        let mut s = scene();
        s.set_animation("slide", 0.0).expect("animation");
        s.update(0.5).expect("update");
        let t = s.world(1).expect("tip").world.translation();
        assert!((t[0] - 15.0).abs() < 1e-4);

        let before = s.vertices().to_vec();
        assert_eq!(s.update(-1.0), Err(SceneError::InvalidTimeDelta(-1.0)));
        assert!(matches!(s.update(f32::NAN), Err(SceneError::InvalidTimeDelta(_))));
        assert_eq!(s.vertices(), &before[..]);
        assert!((s.cursor() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn clear_animation_restores_setup() {
        let mut s = scene();
        s.set_animation("slide", 0.0).expect("animation");
        s.update(0.5).expect("update");
        s.clear_animation();
        assert_eq!(s.current_animation(), None);
        assert_eq!(s.world_transforms(), s.setup_world());
    }

    #[test]
    fn constants_reach_render_objects() {
        let mut s = scene();
        assert!(s.set_constant("tint", [1.0, 0.0, 0.0, 1.0]));
        let rec = &s.render_object_records()[0];
        assert_eq!(rec.num_constants, 1);
        assert_eq!(rec.constants[0].name_hash, hash_name("tint"));

        assert!(s.reset_constant("tint"));
        assert!(!s.reset_constant("tint"));
        assert_eq!(s.render_object_records()[0].num_constants, 0);
    }

    #[test]
    fn offset_and_rate_shape_the_cursor() {
        let mut s = scene();
        s.set_animation("slide", 0.25).expect("animation");
        assert!((s.cursor() - 0.25).abs() < 1e-6);
        assert!((s.world(1).expect("tip").world.translation()[0] - 12.5).abs() < 1e-4);

        s.set_playback_rate(2.0).expect("rate");
        s.update(0.125).expect("update");
        assert!((s.cursor() - 0.5).abs() < 1e-6);

        assert_eq!(
            s.set_playback_rate(-1.0),
            Err(SceneError::InvalidPlaybackRate(-1.0))
        );
        assert!(s.set_playback_rate(f32::NAN).is_err());
        assert_eq!(s.playback_rate(), 2.0);

        s.clear_animation();
        s.set_animation("slide", 7.0).expect("clamped offset");
        assert!((s.cursor() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn once_reports_completion_from_update() {
        let mut s = scene();
        s.set_loop_mode(LoopMode::Once);
        s.set_animation("slide", 0.0).expect("animation");
        assert!(s.update(0.5).expect("update").is_empty());
        let events = s.update(0.75).expect("update").to_vec();
        assert_eq!(
            events,
            vec![SceneEvent::Completed {
                animation: "slide".into()
            }]
        );
        assert_eq!(s.events(), &events[..]);
        assert!(s.update(0.1).expect("update").is_empty());
    }

    #[test]
    fn attachment_overrides_until_skin_change() {
        let mut s = scene();
        assert_eq!(
            s.set_attachment("nope", None),
            Err(SceneError::NotFound {
                kind: "slot",
                name: "nope".into()
            })
        );
        assert_eq!(
            s.set_attachment("s", Some("ghost")),
            Err(SceneError::NotFound {
                kind: "attachment",
                name: "ghost".into()
            })
        );
        assert_eq!(s.vertices().len(), 6);

        s.set_attachment("s", None).expect("hide");
        assert!(s.vertices().is_empty());
        s.update(0.1).expect("update");
        assert!(s.vertices().is_empty());

        s.set_attachment("s", Some("img")).expect("show");
        assert_eq!(s.vertices().len(), 6);
    }

    #[test]
    fn world_transform_places_vertices() {
        let mut s = scene();
        s.set_world_transform(Transform2D {
            tx: 100.0,
            ty: 50.0,
            ..Transform2D::IDENTITY
        });
        let b = s.aabb().expect("bounds");
        assert_eq!((b.min_x, b.max_x, b.min_y, b.max_y), (108.0, 112.0, 49.0, 51.0));
        // bone transforms stay in skeleton space
        assert_eq!(s.world(1).expect("tip").world.translation(), [10.0, 0.0]);
        assert_eq!(s.render_object_records()[0].world_transform[12], 0.0);
    }
}
