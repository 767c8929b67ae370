//! Handle-based boundary for hosts in other languages.
//!
//! Every call takes a [`SceneHandle`]. Failures return `None`/`false` and leave a
//! human-readable message in [`SceneHost::last_error`]; a later success does not
//! clear it.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::error::{LoadError, SceneError};
use crate::events::SceneEvent;
use crate::ids::HandleAllocator;
use crate::loader::AtlasSource;
use crate::math::Transform2D;
use crate::records::{RENDER_OBJECT_RECORD_SIZE, VERTEX_RECORD_SIZE};
use crate::scene::{Aabb, Scene};

pub use crate::ids::SceneHandle;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HostError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("scene handle {0} is not loaded")]
    State(u32),
    #[error("scene handles exhausted")]
    Exhausted,
}

/// Flat bone description for introspection. `parent` is -1 for roots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneInfo {
    pub name: String,
    pub index: u32,
    pub parent: i32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub length: f32,
    pub children: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct SceneHost {
    cfg: Config,
    ids: HandleAllocator,
    scenes: HashMap<SceneHandle, Scene>,
    last_error: Option<String>,
}

impl SceneHost {
    /// `cfg` is applied to every scene loaded through this host.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            ..Self::default()
        }
    }

    pub const fn vertex_record_size() -> usize {
        VERTEX_RECORD_SIZE
    }

    pub const fn render_object_record_size() -> usize {
        RENDER_OBJECT_RECORD_SIZE
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fail(&mut self, err: HostError) {
        log::error!("{err}");
        self.last_error = Some(err.to_string());
    }

    fn check(&mut self, handle: SceneHandle) -> bool {
        if self.scenes.contains_key(&handle) {
            true
        } else {
            self.fail(HostError::State(handle.0));
            false
        }
    }

    fn with_scene<R>(
        &mut self,
        handle: SceneHandle,
        f: impl FnOnce(&mut Scene) -> Result<R, SceneError>,
    ) -> Option<R> {
        let result = match self.scenes.get_mut(&handle) {
            None => Err(HostError::State(handle.0)),
            Some(scene) => f(scene).map_err(HostError::from),
        };
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    pub fn load(
        &mut self,
        skeleton: &[u8],
        path: &str,
        atlas: Option<AtlasSource<'_>>,
    ) -> Option<SceneHandle> {
        let scene = match Scene::load(skeleton, path, atlas, self.cfg.clone()) {
            Ok(scene) => scene,
            Err(e) => {
                self.fail(e.into());
                return None;
            }
        };
        let Some(handle) = self.ids.alloc() else {
            self.fail(HostError::Exhausted);
            return None;
        };
        for warning in scene.warnings() {
            log::warn!("scene {}: {warning}", handle.0);
        }
        self.scenes.insert(handle, scene);
        Some(handle)
    }

    /// Release a scene. Destroying an unknown or already destroyed handle is a
    /// no-op that returns `false`.
    pub fn destroy(&mut self, handle: SceneHandle) -> bool {
        self.scenes.remove(&handle).is_some()
    }

    pub fn is_loaded(&self, handle: SceneHandle) -> bool {
        self.scenes.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scene(&self, handle: SceneHandle) -> Option<&Scene> {
        self.scenes.get(&handle)
    }

    pub fn scene_mut(&mut self, handle: SceneHandle) -> Option<&mut Scene> {
        self.scenes.get_mut(&handle)
    }

    pub fn animation_names(&mut self, handle: SceneHandle) -> Option<Vec<String>> {
        self.with_scene(handle, |s| Ok(s.animation_names().map(str::to_string).collect()))
    }

    pub fn skin_names(&mut self, handle: SceneHandle) -> Option<Vec<String>> {
        self.with_scene(handle, |s| Ok(s.skin_names().map(str::to_string).collect()))
    }

    pub fn bones(&mut self, handle: SceneHandle) -> Option<Vec<BoneInfo>> {
        self.with_scene(handle, |s| {
            Ok(s.bones()
                .iter()
                .map(|b| BoneInfo {
                    name: b.name.clone(),
                    index: b.index as u32,
                    parent: b.parent.map(|p| p as i32).unwrap_or(-1),
                    x: b.setup.x,
                    y: b.setup.y,
                    rotation: b.setup.rotation,
                    scale_x: b.setup.scale_x,
                    scale_y: b.setup.scale_y,
                    length: b.length,
                    children: b.children.iter().map(|&c| c as u32).collect(),
                })
                .collect())
        })
    }

    pub fn set_skin(&mut self, handle: SceneHandle, name: &str) -> bool {
        self.with_scene(handle, |s| s.set_skin(name)).is_some()
    }

    /// `offset` is a fraction of the animation's duration.
    pub fn set_animation(&mut self, handle: SceneHandle, name: &str, offset: f32) -> bool {
        self.with_scene(handle, |s| s.set_animation(name, offset)).is_some()
    }

    pub fn set_attachment(&mut self, handle: SceneHandle, slot: &str, attachment: Option<&str>) -> bool {
        self.with_scene(handle, |s| s.set_attachment(slot, attachment)).is_some()
    }

    pub fn set_playback_rate(&mut self, handle: SceneHandle, rate: f32) -> bool {
        self.with_scene(handle, |s| s.set_playback_rate(rate)).is_some()
    }

    pub fn set_world_transform(&mut self, handle: SceneHandle, transform: Transform2D) -> bool {
        self.with_scene(handle, |s| {
            s.set_world_transform(transform);
            Ok(())
        })
        .is_some()
    }

    /// `false` when the handle is unknown or the constant did not fit.
    pub fn set_constant(&mut self, handle: SceneHandle, name: &str, value: [f32; 4]) -> bool {
        self.with_scene(handle, |s| Ok(s.set_constant(name, value)))
            .unwrap_or(false)
    }

    pub fn reset_constant(&mut self, handle: SceneHandle, name: &str) -> bool {
        self.with_scene(handle, |s| Ok(s.reset_constant(name)))
            .unwrap_or(false)
    }

    pub fn update(&mut self, handle: SceneHandle, dt: f32) -> bool {
        self.with_scene(handle, |s| s.update(dt).map(|_| ())).is_some()
    }

    /// Events reported by the last update of this scene.
    pub fn events(&mut self, handle: SceneHandle) -> Option<Vec<SceneEvent>> {
        self.with_scene(handle, |s| Ok(s.events().to_vec()))
    }

    /// `(vertex count, render object count)` of the last evaluation.
    pub fn counts(&mut self, handle: SceneHandle) -> Option<(usize, usize)> {
        self.with_scene(handle, |s| Ok((s.vertices().len(), s.render_objects().len())))
    }

    pub fn aabb(&mut self, handle: SceneHandle) -> Option<Aabb> {
        if !self.check(handle) {
            return None;
        }
        self.scenes.get(&handle).and_then(Scene::aabb)
    }

    /// Packed [`VertexRecord`](crate::records::VertexRecord)s, valid until the
    /// next call on this host.
    pub fn vertex_bytes(&mut self, handle: SceneHandle) -> Option<&[u8]> {
        if !self.check(handle) {
            return None;
        }
        self.scenes.get(&handle).map(Scene::vertex_bytes)
    }

    /// Packed [`RenderObjectRecord`](crate::records::RenderObjectRecord)s.
    pub fn render_object_bytes(&mut self, handle: SceneHandle) -> Option<&[u8]> {
        if !self.check(handle) {
            return None;
        }
        self.scenes.get(&handle).map(Scene::render_object_bytes)
    }
}
