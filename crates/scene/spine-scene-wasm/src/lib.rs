use js_sys::Uint8Array;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;

use spine_scene_core::{AtlasSource, Config, SceneHandle, SceneHost, Transform2D};

/// Many scenes behind integer handles. Failing calls return `0`/`false`/`undefined`
/// and leave a message in `last_error()`.
#[wasm_bindgen]
pub struct SpineSceneHost {
    core: SceneHost,
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn to_js<T: serde::Serialize>(value: Option<T>) -> Result<JsValue, JsError> {
    match value {
        Some(v) => swb::to_value(&v).map_err(|e| JsError::new(&format!("serialize error: {e}"))),
        None => Ok(JsValue::UNDEFINED),
    }
}

#[wasm_bindgen]
impl SpineSceneHost {
    /// Create a host. Pass a config object or undefined/null for defaults.
    /// Example:
    ///   new SpineSceneHost({ loop_mode: "ping_pong", max_vertices_per_object: 6000 })
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<SpineSceneHost, JsError> {
        console_error_panic_hook::set_once();

        let cfg: Config = if jsvalue_is_undefined_or_null(&config) {
            Config::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };

        Ok(SpineSceneHost {
            core: SceneHost::new(cfg),
        })
    }

    /// Load skeleton JSON bytes plus optional atlas text. Returns a handle, or 0 on failure.
    #[wasm_bindgen]
    pub fn load(&mut self, skeleton: &[u8], path: String, atlas: Option<String>) -> u32 {
        let src = atlas.as_deref().map(|text| AtlasSource {
            bytes: text.as_bytes(),
            path: &path,
        });
        self.core
            .load(skeleton, &path, src)
            .map(|h| h.0)
            .unwrap_or(0)
    }

    #[wasm_bindgen]
    pub fn destroy(&mut self, handle: u32) -> bool {
        self.core.destroy(SceneHandle(handle))
    }

    #[wasm_bindgen(js_name = last_error)]
    pub fn last_error(&self) -> Option<String> {
        self.core.last_error().map(str::to_string)
    }

    /// Animation names as `string[]`.
    #[wasm_bindgen(js_name = animation_names)]
    pub fn animation_names(&mut self, handle: u32) -> Result<JsValue, JsError> {
        to_js(self.core.animation_names(SceneHandle(handle)))
    }

    #[wasm_bindgen(js_name = skin_names)]
    pub fn skin_names(&mut self, handle: u32) -> Result<JsValue, JsError> {
        to_js(self.core.skin_names(SceneHandle(handle)))
    }

    /// Bone descriptions (`name`, `parent`, setup transform, `children`).
    #[wasm_bindgen]
    pub fn bones(&mut self, handle: u32) -> Result<JsValue, JsError> {
        to_js(self.core.bones(SceneHandle(handle)))
    }

    #[wasm_bindgen(js_name = set_skin)]
    pub fn set_skin(&mut self, handle: u32, name: String) -> bool {
        self.core.set_skin(SceneHandle(handle), &name)
    }

    /// `offset` is a fraction of the animation's duration (0 when omitted).
    #[wasm_bindgen(js_name = set_animation)]
    pub fn set_animation(&mut self, handle: u32, name: String, offset: Option<f32>) -> bool {
        self.core
            .set_animation(SceneHandle(handle), &name, offset.unwrap_or(0.0))
    }

    /// Pass `undefined` as `attachment` to clear the slot.
    #[wasm_bindgen(js_name = set_attachment)]
    pub fn set_attachment(&mut self, handle: u32, slot: String, attachment: Option<String>) -> bool {
        self.core
            .set_attachment(SceneHandle(handle), &slot, attachment.as_deref())
    }

    #[wasm_bindgen(js_name = set_playback_rate)]
    pub fn set_playback_rate(&mut self, handle: u32, rate: f32) -> bool {
        self.core.set_playback_rate(SceneHandle(handle), rate)
    }

    /// `{ a, b, c, d, tx, ty }` placement applied to every vertex.
    #[wasm_bindgen(js_name = set_world_transform)]
    pub fn set_world_transform(&mut self, handle: u32, transform: JsValue) -> Result<bool, JsError> {
        let transform: Transform2D = swb::from_value(transform)
            .map_err(|e| JsError::new(&format!("transform error: {e}")))?;
        Ok(self.core.set_world_transform(SceneHandle(handle), transform))
    }

    #[wasm_bindgen(js_name = set_constant)]
    pub fn set_constant(&mut self, handle: u32, name: String, x: f32, y: f32, z: f32, w: f32) -> bool {
        self.core.set_constant(SceneHandle(handle), &name, [x, y, z, w])
    }

    #[wasm_bindgen(js_name = reset_constant)]
    pub fn reset_constant(&mut self, handle: u32, name: String) -> bool {
        self.core.reset_constant(SceneHandle(handle), &name)
    }

    /// Step one scene by dt (seconds).
    #[wasm_bindgen]
    pub fn update(&mut self, handle: u32, dt: f32) -> bool {
        self.core.update(SceneHandle(handle), dt)
    }

    /// Events of the last update (`Completed` / `Keyframe` objects).
    #[wasm_bindgen]
    pub fn events(&mut self, handle: u32) -> Result<JsValue, JsError> {
        to_js(self.core.events(SceneHandle(handle)))
    }

    /// Bounds of the current vertices, or undefined.
    #[wasm_bindgen]
    pub fn aabb(&mut self, handle: u32) -> Result<JsValue, JsError> {
        to_js(self.core.aabb(SceneHandle(handle)))
    }

    /// Copy of the packed vertex records (`vertex_record_size()` bytes each).
    #[wasm_bindgen(js_name = vertex_bytes)]
    pub fn vertex_bytes(&mut self, handle: u32) -> Option<Uint8Array> {
        self.core.vertex_bytes(SceneHandle(handle)).map(Uint8Array::from)
    }

    /// Copy of the packed render-object records.
    #[wasm_bindgen(js_name = render_object_bytes)]
    pub fn render_object_bytes(&mut self, handle: u32) -> Option<Uint8Array> {
        self.core
            .render_object_bytes(SceneHandle(handle))
            .map(Uint8Array::from)
    }
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}

#[wasm_bindgen]
pub fn vertex_record_size() -> u32 {
    SceneHost::vertex_record_size() as u32
}

#[wasm_bindgen]
pub fn render_object_record_size() -> u32 {
    SceneHost::render_object_record_size() as u32
}
