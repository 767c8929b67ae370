#![allow(dead_code)]

use spine_scene_core::{AtlasSource, Config, RenderObject, Scene};
use spine_scene_test_fixtures::skeletons;

pub fn load_fixture(name: &str, cfg: Config) -> Scene {
    let json = skeletons::json(name).expect("skeleton fixture");
    let atlas = skeletons::atlas(name).expect("atlas fixture");
    let path = skeletons::path(name).expect("fixture path");
    let atlas_src = atlas.as_deref().map(|text| AtlasSource {
        bytes: text.as_bytes(),
        path: "fixture.atlas",
    });
    Scene::load(json.as_bytes(), &path.display().to_string(), atlas_src, cfg).expect("load fixture")
}

pub fn approx(a: f32, b: f32) {
    assert!((a - b).abs() <= 1e-3, "left={a} right={b}");
}

/// Render objects must tile `[0, vertex_count)` in order without gaps or overlap.
pub fn assert_covers(objects: &[RenderObject], vertex_count: usize) {
    let mut next = 0u32;
    for (i, obj) in objects.iter().enumerate() {
        assert_eq!(obj.vertex_start, next, "object {i} does not start where the previous ended");
        assert!(obj.vertex_count > 0, "object {i} is empty");
        next += obj.vertex_count;
    }
    assert_eq!(next as usize, vertex_count);
}
