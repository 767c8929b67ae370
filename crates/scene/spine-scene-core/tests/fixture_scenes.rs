mod common;

use common::{approx, assert_covers, load_fixture};
use spine_scene_core::{
    AtlasSource, BlendMode, Config, FaceWinding, LoopMode, Scene, SceneError, Transform2D, VertexRecord,
};
use spine_scene_test_fixtures::skeletons;

#[test]
fn default_skin_draws_one_batch() {
    let scene = load_fixture("arm", Config::default());
    assert_eq!(scene.vertices().len(), 18);
    assert_eq!(scene.render_objects().len(), 1);
    assert!(scene.warnings().is_empty());
    assert_covers(scene.render_objects(), 18);
}

#[test]
fn skin_switch_adds_weapon_on_second_page() {
    let mut scene = load_fixture("arm", Config::default());
    let default_pose = scene.vertices().to_vec();
    scene.set_skin("unarmed").expect("unarmed");
    // slots fall back to the default skin
    assert_eq!(scene.vertices().len(), 18);

    scene.set_skin("armed").expect("armed");
    assert_eq!(scene.vertices().len(), 24);
    assert_eq!(&scene.vertices()[..18], &default_pose[..]);
    let objects = scene.render_objects();
    assert_eq!(objects.len(), 2);
    assert_eq!((objects[0].vertex_start, objects[0].vertex_count), (0, 18));
    assert_eq!((objects[1].vertex_start, objects[1].vertex_count), (18, 6));
    assert_eq!(objects[0].state.page, 0);
    assert_eq!(objects[1].state.page, 1);
    assert!(scene.vertices()[18..].iter().all(|v| v.page_index == 1.0));

    let bounds = scene.aabb().expect("bounds");
    approx(bounds.min_x, -10.0);
    approx(bounds.max_x, 112.0);
    approx(bounds.min_y, -25.0);
    approx(bounds.max_y, 35.0);
}

#[test]
fn skeleton_without_atlas_uses_a_single_page() {
    let mut scene = load_fixture("arm-structure", Config::default());
    scene.set_skin("armed").expect("armed");
    assert_eq!(scene.vertices().len(), 24);
    assert_eq!(scene.render_objects().len(), 1);
}

#[test]
fn atlas_without_weapon_region_drops_the_sword() {
    let json = skeletons::json("arm").expect("json");
    let atlas = skeletons::atlas("arm").expect("atlas").expect("arm has an atlas");
    let cut = atlas.find("\nweapons.png").expect("second page");
    let truncated = &atlas[..cut];

    let mut scene = Scene::load(
        json.as_bytes(),
        "arm.json",
        Some(AtlasSource {
            bytes: truncated.as_bytes(),
            path: "arm.atlas",
        }),
        Config::default(),
    )
    .expect("load");
    assert_eq!(scene.warnings().len(), 1);
    assert!(scene.warnings()[0].contains("sword"), "{:?}", scene.warnings());

    scene.set_skin("armed").expect("armed");
    assert_eq!(scene.vertices().len(), 18);
}

#[test]
fn rotated_region_maps_corners() {
    let scene = load_fixture("arm", Config::default());
    let hand = &scene.vertices()[12..18];
    // hand slot tint ffe0c0
    approx(hand[0].g, 224.0 / 255.0);
    approx(hand[0].b, 192.0 / 255.0);
    let us: Vec<f32> = hand.iter().map(|v| v.u).collect();
    let min_u = us.iter().copied().fold(f32::MAX, f32::min);
    let max_u = us.iter().copied().fold(f32::MIN, f32::max);
    approx(min_u, 80.0 / 256.0);
    approx(max_u, 92.0 / 256.0);
}

#[test]
fn blink_fades_then_hides_the_hand() {
    let mut scene = load_fixture("arm", Config::default());
    scene.set_animation("blink", 0.0).expect("blink");
    scene.update(0.25).expect("update");
    assert_eq!(scene.vertices().len(), 18);
    for v in &scene.vertices()[12..18] {
        approx(v.a, 0.75);
        approx(v.r, 1.0);
    }

    scene.update(0.5).expect("update");
    assert_eq!(scene.vertices().len(), 12);
    assert_eq!(scene.pose().slots[2].attachment, None);
}

#[test]
fn once_mode_holds_the_last_key() {
    let cfg = Config {
        loop_mode: LoopMode::Once,
        ..Config::default()
    };
    let mut scene = load_fixture("arm", cfg);
    scene.set_animation("stepped", 0.0).expect("stepped");
    scene.update(2.0).expect("update");
    approx(scene.animation_time(), 1.0);
    let hand = scene.find_bone("hand").expect("hand");
    let t = scene.world(hand).expect("world").world.translation();
    approx(t[0], 30.0);
    approx(t[1], 35.0);
}

#[test]
fn draw_order_offsets_move_the_body_back() {
    let mut scene = load_fixture("arm", Config::default());
    let body_first = scene.vertices()[0].x;
    scene.set_animation("reorder", 0.0).expect("reorder");
    scene.update(0.0).expect("update");
    assert_eq!(scene.pose().draw_order, vec![1, 2, 0, 3]);
    // arm quad now leads the buffer
    assert!(scene.vertices()[..6].iter().all(|v| v.x >= 30.0 - 1e-3));
    assert!(body_first < 30.0);

    scene.clear_animation();
    assert_eq!(scene.pose().draw_order, vec![0, 1, 2, 3]);
}

#[test]
fn weighted_mesh_follows_both_bones() {
    let mut scene = load_fixture("mesh", Config::default());
    assert_eq!(scene.vertices().len(), 9);
    let objects = scene.render_objects();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[1].state.blend, BlendMode::Additive);
    assert_eq!((objects[1].vertex_start, objects[1].vertex_count), (6, 3));

    let first = scene.vertices()[0];
    approx(first.x, 0.0);
    approx(first.y, -10.0);
    approx(first.u, 0.0);
    approx(first.v, 0.25);

    scene.set_animation("bend", 0.0).expect("bend");
    scene.update(0.5).expect("update");
    let v1 = scene.vertices()[1];
    approx(v1.x, 57.071);
    approx(v1.y, -7.071);
    // the root-bound vertex stays put
    approx(scene.vertices()[0].x, 0.0);
}

#[test]
fn bounding_boxes_are_not_drawn() {
    let scene = load_fixture("mesh", Config::default());
    let flag = scene.data().find_slot("flag").expect("flag slot");
    let skin = &scene.data().skins[scene.data().default_skin.expect("default skin")];
    assert!(skin.get(flag, "hitbox").is_none());
    assert!(skin.get(flag, "flag").is_some());
}

#[test]
fn set_attachment_overrides_until_skin_change() {
    let mut scene = load_fixture("arm", Config::default());
    // the sword only lives in the "armed" skin
    assert_eq!(
        scene.set_attachment("weapon", Some("sword")),
        Err(SceneError::NotFound {
            kind: "attachment",
            name: "sword".into()
        })
    );
    assert!(matches!(
        scene.set_attachment("tail", None),
        Err(SceneError::NotFound { kind: "slot", .. })
    ));

    scene.set_skin("armed").expect("armed");
    scene.set_attachment("hand", None).expect("hide hand");
    assert_eq!(scene.vertices().len(), 18);
    scene.set_attachment("weapon", None).expect("hide sword");
    assert_eq!(scene.vertices().len(), 12);
    scene.set_attachment("weapon", Some("sword")).expect("show sword");
    assert_eq!(scene.vertices().len(), 18);

    scene.set_skin("unarmed").expect("unarmed");
    assert_eq!(scene.vertices().len(), 18);
    assert_eq!(scene.pose().slots[2].attachment.as_deref(), Some("hand"));
}

fn triangle_area(v: &[VertexRecord]) -> f32 {
    v.chunks_exact(3)
        .map(|t| {
            ((t[1].x - t[0].x) * (t[2].y - t[0].y) - (t[2].x - t[0].x) * (t[1].y - t[0].y)).abs() * 0.5
        })
        .sum()
}

#[test]
fn clipping_mask_cuts_the_image_in_half() {
    let scene = load_fixture("clip", Config::default());
    let draws = scene.draw_descs();
    assert_eq!(draws.len(), 2);

    let img = &scene.vertices()[..draws[0].vertex_count as usize];
    assert!(img.iter().all(|v| v.x >= -1e-3 && v.x <= 20.0 + 1e-3));
    approx(img.iter().map(|v| v.x).fold(f32::MIN, f32::max), 20.0);
    approx(triangle_area(img), 800.0);
    let on_edge: Vec<_> = img.iter().filter(|v| v.x.abs() < 1e-3).collect();
    assert!(!on_edge.is_empty());
    for v in on_edge {
        approx(v.u, 0.5);
    }

    // the clip ends with "img"
    let after = &scene.vertices()[draws[1].vertex_start as usize..];
    assert_eq!(after.len(), 6);
    approx(after.iter().map(|v| v.x).fold(f32::MAX, f32::min), -20.0);
    assert_covers(scene.render_objects(), scene.vertices().len());
}

#[test]
fn world_transform_places_clipped_output() {
    let mut scene = load_fixture("clip", Config::default());
    scene.set_world_transform(Transform2D {
        a: -1.0,
        tx: 100.0,
        ty: 10.0,
        ..Transform2D::IDENTITY
    });
    let draws = scene.draw_descs().to_vec();
    let img = &scene.vertices()[..draws[0].vertex_count as usize];
    assert!(img.iter().all(|v| v.x >= 80.0 - 1e-3 && v.x <= 100.0 + 1e-3));
    approx(triangle_area(img), 800.0);
    assert!(draws.iter().all(|d| d.state.winding == FaceWinding::Cw));

    let bounds = scene.aabb().expect("bounds");
    approx(bounds.min_x, 80.0);
    approx(bounds.max_x, 120.0);
    approx(bounds.min_y, -10.0);
    approx(bounds.max_y, 30.0);
}
