use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::atlas::{Atlas, AtlasRegion};
use crate::data::{
    Animation, Attachment, Axis, BlendMode, BoneData, BoneWeight, ClippingAttachment, Color,
    Curve, EventData, EventKey, Keyframe, LocalTransform, MeshAttachment, MeshVertices,
    RegionAttachment, SkeletonData, Skin, SlotData, Timeline, WHITE,
};
use crate::error::LoadError;

/// Atlas text handed to the loader alongside the skeleton.
#[derive(Clone, Copy, Debug)]
pub struct AtlasSource<'a> {
    pub bytes: &'a [u8],
    /// Only used in diagnostics.
    pub path: &'a str,
}

/// Public API: parse a Spine-style skeleton JSON document (3.x or 4.x layout) plus
/// an optional text atlas into the canonical [`SkeletonData`].
///
/// Notes:
/// - Without an atlas every attachment is kept with UVs spanning the unit square
///   and page 0, which is enough for structural inspection.
/// - With an atlas, attachments whose region is missing are dropped with a
///   warning (also recorded in `SkeletonData::warnings`).
/// - Any structural error aborts the load; nothing partial is returned.
pub fn load_skeleton(
    skeleton: &[u8],
    path: &str,
    atlas: Option<AtlasSource<'_>>,
) -> Result<SkeletonData, LoadError> {
    let raw: RawSkeleton = serde_json::from_slice(skeleton).map_err(|e| LoadError::Json {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    let atlas = atlas.map(parse_atlas).transpose()?;

    let mut data = SkeletonData {
        name: raw
            .skeleton
            .as_ref()
            .and_then(|h| h.name.clone())
            .unwrap_or_else(|| file_stem(path)),
        ..SkeletonData::default()
    };

    load_bones(&raw.bones, &mut data)?;
    load_slots(&raw.slots, &mut data)?;
    load_skins(raw.skins, atlas.as_ref(), &mut data)?;
    data.events = raw
        .events
        .into_iter()
        .map(|(name, e)| EventData {
            name,
            int: e.int,
            float: e.float,
            string: e.string,
        })
        .collect();
    for (name, anim) in &raw.animations {
        let animation = load_animation(name, anim, &data)?;
        data.animations.push(animation);
    }
    data.atlas = atlas;

    log::debug!(
        "skeleton '{path}': {} bones, {} slots, {} skins, {} animations, {} warnings",
        data.bones.len(),
        data.slots.len(),
        data.skins.len(),
        data.animations.len(),
        data.warnings.len()
    );
    Ok(data)
}

fn parse_atlas(src: AtlasSource<'_>) -> Result<Atlas, LoadError> {
    let text = std::str::from_utf8(src.bytes).map_err(|e| LoadError::Atlas {
        path: src.path.to_string(),
        line: 0,
        message: format!("not valid UTF-8: {e}"),
    })?;
    Atlas::parse(text, src.path)
}

fn file_stem(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// `RRGGBBAA` or `RRGGBB` hex into linear 0..1 channels.
pub fn parse_color(hex: &str) -> Result<Color, LoadError> {
    let invalid = || LoadError::InvalidColor(hex.to_string());
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }
    let mut out = WHITE;
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).map_err(|_| invalid())?;
        let byte = u8::from_str_radix(s, 16).map_err(|_| invalid())?;
        out[i] = byte as f32 / 255.0;
    }
    Ok(out)
}

fn load_bones(raw: &[RawBone], data: &mut SkeletonData) -> Result<(), LoadError> {
    // every declared name, so a late parent is told apart from a missing one
    let declared: HashMap<&str, usize> = raw
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();

    for (index, rb) in raw.iter().enumerate() {
        if data.bone_index.contains_key(&rb.name) {
            return Err(LoadError::DuplicateBone(rb.name.clone()));
        }
        let parent = match &rb.parent {
            None => None,
            Some(p) => match data.bone_index.get(p) {
                Some(&pi) => Some(pi),
                None if declared.contains_key(p.as_str()) => {
                    return Err(LoadError::ForwardReference {
                        bone: rb.name.clone(),
                        parent: p.clone(),
                    })
                }
                None => {
                    return Err(LoadError::UndefinedParent {
                        bone: rb.name.clone(),
                        parent: p.clone(),
                    })
                }
            },
        };
        let inherit_scale = rb.inherit_scale.unwrap_or(true)
            && !matches!(
                rb.transform.as_deref(),
                Some("noScale" | "noScaleOrReflection" | "onlyTranslation")
            );
        if let Some(pi) = parent {
            data.bones[pi].children.push(index);
        }
        data.bones.push(BoneData {
            index,
            name: rb.name.clone(),
            parent,
            children: Vec::new(),
            setup: LocalTransform {
                x: rb.x,
                y: rb.y,
                rotation: rb.rotation,
                scale_x: rb.scale_x,
                scale_y: rb.scale_y,
            },
            length: rb.length,
            inherit_scale,
        });
        data.bone_index.insert(rb.name.clone(), index);
    }
    Ok(())
}

fn load_slots(raw: &[RawSlot], data: &mut SkeletonData) -> Result<(), LoadError> {
    for (index, rs) in raw.iter().enumerate() {
        if data.slot_index.contains_key(&rs.name) {
            return Err(LoadError::DuplicateSlot(rs.name.clone()));
        }
        let bone = data
            .find_bone(&rs.bone)
            .ok_or_else(|| LoadError::UndefinedBone {
                bone: rs.bone.clone(),
                referrer: format!("slot '{}'", rs.name),
            })?;
        let color = match &rs.color {
            Some(hex) => parse_color(hex)?,
            None => WHITE,
        };
        let blend = match &rs.blend {
            None => BlendMode::Normal,
            Some(b) => BlendMode::parse(b).ok_or_else(|| LoadError::UnknownBlendMode {
                slot: rs.name.clone(),
                blend: b.clone(),
            })?,
        };
        data.slots.push(SlotData {
            index,
            name: rs.name.clone(),
            bone,
            color,
            attachment: rs.attachment.clone(),
            blend,
        });
        data.slot_index.insert(rs.name.clone(), index);
    }
    Ok(())
}

fn load_skins(
    raw: Option<RawSkins>,
    atlas: Option<&Atlas>,
    data: &mut SkeletonData,
) -> Result<(), LoadError> {
    let skins: Vec<RawSkin> = match raw {
        None => Vec::new(),
        Some(RawSkins::List(list)) => list,
        Some(RawSkins::Map(map)) => map
            .into_iter()
            .map(|(name, attachments)| RawSkin { name, attachments })
            .collect(),
    };

    for rs in skins {
        let mut skin = Skin::new(rs.name.clone());
        for (slot_name, entries) in &rs.attachments {
            let slot = data
                .find_slot(slot_name)
                .ok_or_else(|| LoadError::UndefinedSlot {
                    slot: slot_name.clone(),
                    referrer: format!("skin '{}'", rs.name),
                })?;
            for (key, ra) in entries {
                match build_attachment(key, ra, atlas, data)? {
                    Built::Attachment(att) => skin.insert(slot, key.clone(), att),
                    Built::Ignored(kind) => {
                        log::debug!(
                            "skin '{}': ignoring {kind} attachment '{key}' on slot '{slot_name}'",
                            rs.name
                        );
                    }
                    Built::MissingRegion(region) => {
                        let msg = format!(
                            "skin '{}': attachment '{key}' on slot '{slot_name}' dropped, atlas has no region '{region}'",
                            rs.name
                        );
                        log::warn!("{msg}");
                        data.warnings.push(msg);
                    }
                }
            }
        }
        if rs.name == "default" {
            data.default_skin = Some(data.skins.len());
        }
        data.skins.push(skin);
    }
    Ok(())
}

enum Built {
    Attachment(Attachment),
    Ignored(String),
    MissingRegion(String),
}

fn build_attachment(
    key: &str,
    ra: &RawAttachment,
    atlas: Option<&Atlas>,
    data: &SkeletonData,
) -> Result<Built, LoadError> {
    let bone_count = data.bones.len();
    let name = ra.name.clone().unwrap_or_else(|| key.to_string());
    let path = ra.path.clone().unwrap_or_else(|| name.clone());
    let color = match &ra.color {
        Some(hex) => parse_color(hex)?,
        None => WHITE,
    };
    let kind = ra.kind.as_deref().unwrap_or("region");
    match kind {
        "region" | "mesh" => {}
        "clipping" => return clipping_attachment(name, color, ra, data).map(Built::Attachment),
        other => return Ok(Built::Ignored(other.to_string())),
    }

    let region = match atlas {
        Some(atlas) => match atlas.find(&path) {
            Some(r) => Some(r),
            None => return Ok(Built::MissingRegion(path)),
        },
        None => None,
    };
    let page = region.map(|r| r.page as u32).unwrap_or(0);

    let att = if kind == "region" {
        Attachment::Region(RegionAttachment {
            offsets: region_offsets(ra, region),
            uvs: region_uvs(region),
            name,
            path,
            color,
            page,
        })
    } else {
        let (vertices, uvs, triangles) = mesh_geometry(&name, ra, bone_count)?;
        Attachment::Mesh(MeshAttachment {
            uvs: mesh_uvs(&uvs, region),
            name,
            path,
            color,
            vertices,
            triangles,
            hull: ra.hull.unwrap_or(0),
            page,
        })
    };
    Ok(Built::Attachment(att))
}

fn clipping_attachment(
    name: String,
    color: Color,
    ra: &RawAttachment,
    data: &SkeletonData,
) -> Result<Attachment, LoadError> {
    let invalid = |message: String| LoadError::InvalidMesh {
        attachment: name.clone(),
        message,
    };
    let end = match &ra.end {
        None => None,
        Some(slot) => Some(data.find_slot(slot).ok_or_else(|| LoadError::UndefinedSlot {
            slot: slot.clone(),
            referrer: format!("clipping attachment '{name}'"),
        })?),
    };
    let raw = ra.vertices.as_deref().unwrap_or_default();
    let count = match ra.vertex_count {
        Some(n) => n as usize,
        None => raw.len() / 2,
    };
    let vertices = if Some(raw.len()) == count.checked_mul(2) {
        MeshVertices::Unweighted(raw.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
    } else {
        MeshVertices::Weighted(weighted_vertices(raw, data.bones.len()).map_err(&invalid)?)
    };
    if vertices.len() != count {
        return Err(invalid(format!(
            "clipping polygon has {} vertices but declares {count}",
            vertices.len()
        )));
    }
    if count < 3 {
        return Err(invalid(format!("clipping polygon needs 3 vertices, got {count}")));
    }
    Ok(Attachment::Clipping(ClippingAttachment {
        name,
        end,
        vertices,
        color,
    }))
}

/// Bone-local quad corners (BL, UL, UR, BR), accounting for whitespace the
/// packer stripped from the region.
fn region_offsets(ra: &RawAttachment, region: Option<&AtlasRegion>) -> [[f32; 2]; 4] {
    let (packed_w, packed_h, orig_w, orig_h, off_x, off_y) = match region {
        Some(r) => (
            r.width as f32,
            r.height as f32,
            r.original_width as f32,
            r.original_height as f32,
            r.offset_x,
            r.offset_y,
        ),
        None => (ra.width, ra.height, ra.width, ra.height, 0.0, 0.0),
    };
    let ratio = |size: f32, orig: f32| if orig > 0.0 { size / orig } else { 1.0 };
    let region_scale_x = ratio(ra.width, orig_w) * ra.scale_x;
    let region_scale_y = ratio(ra.height, orig_h) * ra.scale_y;

    let local_x = -ra.width / 2.0 * ra.scale_x + off_x * region_scale_x;
    let local_y = -ra.height / 2.0 * ra.scale_y + off_y * region_scale_y;
    let local_x2 = local_x + packed_w * region_scale_x;
    let local_y2 = local_y + packed_h * region_scale_y;

    let (sin, cos) = ra.rotation.to_radians().sin_cos();
    let corner = |lx: f32, ly: f32| [lx * cos - ly * sin + ra.x, lx * sin + ly * cos + ra.y];
    [
        corner(local_x, local_y),
        corner(local_x, local_y2),
        corner(local_x2, local_y2),
        corner(local_x2, local_y),
    ]
}

fn region_uvs(region: Option<&AtlasRegion>) -> [[f32; 2]; 4] {
    let Some(r) = region else {
        return [[0.0, 1.0], [0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
    };
    if r.rotate {
        [[r.u, r.v], [r.u2, r.v], [r.u2, r.v2], [r.u, r.v2]]
    } else {
        [[r.u, r.v2], [r.u, r.v], [r.u2, r.v], [r.u2, r.v2]]
    }
}

fn mesh_uvs(region_uvs: &[[f32; 2]], region: Option<&AtlasRegion>) -> Vec<[f32; 2]> {
    let Some(r) = region else {
        return region_uvs.to_vec();
    };
    let w = r.u2 - r.u;
    let h = r.v2 - r.v;
    region_uvs
        .iter()
        .map(|&[x, y]| {
            if r.rotate {
                [r.u + y * w, r.v + h - x * h]
            } else {
                [r.u + x * w, r.v + y * h]
            }
        })
        .collect()
}

type MeshGeometry = (MeshVertices, Vec<[f32; 2]>, Vec<u16>);

fn mesh_geometry(name: &str, ra: &RawAttachment, bone_count: usize) -> Result<MeshGeometry, LoadError> {
    let invalid = |message: String| LoadError::InvalidMesh {
        attachment: name.to_string(),
        message,
    };
    let (Some(raw_uvs), Some(raw_tris), Some(raw_verts)) = (&ra.uvs, &ra.triangles, &ra.vertices)
    else {
        return Err(invalid("mesh needs 'uvs', 'triangles' and 'vertices'".into()));
    };
    if raw_uvs.len() % 2 != 0 {
        return Err(invalid(format!("odd number of uv values ({})", raw_uvs.len())));
    }
    let count = raw_uvs.len() / 2;
    let uvs: Vec<[f32; 2]> = raw_uvs.chunks_exact(2).map(|c| [c[0], c[1]]).collect();

    let vertices = if raw_verts.len() == raw_uvs.len() {
        MeshVertices::Unweighted(raw_verts.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
    } else {
        MeshVertices::Weighted(weighted_vertices(raw_verts, bone_count).map_err(&invalid)?)
    };
    if vertices.len() != count {
        return Err(invalid(format!(
            "{} vertices but {count} uv pairs",
            vertices.len()
        )));
    }

    if raw_tris.len() % 3 != 0 {
        return Err(invalid(format!(
            "triangle index count {} is not a multiple of 3",
            raw_tris.len()
        )));
    }
    let mut triangles = Vec::with_capacity(raw_tris.len());
    for &t in raw_tris {
        if t as usize >= count {
            return Err(invalid(format!("triangle index {t} out of range (vertex count {count})")));
        }
        let t = u16::try_from(t).map_err(|_| invalid(format!("triangle index {t} exceeds 16 bits")))?;
        triangles.push(t);
    }
    Ok((vertices, uvs, triangles))
}

/// Counts and indices are stored as JSON numbers; only whole, non-negative
/// values that fit in 32 bits are accepted.
fn whole_number(value: f32) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f32 {
        Some(value as usize)
    } else {
        None
    }
}

/// `[bone_count, (bone, x, y, weight) * bone_count]` per vertex.
fn weighted_vertices(raw: &[f32], bone_count: usize) -> Result<Vec<Vec<BoneWeight>>, String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let n = whole_number(raw[i])
            .ok_or_else(|| format!("vertex {} has invalid bone count {}", out.len(), raw[i]))?;
        i += 1;
        if n == 0 {
            return Err(format!("vertex {} has no bone weights", out.len()));
        }
        let end = n
            .checked_mul(4)
            .and_then(|len| len.checked_add(i))
            .filter(|&end| end <= raw.len())
            .ok_or_else(|| format!("weighted vertex {} is truncated", out.len()))?;
        let weights = raw[i..end]
            .chunks_exact(4)
            .map(|c| {
                let bone = whole_number(c[0])
                    .filter(|&b| b < bone_count)
                    .ok_or_else(|| format!("bone index {} out of range", c[0]))?;
                Ok(BoneWeight {
                    bone,
                    x: c[1],
                    y: c[2],
                    weight: c[3],
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        out.push(weights);
        i = end;
    }
    Ok(out)
}

fn load_animation(name: &str, raw: &RawAnimation, data: &SkeletonData) -> Result<Animation, LoadError> {
    let mut timelines = Vec::new();

    for (bone_name, bt) in &raw.bones {
        let bone = data
            .find_bone(bone_name)
            .ok_or_else(|| LoadError::UndefinedBone {
                bone: bone_name.clone(),
                referrer: format!("animation '{name}'"),
            })?;
        if let Some(keys) = &bt.rotate {
            let frames = keyframes(name, keys, |k| Ok(k.angle.or(k.value).unwrap_or(0.0)))?;
            timelines.push(Timeline::Rotate { bone, frames });
        }
        if let Some(keys) = &bt.translate {
            let frames = keyframes(name, keys, |k| Ok([k.x.unwrap_or(0.0), k.y.unwrap_or(0.0)]))?;
            timelines.push(Timeline::Translate { bone, frames });
        }
        if let Some(keys) = &bt.scale {
            let frames = keyframes(name, keys, |k| Ok([k.x.unwrap_or(1.0), k.y.unwrap_or(1.0)]))?;
            timelines.push(Timeline::Scale { bone, frames });
        }
        for (keys, axis) in [(&bt.translate_x, Axis::X), (&bt.translate_y, Axis::Y)] {
            if let Some(keys) = keys {
                let frames = keyframes(name, keys, |k| Ok(k.value.unwrap_or(0.0)))?;
                timelines.push(Timeline::TranslateAxis { bone, axis, frames });
            }
        }
        for (keys, axis) in [(&bt.scale_x, Axis::X), (&bt.scale_y, Axis::Y)] {
            if let Some(keys) = keys {
                let frames = keyframes(name, keys, |k| Ok(k.value.unwrap_or(1.0)))?;
                timelines.push(Timeline::ScaleAxis { bone, axis, frames });
            }
        }
    }

    for (slot_name, st) in &raw.slots {
        let slot = data
            .find_slot(slot_name)
            .ok_or_else(|| LoadError::UndefinedSlot {
                slot: slot_name.clone(),
                referrer: format!("animation '{name}'"),
            })?;
        if let Some(keys) = st.color.as_ref().or(st.rgba.as_ref()) {
            let frames = keyframes(name, keys, |k| match &k.color {
                Some(hex) => parse_color(hex),
                None => Ok(WHITE),
            })?;
            timelines.push(Timeline::Color { slot, frames });
        }
        if let Some(keys) = &st.attachment {
            let frames = keyframes(name, keys, |k| Ok(k.name.clone()))?;
            timelines.push(Timeline::Attachment { slot, frames });
        }
    }

    if let Some(keys) = &raw.draw_order {
        let slot_count = data.slots.len();
        let frames = keyframes(name, keys, |k| match &k.offsets {
            None => Ok(None),
            Some(offsets) => draw_order_from_offsets(name, offsets, data, slot_count).map(Some),
        })?;
        timelines.push(Timeline::DrawOrder { frames });
    }

    let mut events = Vec::with_capacity(raw.events.len());
    for key in &raw.events {
        let event = data
            .events
            .iter()
            .position(|e| e.name == key.name)
            .ok_or_else(|| LoadError::UndefinedEvent {
                event: key.name.clone(),
                animation: name.to_string(),
            })?;
        let invalid_time = !key.time.is_finite()
            || key.time < 0.0
            || events.last().is_some_and(|prev: &EventKey| key.time < prev.time);
        if invalid_time {
            return Err(LoadError::InvalidKeyframes {
                animation: name.to_string(),
                message: format!("invalid event time {} for '{}'", key.time, key.name),
            });
        }
        let declared = &data.events[event];
        events.push(EventKey {
            time: key.time,
            event,
            int: key.int.unwrap_or(declared.int),
            float: key.float.unwrap_or(declared.float),
            string: key.string.clone().or_else(|| declared.string.clone()),
        });
    }

    let duration = timelines
        .iter()
        .map(Timeline::end_time)
        .chain(events.last().map(|e| e.time))
        .fold(0.0f32, f32::max);
    Ok(Animation {
        name: name.to_string(),
        duration,
        timelines,
        events,
    })
}

fn keyframes<T>(
    animation: &str,
    keys: &[RawKey],
    value: impl Fn(&RawKey) -> Result<T, LoadError>,
) -> Result<Vec<Keyframe<T>>, LoadError> {
    let mut frames: Vec<Keyframe<T>> = Vec::with_capacity(keys.len());
    for key in keys {
        if !key.time.is_finite() || key.time < 0.0 {
            return Err(LoadError::InvalidKeyframes {
                animation: animation.to_string(),
                message: format!("invalid keyframe time {}", key.time),
            });
        }
        if let Some(prev) = frames.last() {
            if key.time < prev.time {
                return Err(LoadError::InvalidKeyframes {
                    animation: animation.to_string(),
                    message: format!(
                        "keyframe times must not decrease ({} after {})",
                        key.time, prev.time
                    ),
                });
            }
        }
        frames.push(Keyframe {
            time: key.time,
            value: value(key)?,
            curve: curve_of(key),
        });
    }
    Ok(frames)
}

fn curve_of(key: &RawKey) -> Curve {
    match &key.curve {
        None => Curve::Linear,
        Some(RawCurve::Name(n)) if n == "stepped" => Curve::Stepped,
        Some(RawCurve::Name(n)) => {
            if n != "linear" {
                log::debug!("unknown curve '{n}', using linear");
            }
            Curve::Linear
        }
        Some(RawCurve::Number(cx1)) => Curve::Bezier([
            *cx1,
            key.c2.unwrap_or(0.0),
            key.c3.unwrap_or(1.0),
            key.c4.unwrap_or(1.0),
        ]),
        Some(RawCurve::Points(p)) if p.len() == 4 => Curve::Bezier([p[0], p[1], p[2], p[3]]),
        Some(RawCurve::Points(p)) => {
            log::debug!("curve with {} control values is not supported, using linear", p.len());
            Curve::Linear
        }
    }
}

/// Expand a sparse list of slot offsets into a full back-to-front slot order.
fn draw_order_from_offsets(
    animation: &str,
    offsets: &[RawOffset],
    data: &SkeletonData,
    slot_count: usize,
) -> Result<Vec<usize>, LoadError> {
    let invalid = |message: String| LoadError::InvalidKeyframes {
        animation: animation.to_string(),
        message,
    };
    if offsets.len() > slot_count {
        return Err(invalid("more draw order offsets than slots".into()));
    }
    let mut order: Vec<Option<usize>> = vec![None; slot_count];
    let mut unchanged = Vec::with_capacity(slot_count - offsets.len());
    let mut original = 0usize;
    for off in offsets {
        let slot = data
            .find_slot(&off.slot)
            .ok_or_else(|| LoadError::UndefinedSlot {
                slot: off.slot.clone(),
                referrer: format!("draw order of animation '{animation}'"),
            })?;
        if slot < original {
            return Err(invalid(format!(
                "draw order offsets must follow slot order (slot '{}')",
                off.slot
            )));
        }
        while original != slot {
            unchanged.push(original);
            original += 1;
        }
        let target = original as i64 + off.offset as i64;
        if target < 0 || target as usize >= slot_count || order[target as usize].is_some() {
            return Err(invalid(format!(
                "draw order offset {} of slot '{}' is out of range",
                off.offset, off.slot
            )));
        }
        order[target as usize] = Some(original);
        original += 1;
    }
    unchanged.extend(original..slot_count);

    let mut remaining = unchanged.into_iter().rev();
    let mut out = vec![0; slot_count];
    for i in (0..slot_count).rev() {
        out[i] = match order[i] {
            Some(slot) => slot,
            None => remaining
                .next()
                .ok_or_else(|| invalid("draw order offsets overlap".into()))?,
        };
    }
    Ok(out)
}

// ----- JSON schema (serde) -----

#[derive(Debug, Deserialize)]
struct RawSkeleton {
    #[serde(default)]
    skeleton: Option<RawHeader>,
    #[serde(default)]
    bones: Vec<RawBone>,
    #[serde(default)]
    slots: Vec<RawSlot>,
    #[serde(default)]
    skins: Option<RawSkins>,
    #[serde(default)]
    events: IndexMap<String, RawEventData>,
    #[serde(default)]
    animations: IndexMap<String, RawAnimation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEventData {
    int: i32,
    float: f32,
    string: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEventKey {
    #[serde(default)]
    time: f32,
    name: String,
    #[serde(default)]
    int: Option<i32>,
    #[serde(default)]
    float: Option<f32>,
    #[serde(default)]
    string: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    #[serde(default)]
    name: Option<String>,
}

fn one() -> f32 {
    1.0
}

fn default_size() -> f32 {
    32.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBone {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    length: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "one")]
    scale_x: f32,
    #[serde(default = "one")]
    scale_y: f32,
    #[serde(default)]
    inherit_scale: Option<bool>,
    #[serde(default)]
    transform: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSlot {
    name: String,
    bone: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    attachment: Option<String>,
    #[serde(default)]
    blend: Option<String>,
}

type RawSkinAttachments = IndexMap<String, IndexMap<String, RawAttachment>>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSkins {
    /// 3.8+: `[{ "name": ..., "attachments": { slot: { name: attachment } } }]`
    List(Vec<RawSkin>),
    /// Older: `{ skin: { slot: { name: attachment } } }`
    Map(IndexMap<String, RawSkinAttachments>),
}

#[derive(Debug, Deserialize)]
struct RawSkin {
    name: String,
    #[serde(default)]
    attachments: RawSkinAttachments,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttachment {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "one")]
    scale_x: f32,
    #[serde(default = "one")]
    scale_y: f32,
    #[serde(default = "default_size")]
    width: f32,
    #[serde(default = "default_size")]
    height: f32,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    uvs: Option<Vec<f32>>,
    #[serde(default)]
    triangles: Option<Vec<u32>>,
    #[serde(default)]
    vertices: Option<Vec<f32>>,
    #[serde(default)]
    hull: Option<u32>,
    /// Clipping: last slot clipped.
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    vertex_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawAnimation {
    #[serde(default)]
    bones: IndexMap<String, RawBoneTimelines>,
    #[serde(default)]
    slots: IndexMap<String, RawSlotTimelines>,
    #[serde(default, rename = "drawOrder", alias = "draworder")]
    draw_order: Option<Vec<RawKey>>,
    #[serde(default)]
    events: Vec<RawEventKey>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBoneTimelines {
    #[serde(default)]
    rotate: Option<Vec<RawKey>>,
    #[serde(default)]
    translate: Option<Vec<RawKey>>,
    #[serde(default)]
    scale: Option<Vec<RawKey>>,
    #[serde(default, rename = "translatex")]
    translate_x: Option<Vec<RawKey>>,
    #[serde(default, rename = "translatey")]
    translate_y: Option<Vec<RawKey>>,
    #[serde(default, rename = "scalex")]
    scale_x: Option<Vec<RawKey>>,
    #[serde(default, rename = "scaley")]
    scale_y: Option<Vec<RawKey>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSlotTimelines {
    #[serde(default)]
    attachment: Option<Vec<RawKey>>,
    #[serde(default)]
    color: Option<Vec<RawKey>>,
    #[serde(default)]
    rgba: Option<Vec<RawKey>>,
}

/// Union of every keyframe shape; each timeline reads the fields it needs.
#[derive(Debug, Default, Deserialize)]
struct RawKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    angle: Option<f32>,
    #[serde(default)]
    value: Option<f32>,
    #[serde(default)]
    x: Option<f32>,
    #[serde(default)]
    y: Option<f32>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    offsets: Option<Vec<RawOffset>>,
    #[serde(default)]
    curve: Option<RawCurve>,
    #[serde(default)]
    c2: Option<f32>,
    #[serde(default)]
    c3: Option<f32>,
    #[serde(default)]
    c4: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCurve {
    Number(f32),
    Name(String),
    Points(Vec<f32>),
}

#[derive(Debug, Deserialize)]
struct RawOffset {
    slot: String,
    offset: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(json: &str) -> Result<SkeletonData, LoadError> {
        load_skeleton(json.as_bytes(), "test.json", None)
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_color("ff000080").unwrap()[3], 128.0 / 255.0);
        assert_eq!(parse_color("00ff00").unwrap(), [0.0, 1.0, 0.0, 1.0]);
        assert!(matches!(parse_color("zz"), Err(LoadError::InvalidColor(_))));
        assert!(parse_color("gg0000ff").is_err());
    }

    #[test]
    fn undefined_parent_is_named() {
        let err = load(r#"{ "bones": [ { "name": "root" }, { "name": "arm", "parent": "root2" } ] }"#)
            .unwrap_err();
        assert!(err.to_string().contains("parent bone 'root2' does not exist"));
    }

    #[test]
    fn late_parent_is_a_forward_reference() {
        let err = load(r#"{ "bones": [ { "name": "arm", "parent": "root" }, { "name": "root" } ] }"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::ForwardReference { .. }));
    }

    #[test]
    fn duplicate_bone_is_rejected() {
        let err = load(r#"{ "bones": [ { "name": "root" }, { "name": "root" } ] }"#).unwrap_err();
        assert_eq!(err, LoadError::DuplicateBone("root".into()));
    }

    #[test]
    fn decreasing_keyframes_are_rejected() {
        let json = r#"{
            "bones": [ { "name": "root" } ],
            "animations": { "bad": { "bones": { "root": { "rotate": [
                { "time": 0.5, "angle": 0 }, { "time": 0.25, "angle": 10 }
            ] } } } }
        }"#;
        assert!(matches!(load(json), Err(LoadError::InvalidKeyframes { .. })));
    }

    #[test]
    fn curves_from_all_layouts() {
        let json = r#"{
            "bones": [ { "name": "root" } ],
            "animations": { "a": { "bones": { "root": { "rotate": [
                { "time": 0, "angle": 0, "curve": "stepped" },
                { "time": 1, "angle": 0, "curve": [0.25, 0, 0.75, 1] },
                { "time": 2, "angle": 0, "curve": 0.1, "c3": 0.9 },
                { "time": 3, "value": 7 }
            ] } } } }
        }"#;
        let data = load(json).expect("load");
        let Timeline::Rotate { frames, .. } = &data.animations[0].timelines[0] else {
            panic!("expected rotate timeline");
        };
        assert_eq!(frames[0].curve, Curve::Stepped);
        assert_eq!(frames[1].curve, Curve::Bezier([0.25, 0.0, 0.75, 1.0]));
        assert_eq!(frames[2].curve, Curve::Bezier([0.1, 0.0, 0.9, 1.0]));
        assert_eq!(frames[3].curve, Curve::Linear);
        assert_eq!(frames[3].value, 7.0);
        assert_eq!(data.animations[0].duration, 3.0);
    }

    #[test]
    fn draw_order_offsets_expand() {
        let json = r#"{
            "bones": [ { "name": "root" } ],
            "slots": [
                { "name": "a", "bone": "root" }, { "name": "b", "bone": "root" },
                { "name": "c", "bone": "root" }, { "name": "d", "bone": "root" }
            ],
            "animations": { "swap": { "drawOrder": [
                { "time": 0, "offsets": [ { "slot": "a", "offset": 2 } ] },
                { "time": 1 }
            ] } }
        }"#;
        let data = load(json).expect("load");
        let Timeline::DrawOrder { frames } = &data.animations[0].timelines[0] else {
            panic!("expected draw order timeline");
        };
        assert_eq!(frames[0].value, Some(vec![1, 2, 0, 3]));
        assert_eq!(frames[1].value, None);
    }

    #[test]
    fn region_quad_without_atlas_is_centered() {
        let json = r#"{
            "bones": [ { "name": "root" } ],
            "slots": [ { "name": "s", "bone": "root", "attachment": "img" } ],
            "skins": { "default": { "s": { "img": { "width": 20, "height": 10, "x": 5 },
                                           "box": { "type": "boundingbox", "vertices": [] } } } }
        }"#;
        let data = load(json).expect("load");
        let skin = &data.skins[data.default_skin.expect("default skin")];
        assert_eq!(skin.len(), 1);
        let Some(Attachment::Region(r)) = skin.get(0, "img") else {
            panic!("expected region");
        };
        assert_eq!(r.offsets[0], [-5.0, -5.0]);
        assert_eq!(r.offsets[2], [15.0, 5.0]);
        assert_eq!(r.uvs[1], [0.0, 0.0]);
        assert_eq!(r.page, 0);
    }

    #[test]
    fn missing_region_drops_attachment_with_warning() {
        let json = r#"{
            "bones": [ { "name": "root" } ],
            "slots": [ { "name": "s", "bone": "root" } ],
            "skins": [ { "name": "default", "attachments": { "s": { "ghost": {} } } } ]
        }"#;
        let atlas = "p.png\nsize: 16,16\nother\n  xy: 0, 0\n  size: 4, 4\n";
        let data = load_skeleton(
            json.as_bytes(),
            "test.json",
            Some(AtlasSource {
                bytes: atlas.as_bytes(),
                path: "test.atlas",
            }),
        )
        .expect("load");
        assert!(data.skins[0].is_empty());
        assert_eq!(data.warnings.len(), 1);
        assert!(data.warnings[0].contains("ghost"));
    }

    #[test]
    fn inconsistent_mesh_is_rejected() {
        let json = r#"{
            "bones": [ { "name": "root" } ],
            "slots": [ { "name": "s", "bone": "root" } ],
            "skins": [ { "name": "default", "attachments": { "s": { "m": {
                "type": "mesh", "uvs": [0, 0, 1, 0, 1, 1], "vertices": [0, 0, 1, 0, 1, 1],
                "triangles": [0, 1, 5]
            } } } } ]
        }"#;
        assert!(matches!(load(json), Err(LoadError::InvalidMesh { .. })));
    }

    #[test]
    fn weighted_mesh_vertices() {
        let json = r#"{
            "bones": [ { "name": "root" }, { "name": "tip", "parent": "root", "x": 10 } ],
            "slots": [ { "name": "s", "bone": "root" } ],
            "skins": [ { "name": "default", "attachments": { "s": { "m": {
                "type": "mesh", "uvs": [0, 0, 1, 0, 1, 1],
                "vertices": [1, 0, 0, 0, 1,  1, 1, 0, 0, 1,  2, 0, 5, 5, 0.5, 1, -5, 5, 0.5],
                "triangles": [0, 1, 2], "hull": 3
            } } } } ]
        }"#;
        let data = load(json).expect("load");
        let Some(Attachment::Mesh(m)) = data.skins[0].get(0, "m") else {
            panic!("expected mesh");
        };
        let MeshVertices::Weighted(w) = &m.vertices else {
            panic!("expected weighted vertices");
        };
        assert_eq!(w.len(), 3);
        assert_eq!(w[2].len(), 2);
        assert_eq!(w[2][1].bone, 1);
        assert_eq!(m.hull, 3);
    }

    fn weighted_mesh_json(vertices: &str) -> String {
        format!(
            r#"{{
            "bones": [ {{ "name": "root" }}, {{ "name": "tip", "parent": "root" }} ],
            "slots": [ {{ "name": "s", "bone": "root" }} ],
            "skins": [ {{ "name": "default", "attachments": {{ "s": {{ "m": {{
                "type": "mesh", "uvs": [0, 0, 1, 0, 1, 1],
                "vertices": {vertices}, "triangles": [0, 1, 2]
            }} }} }} }} ]
        }}"#
        )
    }

    #[test]
    fn huge_weighted_bone_count_is_rejected() {
        let err = load(&weighted_mesh_json("[1e30, 0, 0, 0, 1]")).unwrap_err();
        let LoadError::InvalidMesh { attachment, message } = err else {
            panic!("expected InvalidMesh, got {err:?}");
        };
        assert_eq!(attachment, "m");
        assert!(message.contains("bone count"), "{message}");

        // a whole count that runs past the end of the array
        let err = load(&weighted_mesh_json("[4000000000, 0, 0, 0, 1]")).unwrap_err();
        assert!(matches!(err, LoadError::InvalidMesh { .. }), "{err:?}");
    }

    #[test]
    fn fractional_or_negative_bone_indices_are_rejected() {
        for verts in [
            "[1, -1, 0, 0, 1,  1, 0, 0, 0, 1,  1, 0, 0, 0, 1]",
            "[1, 1.5, 0, 0, 1,  1, 0, 0, 0, 1,  1, 0, 0, 0, 1]",
            "[1.5, 0, 0, 0, 1,  1, 0, 0, 0, 1,  1, 0, 0, 0, 1]",
            "[1, 2, 0, 0, 1,  1, 0, 0, 0, 1,  1, 0, 0, 0, 1]",
        ] {
            let err = load(&weighted_mesh_json(verts)).unwrap_err();
            assert!(matches!(err, LoadError::InvalidMesh { .. }), "{verts}: {err:?}");
        }
        let data = load(&weighted_mesh_json(
            "[1, 1, 0, 0, 1,  1, 0, 0, 0, 1,  1, 0, 0, 0, 1]",
        ))
        .expect("valid weights");
        assert_eq!(data.skins[0].len(), 1);
    }

    #[test]
    fn clipping_attachment_resolves_end_slot() {
        let json = r#"{
            "bones": [ { "name": "root" } ],
            "slots": [
                { "name": "mask", "bone": "root", "attachment": "clip" },
                { "name": "img", "bone": "root" }
            ],
            "skins": { "default": { "mask": { "clip": {
                "type": "clipping", "end": "img", "vertexCount": 3,
                "vertices": [0, 0, 10, 0, 0, 10], "color": "ce3a3aff"
            } } } }
        }"#;
        let data = load(json).expect("load");
        let Some(Attachment::Clipping(c)) = data.skins[0].get(0, "clip") else {
            panic!("expected clipping attachment");
        };
        assert_eq!(c.end, Some(1));
        assert_eq!(c.vertices.len(), 3);

        let bad_end = json.replace(r#""end": "img""#, r#""end": "nowhere""#);
        assert!(matches!(load(&bad_end), Err(LoadError::UndefinedSlot { .. })));
        let too_few = json.replace(r#""vertexCount": 3"#, r#""vertexCount": 2"#);
        assert!(matches!(load(&too_few), Err(LoadError::InvalidMesh { .. })));
    }

    #[test]
    fn events_are_resolved_and_extend_the_duration() {
        let json = r#"{
            "bones": [ { "name": "root" } ],
            "events": { "step": { "int": 3, "string": "left" }, "shout": {} },
            "animations": { "walk": {
                "bones": { "root": { "rotate": [ { "time": 0, "angle": 0 }, { "time": 0.5, "angle": 10 } ] } },
                "events": [
                    { "time": 0.25, "name": "step" },
                    { "time": 0.75, "name": "step", "int": 4, "float": 0.5 }
                ]
            } }
        }"#;
        let data = load(json).expect("load");
        assert_eq!(data.events.len(), 2);
        let anim = &data.animations[0];
        assert_eq!(anim.duration, 0.75);
        assert_eq!(anim.events[0].event, 0);
        assert_eq!(anim.events[0].int, 3);
        assert_eq!(anim.events[0].string.as_deref(), Some("left"));
        assert_eq!(anim.events[1].int, 4);
        assert_eq!(anim.events[1].float, 0.5);

        let undeclared = json.replace(r#""name": "step" },"#, r#""name": "jump" },"#);
        assert_eq!(
            load(&undeclared).unwrap_err(),
            LoadError::UndefinedEvent {
                event: "jump".into(),
                animation: "walk".into()
            }
        );
        let unordered = json.replace(r#""time": 0.75, "name""#, r#""time": 0.1, "name""#);
        assert!(matches!(load(&unordered), Err(LoadError::InvalidKeyframes { .. })));
    }

    #[test]
    fn single_axis_bone_timelines() {
        let json = r#"{
            "bones": [ { "name": "root" } ],
            "animations": { "a": { "bones": { "root": {
                "translatex": [ { "time": 0, "value": 5 } ],
                "scaley": [ { "time": 0 }, { "time": 2, "value": 3 } ]
            } } } }
        }"#;
        let data = load(json).expect("load");
        let anim = &data.animations[0];
        assert_eq!(anim.duration, 2.0);
        assert!(anim.timelines.iter().any(|t| matches!(
            t,
            Timeline::TranslateAxis { axis: Axis::X, frames, .. } if frames[0].value == 5.0
        )));
        assert!(anim.timelines.iter().any(|t| matches!(
            t,
            Timeline::ScaleAxis { axis: Axis::Y, frames, .. } if frames[0].value == 1.0
        )));
    }
}
