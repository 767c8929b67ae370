//! Bone hierarchy resolution.
//!
//! Bones are stored parent-first, so a single pass in declaration order sees
//! every parent's world transform before its children need it.

use crate::data::{BoneData, LocalTransform};
use crate::error::LoadError;
use crate::math::Transform2D;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoneWorld {
    pub world: Transform2D,
    /// `None` when the world transform is singular (zero scale).
    pub inverse: Option<Transform2D>,
}

impl BoneWorld {
    fn new(world: Transform2D) -> Self {
        Self {
            world,
            inverse: world.inverse(),
        }
    }

    #[inline]
    pub fn local_to_world(&self, x: f32, y: f32) -> [f32; 2] {
        self.world.apply(x, y)
    }

    pub fn world_to_local(&self, x: f32, y: f32) -> Option<[f32; 2]> {
        self.inverse.map(|inv| inv.apply(x, y))
    }
}

/// Check that every parent index points at an earlier bone.
pub fn validate_order(bones: &[BoneData]) -> Result<(), LoadError> {
    for bone in bones {
        if let Some(p) = bone.parent {
            if p >= bone.index {
                let parent = bones
                    .get(p)
                    .map(|b| b.name.clone())
                    .unwrap_or_else(|| format!("#{p}"));
                return Err(LoadError::ForwardReference {
                    bone: bone.name.clone(),
                    parent,
                });
            }
        }
    }
    Ok(())
}

/// Setup-pose world transforms, validating the hierarchy first.
pub fn resolve_setup(bones: &[BoneData]) -> Result<Vec<BoneWorld>, LoadError> {
    validate_order(bones)?;
    let locals: Vec<LocalTransform> = bones.iter().map(|b| b.setup).collect();
    let mut out = Vec::with_capacity(bones.len());
    update_world(bones, &locals, &mut out);
    Ok(out)
}

/// Recompute world transforms for `locals` into `out` (resized to fit).
///
/// Expects a hierarchy that passed [`validate_order`].
pub fn update_world(bones: &[BoneData], locals: &[LocalTransform], out: &mut Vec<BoneWorld>) {
    out.clear();
    for (bone, local) in bones.iter().zip(locals) {
        let local_m = Transform2D::from_local(local);
        let world = match bone.parent.and_then(|p| out.get(p)) {
            None => local_m,
            Some(parent) => {
                let w = parent.world.mul(&local_m);
                if bone.inherit_scale {
                    w
                } else {
                    w.with_scale(local.scale_x, local.scale_y)
                }
            }
        };
        out.push(BoneWorld::new(world));
    }
}
