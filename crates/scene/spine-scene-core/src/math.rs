//! 2D affine transforms used for bone world matrices.
//!
//! Layout follows the usual skeletal convention:
//! `x' = a*x + b*y + tx`, `y' = c*x + d*y + ty`. The first column `(a, c)` is the
//! bone's local x axis expressed in world space, the second `(b, d)` its y axis.

use serde::{Deserialize, Serialize};

use crate::data::LocalTransform;

const SINGULAR_EPS: f32 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Translation, rotation (degrees) and non-uniform scale, applied as T * R * S.
    pub fn from_local(local: &LocalTransform) -> Self {
        let (sin, cos) = local.rotation.to_radians().sin_cos();
        Self {
            a: cos * local.scale_x,
            b: -sin * local.scale_y,
            c: sin * local.scale_x,
            d: cos * local.scale_y,
            tx: local.x,
            ty: local.y,
        }
    }

    /// `self * rhs`: applies `rhs` first, then `self`.
    #[inline]
    pub fn mul(&self, rhs: &Self) -> Self {
        Self {
            a: self.a * rhs.a + self.b * rhs.c,
            b: self.a * rhs.b + self.b * rhs.d,
            c: self.c * rhs.a + self.d * rhs.c,
            d: self.c * rhs.b + self.d * rhs.d,
            tx: self.a * rhs.tx + self.b * rhs.ty + self.tx,
            ty: self.c * rhs.tx + self.d * rhs.ty + self.ty,
        }
    }

    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> [f32; 2] {
        [
            self.a * x + self.b * y + self.tx,
            self.c * x + self.d * y + self.ty,
        ]
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform, or `None` when the linear part is singular (zero scale).
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() <= SINGULAR_EPS || !det.is_finite() {
            return None;
        }
        let inv = det.recip();
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Self {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + b * self.ty),
            ty: -(c * self.tx + d * self.ty),
        })
    }

    #[inline]
    pub fn translation(&self) -> [f32; 2] {
        [self.tx, self.ty]
    }

    /// World rotation of the x axis, in degrees.
    #[inline]
    pub fn rotation(&self) -> f32 {
        self.c.atan2(self.a).to_degrees()
    }

    #[inline]
    pub fn scale_x(&self) -> f32 {
        self.a.hypot(self.c)
    }

    #[inline]
    pub fn scale_y(&self) -> f32 {
        self.b.hypot(self.d)
    }

    /// Keep translation and the direction of the x axis, but replace the scale
    /// (and any shear picked up from ancestors) with `(scale_x, scale_y)`.
    pub fn with_scale(&self, scale_x: f32, scale_y: f32) -> Self {
        let len = self.scale_x();
        let (ux, uy) = if len > SINGULAR_EPS {
            (self.a / len, self.c / len)
        } else {
            (1.0, 0.0)
        };
        Self {
            a: ux * scale_x,
            b: -uy * scale_y,
            c: uy * scale_x,
            d: ux * scale_y,
            tx: self.tx,
            ty: self.ty,
        }
    }

    /// Column-major 4x4 matrix with the affine part in the xy plane.
    pub fn to_mat4(&self) -> [f32; 16] {
        [
            self.a, self.c, 0.0, 0.0, //
            self.b, self.d, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            self.tx, self.ty, 0.0, 1.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-4, "left={a} right={b}");
    }

    #[test]
    fn rotation_then_translation() {
        let t = Transform2D::from_local(&LocalTransform {
            x: 10.0,
            y: 0.0,
            rotation: 90.0,
            scale_x: 2.0,
            scale_y: 1.0,
        });
        let p = t.apply(1.0, 0.0);
        approx(p[0], 10.0);
        approx(p[1], 2.0);
        approx(t.rotation(), 90.0);
        approx(t.scale_x(), 2.0);
    }

    #[test]
    fn inverse_round_trips_points() {
        let t = Transform2D::from_local(&LocalTransform {
            x: 3.0,
            y: -4.0,
            rotation: 33.0,
            scale_x: 1.5,
            scale_y: 0.5,
        });
        let inv = t.inverse().expect("invertible");
        let p = t.apply(7.0, 2.0);
        let q = inv.apply(p[0], p[1]);
        approx(q[0], 7.0);
        approx(q[1], 2.0);
        approx(t.mul(&inv).a, 1.0);
    }

    #[test]
    fn zero_scale_has_no_inverse() {
        let t = Transform2D::from_local(&LocalTransform {
            scale_x: 0.0,
            ..LocalTransform::default()
        });
        assert!(t.inverse().is_none());
    }

    #[test]
    fn with_scale_keeps_direction() {
        let t = Transform2D::from_local(&LocalTransform {
            rotation: 45.0,
            scale_x: 3.0,
            scale_y: 3.0,
            ..LocalTransform::default()
        })
        .with_scale(1.0, 2.0);
        approx(t.rotation(), 45.0);
        approx(t.scale_x(), 1.0);
        approx(t.scale_y(), 2.0);
    }
}
