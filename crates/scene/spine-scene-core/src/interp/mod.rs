//! Keyframe interpolation helpers.
//!
//! Curves ease the normalized segment time; values are then blended linearly
//! (angles along the shortest arc).

pub mod functions;

use crate::data::Curve;

/// Eased segment time for `curve` at normalized `t`, or `None` for stepped curves
/// (the caller holds the left keyframe).
#[inline]
pub fn ease(curve: &Curve, t: f32) -> Option<f32> {
    match curve {
        Curve::Linear => Some(t.clamp(0.0, 1.0)),
        Curve::Stepped => None,
        Curve::Bezier([x1, y1, x2, y2]) => Some(functions::bezier_ease(t, *x1, *y1, *x2, *y2)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepped_holds() {
        assert_eq!(ease(&Curve::Stepped, 0.7), None);
        assert_eq!(ease(&Curve::Linear, 0.25), Some(0.25));
        let linear_bezier = Curve::Bezier([0.0, 0.0, 1.0, 1.0]);
        assert_eq!(ease(&linear_bezier, 0.4), Some(0.4));
    }
}
