//! Timeline sampling.
//!
//! Model:
//! - Keyframes are sorted by time (non-decreasing); identical times are allowed.
//! - At time `t` the active keyframe is the LAST one with `time <= t`, so of two
//!   keyframes sharing a timestamp the later-declared one wins.
//! - Before the first keyframe the timeline yields nothing and the setup value stays.
//! - Between keyframes the left keyframe's curve eases the segment time;
//!   stepped curves hold the left value.

use crate::data::{Color, Keyframe};
use crate::interp::ease;
use crate::interp::functions::{lerp_angle, lerp_f32, lerp_vec2, lerp_vec4};

/// Where `time` falls within a keyframe list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Segment {
    /// No keyframes, or `time` precedes the first one.
    Before,
    /// Hold keyframe `i` (last keyframe, or a stepped curve).
    Hold(usize),
    /// Blend from `left` to `left + 1` with eased weight `t`.
    Between { left: usize, t: f32 },
}

pub fn find_segment<T>(frames: &[Keyframe<T>], time: f32) -> Segment {
    let Some(first) = frames.first() else {
        return Segment::Before;
    };
    if time < first.time {
        return Segment::Before;
    }
    // first index with frame.time > time, minus one: the last frame at or before `time`
    let left = frames.partition_point(|f| f.time <= time) - 1;
    if left + 1 >= frames.len() {
        return Segment::Hold(left);
    }
    let l = &frames[left];
    let r = &frames[left + 1];
    let span = r.time - l.time;
    if span <= 0.0 {
        return Segment::Hold(left);
    }
    match ease(&l.curve, (time - l.time) / span) {
        Some(t) => Segment::Between { left, t },
        None => Segment::Hold(left),
    }
}

fn sample_with<T: Clone>(
    frames: &[Keyframe<T>],
    time: f32,
    blend: impl Fn(&T, &T, f32) -> T,
) -> Option<T> {
    match find_segment(frames, time) {
        Segment::Before => None,
        Segment::Hold(i) => Some(frames[i].value.clone()),
        Segment::Between { left, t } => {
            Some(blend(&frames[left].value, &frames[left + 1].value, t))
        }
    }
}

pub fn sample_scalar(frames: &[Keyframe<f32>], time: f32) -> Option<f32> {
    sample_with(frames, time, |a, b, t| lerp_f32(*a, *b, t))
}

/// Degrees, interpolated along the shortest arc.
pub fn sample_angle(frames: &[Keyframe<f32>], time: f32) -> Option<f32> {
    sample_with(frames, time, |a, b, t| lerp_angle(*a, *b, t))
}

pub fn sample_vec2(frames: &[Keyframe<[f32; 2]>], time: f32) -> Option<[f32; 2]> {
    sample_with(frames, time, |a, b, t| lerp_vec2(*a, *b, t))
}

pub fn sample_color(frames: &[Keyframe<Color>], time: f32) -> Option<Color> {
    sample_with(frames, time, |a, b, t| lerp_vec4(*a, *b, t))
}

/// Stepped sampling regardless of curves (attachments, draw order).
pub fn sample_step<T>(frames: &[Keyframe<T>], time: f32) -> Option<&T> {
    let first = frames.first()?;
    if time < first.time {
        return None;
    }
    let idx = frames.partition_point(|f| f.time <= time) - 1;
    frames.get(idx).map(|f| &f.value)
}
