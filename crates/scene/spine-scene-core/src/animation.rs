//! Animation state and pose evaluation.
//!
//! The pose is rebuilt from the setup pose on every evaluation, so it only
//! depends on the animation and the cursor, never on the update history.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::data::{Animation, Axis, Color, LocalTransform, SkeletonData, Timeline};
use crate::events::{collect_keyed_events, SceneEvent};
use crate::sampling::{sample_angle, sample_color, sample_scalar, sample_step, sample_vec2};

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Play to the end and hold the last frame.
    Once,
    /// Play from the end to the start and hold the first frame.
    OnceBackward,
    #[default]
    Loop,
    LoopBackward,
    /// Alternate forward and backward.
    PingPong,
    /// Forward, then backward once, then hold the first frame.
    OncePingPong,
}

impl LoopMode {
    pub fn is_looping(self) -> bool {
        matches!(self, LoopMode::Loop | LoopMode::LoopBackward | LoopMode::PingPong)
    }

    pub fn is_backward(self) -> bool {
        matches!(self, LoopMode::OnceBackward | LoopMode::LoopBackward)
    }

    /// Cursor distance covered by one complete play, `None` for looping modes.
    pub fn play_length(self, duration: f32) -> Option<f32> {
        match self {
            LoopMode::Once | LoopMode::OnceBackward => Some(duration.max(0.0)),
            LoopMode::OncePingPong => Some(2.0 * duration.max(0.0)),
            LoopMode::Loop | LoopMode::LoopBackward | LoopMode::PingPong => None,
        }
    }
}

/// Per-slot attachment overrides applied under the animation.
pub type AttachmentOverrides = HashMap<usize, Option<String>>;

#[derive(Clone, Debug, PartialEq)]
pub struct SlotPose {
    pub color: Color,
    /// Placeholder name resolved through the active skin.
    pub attachment: Option<String>,
}

/// Evaluated local state of every bone and slot.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    /// Animation time the pose was sampled at.
    pub time: f32,
    pub bones: Vec<LocalTransform>,
    pub slots: Vec<SlotPose>,
    /// Slot indices, back to front.
    pub draw_order: Vec<usize>,
}

impl Pose {
    pub fn setup(data: &SkeletonData) -> Self {
        let mut pose = Self {
            time: 0.0,
            bones: Vec::with_capacity(data.bones.len()),
            slots: Vec::with_capacity(data.slots.len()),
            draw_order: Vec::with_capacity(data.slots.len()),
        };
        pose.reset(data);
        pose
    }

    /// Overwrite everything with the setup pose, keeping allocations.
    pub fn reset(&mut self, data: &SkeletonData) {
        self.time = 0.0;
        self.bones.clear();
        self.bones.extend(data.bones.iter().map(|b| b.setup));
        self.reset_slots(data);
        self.draw_order.clear();
        self.draw_order.extend(0..data.slots.len());
    }

    /// Slot colors and attachments back to setup (bones untouched).
    pub fn reset_slots(&mut self, data: &SkeletonData) {
        self.slots.clear();
        self.slots.extend(data.slots.iter().map(|s| SlotPose {
            color: s.color,
            attachment: s.attachment.clone(),
        }));
    }
}

/// Map an unbounded cursor into `[0, duration]`.
pub fn animation_time(cursor: f32, duration: f32, mode: LoopMode) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    match mode {
        LoopMode::Once => cursor.clamp(0.0, duration),
        LoopMode::OnceBackward => duration - cursor.clamp(0.0, duration),
        LoopMode::Loop => fmod(cursor, duration),
        LoopMode::LoopBackward => duration - fmod(cursor, duration),
        LoopMode::PingPong => ping_pong(cursor, duration),
        LoopMode::OncePingPong => ping_pong(cursor.clamp(0.0, 2.0 * duration), duration),
    }
}

pub(crate) fn fmod(a: f32, b: f32) -> f32 {
    if b == 0.0 {
        return 0.0;
    }
    let m = a % b;
    if (m < 0.0 && b > 0.0) || (m > 0.0 && b < 0.0) {
        m + b
    } else {
        m
    }
}

/// Reflect t into [0, span] with a period of 2 * span.
fn ping_pong(t: f32, span: f32) -> f32 {
    if span <= 0.0 {
        return 0.0;
    }
    let m = fmod(t, 2.0 * span);
    if m <= span {
        m
    } else {
        2.0 * span - m
    }
}

/// Apply every timeline of `anim` at `time` on top of `pose`, which is expected
/// to hold the setup pose.
pub fn apply_animation(data: &SkeletonData, anim: &Animation, time: f32, pose: &mut Pose) {
    pose.time = time;
    for timeline in &anim.timelines {
        match timeline {
            Timeline::Rotate { bone, frames } => {
                if let (Some(delta), Some(local)) = (sample_angle(frames, time), pose.bones.get_mut(*bone)) {
                    local.rotation = data.bones[*bone].setup.rotation + delta;
                }
            }
            Timeline::Translate { bone, frames } => {
                if let (Some([dx, dy]), Some(local)) = (sample_vec2(frames, time), pose.bones.get_mut(*bone)) {
                    let setup = &data.bones[*bone].setup;
                    local.x = setup.x + dx;
                    local.y = setup.y + dy;
                }
            }
            Timeline::Scale { bone, frames } => {
                if let (Some([sx, sy]), Some(local)) = (sample_vec2(frames, time), pose.bones.get_mut(*bone)) {
                    let setup = &data.bones[*bone].setup;
                    local.scale_x = setup.scale_x * sx;
                    local.scale_y = setup.scale_y * sy;
                }
            }
            Timeline::TranslateAxis { bone, axis, frames } => {
                if let (Some(d), Some(local)) = (sample_scalar(frames, time), pose.bones.get_mut(*bone)) {
                    let setup = &data.bones[*bone].setup;
                    match axis {
                        Axis::X => local.x = setup.x + d,
                        Axis::Y => local.y = setup.y + d,
                    }
                }
            }
            Timeline::ScaleAxis { bone, axis, frames } => {
                if let (Some(s), Some(local)) = (sample_scalar(frames, time), pose.bones.get_mut(*bone)) {
                    let setup = &data.bones[*bone].setup;
                    match axis {
                        Axis::X => local.scale_x = setup.scale_x * s,
                        Axis::Y => local.scale_y = setup.scale_y * s,
                    }
                }
            }
            Timeline::Color { slot, frames } => {
                if let (Some(color), Some(sp)) = (sample_color(frames, time), pose.slots.get_mut(*slot)) {
                    sp.color = color;
                }
            }
            Timeline::Attachment { slot, frames } => {
                if let (Some(name), Some(sp)) = (sample_step(frames, time), pose.slots.get_mut(*slot)) {
                    sp.attachment = name.clone();
                }
            }
            Timeline::DrawOrder { frames } => {
                if let Some(order) = sample_step(frames, time) {
                    pose.draw_order.clear();
                    match order {
                        Some(order) => pose.draw_order.extend_from_slice(order),
                        None => pose.draw_order.extend(0..data.slots.len()),
                    }
                }
            }
        }
    }
}

/// Selected animation plus its playback cursor.
#[derive(Clone, Debug)]
pub struct AnimationState {
    pub current: Option<usize>,
    /// Seconds of playback since the animation was selected, scaled by `rate`.
    pub cursor: f32,
    pub mode: LoopMode,
    /// Multiplier on every time step.
    pub rate: f32,
    /// Keyed events exactly at the cursor are still due (first step after a selection).
    primed: bool,
    completed: bool,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self::new(LoopMode::default())
    }
}

impl AnimationState {
    pub fn new(mode: LoopMode) -> Self {
        Self {
            current: None,
            cursor: 0.0,
            mode,
            rate: 1.0,
            primed: false,
            completed: false,
        }
    }

    /// Select `index` starting at `cursor`. Re-selecting the active animation is a no-op.
    pub fn select(&mut self, index: usize, cursor: f32) -> bool {
        if self.current == Some(index) {
            return false;
        }
        self.current = Some(index);
        self.cursor = cursor;
        self.primed = true;
        self.completed = false;
        true
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.cursor = 0.0;
        self.primed = false;
        self.completed = false;
    }

    #[inline]
    pub fn advance(&mut self, dt: f32) {
        self.cursor += dt;
    }

    /// Advance by `dt * rate` and report keyed events crossed on the way, then
    /// completion once a non-looping play reaches its end.
    pub fn step(&mut self, data: &SkeletonData, dt: f32, events: &mut Vec<SceneEvent>) {
        let from = self.cursor;
        self.advance(dt * self.rate);
        let Some(anim) = self.current.and_then(|i| data.animations.get(i)) else {
            return;
        };
        collect_keyed_events(data, anim, self.mode, from, self.cursor, self.primed, events);
        self.primed = false;
        if self.completed {
            return;
        }
        if let Some(end) = self.mode.play_length(anim.duration) {
            if self.cursor >= end {
                self.completed = true;
                events.push(SceneEvent::Completed {
                    animation: anim.name.clone(),
                });
            }
        }
    }

    /// Rebuild `pose` for the current cursor. Overrides replace setup
    /// attachments; attachment timelines still take precedence.
    pub fn evaluate(&self, data: &SkeletonData, overrides: &AttachmentOverrides, pose: &mut Pose) {
        pose.reset(data);
        for (&slot, name) in overrides {
            if let Some(sp) = pose.slots.get_mut(slot) {
                sp.attachment = name.clone();
            }
        }
        let Some(anim) = self.current.and_then(|i| data.animations.get(i)) else {
            return;
        };
        let t = animation_time(self.cursor, anim.duration, self.mode);
        apply_animation(data, anim, t, pose);
    }
}
