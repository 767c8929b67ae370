//! Discrete signals produced while the playback cursor advances.

use serde::{Deserialize, Serialize};

use crate::animation::LoopMode;
use crate::data::{Animation, SkeletonData};

/// Reported by `Scene::update` for the step that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SceneEvent {
    /// A non-looping animation reached its end. Reported once per selection.
    Completed { animation: String },
    /// A keyed event was crossed. `time` is the key's animation time.
    Keyframe {
        animation: String,
        name: String,
        time: f32,
        int: i32,
        float: f32,
        string: Option<String>,
    },
}

/// Push every key of `anim` whose cursor position lies in `(from, to]`
/// (`[from, to]` when `inclusive`), ordered by cursor and then in playback
/// direction. Looping modes report at most one period per step.
pub(crate) fn collect_keyed_events(
    data: &SkeletonData,
    anim: &Animation,
    mode: LoopMode,
    from: f32,
    to: f32,
    inclusive: bool,
    out: &mut Vec<SceneEvent>,
) {
    if anim.events.is_empty() || to < from {
        return;
    }
    let duration = anim.duration;
    let period = if duration > 0.0 {
        match mode {
            LoopMode::Loop | LoopMode::LoopBackward => Some(duration),
            LoopMode::PingPong => Some(2.0 * duration),
            _ => None,
        }
    } else {
        None
    };
    let (lo, inclusive) = match period {
        Some(p) if to - p > from => (to - p, false),
        _ => (from, inclusive),
    };

    // (cursor, period index, reversed, key index)
    let mut hits: Vec<(f32, f32, bool, usize)> = Vec::new();
    for (index, key) in anim.events.iter().enumerate() {
        let t = key.time;
        let mut bases: [Option<(f32, bool)>; 2] = [None, None];
        if duration <= 0.0 {
            bases[0] = Some((0.0, false));
        } else {
            match mode {
                LoopMode::Once | LoopMode::Loop => bases[0] = Some((t, false)),
                LoopMode::OnceBackward | LoopMode::LoopBackward => {
                    bases[0] = Some((duration - t, true))
                }
                LoopMode::OncePingPong => {
                    bases[0] = Some((t, false));
                    if t < duration {
                        bases[1] = Some((2.0 * duration - t, true));
                    }
                }
                LoopMode::PingPong => {
                    bases[0] = Some((t, false));
                    // the turnarounds at 0 and `duration` are crossed once
                    if t > 0.0 && t < duration {
                        bases[1] = Some((2.0 * duration - t, true));
                    }
                }
            }
        }
        for (base, reversed) in bases.into_iter().flatten() {
            let hit = |c: f32| c <= to && (c > lo || (inclusive && c == lo));
            match period {
                None => {
                    if hit(base) {
                        hits.push((base, 0.0, reversed, index));
                    }
                }
                Some(p) => {
                    let mut k = ((lo - base) / p).floor().max(0.0);
                    loop {
                        let c = base + k * p;
                        if c > to {
                            break;
                        }
                        if hit(c) {
                            hits.push((c, k, reversed, index));
                        }
                        k += 1.0;
                    }
                }
            }
        }
    }

    // a key at the end of one period precedes the start of the next
    hits.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| a.1.total_cmp(&b.1))
            .then_with(|| match (a.2, b.2) {
                (true, true) => b.3.cmp(&a.3),
                _ => a.3.cmp(&b.3),
            })
    });
    out.extend(hits.into_iter().filter_map(|(_, _, _, index)| {
        let key = &anim.events[index];
        let declared = data.events.get(key.event)?;
        Some(SceneEvent::Keyframe {
            animation: anim.name.clone(),
            name: declared.name.clone(),
            time: key.time,
            int: key.int,
            float: key.float,
            string: key.string.clone(),
        })
    }));
}
