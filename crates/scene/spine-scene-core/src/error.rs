//! Error taxonomy for loading and driving a scene.

use thiserror::Error;

/// Structural failures while building a scene. A load that fails never yields a
/// partially constructed scene.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    #[error("skeleton '{path}' is not a valid skeleton document: {message}")]
    Json { path: String, message: String },
    #[error("atlas '{path}' line {line}: {message}")]
    Atlas {
        path: String,
        line: usize,
        message: String,
    },
    #[error("bone '{0}' is declared more than once")]
    DuplicateBone(String),
    #[error("parent bone '{parent}' does not exist (referenced by bone '{bone}')")]
    UndefinedParent { bone: String, parent: String },
    #[error("bone '{bone}' references parent '{parent}' which is not declared before it")]
    ForwardReference { bone: String, parent: String },
    #[error("bone '{bone}' does not exist (referenced by {referrer})")]
    UndefinedBone { bone: String, referrer: String },
    #[error("slot '{slot}' does not exist (referenced by {referrer})")]
    UndefinedSlot { slot: String, referrer: String },
    #[error("slot '{0}' is declared more than once")]
    DuplicateSlot(String),
    #[error("animation '{animation}': {message}")]
    InvalidKeyframes { animation: String, message: String },
    #[error("mesh attachment '{attachment}': {message}")]
    InvalidMesh { attachment: String, message: String },
    #[error("slot '{slot}' uses unknown blend mode '{blend}'")]
    UnknownBlendMode { slot: String, blend: String },
    #[error("invalid color '{0}' (expected RRGGBB or RRGGBBAA hex)")]
    InvalidColor(String),
    #[error("event '{event}' is not declared (keyed by animation '{animation}')")]
    UndefinedEvent { event: String, animation: String },
}

/// Failures of per-frame operations. None of them modifies the scene.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("time delta must be finite and non-negative, got {0}")]
    InvalidTimeDelta(f32),
    #[error("playback rate must be finite and non-negative, got {0}")]
    InvalidPlaybackRate(f32),
}

impl SceneError {
    pub(crate) fn animation(name: &str) -> Self {
        SceneError::NotFound {
            kind: "animation",
            name: name.to_string(),
        }
    }

    pub(crate) fn skin(name: &str) -> Self {
        SceneError::NotFound {
            kind: "skin",
            name: name.to_string(),
        }
    }

    pub(crate) fn slot(name: &str) -> Self {
        SceneError::NotFound {
            kind: "slot",
            name: name.to_string(),
        }
    }

    pub(crate) fn attachment(name: &str) -> Self {
        SceneError::NotFound {
            kind: "attachment",
            name: name.to_string(),
        }
    }
}
