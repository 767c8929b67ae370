//! Opaque scene handles.

use serde::{Deserialize, Serialize};

/// Handle to a scene owned by a [`SceneHost`](crate::host::SceneHost).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneHandle(pub u32);

/// Monotonic handle allocator. Handles are never reused, so a destroyed handle
/// can not alias a later scene. Starts at 1 to keep 0 free as a null value.
#[derive(Debug)]
pub struct HandleAllocator {
    next: u32,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` once the 32-bit space is exhausted.
    #[inline]
    pub fn alloc(&mut self) -> Option<SceneHandle> {
        let id = self.next;
        self.next = self.next.checked_add(1)?;
        Some(SceneHandle(id))
    }
}
