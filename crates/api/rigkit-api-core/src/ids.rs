//! Identifiers and a monotonic allocator for core entities.
//!
//! Ids are dense `u32` values wrapped in distinct newtypes so a bone id can
//! never be handed to a mesh lookup. Containers own their allocator and
//! serialize it, keeping ids stable across save/load.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// An animatable object owned by a document.
    ObjectId,
    "obj#"
);
define_id!(
    /// A bone inside one object's rig.
    BoneId,
    "bone#"
);
define_id!(
    /// A vertex inside one mesh topology.
    VertexId,
    "vtx#"
);
define_id!(
    /// A triangle inside one mesh topology.
    TriangleId,
    "tri#"
);

/// Monotonic allocator. Ids are never reused, even after removal, so undo can
/// restore an entity under its original id without colliding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc<I: From<u32>>(&mut self) -> I {
        let id = I::from(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }

    /// Make sure `raw` will never be handed out again.
    #[inline]
    pub fn reserve(&mut self, raw: u32) {
        if raw >= self.next {
            self.next = raw.wrapping_add(1);
        }
    }

    #[inline]
    pub fn peek(&self) -> u32 {
        self.next
    }
}
