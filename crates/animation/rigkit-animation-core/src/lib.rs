//! rigkit-animation-core: keyed attributes and per-object timelines.
//!
//! Sampling rules for a `KeyedAttribute<T>` at frame `f`:
//! - no keys, or `f` before the first key: the default value
//! - `f` on a key: that key's value, untouched by easing
//! - `f` at or after the last key: the last key's value
//! - otherwise: blend between the bracketing keys using the later key's
//!   easing; stepped kinds hold the earlier key

pub mod easing;
pub mod keyframe;
pub mod timeline;
pub mod value;

pub use easing::{Easing, EasingKind, EasingRange};
pub use keyframe::{KeyedAttribute, Keyframe};
pub use timeline::{KeySnapshot, ObjectTimeline, TimelineSample};
pub use value::{AttrValue, AttributeKind, ImageValue};
