//! Frame-indexed keys for one attribute.

use rigkit_api_core::{Blend, Frame, Invalid, RigError};
use serde::{Deserialize, Serialize};

use crate::easing::Easing;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub frame: Frame,
    pub value: T,
    /// How progress flows from the previous key toward this one.
    #[serde(default)]
    pub easing: Easing,
}

impl<T> Keyframe<T> {
    pub fn new(frame: Frame, value: T, easing: Easing) -> Self {
        Self {
            frame,
            value,
            easing,
        }
    }
}

/// A default value plus keys kept in strictly increasing frame order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyedAttribute<T> {
    default: T,
    #[serde(default = "Vec::new")]
    keys: Vec<Keyframe<T>>,
}

impl<T: Default> Default for KeyedAttribute<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> KeyedAttribute<T> {
    pub fn new(default: T) -> Self {
        Self {
            default,
            keys: Vec::new(),
        }
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Replace the unkeyed value. Returns the previous one.
    pub fn set_default(&mut self, value: T) -> T {
        std::mem::replace(&mut self.default, value)
    }

    pub fn keys(&self) -> &[Keyframe<T>] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn position(&self, frame: Frame) -> Result<usize, usize> {
        self.keys.binary_search_by_key(&frame, |k| k.frame)
    }

    pub fn has_key(&self, frame: Frame) -> bool {
        self.position(frame).is_ok()
    }

    pub fn key(&self, frame: Frame) -> Option<&Keyframe<T>> {
        self.position(frame).ok().map(|i| &self.keys[i])
    }

    pub fn key_frames(&self) -> Vec<Frame> {
        self.keys.iter().map(|k| k.frame).collect()
    }

    /// Last key strictly before `frame`.
    pub fn prev_key_frame(&self, frame: Frame) -> Option<Frame> {
        let idx = self.keys.partition_point(|k| k.frame < frame);
        idx.checked_sub(1).map(|i| self.keys[i].frame)
    }

    /// First key strictly after `frame`.
    pub fn next_key_frame(&self, frame: Frame) -> Option<Frame> {
        let idx = self.keys.partition_point(|k| k.frame <= frame);
        self.keys.get(idx).map(|k| k.frame)
    }

    /// The stepped value at `frame`: the last key at or before it, else the
    /// default. Borrows instead of cloning.
    pub fn hold_value(&self, frame: Frame) -> &T {
        let idx = self.keys.partition_point(|k| k.frame <= frame);
        match idx.checked_sub(1) {
            Some(i) => &self.keys[i].value,
            None => &self.default,
        }
    }

    /// Mutable access to the value an edit at `frame` should change: the key
    /// at `frame`, or the default when `frame` is `None`.
    pub fn target_mut(&mut self, frame: Option<Frame>) -> Option<&mut T> {
        match frame {
            None => Some(&mut self.default),
            Some(f) => {
                let i = self.position(f).ok()?;
                Some(&mut self.keys[i].value)
            }
        }
    }

    pub fn target(&self, frame: Option<Frame>) -> Option<&T> {
        match frame {
            None => Some(&self.default),
            Some(f) => self.key(f).map(|k| &k.value),
        }
    }

    /// Insert a key. An existing key at the same frame is replaced in place
    /// and returned.
    pub fn push_key(&mut self, frame: Frame, value: T, easing: Easing) -> Option<Keyframe<T>> {
        let key = Keyframe::new(frame, value, easing);
        match self.position(frame) {
            Ok(i) => Some(std::mem::replace(&mut self.keys[i], key)),
            Err(i) => {
                self.keys.insert(i, key);
                None
            }
        }
    }

    pub fn insert_key(&mut self, key: Keyframe<T>) -> Option<Keyframe<T>> {
        let Keyframe {
            frame,
            value,
            easing,
        } = key;
        self.push_key(frame, value, easing)
    }

    pub fn delete_key(&mut self, frame: Frame) -> Result<Keyframe<T>, RigError> {
        let i = self
            .position(frame)
            .map_err(|_| Invalid::KeyNotFound { frame })?;
        Ok(self.keys.remove(i))
    }

    /// Move the key at `from` to `to`. A key already at `to` is an error
    /// unless `overwrite` is set, in which case it is removed and returned.
    pub fn move_key(&mut self, from: Frame, to: Frame, overwrite: bool) -> Result<Option<Keyframe<T>>, RigError> {
        if !self.has_key(from) {
            return Err(Invalid::KeyNotFound { frame: from }.into());
        }
        if from == to {
            return Ok(None);
        }
        if self.has_key(to) && !overwrite {
            return Err(Invalid::FrameOccupied { frame: to }.into());
        }
        if self.has_key(to) {
            log::trace!("key at {to} overwritten by move from {from}");
        }
        let mut key = self.delete_key(from)?;
        key.frame = to;
        Ok(self.insert_key(key))
    }

    pub fn set_easing(&mut self, frame: Frame, easing: Easing) -> Result<Easing, RigError> {
        easing.validate()?;
        let i = self
            .position(frame)
            .map_err(|_| Invalid::KeyNotFound { frame })?;
        Ok(std::mem::replace(&mut self.keys[i].easing, easing))
    }

    /// Replace the value of an existing key. Returns the previous value.
    pub fn set_key_value(&mut self, frame: Frame, value: T) -> Result<T, RigError> {
        let slot = self
            .target_mut(Some(frame))
            .ok_or(Invalid::KeyNotFound { frame })?;
        Ok(std::mem::replace(slot, value))
    }

    /// Apply `f` to the default and every key value.
    pub fn for_each_value_mut(&mut self, mut f: impl FnMut(Option<Frame>, &mut T)) {
        f(None, &mut self.default);
        for key in &mut self.keys {
            f(Some(key.frame), &mut key.value);
        }
    }

    pub fn validate(&self) -> Result<(), RigError> {
        for pair in self.keys.windows(2) {
            if pair[0].frame >= pair[1].frame {
                return Err(Invalid::FrameOccupied {
                    frame: pair[1].frame,
                }
                .into());
            }
        }
        for key in &self.keys {
            key.easing.validate()?;
        }
        Ok(())
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.keys.last().map(|k| k.frame)
    }
}

impl<T: Blend> KeyedAttribute<T> {
    /// Value at `frame`. Pure; never mutates.
    pub fn sample(&self, frame: Frame) -> T {
        let idx = self.keys.partition_point(|k| k.frame <= frame);
        if idx == 0 {
            return self.default.clone();
        }
        let prev = &self.keys[idx - 1];
        if prev.frame == frame || idx == self.keys.len() || T::is_stepped() {
            return prev.value.clone();
        }
        let next = &self.keys[idx];
        let span = (next.frame - prev.frame) as f32;
        let t = (frame - prev.frame) as f32 / span;
        let progress = next.easing.apply(t);
        T::blend(&prev.value, &next.value, progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::{EasingKind, EasingRange};
    use glam::Vec2;

    fn scenario() -> KeyedAttribute<Vec2> {
        let mut attr = KeyedAttribute::new(Vec2::ZERO);
        attr.push_key(10, Vec2::new(10.0, 10.0), Easing::LINEAR);
        attr.push_key(20, Vec2::new(20.0, 0.0), Easing::LINEAR);
        attr
    }

    #[test]
    fn linear_scenario() {
        let attr = scenario();
        assert_eq!(attr.sample(5), Vec2::ZERO);
        assert_eq!(attr.sample(10), Vec2::new(10.0, 10.0));
        assert_eq!(attr.sample(15), Vec2::new(15.0, 5.0));
        assert_eq!(attr.sample(20), Vec2::new(20.0, 0.0));
        assert_eq!(attr.sample(30), Vec2::new(20.0, 0.0));
    }

    #[test]
    fn key_frames_are_exact_for_every_easing() {
        for kind in EasingKind::ALL {
            let mut attr = KeyedAttribute::new(0.0f32);
            attr.push_key(3, 1.25, Easing::curve(kind, EasingRange::Out));
            attr.push_key(9, -7.5, Easing::curve(kind, EasingRange::InOut));
            assert_eq!(attr.sample(3), 1.25, "{kind:?}");
            assert_eq!(attr.sample(9), -7.5, "{kind:?}");
        }
    }

    #[test]
    fn later_key_easing_shapes_the_segment() {
        let mut attr = KeyedAttribute::new(0.0f32);
        attr.push_key(0, 0.0, Easing::LINEAR);
        attr.push_key(10, 10.0, Easing::curve(EasingKind::Quad, EasingRange::In));
        assert!((attr.sample(5) - 2.5).abs() < 1e-5);
        attr.set_easing(10, Easing::HOLD).unwrap();
        assert_eq!(attr.sample(9), 0.0);
    }

    #[test]
    fn push_at_occupied_frame_replaces() {
        let mut attr = scenario();
        let old = attr.push_key(10, Vec2::ONE, Easing::LINEAR).unwrap();
        assert_eq!(old.value, Vec2::new(10.0, 10.0));
        assert_eq!(attr.len(), 2);
        assert_eq!(attr.sample(10), Vec2::ONE);
    }

    #[test]
    fn move_key_respects_occupied_frames() {
        let mut attr = scenario();
        let err = attr.move_key(10, 20, false).unwrap_err();
        assert_eq!(err.invalid(), Some(&Invalid::FrameOccupied { frame: 20 }));
        assert_eq!(attr, scenario());

        let replaced = attr.move_key(10, 20, true).unwrap().unwrap();
        assert_eq!(replaced.value, Vec2::new(20.0, 0.0));
        assert_eq!(attr.key_frames(), vec![20]);

        let mut attr = scenario();
        attr.move_key(20, 5, false).unwrap();
        assert_eq!(attr.key_frames(), vec![5, 10]);
        attr.validate().unwrap();
    }

    #[test]
    fn delete_missing_key_fails() {
        let mut attr = scenario();
        assert!(attr.delete_key(11).is_err());
        assert_eq!(attr.delete_key(10).unwrap().frame, 10);
        assert_eq!(attr.key_frames(), vec![20]);
    }

    #[test]
    fn navigation_and_hold() {
        let attr = scenario();
        assert_eq!(attr.prev_key_frame(10), None);
        assert_eq!(attr.prev_key_frame(15), Some(10));
        assert_eq!(attr.next_key_frame(10), Some(20));
        assert_eq!(attr.next_key_frame(20), None);
        assert_eq!(*attr.hold_value(15), Vec2::new(10.0, 10.0));
        assert_eq!(*attr.hold_value(2), Vec2::ZERO);
    }

    #[test]
    fn sampling_is_idempotent() {
        let attr = scenario();
        assert_eq!(attr.sample(13), attr.sample(13));
    }
}
