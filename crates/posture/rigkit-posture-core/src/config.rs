//! Document-wide settings.

use rigkit_api_core::{Frame, Invalid, RigError};
use rigkit_rig_core::influence::DEFAULT_MAX_INFLUENCES;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Last addressable frame, inclusive.
    pub max_frame: Frame,
    /// Playback rate in frames per second.
    pub frame_rate: u32,
    /// Upper bound on bones influencing one vertex.
    pub max_influences_per_vertex: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_frame: 300,
            frame_rate: 24,
            max_influences_per_vertex: DEFAULT_MAX_INFLUENCES,
        }
    }
}

impl DocumentConfig {
    pub fn check_frame(&self, frame: Frame) -> Result<(), RigError> {
        if frame > self.max_frame {
            return Err(Invalid::FrameOutOfRange {
                frame,
                max: self.max_frame,
            }
            .into());
        }
        Ok(())
    }

    /// Wall-clock seconds at `frame`.
    pub fn seconds(&self, frame: Frame) -> f32 {
        frame as f32 / self.frame_rate.max(1) as f32
    }
}
