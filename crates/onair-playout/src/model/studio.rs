//! Studios and show styles.
//!
//! A studio is one physical/logical playout environment: one timeline
//! output and one set of playout settings. At most one playlist may be
//! active per studio at any time.

use serde::{Deserialize, Serialize};

use onair_core::{ShowStyleId, StudioId};

/// One device layer scanned by the lookahead pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookaheadLayer {
    /// The timeline layer to pre-place objects on.
    pub layer: String,
    /// How many upcoming parts to scan for content on this layer.
    pub search_distance: usize,
}

/// Playout settings for a studio.
///
/// These feed the take rate limiter, hold gating, the orphaned-segment
/// cleanup policy and the lookahead pass, and are hashed into the
/// timeline generation versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioSettings {
    /// Minimum time between two takes, in milliseconds.
    #[serde(default = "default_minimum_take_span")]
    pub minimum_take_span_ms: i64,
    /// Whether hold transitions may be armed in this studio.
    #[serde(default)]
    pub allow_hold: bool,
    /// Whether an orphaned segment keeps its position in the rundown
    /// order until it goes off air, instead of being removed as soon as
    /// it is no longer current.
    #[serde(default)]
    pub preserve_orphaned_segment_position: bool,
    /// Device layers the lookahead pass pre-places objects on.
    #[serde(default)]
    pub lookahead_layers: Vec<LookaheadLayer>,
}

const fn default_minimum_take_span() -> i64 {
    1_000
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            minimum_take_span_ms: default_minimum_take_span(),
            allow_hold: false,
            preserve_orphaned_segment_position: false,
            lookahead_layers: Vec::new(),
        }
    }
}

/// One playout environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Studio {
    /// Unique studio identifier.
    pub id: StudioId,
    /// Display name.
    pub name: String,
    /// Playout settings.
    #[serde(default)]
    pub settings: StudioSettings,
}

impl Studio {
    /// Creates a studio with default settings.
    #[must_use]
    pub fn new(id: StudioId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            settings: StudioSettings::default(),
        }
    }
}

/// A show style: the format rundowns are produced against.
///
/// Open-ended content only continues across a rundown boundary when
/// both rundowns bind the same show style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowStyle {
    /// Unique show style identifier.
    pub id: ShowStyleId,
    /// Display name.
    pub name: String,
}

impl ShowStyle {
    /// Creates a show style.
    #[must_use]
    pub fn new(id: ShowStyleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_take_span_is_one_second() {
        let settings = StudioSettings::default();
        assert_eq!(settings.minimum_take_span_ms, 1_000);
        assert!(!settings.allow_hold);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: StudioSettings = serde_json::from_str("{}").expect("parse settings");
        assert_eq!(settings.minimum_take_span_ms, 1_000);
        assert!(settings.lookahead_layers.is_empty());
    }
}
