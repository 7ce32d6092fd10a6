//! The generated timeline: the engine's sole output artifact.
//!
//! Timeline objects carry *relative* enables. A downstream resolver
//! turns them into absolute device commands; the engine only promises
//! consistent, replayable relative timing. Three timing forms exist:
//!
//! - `Absolute(ms)`: a fixed epoch-millisecond value
//! - `Now`: resolved once by the generator, then frozen per object id
//!   so regeneration does not drift (see the generator's now-freezing
//!   pass)
//! - `Expression { object, anchor, offset }`: relative to another
//!   object's start or end
//!
//! Objects form nested groups during construction and are flattened to
//! a single list with `in_group` back-references before persisting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use onair_core::{InfiniteId, PartInstanceId, PieceInstanceId, StudioId, TimeMillis};

use super::Document;

/// Identifier of a timeline object.
///
/// Ids are semantic: the same logical object keeps the same id across
/// regenerations, which is what the now-freezing rule keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimelineObjId(String);

impl TimelineObjId {
    /// Wraps a raw id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The group spanning one part instance on air.
    #[must_use]
    pub fn part_group(instance_id: PartInstanceId) -> Self {
        Self(format!("part_group_{instance_id}"))
    }

    /// The marker object signalling unit start to the playout device.
    #[must_use]
    pub fn part_group_first_object(instance_id: PartInstanceId) -> Self {
        Self(format!("part_group_firstobject_{instance_id}"))
    }

    /// The object rendering one piece instance.
    #[must_use]
    pub fn piece(piece_instance_id: PieceInstanceId) -> Self {
        Self(format!("piece_{piece_instance_id}"))
    }

    /// The independent group carrying one open-ended run.
    ///
    /// Keyed by continuation id, not instance id, so the group survives
    /// the run moving between part instances.
    #[must_use]
    pub fn infinite_group(infinite_id: InfiniteId) -> Self {
        Self(format!("piece_inf_group_{infinite_id}"))
    }

    /// The playlist status object.
    #[must_use]
    pub fn playout_status() -> Self {
        Self("playout_status".to_string())
    }

    /// The object view of the id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TimelineObjId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which boundary of a referenced object an expression anchors to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExprAnchor {
    /// The referenced object's start.
    Start,
    /// The referenced object's end.
    End,
}

/// A point in time, in one of the three timing forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeRef {
    /// A fixed epoch-millisecond value.
    Absolute {
        /// The time in epoch milliseconds.
        ms: TimeMillis,
    },
    /// Resolved once at generation, then frozen per object id.
    Now,
    /// Relative to another object's boundary.
    Expression {
        /// The referenced object.
        object: TimelineObjId,
        /// Which boundary of the referenced object.
        anchor: ExprAnchor,
        /// Offset from the boundary, in milliseconds.
        offset: i64,
    },
}

impl TimeRef {
    /// A fixed epoch-millisecond value.
    #[must_use]
    pub const fn absolute(ms: TimeMillis) -> Self {
        Self::Absolute { ms }
    }

    /// The start of another object.
    #[must_use]
    pub fn start_of(object: TimelineObjId) -> Self {
        Self::Expression {
            object,
            anchor: ExprAnchor::Start,
            offset: 0,
        }
    }

    /// The end of another object.
    #[must_use]
    pub fn end_of(object: TimelineObjId) -> Self {
        Self::Expression {
            object,
            anchor: ExprAnchor::End,
            offset: 0,
        }
    }

    /// Offsets an expression by the given milliseconds; absolute values
    /// are shifted directly and `Now` is returned unchanged.
    #[must_use]
    pub fn offset_by(self, delta: i64) -> Self {
        match self {
            Self::Absolute { ms } => Self::Absolute { ms: ms + delta },
            Self::Now => Self::Now,
            Self::Expression {
                object,
                anchor,
                offset,
            } => Self::Expression {
                object,
                anchor,
                offset: offset + delta,
            },
        }
    }
}

/// The timing window of a timeline object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEnable {
    /// When the object becomes active.
    pub start: TimeRef,
    /// Fixed duration in milliseconds; open-ended when absent and no
    /// `end` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Explicit end; takes precedence over `duration` downstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeRef>,
}

impl TimelineEnable {
    /// An open-ended enable starting at the given point.
    #[must_use]
    pub const fn starting_at(start: TimeRef) -> Self {
        Self {
            start,
            duration: None,
            end: None,
        }
    }

    /// An open-ended enable starting now.
    #[must_use]
    pub const fn starting_now() -> Self {
        Self::starting_at(TimeRef::Now)
    }

    /// Sets a fixed duration.
    #[must_use]
    pub const fn with_duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Sets an explicit end.
    #[must_use]
    pub fn with_end(mut self, end: TimeRef) -> Self {
        self.end = Some(end);
        self
    }
}

/// How a timeline object behaves while a hold is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineObjHoldMode {
    /// Included regardless of hold state.
    Normal,
    /// Included only while a hold is active.
    Only,
    /// Suppressed while a hold is active.
    Except,
}

impl Default for TimelineObjHoldMode {
    fn default() -> Self {
        Self::Normal
    }
}

/// A timed content tweak inside a timeline object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineKeyframe {
    /// Keyframe id, unique within its object.
    pub id: String,
    /// When the keyframe applies, relative to its object.
    pub enable: TimelineEnable,
    /// Content overrides applied while the keyframe is active.
    pub content: Value,
}

/// A node in the generated schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineObject {
    /// Semantic object id, stable across regenerations.
    pub id: TimelineObjId,
    /// Timing window.
    pub enable: TimelineEnable,
    /// Device layer the object plays on. Groups use an empty layer.
    pub layer: String,
    /// Resolution priority among objects on the same layer.
    #[serde(default)]
    pub priority: i32,
    /// Opaque content descriptor consumed by the playout device.
    #[serde(default)]
    pub content: Value,
    /// Classification tags consumed by expressions and devices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// Timed content tweaks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyframes: Vec<TimelineKeyframe>,
    /// Behavior while a hold is active.
    #[serde(default)]
    pub hold_mode: TimelineObjHoldMode,
    /// True for grouping nodes.
    #[serde(default)]
    pub is_group: bool,
    /// The group this object belongs to, set during flattening.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_group: Option<TimelineObjId>,
    /// Nested children; emptied by flattening before persisting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TimelineObject>,
}

impl TimelineObject {
    /// Creates a content object on a layer.
    #[must_use]
    pub fn new(id: TimelineObjId, enable: TimelineEnable, layer: impl Into<String>) -> Self {
        Self {
            id,
            enable,
            layer: layer.into(),
            priority: 0,
            content: Value::Null,
            classes: Vec::new(),
            keyframes: Vec::new(),
            hold_mode: TimelineObjHoldMode::Normal,
            is_group: false,
            in_group: None,
            children: Vec::new(),
        }
    }

    /// Creates a grouping node.
    #[must_use]
    pub fn group(id: TimelineObjId, enable: TimelineEnable) -> Self {
        let mut obj = Self::new(id, enable, "");
        obj.is_group = true;
        obj
    }

    /// Sets the content descriptor.
    #[must_use]
    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    /// Adds classification tags.
    #[must_use]
    pub fn with_classes(mut self, classes: Vec<String>) -> Self {
        self.classes = classes;
        self
    }

    /// Sets the resolution priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the hold-mode tag.
    #[must_use]
    pub const fn with_hold_mode(mut self, hold_mode: TimelineObjHoldMode) -> Self {
        self.hold_mode = hold_mode;
        self
    }

    /// Adds a child to a grouping node.
    pub fn push_child(&mut self, child: TimelineObject) {
        debug_assert!(self.is_group, "children belong on grouping nodes");
        self.children.push(child);
    }
}

/// Generation version stamp for compatibility checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineVersions {
    /// Version of the engine that generated the timeline.
    pub core: String,
    /// Identifier of the post-process hook, when one is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_id: Option<String>,
    /// Version of the post-process hook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_version: Option<String>,
    /// Hash of the studio settings the generation ran against.
    pub studio_config_hash: String,
}

/// The persisted timeline document, one per studio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// The studio this timeline drives.
    pub studio_id: StudioId,
    /// Flat object list (groups flattened, `in_group` back-references
    /// set).
    pub objects: Vec<TimelineObject>,
    /// Generation version stamp.
    pub versions: TimelineVersions,
    /// Random token regenerated on every write, so consumers can detect
    /// any change without diffing.
    pub hash: String,
    /// When this generation ran.
    pub generated_at: DateTime<Utc>,
    /// Opaque state carried between post-process hook invocations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_state: Option<Value>,
}

impl Timeline {
    /// Creates a timeline document with a fresh hash token and a
    /// generated-at stamp of now.
    #[must_use]
    pub fn new(studio_id: StudioId, objects: Vec<TimelineObject>, versions: TimelineVersions) -> Self {
        Self {
            studio_id,
            objects,
            versions,
            hash: ulid::Ulid::new().to_string(),
            generated_at: Utc::now(),
            persistent_state: None,
        }
    }

    /// Looks up a top-level object by id.
    #[must_use]
    pub fn object(&self, id: &TimelineObjId) -> Option<&TimelineObject> {
        self.objects.iter().find(|obj| &obj.id == id)
    }
}

impl Document for Timeline {
    type Id = StudioId;

    const KIND: &'static str = "timeline";

    fn doc_id(&self) -> StudioId {
        self.studio_id
    }
}
