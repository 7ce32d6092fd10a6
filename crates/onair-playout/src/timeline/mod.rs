//! Timeline generation.
//!
//! Renders the current/next/previous part instances and their
//! time-processed piece instances into the flat, relatively-timed
//! object graph consumed by the downstream playout device:
//!
//! - [`builder`]: constructs the individual object shapes (part
//!   groups, piece objects, infinite continuation groups, the playout
//!   status marker).
//! - [`generate`]: the full generation pass: groups, flattening, hold
//!   filtering, `now` freezing, post-process hook, versions and hash.
//! - [`lookahead`]: preload objects for studio-configured lookahead
//!   layers.
//! - [`hook`]: the post-process and fast-publish seams to the plugin
//!   layer and the playout transport.

pub mod builder;
pub mod generate;
pub mod hook;
pub mod lookahead;

pub use generate::{generate_studio_baseline, generate_timeline};
pub use hook::{
    PieceSummary, TimelineHook, TimelineHookInput, TimelineHookOutput, TimelinePublisher,
};
