//! Unplanned content: the ad-lib API.
//!
//! These operations are the narrow surface the action layer drives
//! while a show is on air: drop a piece onto the playing or queued
//! part, queue a whole improvised part, stop layers, edit playhead
//! content. Each one validates, mutates the cache and reports a
//! [`PlayheadChange`] instead of regenerating anything itself; the
//! caller folds the changes of a whole action and settles them once
//! through [`apply_playhead_change`]. All of them refuse to run while
//! a hold is armed or on air.

use onair_core::{PartId, PartInstanceId, PieceInstanceId};
use serde_json::Value;

use crate::cache::PlayoutCache;
use crate::context::JobContext;
use crate::effects::DeferredEffects;
use crate::error::{Error, Result};
use crate::model::{
    Part, PartInstance, PartInstanceOrphaned, Piece, PieceEnable, PieceInstance, PieceStart,
    PieceUserDuration,
};
use crate::timeline::generate_timeline;

use super::defer_timing_flush;
use super::infinites::sync_playhead_infinites_for_next_part_instance;
use super::ordered::OrderedPlaylist;
use super::set_next::{queue_next_part, SetNextTarget};

/// Where an ad-libbed piece lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdlibDestination {
    /// Onto the on-air instance, starting at the live playhead.
    Current,
    /// Onto the queued-next instance, starting at offset zero.
    Next,
}

/// Which playhead instances an operation touched.
///
/// `current_changed` obliges the caller to re-sync the queued-next
/// continuations before regenerating; `next_changed` alone only needs
/// the regeneration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayheadChange {
    /// The on-air instance or its pieces changed.
    pub current_changed: bool,
    /// The queued-next instance or its pieces changed.
    pub next_changed: bool,
}

impl PlayheadChange {
    const fn current() -> Self {
        Self {
            current_changed: true,
            next_changed: false,
        }
    }

    const fn next() -> Self {
        Self {
            current_changed: false,
            next_changed: true,
        }
    }

    /// Folds two change reports together.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            current_changed: self.current_changed || other.current_changed,
            next_changed: self.next_changed || other.next_changed,
        }
    }

    /// Returns true if anything changed.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        self.current_changed || self.next_changed
    }
}

/// The editable surface of a playhead piece instance.
#[derive(Debug, Clone, Default)]
pub struct PieceInstanceUpdate {
    /// Replacement display name.
    pub name: Option<String>,
    /// Replacement timing window.
    pub enable: Option<PieceEnable>,
    /// Replacement content descriptor.
    pub content: Option<Value>,
}

/// Inserts an ad-libbed piece onto the playing or queued part.
///
/// The piece is rebound to the target instance's part. On the current
/// instance it starts at the live playhead position, pinned at
/// insertion time so later regenerations do not move it; on the next
/// instance it starts at offset zero.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::DuringHold`],
/// [`Error::NoCurrentPart`] or [`Error::NoNextPart`] when a
/// precondition fails.
pub fn insert_adlib_piece(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    destination: AdlibDestination,
    piece: Piece,
) -> Result<(PieceInstanceId, PlayheadChange)> {
    require_adlib_allowed(cache)?;
    let playlist = cache.playlist();
    let playlist_id = playlist.id;
    let activation_id = playlist
        .activation_id
        .ok_or(Error::PlaylistNotActive { playlist_id })?;
    let now = ctx.now_ms();

    let (target, change, start_offset): (PartInstance, _, i64) = match destination {
        AdlibDestination::Current => {
            let current = cache.require_current_part_instance()?.clone();
            let offset = current.playhead_position(now);
            (current, PlayheadChange::current(), offset)
        }
        AdlibDestination::Next => {
            let next = cache
                .next_part_instance()
                .ok_or(Error::NoNextPart)?
                .clone();
            (next, PlayheadChange::next(), 0)
        }
    };

    let mut piece = piece;
    piece.part_id = target.part.id;
    piece.segment_id = target.segment_id;
    piece.rundown_id = target.rundown_id;
    piece.enable.start = PieceStart::Offset(start_offset);

    let mut instance = PieceInstance::from_piece(piece, target.id, activation_id);
    instance.dynamically_inserted = Some(now);
    let instance_id = instance.id;

    tracing::debug!(
        playlist_id = %playlist_id,
        piece_instance_id = %instance_id,
        layer = %instance.piece.source_layer,
        start_offset,
        "ad-lib piece inserted",
    );
    cache.piece_instances_mut().insert(instance);
    Ok((instance_id, change))
}

/// Queues an improvised part as next, directly after the playing one.
///
/// The part has no scripted backing: its instance is marked orphaned
/// and ranked between the current part and its scripted successor, so
/// selection walks back onto the script once it has played. The
/// supplied pieces start at offset zero; live continuations are
/// carried onto it like onto any queued part.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::DuringHold`] or
/// [`Error::NoCurrentPart`] when a precondition fails.
pub fn queue_adlib_part(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    title: impl Into<String>,
    pieces: Vec<Piece>,
) -> Result<(PartInstanceId, PlayheadChange)> {
    require_adlib_allowed(cache)?;
    let playlist = cache.playlist();
    let playlist_id = playlist.id;
    let activation_id = playlist
        .activation_id
        .ok_or(Error::PlaylistNotActive { playlist_id })?;
    let current = cache.require_current_part_instance()?;
    let current_rank = current.part.rank;
    let segment_id = current.segment_id;
    let rundown_id = current.rundown_id;
    let now = ctx.now_ms();

    // Rank between the playing part and its scripted successor keeps
    // selection walking forward out of the improvised part.
    let ordered = OrderedPlaylist::build(cache);
    let following_rank = ordered
        .parts_of_segment(segment_id)
        .map(|part| part.rank)
        .filter(|rank| *rank > current_rank)
        .fold(None, |lowest: Option<f64>, rank| {
            Some(lowest.map_or(rank, |l| l.min(rank)))
        });
    let rank = following_rank.map_or(current_rank + 1.0, |next| (current_rank + next) / 2.0);

    let part = Part::new(PartId::generate(), segment_id, rundown_id, rank, title);
    let part_id = part.id;

    let instance_id = queue_next_part(ctx, cache, SetNextTarget::from(part))?;
    cache.part_instances_mut().update(instance_id, |instance| {
        instance.orphaned = Some(PartInstanceOrphaned::AdlibPart);
    });
    for supplied in pieces {
        let mut piece = supplied;
        piece.part_id = part_id;
        piece.segment_id = segment_id;
        piece.rundown_id = rundown_id;
        piece.enable.start = PieceStart::Offset(0);
        let mut instance = PieceInstance::from_piece(piece, instance_id, activation_id);
        instance.dynamically_inserted = Some(now);
        cache.piece_instances_mut().insert(instance);
    }

    tracing::info!(
        playlist_id = %playlist_id,
        part_instance_id = %instance_id,
        rank,
        "ad-lib part queued",
    );
    Ok((instance_id, PlayheadChange::next()))
}

/// Stops the playing pieces on the given source layers.
///
/// Each affected piece instance of the on-air part gets a user stop at
/// the current playhead position. Pieces already stopped, disabled or
/// carrying a user override are left alone. Stopping an open-ended run
/// ends it for the queued next as well, once the change is settled.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::DuringHold`] or
/// [`Error::NoCurrentPart`] when a precondition fails.
pub fn stop_pieces_on_source_layers(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    source_layers: &[String],
) -> Result<(Vec<PieceInstanceId>, PlayheadChange)> {
    require_adlib_allowed(cache)?;
    let current = cache.require_current_part_instance()?;
    let current_id = current.id;
    let playlist_id = cache.playlist().id;
    let now_in_part = current.playhead_position(ctx.now_ms());

    let stopped: Vec<PieceInstanceId> = cache
        .piece_instances_of(current_id)
        .filter(|instance| {
            !instance.reset
                && !instance.disabled
                && instance.reported_stopped_playback.is_none()
                && instance.user_duration.is_none()
                && source_layers.contains(&instance.piece.source_layer)
        })
        .map(|instance| instance.id)
        .collect();

    for id in &stopped {
        cache.piece_instances_mut().update(*id, |instance| {
            instance.user_duration = Some(PieceUserDuration::EndRelativeToPart(now_in_part));
        });
        ctx.timing_events().enqueue_piece(playlist_id, *id);
    }

    let change = if stopped.is_empty() {
        PlayheadChange::default()
    } else {
        PlayheadChange::current()
    };
    tracing::debug!(
        playlist_id = %playlist_id,
        stopped = stopped.len(),
        "stop on source layers",
    );
    Ok((stopped, change))
}

/// Edits a piece instance on the playhead.
///
/// Only instances belonging to the current or next part instance are
/// addressable; anything older reports not-found. Continuations
/// inherited from an earlier part cannot be edited, since the re-sync
/// would overwrite them from their origin.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::DuringHold`] or
/// [`Error::PieceInstanceNotFound`] when a precondition fails;
/// attempts to edit an inherited continuation fail as internal misuse.
pub fn update_piece_instance(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    piece_instance_id: PieceInstanceId,
    update: PieceInstanceUpdate,
) -> Result<PlayheadChange> {
    require_adlib_allowed(cache)?;
    let playlist = cache.playlist();
    let playlist_id = playlist.id;
    let current_id = playlist.current_part_instance_id;
    let next_id = playlist.next_part_instance_id;

    let Some(instance) = cache.piece_instances().get(piece_instance_id) else {
        return Err(Error::PieceInstanceNotFound { piece_instance_id });
    };
    let owner = instance.part_instance_id;
    let change = if Some(owner) == current_id {
        PlayheadChange::current()
    } else if Some(owner) == next_id {
        PlayheadChange::next()
    } else {
        return Err(Error::PieceInstanceNotFound { piece_instance_id });
    };
    if instance.is_inherited_continuation() {
        return Err(Error::internal(format!(
            "piece instance {piece_instance_id} continues an earlier part; edit its origin"
        )));
    }

    cache
        .piece_instances_mut()
        .update(piece_instance_id, |instance| {
            if let Some(name) = update.name {
                instance.piece.name = name;
            }
            if let Some(enable) = update.enable {
                instance.piece.enable = enable;
            }
            if let Some(content) = update.content {
                instance.piece.content = content;
            }
        });

    tracing::debug!(
        playlist_id = %playlist_id,
        piece_instance_id = %piece_instance_id,
        "piece instance updated",
    );
    Ok(change)
}

/// Disables (or re-enables) the next upcoming piece on the playhead.
///
/// Candidates are the on-air part's pieces that have not reached their
/// start yet, in start order, followed by the queued next part's
/// pieces. Disabling picks the first enabled candidate; undo re-enables
/// the last disabled one.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::DuringHold`],
/// [`Error::NoCurrentPart`] or [`Error::DisableNoMatch`] when a
/// precondition fails or no candidate matches.
pub fn disable_next_piece(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    undo: bool,
) -> Result<(PieceInstanceId, PlayheadChange)> {
    require_adlib_allowed(cache)?;
    let current = cache.require_current_part_instance()?;
    let current_id = current.id;
    let now_in_part = current.playhead_position(ctx.now_ms());

    let mut candidates: Vec<(PieceInstanceId, bool, PlayheadChange)> = Vec::new();
    let mut upcoming: Vec<&PieceInstance> = cache
        .piece_instances_of(current_id)
        .filter(|instance| {
            !instance.reset && piece_offset(instance, now_in_part) > now_in_part
        })
        .collect();
    upcoming.sort_by_key(|instance| (piece_offset(instance, now_in_part), instance.id));
    candidates.extend(
        upcoming
            .iter()
            .map(|instance| (instance.id, instance.disabled, PlayheadChange::current())),
    );
    if let Some(next_id) = cache.playlist().next_part_instance_id {
        let mut queued: Vec<&PieceInstance> = cache
            .piece_instances_of(next_id)
            .filter(|instance| !instance.reset)
            .collect();
        queued.sort_by_key(|instance| (piece_offset(instance, 0), instance.id));
        candidates.extend(
            queued
                .iter()
                .map(|instance| (instance.id, instance.disabled, PlayheadChange::next())),
        );
    }

    let found = if undo {
        candidates.iter().rev().find(|(_, disabled, _)| *disabled)
    } else {
        candidates.iter().find(|(_, disabled, _)| !*disabled)
    };
    let Some(&(instance_id, _, change)) = found else {
        return Err(Error::DisableNoMatch {
            action: if undo { "enable" } else { "disable" }.into(),
        });
    };

    cache
        .piece_instances_mut()
        .update(instance_id, |instance| instance.disabled = !undo);
    tracing::debug!(
        piece_instance_id = %instance_id,
        undo,
        "next piece toggled",
    );
    Ok((instance_id, change))
}

/// Settles the folded change report of one or more ad-lib operations.
///
/// A changed on-air instance re-syncs the queued-next continuations
/// first; any change regenerates the timeline and defers the coalesced
/// timing event. A report with nothing set settles nothing, so callers
/// can always fold and call this once.
///
/// # Errors
///
/// Propagates continuity re-sync and timeline generation failures.
pub fn apply_playhead_change(
    ctx: &JobContext,
    cache: &mut PlayoutCache,
    effects: &mut DeferredEffects,
    change: PlayheadChange,
) -> Result<()> {
    if !change.is_any() {
        return Ok(());
    }
    if change.current_changed {
        sync_playhead_infinites_for_next_part_instance(ctx, cache)?;
    }
    generate_timeline(ctx, cache, effects)?;
    defer_timing_flush(ctx, effects, cache.playlist().id);
    Ok(())
}

/// The scripted (or pinned) start offset of a piece instance within
/// its part.
fn piece_offset(instance: &PieceInstance, now_in_part: i64) -> i64 {
    match instance.piece.enable.start {
        PieceStart::Offset(offset) => offset,
        PieceStart::Now => now_in_part,
    }
}

fn require_adlib_allowed(cache: &PlayoutCache) -> Result<()> {
    let playlist = cache.playlist();
    if !playlist.is_active() {
        return Err(Error::PlaylistNotActive {
            playlist_id: playlist.id,
        });
    }
    if playlist.is_in_hold() {
        return Err(Error::DuringHold {
            state: playlist.hold_state.to_string(),
        });
    }
    Ok(())
}
