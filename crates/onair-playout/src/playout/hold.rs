//! Arming and releasing hold transitions.
//!
//! A hold is a scripted two-part transition: the FROM part stays on air
//! underneath while the TO part plays on top, until a second take cuts
//! the FROM tail. Arming only flips the playlist's hold state to
//! pending; the take into the TO part makes it active and the take
//! after that completes it (both in [`super::take`]). Releasing is only
//! possible while still pending.

use onair_core::PlaylistId;

use crate::cache::{with_playlist_cache, PlayoutCache};
use crate::context::JobContext;
use crate::error::{Error, Result};
use crate::model::{HoldState, PartHoldMode, PartInstance};

use super::ordered::OrderedPlaylist;

/// Arms a hold between the on-air part and the queued next part.
///
/// The pair must be adjacent playable parts of one segment, tagged FROM
/// and TO, in a studio that allows holds, and the on-air instance must
/// not carry ad-libbed content. On success the hold state becomes
/// pending; nothing changes on air until the next take.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::DuringHold`] when a hold is
/// already in progress, [`Error::NoCurrentPart`] / [`Error::NoNextPart`]
/// when either pointer is empty, and [`Error::HoldNotPossible`] when
/// the pair does not qualify.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn activate_hold(ctx: &JobContext, playlist_id: PlaylistId) -> Result<()> {
    with_playlist_cache(ctx, playlist_id, |cache, _effects| arm_hold(ctx, cache)).await
}

/// Releases a pending hold without taking it.
///
/// # Errors
///
/// [`Error::PlaylistNotActive`], [`Error::HoldNotPossible`] when no
/// hold is armed, or [`Error::DuringHold`] when the hold is already on
/// air and can only complete through a take.
#[tracing::instrument(
    skip(ctx),
    fields(studio_id = %ctx.studio().id),
)]
pub async fn deactivate_hold(ctx: &JobContext, playlist_id: PlaylistId) -> Result<()> {
    with_playlist_cache(ctx, playlist_id, |cache, _effects| {
        let playlist = cache.playlist();
        if !playlist.is_active() {
            return Err(Error::PlaylistNotActive {
                playlist_id: playlist.id,
            });
        }
        match playlist.hold_state {
            HoldState::Pending => {
                cache.playlist_mut().hold_state = HoldState::None;
                tracing::info!(playlist_id = %playlist_id, "hold released");
                Ok(())
            }
            HoldState::None => Err(Error::HoldNotPossible {
                reason: "no hold is armed".into(),
            }),
            HoldState::Active => Err(Error::DuringHold {
                state: HoldState::Active.to_string(),
            }),
        }
    })
    .await
}

fn arm_hold(ctx: &JobContext, cache: &mut PlayoutCache) -> Result<()> {
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
    if !ctx.studio().settings.allow_hold {
        return Err(Error::HoldNotPossible {
            reason: "holds are not enabled for this studio".into(),
        });
    }

    let current = cache.current_part_instance().ok_or(Error::NoCurrentPart)?;
    let next = cache.next_part_instance().ok_or(Error::NoNextPart)?;

    if current.part.hold_mode != PartHoldMode::From {
        return Err(hold_not_possible("the on-air part cannot start a hold"));
    }
    if next.part.hold_mode != PartHoldMode::To {
        return Err(hold_not_possible("the queued part cannot receive a hold"));
    }
    if current.segment_id != next.segment_id {
        return Err(hold_not_possible("the parts sit in different segments"));
    }
    if !are_adjacent(cache, current, next) {
        return Err(hold_not_possible(
            "the parts are not adjacent in the segment",
        ));
    }
    let current_id = current.id;
    if cache
        .piece_instances_of(current_id)
        .any(|instance| instance.is_dynamically_inserted())
    {
        return Err(hold_not_possible("the on-air part carries ad-libbed content"));
    }

    cache.playlist_mut().hold_state = HoldState::Pending;
    tracing::info!(playlist_id = %cache.playlist().id, "hold armed");
    Ok(())
}

/// Adjacency over the segment's playable parts, the same order
/// selection walks.
fn are_adjacent(cache: &PlayoutCache, current: &PartInstance, next: &PartInstance) -> bool {
    let ordered = OrderedPlaylist::build(cache);
    let playable: Vec<_> = ordered
        .parts_of_segment(current.segment_id)
        .filter(|part| part.is_playable())
        .map(|part| part.id)
        .collect();
    let Some(current_position) = playable.iter().position(|id| *id == current.part.id) else {
        return false;
    };
    playable.get(current_position + 1) == Some(&next.part.id)
}

fn hold_not_possible(reason: &str) -> Error {
    Error::HoldNotPossible {
        reason: reason.into(),
    }
}
