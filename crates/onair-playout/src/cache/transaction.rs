//! Lock/load/commit wrappers for playout jobs.
//!
//! The body runs synchronously against the cache: once the working set
//! is loaded there are no suspension points until commit, so no state
//! observed by the body can change under it. Jobs that must re-read the
//! store right before committing (activation's cross-playlist
//! exclusivity recheck) pass an async verify step that runs between the
//! body and the commit, still under the lock.

use std::future::Future;

use onair_core::id::PlaylistId;

use crate::cache::playout::{PlayoutCache, StudioCache};
use crate::context::JobContext;
use crate::effects::DeferredEffects;
use crate::error::{Error, Result};
use crate::lock::LockKey;

/// Runs a job body against one playlist's working set.
///
/// Acquires the playlist lock, loads the cache, runs `body`, commits
/// the diff, releases the lock, then drains the deferred effects. On
/// any error the working set is discarded, the lock released and the
/// error propagated; nothing is written.
///
/// # Errors
///
/// Propagates load, body and commit errors unchanged.
pub async fn with_playlist_cache<T, F>(
    ctx: &JobContext,
    playlist_id: PlaylistId,
    body: F,
) -> Result<T>
where
    F: FnOnce(&mut PlayoutCache, &mut DeferredEffects) -> Result<T>,
{
    with_playlist_cache_and_verify(ctx, playlist_id, body, || async { Ok(()) }).await
}

/// [`with_playlist_cache`] with an async pre-commit verification step.
///
/// `verify` runs after the body succeeded and before the commit, still
/// under the lock. A verification error discards the working set like a
/// body error would.
///
/// # Errors
///
/// Propagates load, body, verification and commit errors unchanged.
pub async fn with_playlist_cache_and_verify<T, F, V, Fut>(
    ctx: &JobContext,
    playlist_id: PlaylistId,
    body: F,
    verify: V,
) -> Result<T>
where
    F: FnOnce(&mut PlayoutCache, &mut DeferredEffects) -> Result<T>,
    V: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let guard = ctx.locks().acquire(LockKey::Playlist(playlist_id)).await?;
    ctx.metrics().observe_lock_wait("playlist", guard.waited());
    if guard.waited() >= ctx.config().lock_warn_after {
        tracing::warn!(
            key = %guard.key(),
            waited_ms = guard.waited().as_millis() as u64,
            "slow playout lock acquisition",
        );
    }

    let mut cache = PlayoutCache::load(ctx.store(), ctx.studio().id, playlist_id).await?;
    if cache.playlist().studio_id != ctx.studio().id {
        return Err(Error::configuration(format!(
            "playlist {playlist_id} belongs to studio {}, not {}",
            cache.playlist().studio_id,
            ctx.studio().id,
        )));
    }

    let mut effects = DeferredEffects::new();
    let value = body(&mut cache, &mut effects)?;
    verify().await?;

    let batch = cache.into_write_batch();
    if !batch.is_empty() {
        tracing::debug!(playlist_id = %playlist_id, docs = batch.len(), "committing playout cache");
        ctx.store().commit(batch).await?;
    }

    drop(guard);
    effects.drain(ctx.metrics()).await;
    Ok(value)
}

/// Runs a job body against the studio-scoped working set.
///
/// Serialized against other studio-scoped jobs by the studio lock.
/// Playlist-scoped jobs proceed independently; a job that needs both
/// scopes takes the studio lock first and the playlist lock inside it,
/// never the reverse.
///
/// # Errors
///
/// Propagates load, body and commit errors unchanged.
pub async fn with_studio_cache<T, F>(ctx: &JobContext, body: F) -> Result<T>
where
    F: FnOnce(&mut StudioCache, &mut DeferredEffects) -> Result<T>,
{
    let studio_id = ctx.studio().id;
    let guard = ctx.locks().acquire(LockKey::Studio(studio_id)).await?;
    ctx.metrics().observe_lock_wait("studio", guard.waited());

    let mut cache = StudioCache::load(ctx.store(), studio_id).await?;
    let mut effects = DeferredEffects::new();
    let value = body(&mut cache, &mut effects)?;

    let batch = cache.into_write_batch();
    if !batch.is_empty() {
        tracing::debug!(studio_id = %studio_id, docs = batch.len(), "committing studio cache");
        ctx.store().commit(batch).await?;
    }

    drop(guard);
    effects.drain(ctx.metrics()).await;
    Ok(value)
}
