//! Timeline document tests through the public playout API.
//!
//! Focus: regeneration must not disturb what is already on air, and
//! the document extensions (lookahead preloads, hold gating, the
//! post-process hook, fast publish) must ride the same committed
//! transaction as the playhead change that triggered them.

#![allow(clippy::expect_used)]

use std::sync::Arc;

use serde_json::json;

use onair_core::time::ManualClock;
use onair_core::{PartId, PieceId, PlaylistId, RundownId, SegmentId, ShowStyleId, StudioId};

use onair_playout::cache::with_playlist_cache;
use onair_playout::context::JobContext;
use onair_playout::model::{
    HoldState, LookaheadLayer, Part, PartHoldMode, Piece, PieceHoldMode, PieceInstance,
    PieceLifespan, Playlist, Rundown, Segment, Studio, StudioSettings, TimeRef, Timeline,
    TimelineEnable, TimelineKeyframe, TimelineObjId, TimelineObject,
};
use onair_playout::playout::{
    activate_hold, activate_playlist, on_part_playback_started, set_next_part, take_next_part,
    SetNextTarget,
};
use onair_playout::store::{DocStore, MemoryDocStore};
use onair_playout::timeline::hook::InMemoryTimelinePublisher;
use onair_playout::timeline::{TimelineHook, TimelineHookInput, TimelineHookOutput};

struct ShowRig {
    ctx: JobContext,
    store: Arc<MemoryDocStore>,
    publisher: Arc<InMemoryTimelinePublisher>,
    clock: Arc<ManualClock>,
    playlist_id: PlaylistId,
    studio_id: StudioId,
    parts: Vec<Part>,
    pieces: Vec<Piece>,
}

async fn seeded_show(settings: StudioSettings) -> ShowRig {
    seeded_show_with(settings, |ctx| ctx).await
}

/// One segment of three parts. Pieces are seeded in part order: a
/// camera and an open-ended segment brand on the opener, a server clip
/// on the second part, a camera on the third. `configure` may attach
/// extensions to the context before the rig is handed out.
async fn seeded_show_with(
    settings: StudioSettings,
    configure: impl FnOnce(JobContext) -> JobContext,
) -> ShowRig {
    let store = Arc::new(MemoryDocStore::new());
    let studio_id = StudioId::generate();
    let playlist_id = PlaylistId::generate();
    let rundown_id = RundownId::generate();
    let segment_id = SegmentId::generate();

    let mut playlist = Playlist::new(playlist_id, studio_id, "continuity check");
    playlist.rundown_ids_in_order = vec![rundown_id];
    store.put_playlist(playlist).expect("seed playlist");
    store
        .put_rundown(Rundown::new(
            rundown_id,
            playlist_id,
            ShowStyleId::generate(),
            "main",
        ))
        .expect("seed rundown");
    store
        .put_segment(Segment::new(segment_id, rundown_id, 1.0, "A"))
        .expect("seed segment");

    let mut parts = Vec::new();
    for i in 0..3 {
        let part = Part::new(
            PartId::generate(),
            segment_id,
            rundown_id,
            (i + 1) as f64,
            format!("A{}", i + 1),
        );
        store.put_part(part.clone()).expect("seed part");
        parts.push(part);
    }

    let piece_on = |part: &Part, name: &str, layer: &str| {
        Piece::new(
            PieceId::generate(),
            part.id,
            part.segment_id,
            part.rundown_id,
            name,
            layer,
        )
    };
    let camera_one = piece_on(&parts[0], "camera one", "cam0");
    let mut brand = piece_on(&parts[0], "segment brand", "gfx0");
    brand.lifespan = PieceLifespan::UntilSegmentEnd;
    let mut promo = piece_on(&parts[1], "promo clip", "vt0");
    promo.content = json!({ "fileName": "PROMO_16x9" });
    let camera_three = piece_on(&parts[2], "camera three", "cam0");

    let pieces = vec![camera_one, brand, promo, camera_three];
    for piece in &pieces {
        store.put_piece(piece.clone()).expect("seed piece");
    }

    let publisher = Arc::new(InMemoryTimelinePublisher::new());
    let clock = Arc::new(ManualClock::new(200_000));
    let mut studio = Studio::new(studio_id, "Continuity studio");
    studio.settings = settings;
    let ctx = JobContext::new(store.clone(), studio)
        .with_clock(clock.clone())
        .with_publisher(publisher.clone());
    let ctx = configure(ctx);

    ShowRig {
        ctx,
        store,
        publisher,
        clock,
        playlist_id,
        studio_id,
        parts,
        pieces,
    }
}

async fn load_playlist(rig: &ShowRig) -> Playlist {
    rig.ctx
        .store()
        .load_playlist(rig.playlist_id)
        .await
        .expect("load playlist")
        .expect("playlist exists")
}

async fn piece_instances(rig: &ShowRig) -> Vec<PieceInstance> {
    let playlist = load_playlist(rig).await;
    let activation_id = playlist.activation_id.expect("playlist active");
    rig.ctx
        .store()
        .load_piece_instances(rig.playlist_id, activation_id)
        .await
        .expect("load piece instances")
}

async fn studio_timeline(rig: &ShowRig) -> Timeline {
    rig.ctx
        .store()
        .load_timeline(rig.studio_id)
        .await
        .expect("load timeline")
        .expect("timeline written")
}

#[tokio::test]
async fn an_open_ended_run_keeps_its_identity_across_the_take() {
    let rig = seeded_show(StudioSettings::default()).await;
    let brand = rig.pieces[1].clone();
    activate_playlist(&rig.ctx, rig.playlist_id, false)
        .await
        .expect("activate");
    let first = take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("open the show");

    let instances = piece_instances(&rig).await;
    let origin = instances
        .iter()
        .find(|instance| instance.part_instance_id == first && instance.piece.id == brand.id)
        .expect("brand instantiated on air");
    let run_id = origin
        .infinite_id()
        .expect("open-ended piece carries a run id");
    let run_group = TimelineObjId::infinite_group(run_id);
    assert!(
        studio_timeline(&rig).await.object(&run_group).is_some(),
        "the run renders as a standalone group"
    );

    rig.clock.advance(4_000);
    let second = take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("take the next part");

    let instances = piece_instances(&rig).await;
    let carried = instances
        .iter()
        .find(|instance| {
            instance.part_instance_id == second && instance.infinite_id() == Some(run_id)
        })
        .expect("the run continues into the new part");
    assert_ne!(carried.id, origin.id, "continuation is a fresh instance");
    assert!(carried.is_playhead_carried());
    assert!(
        studio_timeline(&rig).await.object(&run_group).is_some(),
        "the group id survives the take, so devices never restart the run"
    );
}

#[tokio::test]
async fn frozen_group_starts_survive_regeneration() {
    let rig = seeded_show(StudioSettings::default()).await;
    activate_playlist(&rig.ctx, rig.playlist_id, false)
        .await
        .expect("activate");
    let taken = take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("take");

    let first_doc = studio_timeline(&rig).await;
    let group_id = TimelineObjId::part_group(taken);
    let group = first_doc.object(&group_id).expect("on-air group rendered");
    assert_eq!(
        group.enable.start,
        TimeRef::absolute(200_000),
        "an unreported start freezes at the take wall clock"
    );

    rig.clock.advance(7_000);
    with_playlist_cache(&rig.ctx, rig.playlist_id, |cache, effects| {
        let target = SetNextTarget::from(rig.parts[2].clone());
        set_next_part(&rig.ctx, cache, effects, target)?;
        Ok(())
    })
    .await
    .expect("re-next");

    let regenerated = studio_timeline(&rig).await;
    let group = regenerated.object(&group_id).expect("on-air group survives");
    assert_eq!(
        group.enable.start,
        TimeRef::absolute(200_000),
        "the frozen start carries even though the wall clock moved"
    );
    assert!(regenerated.generated_at > first_doc.generated_at);
}

#[tokio::test]
async fn device_reports_reanchor_the_on_air_group() {
    let rig = seeded_show(StudioSettings::default()).await;
    activate_playlist(&rig.ctx, rig.playlist_id, false)
        .await
        .expect("activate");
    let taken = take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("take");
    let group_id = TimelineObjId::part_group(taken);

    on_part_playback_started(&rig.ctx, rig.playlist_id, taken, 200_180, 0)
        .await
        .expect("clean start report");
    let group = studio_timeline(&rig)
        .await
        .object(&group_id)
        .cloned()
        .expect("on-air group rendered");
    assert_eq!(group.enable.start, TimeRef::absolute(200_180));

    on_part_playback_started(&rig.ctx, rig.playlist_id, taken, 201_000, 2_000)
        .await
        .expect("corrected report");
    let group = studio_timeline(&rig)
        .await
        .object(&group_id)
        .cloned()
        .expect("on-air group rendered");
    assert_eq!(
        group.enable.start,
        TimeRef::absolute(199_000),
        "the group anchors at the content zero point, not the report time"
    );
}

#[tokio::test]
async fn lookahead_preplaces_upcoming_content_on_configured_layers() {
    let settings = StudioSettings {
        lookahead_layers: vec![LookaheadLayer {
            layer: "vt0".into(),
            search_distance: 2,
        }],
        ..StudioSettings::default()
    };
    let rig = seeded_show(settings).await;
    let promo = rig.pieces[2].clone();
    activate_playlist(&rig.ctx, rig.playlist_id, false)
        .await
        .expect("activate");

    let timeline = studio_timeline(&rig).await;
    let preload_id = TimelineObjId::new(format!("lookahead_{}", promo.id));
    let preload = timeline
        .object(&preload_id)
        .expect("clip preloaded ahead of the playhead");
    assert_eq!(preload.layer, "vt0");
    assert!(preload.classes.iter().any(|class| class == "lookahead"));
    assert_eq!(preload.content["fileName"], "PROMO_16x9");

    take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("open the show");
    rig.clock.advance(2_000);
    take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("take the clip part");

    let timeline = studio_timeline(&rig).await;
    assert!(
        timeline
            .objects
            .iter()
            .all(|object| !object.id.as_str().starts_with("lookahead_")),
        "nothing left to preload within the scan distance"
    );
}

#[tokio::test]
async fn the_hold_lifecycle_gates_tagged_content() {
    let settings = StudioSettings {
        allow_hold: true,
        ..StudioSettings::default()
    };
    let rig = seeded_show(settings).await;

    // Tag the boundary and seed the hold-gated content before
    // activation snapshots the parts into instances.
    let mut from = rig.parts[0].clone();
    from.hold_mode = PartHoldMode::From;
    rig.store.put_part(from).expect("tag the hold-from part");
    let mut to = rig.parts[1].clone();
    to.hold_mode = PartHoldMode::To;
    rig.store.put_part(to).expect("tag the hold-to part");

    let mut strap = Piece::new(
        PieceId::generate(),
        rig.parts[0].id,
        rig.parts[0].segment_id,
        rig.parts[0].rundown_id,
        "name strap",
        "gfx1",
    );
    strap.hold_mode = PieceHoldMode::ExceptDuringHold;
    rig.store.put_piece(strap.clone()).expect("seed the strap");
    let mut bed = Piece::new(
        PieceId::generate(),
        rig.parts[1].id,
        rig.parts[1].segment_id,
        rig.parts[1].rundown_id,
        "hold bed",
        "aud0",
    );
    bed.hold_mode = PieceHoldMode::OnlyDuringHold;
    rig.store.put_piece(bed.clone()).expect("seed the bed");

    activate_playlist(&rig.ctx, rig.playlist_id, false)
        .await
        .expect("activate");
    let first = take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("open the show");
    rig.clock.advance(1_500);
    on_part_playback_started(&rig.ctx, rig.playlist_id, first, 201_500, 0)
        .await
        .expect("report the opener");

    let instances = piece_instances(&rig).await;
    let strap_instance = instances
        .iter()
        .find(|instance| instance.piece.id == strap.id)
        .expect("strap instantiated");
    let strap_object = TimelineObjId::piece(strap_instance.id);
    assert!(
        studio_timeline(&rig).await.object(&strap_object).is_some(),
        "the strap renders outside the hold"
    );

    activate_hold(&rig.ctx, rig.playlist_id)
        .await
        .expect("arm the hold");
    assert_eq!(load_playlist(&rig).await.hold_state, HoldState::Pending);

    rig.clock.advance(1_500);
    let second = take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("take into the hold");
    assert_eq!(load_playlist(&rig).await.hold_state, HoldState::Active);

    let instances = piece_instances(&rig).await;
    let bed_instance = instances
        .iter()
        .find(|instance| instance.piece.id == bed.id)
        .expect("bed instantiated");
    let during = studio_timeline(&rig).await;
    assert!(
        during
            .object(&TimelineObjId::piece(bed_instance.id))
            .is_some(),
        "hold-only audio renders during the hold"
    );
    assert!(
        during.object(&strap_object).is_none(),
        "the strap is gated out during the hold"
    );
    let outgoing = during
        .object(&TimelineObjId::part_group(first))
        .expect("outgoing group stays alive");
    assert_eq!(outgoing.enable.end, None, "no cap while the hold runs");
    assert_eq!(outgoing.enable.duration, None);

    rig.clock.advance(1_500);
    let completed = take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("complete the hold");
    assert_eq!(
        completed, second,
        "completing a hold keeps the playhead in place"
    );
    assert_eq!(load_playlist(&rig).await.hold_state, HoldState::None);
    assert!(
        studio_timeline(&rig)
            .await
            .object(&TimelineObjId::piece(bed_instance.id))
            .is_none(),
        "the bed clears once the hold completes"
    );
}

struct BrandingHook;

impl TimelineHook for BrandingHook {
    fn id(&self) -> &str {
        "branding"
    }

    fn version(&self) -> &str {
        "2024.2"
    }

    fn post_process(
        &self,
        input: TimelineHookInput,
    ) -> std::result::Result<TimelineHookOutput, Box<dyn std::error::Error + Send + Sync>> {
        let seen = input
            .previous_persistent_state
            .and_then(|state| state["generations"].as_i64())
            .unwrap_or(0);
        let mut objects = input.objects;
        let mut bug = TimelineObject::new(
            TimelineObjId::new("branding_bug"),
            TimelineEnable::starting_at(TimeRef::absolute(0)),
            "gfx_bug",
        )
        .with_content(json!({ "opacity": 100 }));
        bug.keyframes.push(TimelineKeyframe {
            id: "bug_fade_in".into(),
            enable: TimelineEnable::starting_at(TimeRef::absolute(0)).with_duration(400),
            content: json!({ "opacity": 0 }),
        });
        objects.push(bug);
        Ok(TimelineHookOutput {
            objects,
            persistent_state: Some(json!({ "generations": seen + 1 })),
        })
    }
}

#[tokio::test]
async fn a_post_process_hook_rides_the_generation() {
    let rig = seeded_show_with(StudioSettings::default(), |ctx| {
        ctx.with_hook(Arc::new(BrandingHook))
    })
    .await;
    activate_playlist(&rig.ctx, rig.playlist_id, false)
        .await
        .expect("activate");

    let first_doc = studio_timeline(&rig).await;
    assert_eq!(first_doc.versions.hook_id.as_deref(), Some("branding"));
    assert_eq!(first_doc.versions.hook_version.as_deref(), Some("2024.2"));
    assert_eq!(first_doc.versions.core, env!("CARGO_PKG_VERSION"));
    let bug = first_doc
        .object(&TimelineObjId::new("branding_bug"))
        .expect("hook output lands in the committed document");
    assert_eq!(
        bug.keyframes.len(),
        1,
        "keyframes authored by the hook survive into the document"
    );
    assert_eq!(bug.keyframes[0].id, "bug_fade_in");
    assert_eq!(
        first_doc.persistent_state,
        Some(json!({ "generations": 1 }))
    );

    take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("take");

    let second_doc = studio_timeline(&rig).await;
    assert_eq!(
        second_doc.persistent_state,
        Some(json!({ "generations": 2 })),
        "hook state persists from one generation to the next"
    );
    assert_eq!(
        second_doc.versions.studio_config_hash,
        first_doc.versions.studio_config_hash
    );
}

#[tokio::test]
async fn every_committed_document_is_fast_published() {
    let rig = seeded_show(StudioSettings::default()).await;
    assert!(rig.publisher.is_empty());

    activate_playlist(&rig.ctx, rig.playlist_id, false)
        .await
        .expect("activate");
    take_next_part(&rig.ctx, rig.playlist_id)
        .await
        .expect("take");

    let published = rig.publisher.drain();
    assert_eq!(published.len(), 2, "one push per committed generation");
    let last = published.last().expect("publishes recorded");
    assert_eq!(
        last.hash,
        studio_timeline(&rig).await.hash,
        "the published document matches the stored one"
    );
}
