#![allow(dead_code)]

use editing::{ClipPlacement, CommandManager, CommandResult, EditCommand};
use project::{EditSettings, MediaRow, ProjectDb, TrackType};
use timeline::{find_overlaps, Clip, ClipId, ProjectId, Rate, SequenceId, TimingInput, TrackId};

pub struct Fixture {
    pub db: ProjectDb,
    pub project: ProjectId,
    pub sequence: SequenceId,
    pub v1: TrackId,
    pub v2: TrackId,
    pub a1: TrackId,
    pub media: MediaRow,
}

/// A 30 fps sequence with tracks V1, V2 and A1, 1000 frames of 30 fps
/// media, and per-step overlap checks switched on.
pub fn fixture() -> Fixture {
    let db = ProjectDb::open_in_memory().unwrap();
    let project = ProjectId::from("project");
    db.ensure_project(&project, "Fixture").unwrap();
    db.update_edit_settings(
        &project,
        &EditSettings {
            verify_apply_steps: true,
            ..Default::default()
        },
    )
    .unwrap();
    let sequence = db.create_sequence(&project, "Main", Rate::FPS_30).unwrap().id;
    let v1 = db.create_track(&sequence, "V1", TrackType::Video, 0).unwrap().id;
    let v2 = db.create_track(&sequence, "V2", TrackType::Video, 1).unwrap().id;
    let a1 = db.create_track(&sequence, "A1", TrackType::Audio, 0).unwrap().id;
    let media = db
        .create_media(&project, "shot", "/media/shot.mov", 1000, Rate::FPS_30)
        .unwrap();
    Fixture {
        db,
        project,
        sequence,
        v1,
        v2,
        a1,
        media,
    }
}

pub fn frames(n: i64) -> TimingInput {
    TimingInput::from_frames(n)
}

pub fn placement(f: &Fixture, track: &TrackId, source_in: i64, duration: i64) -> ClipPlacement {
    ClipPlacement {
        track_id: track.clone(),
        media_id: Some(f.media.id.clone()),
        master_clip_id: None,
        name: None,
        duration: Some(frames(duration)),
        source_in: Some(frames(source_in)),
        source_out: None,
        role: None,
    }
}

/// Places a clip with overwrite semantics and returns its id.
pub fn put(
    f: &Fixture,
    manager: &mut CommandManager<'_>,
    track: &TrackId,
    start: i64,
    duration: i64,
) -> ClipId {
    let result = manager.execute(EditCommand::Overwrite {
        sequence_id: f.sequence.clone(),
        position: frames(start),
        clip: placement(f, track, start, duration),
    });
    assert_ok(&result);
    result.outcome.created[0].clone()
}

pub fn assert_ok(result: &CommandResult) {
    assert!(
        result.success,
        "command failed: {:?} ({:?})",
        result.error_message, result.error_code
    );
}

/// `(start, duration, source_in, source_out)` of every clip on a track, in
/// timeline order.
pub fn layout(f: &Fixture, track: &TrackId) -> Vec<(i64, i64, i64, i64)> {
    f.db.list_track_clips(track)
        .unwrap()
        .iter()
        .map(|c| {
            (
                c.start_frame(),
                c.duration_frames(),
                c.source_in.frames(),
                c.source_out.frames(),
            )
        })
        .collect()
}

pub fn clip(f: &Fixture, id: &ClipId) -> Clip {
    f.db.load_clip(id).unwrap()
}

/// Every clip of the sequence, sorted by id, for whole-state comparisons.
pub fn snapshot(f: &Fixture) -> Vec<Clip> {
    let mut clips = f.db.list_sequence_clips(&f.sequence).unwrap();
    clips.sort_by(|a, b| a.id.cmp(&b.id));
    clips
}

pub fn assert_no_overlaps(f: &Fixture) {
    for track in f.db.list_tracks(&f.sequence).unwrap() {
        let clips = f.db.list_track_clips(&track.id).unwrap();
        assert!(
            find_overlaps(&clips).is_empty(),
            "overlap on track {}",
            track.name
        );
    }
}
