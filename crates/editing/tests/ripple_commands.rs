mod common;

use common::*;
use editing::{CommandManager, EdgeSelection, EditCommand};
use timeline::{EdgeType, Rate, RationalTime, TimingInput};

#[test]
fn insert_pushes_downstream_clips_right() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    for start in [0, 10, 20] {
        put(&f, &mut mgr, &f.v1, start, 10);
    }

    let result = mgr.execute(EditCommand::Insert {
        sequence_id: f.sequence.clone(),
        position: frames(10),
        clip: placement(&f, &f.v1, 500, 5),
    });
    assert_ok(&result);
    assert_eq!(result.outcome.shift, Some(5));
    assert_eq!(
        layout(&f, &f.v1),
        vec![
            (0, 10, 0, 10),
            (10, 5, 500, 505),
            (15, 10, 10, 20),
            (25, 10, 20, 30),
        ]
    );
    assert_no_overlaps(&f);
}

#[test]
fn insert_undo_restores_every_frame() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    put(&f, &mut mgr, &f.v1, 0, 30);
    put(&f, &mut mgr, &f.v2, 40, 10);
    put(&f, &mut mgr, &f.a1, 5, 20);
    let before = snapshot(&f);

    assert_ok(&mgr.execute(EditCommand::Insert {
        sequence_id: f.sequence.clone(),
        position: frames(12),
        clip: placement(&f, &f.v1, 100, 8),
    }));
    assert_ne!(snapshot(&f), before);

    assert_ok(&mgr.undo());
    assert_eq!(snapshot(&f), before);
}

#[test]
fn insert_cuts_straddling_clips_on_every_track() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let long = put(&f, &mut mgr, &f.v1, 0, 30);
    put(&f, &mut mgr, &f.a1, 5, 20);

    assert_ok(&mgr.execute(EditCommand::Insert {
        sequence_id: f.sequence.clone(),
        position: frames(12),
        clip: placement(&f, &f.v1, 100, 10),
    }));

    assert_eq!(
        layout(&f, &f.v1),
        vec![(0, 12, 0, 12), (12, 10, 100, 110), (22, 18, 12, 30)]
    );
    assert_eq!(layout(&f, &f.a1), vec![(5, 7, 5, 12), (22, 13, 12, 25)]);
    assert_eq!(clip(&f, &long).end_frame(), 12);
    assert_no_overlaps(&f);
}

#[test]
fn batch_ripple_shifts_by_the_largest_change_not_the_sum() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let a = put(&f, &mut mgr, &f.v1, 0, 10);
    put(&f, &mut mgr, &f.v1, 10, 10);
    let c = put(&f, &mut mgr, &f.v2, 0, 10);
    put(&f, &mut mgr, &f.v2, 10, 10);
    put(&f, &mut mgr, &f.a1, 10, 10);

    let result = mgr.execute(EditCommand::BatchRippleEdit {
        edges: vec![
            EdgeSelection::new(a.clone(), EdgeType::Out),
            EdgeSelection::new(c.clone(), EdgeType::Out),
        ],
        delta: frames(5),
    });
    assert_ok(&result);
    assert_eq!(result.outcome.shift, Some(5));
    assert_eq!(
        layout(&f, &f.v1),
        vec![(0, 15, 0, 15), (15, 10, 10, 20)]
    );
    assert_eq!(
        layout(&f, &f.v2),
        vec![(0, 15, 0, 15), (15, 10, 10, 20)]
    );
    assert_eq!(layout(&f, &f.a1), vec![(15, 10, 10, 20)]);
    assert_no_overlaps(&f);
}

#[test]
fn out_trim_clamps_at_the_end_of_the_media() {
    let f = fixture();
    let short = f
        .db
        .create_media(&f.project, "short", "/media/short.mov", 100, Rate::FPS_30)
        .unwrap();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let mut request = placement(&f, &f.v1, 0, 50);
    request.media_id = Some(short.id.clone());
    let placed = mgr.execute(EditCommand::Overwrite {
        sequence_id: f.sequence.clone(),
        position: frames(0),
        clip: request,
    });
    assert_ok(&placed);
    let id = placed.outcome.created[0].clone();

    let result = mgr.execute(EditCommand::RippleEdit {
        clip_id: id.clone(),
        edge: EdgeType::Out,
        delta: frames(80),
    });
    assert_ok(&result);
    assert!(result.outcome.clamped());
    assert_eq!(result.outcome.requested_delta, Some(80));
    assert_eq!(result.outcome.applied_delta, Some(50));

    let trimmed = clip(&f, &id);
    assert_eq!(trimmed.duration_frames(), 100);
    assert_eq!(trimmed.source_out.frames(), 100);
}

#[test]
fn in_trim_pulls_later_clips_left() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let a = put(&f, &mut mgr, &f.v1, 0, 20);
    put(&f, &mut mgr, &f.v1, 20, 10);

    let result = mgr.execute(EditCommand::RippleEdit {
        clip_id: a,
        edge: EdgeType::In,
        delta: frames(4),
    });
    assert_ok(&result);
    assert_eq!(result.outcome.shift, Some(-4));
    assert_eq!(
        layout(&f, &f.v1),
        vec![(0, 16, 4, 20), (16, 10, 20, 30)]
    );
}

#[test]
fn dragging_a_gap_closes_it_up_to_its_length() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    put(&f, &mut mgr, &f.v1, 0, 10);
    let b = put(&f, &mut mgr, &f.v1, 20, 10);

    let result = mgr.execute(EditCommand::RippleEdit {
        clip_id: b.clone(),
        edge: EdgeType::GapBefore,
        delta: frames(5),
    });
    assert_ok(&result);
    assert_eq!(clip(&f, &b).start_frame(), 15);

    let result = mgr.execute(EditCommand::RippleEdit {
        clip_id: b.clone(),
        edge: EdgeType::GapBefore,
        delta: frames(30),
    });
    assert_ok(&result);
    assert_eq!(result.outcome.applied_delta, Some(5));
    assert_eq!(clip(&f, &b).start_frame(), 10);
    assert_no_overlaps(&f);
}

#[test]
fn ripple_delete_closes_the_hole() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    put(&f, &mut mgr, &f.v1, 0, 10);
    let b = put(&f, &mut mgr, &f.v1, 10, 10);
    put(&f, &mut mgr, &f.v1, 20, 10);
    let before = snapshot(&f);

    let result = mgr.execute(EditCommand::RippleDelete {
        clip_ids: vec![b.clone()],
    });
    assert_ok(&result);
    assert_eq!(result.outcome.shift, Some(-10));
    assert_eq!(
        layout(&f, &f.v1),
        vec![(0, 10, 0, 10), (10, 10, 20, 30)]
    );
    assert!(!f.db.clip_exists(&b).unwrap());

    assert_ok(&mgr.undo());
    assert_eq!(snapshot(&f), before);
}

#[test]
fn nudge_occludes_what_it_lands_on_and_undoes_exactly() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let a = put(&f, &mut mgr, &f.v1, 0, 10);
    put(&f, &mut mgr, &f.v1, 20, 10);
    let before = snapshot(&f);

    let result = mgr.execute(EditCommand::Nudge {
        clip_ids: vec![a.clone()],
        delta: frames(15),
    });
    assert_ok(&result);
    assert_eq!(
        layout(&f, &f.v1),
        vec![(15, 10, 0, 10), (25, 5, 25, 30)]
    );
    assert_no_overlaps(&f);

    assert_ok(&mgr.undo());
    assert_eq!(snapshot(&f), before);
}

#[test]
fn nudge_stops_at_the_origin() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let a = put(&f, &mut mgr, &f.v1, 6, 10);

    let result = mgr.execute(EditCommand::Nudge {
        clip_ids: vec![a.clone()],
        delta: TimingInput::from_milliseconds(-1000),
    });
    assert_ok(&result);
    assert_eq!(result.outcome.requested_delta, Some(-30));
    assert_eq!(result.outcome.applied_delta, Some(-6));
    assert_eq!(clip(&f, &a).start_frame(), 0);
}

#[test]
fn roll_moves_the_cut_without_rippling() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let left = put(&f, &mut mgr, &f.v1, 0, 10);
    let right = put(&f, &mut mgr, &f.v1, 10, 10);
    put(&f, &mut mgr, &f.v1, 20, 10);

    let result = mgr.execute(EditCommand::RollEdit {
        left_clip_id: left,
        right_clip_id: right,
        delta: frames(3),
    });
    assert_ok(&result);
    assert_eq!(
        layout(&f, &f.v1),
        vec![(0, 13, 0, 13), (13, 7, 13, 20), (20, 10, 20, 30)]
    );
}

#[test]
fn split_inside_the_clip_only() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let id = put(&f, &mut mgr, &f.v1, 10, 10);

    for at in [10, 20, 25] {
        let result = mgr.execute(EditCommand::Split {
            clip_id: id.clone(),
            at: frames(at),
        });
        assert!(!result.success, "split at {at} should fail");
        assert_eq!(result.error_code, Some("VALIDATION"));
    }

    let result = mgr.execute(EditCommand::Split {
        clip_id: id.clone(),
        at: frames(14),
    });
    assert_ok(&result);
    assert_eq!(
        layout(&f, &f.v1),
        vec![(10, 4, 10, 14), (14, 6, 14, 20)]
    );
}

#[test]
fn inexact_rate_conversion_is_refused() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let id = put(&f, &mut mgr, &f.v1, 10, 10);
    let before = snapshot(&f);

    let result = mgr.execute(EditCommand::Nudge {
        clip_ids: vec![id],
        delta: TimingInput::Rational(RationalTime::at(1, Rate::FPS_24)),
    });
    assert!(!result.success);
    assert_eq!(result.error_code, Some("RATE_CONVERSION"));
    assert_eq!(snapshot(&f), before);
    assert_eq!(mgr.undo_depth(), 1);
}

#[test]
fn locked_tracks_reject_edits() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let id = put(&f, &mut mgr, &f.v1, 0, 10);
    f.db.set_track_locked(&f.v1, true).unwrap();

    let result = mgr.execute(EditCommand::Nudge {
        clip_ids: vec![id.clone()],
        delta: frames(5),
    });
    assert_eq!(result.error_code, Some("VALIDATION"));
    let result = mgr.execute(EditCommand::Split {
        clip_id: id,
        at: frames(5),
    });
    assert_eq!(result.error_code, Some("VALIDATION"));
}

#[test]
fn placement_outside_the_source_is_refused() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let before = snapshot(&f);

    let result = mgr.execute(EditCommand::Overwrite {
        sequence_id: f.sequence.clone(),
        position: frames(0),
        clip: placement(&f, &f.v1, -10, 20),
    });
    assert!(!result.success);
    assert_eq!(result.error_code, Some("CONSTRAINT"));

    let result = mgr.execute(EditCommand::Overwrite {
        sequence_id: f.sequence.clone(),
        position: frames(0),
        clip: placement(&f, &f.v1, 995, 10),
    });
    assert_eq!(result.error_code, Some("CONSTRAINT"));
    assert_eq!(snapshot(&f), before);
    assert_eq!(mgr.undo_depth(), 0);
}

#[test]
fn source_out_must_agree_with_duration() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let mut request = placement(&f, &f.v1, 0, 10);
    request.source_out = Some(frames(50));
    let result = mgr.execute(EditCommand::Overwrite {
        sequence_id: f.sequence.clone(),
        position: frames(0),
        clip: request.clone(),
    });
    assert_eq!(result.error_code, Some("VALIDATION"));
    assert!(layout(&f, &f.v1).is_empty());

    request.source_out = Some(frames(10));
    assert_ok(&mgr.execute(EditCommand::Overwrite {
        sequence_id: f.sequence.clone(),
        position: frames(0),
        clip: request,
    }));
    assert_eq!(layout(&f, &f.v1), vec![(0, 10, 0, 10)]);
}

#[test]
fn extreme_deltas_fail_cleanly() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    put(&f, &mut mgr, &f.v1, 0, 10);
    let b = put(&f, &mut mgr, &f.v1, 40, 10);

    let mut unsourced = placement(&f, &f.v2, 0, 10);
    unsourced.media_id = None;
    unsourced.source_in = None;
    let placed = mgr.execute(EditCommand::Overwrite {
        sequence_id: f.sequence.clone(),
        position: frames(0),
        clip: unsourced,
    });
    assert_ok(&placed);
    let loose = placed.outcome.created[0].clone();
    let before = snapshot(&f);

    let result = mgr.execute(EditCommand::RippleEdit {
        clip_id: b,
        edge: EdgeType::GapBefore,
        delta: frames(i64::MIN + 1),
    });
    assert!(!result.success);
    assert_eq!(result.error_code, Some("CONSTRAINT"));

    let result = mgr.execute(EditCommand::RippleEdit {
        clip_id: loose.clone(),
        edge: EdgeType::Out,
        delta: frames(i64::MAX),
    });
    assert_eq!(result.error_code, Some("CONSTRAINT"));

    let result = mgr.execute(EditCommand::Nudge {
        clip_ids: vec![loose],
        delta: frames(i64::MAX),
    });
    assert_eq!(result.error_code, Some("CONSTRAINT"));

    assert_eq!(snapshot(&f), before);
    assert_eq!(mgr.undo_depth(), 3);
}

#[test]
fn batch_edges_on_one_track_stack_up() {
    let f = fixture();
    let mut mgr = CommandManager::load(&f.db, &f.project).unwrap();
    let a = put(&f, &mut mgr, &f.v1, 0, 10);
    let b = put(&f, &mut mgr, &f.v1, 10, 10);
    put(&f, &mut mgr, &f.v1, 20, 10);
    put(&f, &mut mgr, &f.a1, 25, 10);
    let before = snapshot(&f);

    let result = mgr.execute(EditCommand::BatchRippleEdit {
        edges: vec![
            EdgeSelection::new(a, EdgeType::Out),
            EdgeSelection::new(b, EdgeType::Out),
        ],
        delta: frames(5),
    });
    assert_ok(&result);
    assert_eq!(result.outcome.shift, Some(10));
    assert_eq!(
        layout(&f, &f.v1),
        vec![(0, 15, 0, 15), (15, 15, 10, 25), (30, 10, 20, 30)]
    );
    assert_eq!(layout(&f, &f.a1), vec![(35, 10, 25, 35)]);
    assert_no_overlaps(&f);

    assert_ok(&mgr.undo());
    assert_eq!(snapshot(&f), before);
}
