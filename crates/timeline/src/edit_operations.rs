//! Pure edit planners: ripple, insert, overwrite, split, edge trims, roll,
//! nudge and ripple delete. Each one reads track states and returns a
//! `MutationPlan`; nothing here touches storage.

use serde::{Deserialize, Serialize};

use crate::{
    plan_delete, plan_insert, plan_update, resolve_occlusion, same_state, Clip, ClipId, Frame,
    IdAllocator, MutationPlan, PendingClips, RationalTime, RoundingMode, ShiftDirection,
    TimelineError, TrackId, TrackState,
};

/// Shifts every clip of `track` starting at or after `insert_time` by
/// `shift_amount`.
///
/// Records are ordered so that applying them one by one never makes two
/// clips overlap: rightmost first for a positive shift, leftmost first for
/// a negative one. A negative shift that would push a clip below the origin
/// or into a stationary clip is refused; callers clamp beforehand.
pub fn resolve_ripple(
    track: &TrackState,
    insert_time: RationalTime,
    shift_amount: RationalTime,
) -> Result<MutationPlan, TimelineError> {
    let direction = ShiftDirection::of(shift_amount.frames());
    let mut plan = MutationPlan::with_direction(direction);
    let Some(first) = track.clips.first() else {
        return Ok(plan);
    };
    if shift_amount.is_zero() {
        return Ok(plan);
    }
    let rate = first.sequence_rate();
    let point = insert_time.rescale_to(rate)?.frames();
    let shift = shift_amount.rescale_to(rate)?.frames();

    let (mut moving, stationary): (Vec<&Clip>, Vec<&Clip>) =
        track.clips.iter().partition(|c| c.start_frame() >= point);

    if shift < 0 {
        let floor = stationary.iter().map(|c| c.end_frame()).max().unwrap_or(0);
        if let Some(blocked) = moving.iter().find(|c| c.start_frame().saturating_add(shift) < floor) {
            return Err(TimelineError::Constraint(format!(
                "shifting clip {} by {} frames would collide at frame {}",
                blocked.id, shift, floor
            )));
        }
    }

    match direction {
        ShiftDirection::Left => moving.sort_by_key(|c| c.start_frame()),
        _ => moving.sort_by_key(|c| std::cmp::Reverse(c.start_frame())),
    }
    for clip in moving {
        plan.push(plan_update(&clip.shifted_by(shift)?, clip))?;
    }
    Ok(plan)
}

/// How far the clips at or after `point` can move left before touching a
/// stationary clip or the origin. `None` when nothing would move.
pub fn available_left_shift(track: &TrackState, point: Frame) -> Option<Frame> {
    let first_moving = track
        .clips
        .iter()
        .filter(|c| c.start_frame() >= point)
        .map(|c| c.start_frame())
        .min()?;
    let stationary_end = track
        .clips
        .iter()
        .filter(|c| c.start_frame() < point)
        .map(|c| c.end_frame())
        .max()
        .unwrap_or(0);
    Some((first_moving - stationary_end).max(0))
}

fn find_clip<'a>(tracks: &'a [TrackState], clip_id: &ClipId) -> Result<(usize, &'a Clip), TimelineError> {
    tracks
        .iter()
        .enumerate()
        .find_map(|(idx, t)| t.clips.iter().find(|c| &c.id == clip_id).map(|c| (idx, c)))
        .ok_or_else(|| TimelineError::ClipNotFound(clip_id.clone()))
}

fn ensure_unlocked(track: &TrackState) -> Result<(), TimelineError> {
    if track.locked {
        return Err(TimelineError::Validation(format!(
            "track {} is locked",
            track.track_id
        )));
    }
    Ok(())
}

fn at_frames(clip: &Clip, frames: Frame) -> RationalTime {
    RationalTime::at(frames, clip.sequence_rate())
}

/// Splits `clip` at `at`; the tail gets the next id from `ids`.
pub fn plan_split(
    clip: &Clip,
    at: Frame,
    ids: &mut IdAllocator,
    mode: RoundingMode,
) -> Result<MutationPlan, TimelineError> {
    let (head, tail) = clip.split_at(at, ids.next_clip_id(), mode)?;
    let mut plan = MutationPlan::new();
    plan.push(plan_update(&head, clip))?;
    plan.push(plan_insert(&tail))?;
    Ok(plan)
}

/// Insert edit: opens `shift` frames at `at` on every unlocked track and
/// drops `new_clips` into the hole.
///
/// Clips straddling `at` are cut; their tail lands right after the hole.
pub fn plan_insert_edit(
    tracks: &[TrackState],
    at: Frame,
    shift: Frame,
    new_clips: &[Clip],
    ids: &mut IdAllocator,
    mode: RoundingMode,
) -> Result<MutationPlan, TimelineError> {
    if shift <= 0 {
        return Err(TimelineError::Validation(format!(
            "insert length must be positive, got {shift}"
        )));
    }
    for clip in new_clips {
        let track = tracks
            .iter()
            .find(|t| clip.track_id.as_ref() == Some(&t.track_id))
            .ok_or_else(|| {
                TimelineError::Validation(format!("clip {} targets an unknown track", clip.id))
            })?;
        ensure_unlocked(track)?;
    }

    let mut plan = MutationPlan::with_direction(ShiftDirection::Right);
    for track in tracks.iter().filter(|t| !t.locked) {
        let Some(first) = track.clips.first() else {
            continue;
        };
        plan.extend(resolve_ripple(
            track,
            at_frames(first, at),
            at_frames(first, shift),
        )?)?;

        if let Some(straddler) = track
            .clips
            .iter()
            .find(|c| c.start_frame() < at && c.end_frame() > at)
        {
            let (head, tail) = straddler.split_at(at, ids.next_clip_id(), mode)?;
            plan.push(plan_update(&head, straddler))?;
            plan.push(plan_insert(&tail.shifted_by(shift)?))?;
        }
    }

    for clip in new_clips {
        clip.validate()?;
        plan.push(plan_insert(clip))?;
    }
    Ok(plan)
}

/// Overwrite edit: each new clip claims its range on its own track.
pub fn plan_overwrite_edit(
    tracks: &[TrackState],
    new_clips: &[Clip],
    ids: &mut IdAllocator,
    mode: RoundingMode,
) -> Result<MutationPlan, TimelineError> {
    let mut plan = MutationPlan::new();
    let mut pending = PendingClips::new();
    for clip in new_clips {
        clip.validate()?;
        let track = tracks
            .iter()
            .find(|t| clip.track_id.as_ref() == Some(&t.track_id))
            .ok_or_else(|| {
                TimelineError::Validation(format!("clip {} targets an unknown track", clip.id))
            })?;
        ensure_unlocked(track)?;

        let occlusion = resolve_occlusion(
            track,
            clip.timeline_start,
            clip.duration,
            Some(&pending),
            ids,
            mode,
        )?;
        pending.absorb(&occlusion);
        plan.extend(occlusion)?;

        let insert = plan_insert(clip);
        pending.propose(clip.clone());
        plan.push(insert)?;
    }
    Ok(plan)
}

/// Which side of a clip a ripple trim grabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Head of the clip; dragging right consumes source frames.
    In,
    /// Tail of the clip; dragging right reveals source frames.
    Out,
    /// The empty space before the clip; dragging right closes it.
    GapBefore,
    /// The empty space after the clip; dragging right widens it.
    GapAfter,
}

impl EdgeType {
    /// Sign of the duration change for a rightward drag.
    fn sign(self) -> Frame {
        match self {
            EdgeType::Out | EdgeType::GapAfter => 1,
            EdgeType::In | EdgeType::GapBefore => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTrim {
    pub clip_id: ClipId,
    pub edge: EdgeType,
    /// Length of the clip's media in its source rate, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_duration: Option<Frame>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RippleTrimOutcome {
    pub plan: MutationPlan,
    pub requested_delta: Frame,
    pub applied_delta: Frame,
    /// Downstream shift: the largest duration change among the edges.
    pub shift: Frame,
}

impl RippleTrimOutcome {
    pub fn clamped(&self) -> bool {
        self.requested_delta != self.applied_delta
    }
}

struct EdgeBounds {
    lo: Frame,
    hi: Frame,
    point: Frame,
}

fn edge_bounds(track: &TrackState, clip: &Clip, trim: &EdgeTrim) -> Result<EdgeBounds, TimelineError> {
    let others = || track.clips.iter().filter(|c| c.id != clip.id);
    let bounds = match trim.edge {
        EdgeType::In => EdgeBounds {
            lo: -clip.to_sequence_frames(clip.source_in.frames(), RoundingMode::Floor)?,
            hi: clip.duration_frames() - 1,
            point: clip.end_frame(),
        },
        EdgeType::Out => {
            let hi = match trim.media_duration {
                Some(media) => clip
                    .to_sequence_frames(media - clip.source_out.frames(), RoundingMode::Floor)?
                    .max(0),
                None => Frame::MAX,
            };
            EdgeBounds {
                lo: -(clip.duration_frames() - 1),
                hi,
                point: clip.end_frame(),
            }
        }
        EdgeType::GapBefore => {
            let prev_end = others()
                .filter(|c| c.end_frame() <= clip.start_frame())
                .map(|c| c.end_frame())
                .max()
                .unwrap_or(0);
            EdgeBounds {
                lo: Frame::MIN,
                hi: clip.start_frame() - prev_end,
                point: clip.start_frame(),
            }
        }
        EdgeType::GapAfter => {
            let next_start = others()
                .filter(|c| c.start_frame() >= clip.end_frame())
                .map(|c| c.start_frame())
                .min();
            match next_start {
                Some(next) => EdgeBounds {
                    lo: -(next - clip.end_frame()),
                    hi: Frame::MAX,
                    point: next,
                },
                None => EdgeBounds {
                    lo: Frame::MIN,
                    hi: Frame::MAX,
                    point: clip.end_frame(),
                },
            }
        }
    };
    Ok(bounds)
}

/// Ripple trim of one or more edges by one drag `delta`.
///
/// The drag is clamped so every edge stays valid (media bounds, a one-frame
/// minimum duration, gap lengths) and so closing shifts never collide on
/// tracks without an edge. On a track holding several edges, clips between
/// two edges move by the changes of the edges before them. Everything past
/// the last edge of a track, and everything past the earliest edge on tracks
/// without one, moves by the unified shift: the largest net change of any
/// edited track.
pub fn plan_ripple_edges(
    tracks: &[TrackState],
    edges: &[EdgeTrim],
    delta: Frame,
    mode: RoundingMode,
) -> Result<RippleTrimOutcome, TimelineError> {
    if edges.is_empty() {
        return Err(TimelineError::Validation("no edges selected".into()));
    }
    let mut selected: Vec<&EdgeTrim> = Vec::with_capacity(edges.len());
    for trim in edges {
        if !selected
            .iter()
            .any(|e| e.clip_id == trim.clip_id && e.edge == trim.edge)
        {
            selected.push(trim);
        }
    }

    let mut lo = -Frame::MAX;
    let mut hi = Frame::MAX;
    let mut marks: Vec<Vec<EdgeMark>> = vec![Vec::new(); tracks.len()];
    for trim in &selected {
        let (track_idx, clip) = find_clip(tracks, &trim.clip_id)?;
        ensure_unlocked(&tracks[track_idx])?;
        let bounds = edge_bounds(&tracks[track_idx], clip, trim)?;
        lo = lo.max(bounds.lo);
        hi = hi.min(bounds.hi);
        marks[track_idx].push(EdgeMark {
            point: bounds.point,
            sign: trim.edge.sign(),
        });
    }
    for track_marks in &mut marks {
        track_marks.sort_by_key(|m| m.point);
    }
    let global_point = marks
        .iter()
        .flatten()
        .map(|m| m.point)
        .min()
        .unwrap_or(0);

    // Net duration change per frame of drag, for each edited track.
    let weights: Vec<Frame> = marks
        .iter()
        .filter(|m| !m.is_empty())
        .map(|m| m.iter().map(|e| e.sign).sum::<Frame>())
        .collect();
    let max_weight = weights.iter().copied().max().unwrap_or(0);
    let min_weight = weights.iter().copied().min().unwrap_or(0);

    for (idx, track) in tracks.iter().enumerate() {
        if track.locked || !marks[idx].is_empty() {
            continue;
        }
        let Some(avail) = available_left_shift(track, global_point) else {
            continue;
        };
        if min_weight > 0 {
            lo = lo.max(-(avail / min_weight));
        }
        if max_weight < 0 {
            hi = hi.min(avail / -max_weight);
        }
    }

    if lo > hi {
        return Err(TimelineError::Constraint(format!(
            "no valid trim amount for the selected edges (range {lo}..={hi})"
        )));
    }
    let applied = delta.clamp(lo, hi);
    let shift = scaled(
        if applied >= 0 { max_weight } else { min_weight },
        applied,
    )?;

    let mut plan = MutationPlan::with_direction(ShiftDirection::of(shift));
    if applied == 0 {
        return Ok(RippleTrimOutcome {
            plan,
            requested_delta: delta,
            applied_delta: 0,
            shift: 0,
        });
    }

    let mut updates: Vec<(Clip, &Clip)> = Vec::new();
    for (idx, track) in tracks.iter().enumerate() {
        if track.locked {
            continue;
        }
        for clip in &track.clips {
            let mut next = clip.clone();
            for trim in selected.iter().filter(|e| e.clip_id == clip.id) {
                match trim.edge {
                    EdgeType::In => {
                        next.duration = next.duration.offset(-applied)?;
                        next.source_in =
                            next.source_in.offset(clip.to_source_frames(applied, mode)?)?;
                    }
                    EdgeType::Out => {
                        next.duration = next.duration.offset(applied)?;
                        next.source_out =
                            next.source_out.offset(clip.to_source_frames(applied, mode)?)?;
                    }
                    EdgeType::GapBefore | EdgeType::GapAfter => {}
                }
            }
            let offset =
                downstream_offset(&marks[idx], clip.start_frame(), global_point, applied, shift)?;
            if offset != 0 {
                next.timeline_start = next.timeline_start.offset(offset)?;
            }
            if !same_state(&next, clip) {
                next.validate()?;
                updates.push((next, clip));
            }
        }
    }

    match plan.direction() {
        ShiftDirection::Left => updates.sort_by_key(|(_, before)| before.start_frame()),
        _ => updates.sort_by_key(|(_, before)| std::cmp::Reverse(before.start_frame())),
    }
    for (after, before) in updates {
        plan.push(plan_update(&after, before))?;
    }
    Ok(RippleTrimOutcome {
        plan,
        requested_delta: delta,
        applied_delta: applied,
        shift,
    })
}

/// Where a selected edge ripples from on its track, and which way it grows.
#[derive(Debug, Clone, Copy)]
struct EdgeMark {
    point: Frame,
    sign: Frame,
}

fn scaled(weight: Frame, applied: Frame) -> Result<Frame, TimelineError> {
    weight.checked_mul(applied).ok_or(TimelineError::Overflow)
}

fn downstream_offset(
    marks: &[EdgeMark],
    start: Frame,
    global_point: Frame,
    applied: Frame,
    shift: Frame,
) -> Result<Frame, TimelineError> {
    let Some(last) = marks.last() else {
        return Ok(if start >= global_point { shift } else { 0 });
    };
    if start >= last.point {
        return Ok(shift);
    }
    let weight: Frame = marks
        .iter()
        .take_while(|m| m.point <= start)
        .map(|m| m.sign)
        .sum();
    scaled(weight, applied)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollOutcome {
    pub plan: MutationPlan,
    pub requested_delta: Frame,
    pub applied_delta: Frame,
}

/// Moves the cut between two adjacent clips by `delta` without rippling.
///
/// `left_media_duration` bounds how far the left clip can extend.
pub fn plan_roll_edit(
    left: &Clip,
    right: &Clip,
    delta: Frame,
    left_media_duration: Option<Frame>,
    mode: RoundingMode,
) -> Result<RollOutcome, TimelineError> {
    if left.track_id != right.track_id || left.end_frame() != right.start_frame() {
        return Err(TimelineError::Validation(format!(
            "clips {} and {} are not adjacent on one track",
            left.id, right.id
        )));
    }
    let mut lo = -(left.duration_frames() - 1);
    lo = lo.max(-right.to_sequence_frames(right.source_in.frames(), RoundingMode::Floor)?);
    let mut hi = right.duration_frames() - 1;
    if let Some(media) = left_media_duration {
        hi = hi.min(
            left.to_sequence_frames(media - left.source_out.frames(), RoundingMode::Floor)?
                .max(0),
        );
    }
    if lo > hi {
        return Err(TimelineError::Constraint(format!(
            "no room to roll the cut between {} and {}",
            left.id, right.id
        )));
    }
    let applied = delta.clamp(lo, hi);
    let mut plan = MutationPlan::with_direction(ShiftDirection::of(applied));
    if applied == 0 {
        return Ok(RollOutcome {
            plan,
            requested_delta: delta,
            applied_delta: 0,
        });
    }

    let mut new_left = left.clone();
    new_left.duration = left.duration.offset(applied)?;
    new_left.source_out = left.source_out.offset(left.to_source_frames(applied, mode)?)?;
    let mut new_right = right.clone();
    new_right.timeline_start = right.timeline_start.offset(applied)?;
    new_right.duration = right.duration.offset(-applied)?;
    new_right.source_in = right.source_in.offset(right.to_source_frames(applied, mode)?)?;
    new_left.validate()?;
    new_right.validate()?;

    if applied > 0 {
        plan.push(plan_update(&new_right, right))?;
        plan.push(plan_update(&new_left, left))?;
    } else {
        plan.push(plan_update(&new_left, left))?;
        plan.push(plan_update(&new_right, right))?;
    }
    Ok(RollOutcome {
        plan,
        requested_delta: delta,
        applied_delta: applied,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct NudgeOutcome {
    pub plan: MutationPlan,
    pub requested_delta: Frame,
    pub applied_delta: Frame,
}

/// Moves clips by `delta` frames and occludes whatever they land on.
/// The delta is clamped so no clip starts before the origin.
pub fn plan_nudge(
    tracks: &[TrackState],
    clip_ids: &[ClipId],
    delta: Frame,
    ids: &mut IdAllocator,
    mode: RoundingMode,
) -> Result<NudgeOutcome, TimelineError> {
    if clip_ids.is_empty() {
        return Err(TimelineError::Validation("no clips to nudge".into()));
    }
    let mut moving: Vec<(usize, &Clip)> = Vec::with_capacity(clip_ids.len());
    for clip_id in clip_ids {
        let (idx, clip) = find_clip(tracks, clip_id)?;
        ensure_unlocked(&tracks[idx])?;
        if !moving.iter().any(|(_, c)| c.id == clip.id) {
            moving.push((idx, clip));
        }
    }
    let earliest = moving
        .iter()
        .map(|(_, c)| c.start_frame())
        .min()
        .unwrap_or(0);
    let applied = delta.max(-earliest);

    let direction = ShiftDirection::of(applied);
    let mut plan = MutationPlan::with_direction(direction);
    if applied == 0 {
        return Ok(NudgeOutcome {
            plan,
            requested_delta: delta,
            applied_delta: 0,
        });
    }
    match direction {
        ShiftDirection::Left => moving.sort_by_key(|(_, c)| c.start_frame()),
        _ => moving.sort_by_key(|(_, c)| std::cmp::Reverse(c.start_frame())),
    }

    let mut pending = PendingClips::new();
    let mut moved = Vec::with_capacity(moving.len());
    for (idx, clip) in &moving {
        let next = clip.shifted_by(applied)?;
        next.validate()?;
        pending.propose(next.clone());
        pending.mark_in_flight(&clip.id);
        plan.push(plan_update(&next, clip))?;
        moved.push((*idx, next));
    }
    for (idx, clip) in &moved {
        let occlusion = resolve_occlusion(
            &tracks[*idx],
            clip.timeline_start,
            clip.duration,
            Some(&pending),
            ids,
            mode,
        )?;
        pending.absorb(&occlusion);
        plan.extend(occlusion)?;
    }
    Ok(NudgeOutcome {
        plan,
        requested_delta: delta,
        applied_delta: applied,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct RippleDeleteOutcome {
    pub plan: MutationPlan,
    /// Total frames closed across all deleted clips.
    pub closed: Frame,
}

/// Deletes clips and closes the space they leave on every unlocked track,
/// as far as each track allows.
pub fn plan_ripple_delete(
    tracks: &[TrackState],
    clip_ids: &[ClipId],
) -> Result<RippleDeleteOutcome, TimelineError> {
    let mut targets: Vec<(usize, &Clip)> = Vec::with_capacity(clip_ids.len());
    for clip_id in clip_ids {
        let (idx, clip) = find_clip(tracks, clip_id)?;
        ensure_unlocked(&tracks[idx])?;
        if !targets.iter().any(|(_, c)| c.id == clip.id) {
            targets.push((idx, clip));
        }
    }
    targets.sort_by_key(|(_, c)| std::cmp::Reverse(c.start_frame()));

    let mut plan = MutationPlan::with_direction(ShiftDirection::Left);
    let mut pending = PendingClips::new();
    let mut closed = 0;
    for (_, target) in targets {
        plan.push(plan_delete(target))?;
        pending.remove(&target.id);

        let point = target.end_frame();
        let views: Vec<TrackState> = tracks
            .iter()
            .filter(|t| !t.locked)
            .map(|t| pending.overlay(t))
            .collect();
        let room = views
            .iter()
            .filter_map(|t| available_left_shift(t, point))
            .min()
            .unwrap_or(0);
        let gap = room.min(target.duration_frames());
        if gap <= 0 {
            continue;
        }
        for view in &views {
            let ripple = resolve_ripple(
                view,
                at_frames(target, point),
                at_frames(target, -gap),
            )?;
            pending.absorb(&ripple);
            plan.extend(ripple)?;
        }
        closed += gap;
    }
    Ok(RippleDeleteOutcome { plan, closed })
}

/// An empty stretch of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub track_id: TrackId,
    pub start: Frame,
    pub end: Frame,
}

impl Gap {
    pub fn duration(&self) -> Frame {
        self.end - self.start
    }
}

/// Gaps between consecutive clips, including the one before the first clip.
pub fn find_gaps(track: &TrackState) -> Vec<Gap> {
    let mut clips: Vec<&Clip> = track.clips.iter().collect();
    clips.sort_by_key(|c| c.start_frame());
    let mut gaps = Vec::new();
    let mut cursor = 0;
    for clip in clips {
        if clip.start_frame() > cursor {
            gaps.push(Gap {
                track_id: track.track_id.clone(),
                start: cursor,
                end: clip.start_frame(),
            });
        }
        cursor = cursor.max(clip.end_frame());
    }
    gaps
}

/// Pairs of clips whose ranges intersect.
pub fn find_overlaps(clips: &[Clip]) -> Vec<(ClipId, ClipId)> {
    let mut sorted: Vec<&Clip> = clips.iter().collect();
    sorted.sort_by_key(|c| c.start_frame());
    let mut overlaps = Vec::new();
    let mut reach: Option<&Clip> = None;
    for clip in sorted {
        if let Some(prev) = reach {
            if clip.start_frame() < prev.end_frame() {
                overlaps.push((prev.id.clone(), clip.id.clone()));
            }
            if clip.end_frame() > prev.end_frame() {
                reach = Some(clip);
            }
        } else {
            reach = Some(clip);
        }
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::fixtures::clip_on;
    use crate::{MutationRecord, Rate};

    fn at(frames: Frame) -> RationalTime {
        RationalTime::at(frames, Rate::FPS_30)
    }

    fn track(id: &str, clips: Vec<Clip>) -> TrackState {
        TrackState::new(TrackId::from(id), clips)
    }

    /// Applies a plan to plain track states, checking for overlaps after
    /// every record.
    fn apply_stepwise(tracks: &mut [TrackState], plan: &MutationPlan) {
        for record in plan.records() {
            for t in tracks.iter_mut() {
                t.clips.retain(|c| &c.id != record.clip_id());
            }
            if let Some(after) = record.after() {
                let t = tracks
                    .iter_mut()
                    .find(|t| after.track_id.as_ref() == Some(&t.track_id))
                    .unwrap();
                t.clips.push(after.clone());
            }
            for t in tracks.iter() {
                assert!(
                    find_overlaps(&t.clips).is_empty(),
                    "transient overlap on {} after {:?}",
                    t.track_id,
                    record.clip_id()
                );
            }
        }
        for t in tracks.iter_mut() {
            t.clips.sort_by_key(|c| c.start_frame());
        }
    }

    fn starts(track: &TrackState) -> Vec<Frame> {
        track.clips.iter().map(|c| c.start_frame()).collect()
    }

    #[test]
    fn ripple_shifts_clips_at_or_after_point() {
        let t = track(
            "v1",
            vec![
                clip_on("v1", "a", 0, 10),
                clip_on("v1", "b", 10, 10),
                clip_on("v1", "c", 20, 10),
            ],
        );
        let plan = resolve_ripple(&t, at(10), at(5)).unwrap();
        assert_eq!(plan.direction(), ShiftDirection::Right);
        let order: Vec<&str> = plan.records().iter().map(|r| r.clip_id().as_str()).collect();
        assert_eq!(order, vec!["c", "b"]);

        assert!(resolve_ripple(&t, at(10), at(0)).unwrap().is_empty());
    }

    #[test]
    fn closing_ripple_refuses_collisions() {
        let t = track(
            "v1",
            vec![clip_on("v1", "a", 0, 10), clip_on("v1", "b", 15, 10)],
        );
        let err = resolve_ripple(&t, at(15), at(-6)).unwrap_err();
        assert!(matches!(err, TimelineError::Constraint(_)));

        let plan = resolve_ripple(&t, at(15), at(-5)).unwrap();
        assert_eq!(plan.direction(), ShiftDirection::Left);
        assert_eq!(available_left_shift(&t, 15), Some(5));
        assert_eq!(available_left_shift(&t, 30), None);
    }

    #[test]
    fn insert_ripples_downstream_clips() {
        let mut tracks = vec![track(
            "v1",
            vec![
                clip_on("v1", "a", 0, 10),
                clip_on("v1", "b", 10, 10),
                clip_on("v1", "c", 20, 10),
            ],
        )];
        let new_clip = clip_on("v1", "n", 10, 5);
        let mut ids = IdAllocator::new();
        let plan = plan_insert_edit(&tracks, 10, 5, &[new_clip], &mut ids, RoundingMode::Exact)
            .unwrap();

        apply_stepwise(&mut tracks, &plan);
        assert_eq!(starts(&tracks[0]), vec![0, 10, 15, 25]);
        assert!(tracks[0].clips.iter().all(|c| c.duration_frames() == 10
            || c.id.as_str() == "n"));
        assert!(ids.issued().is_empty());
    }

    #[test]
    fn insert_cuts_straddlers_on_every_unlocked_track() {
        let mut tracks = vec![
            track("v1", vec![clip_on("v1", "a", 0, 20)]),
            track("a1", vec![clip_on("a1", "x", 5, 20)]),
            track("a2", vec![clip_on("a2", "y", 5, 20)]).locked(true),
        ];
        let mut ids = IdAllocator::new();
        let plan = plan_insert_edit(
            &tracks,
            10,
            4,
            &[clip_on("v1", "n", 10, 4)],
            &mut ids,
            RoundingMode::Exact,
        )
        .unwrap();
        apply_stepwise(&mut tracks, &plan);

        assert_eq!(starts(&tracks[0]), vec![0, 10, 14]);
        assert_eq!(tracks[0].clips[2].source_in.frames(), 10);
        assert_eq!(starts(&tracks[1]), vec![5, 14]);
        assert_eq!(tracks[1].clips[1].end_frame(), 29);
        assert_eq!(starts(&tracks[2]), vec![5]);
        assert_eq!(ids.issued().len(), 2);
    }

    #[test]
    fn insert_on_locked_track_is_rejected() {
        let tracks = vec![track("v1", vec![]).locked(true)];
        let mut ids = IdAllocator::new();
        let err = plan_insert_edit(
            &tracks,
            0,
            4,
            &[clip_on("v1", "n", 0, 4)],
            &mut ids,
            RoundingMode::Exact,
        )
        .unwrap_err();
        assert!(matches!(err, TimelineError::Validation(_)));
    }

    #[test]
    fn overwrite_occludes_without_ripple() {
        let mut tracks = vec![track(
            "v1",
            vec![clip_on("v1", "a", 0, 30), clip_on("v1", "b", 30, 30)],
        )];
        let mut ids = IdAllocator::new();
        let plan = plan_overwrite_edit(
            &tracks,
            &[clip_on("v1", "n", 20, 20)],
            &mut ids,
            RoundingMode::Exact,
        )
        .unwrap();
        apply_stepwise(&mut tracks, &plan);
        let ranges: Vec<(Frame, Frame)> = tracks[0]
            .clips
            .iter()
            .map(|c| (c.start_frame(), c.end_frame()))
            .collect();
        assert_eq!(ranges, vec![(0, 20), (20, 40), (40, 60)]);
    }

    #[test]
    fn batch_out_trims_shift_by_max_not_sum() {
        let mut tracks = vec![
            track("v1", vec![clip_on("v1", "a", 0, 20)]),
            track("v2", vec![clip_on("v2", "b", 0, 30)]),
            track("v3", vec![clip_on("v3", "c", 40, 10)]),
        ];
        let edges = vec![
            EdgeTrim {
                clip_id: "a".into(),
                edge: EdgeType::Out,
                media_duration: Some(1000),
            },
            EdgeTrim {
                clip_id: "b".into(),
                edge: EdgeType::Out,
                media_duration: Some(1000),
            },
        ];
        let outcome = plan_ripple_edges(&tracks, &edges, 5, RoundingMode::Exact).unwrap();
        assert_eq!(outcome.shift, 5);
        apply_stepwise(&mut tracks, &outcome.plan);
        assert_eq!(tracks[0].clips[0].duration_frames(), 25);
        assert_eq!(tracks[1].clips[0].duration_frames(), 35);
        assert_eq!(starts(&tracks[2]), vec![45]);
    }

    #[test]
    fn edges_on_one_track_accumulate_downstream() {
        let mut tracks = vec![
            track(
                "v1",
                vec![
                    clip_on("v1", "a", 0, 10),
                    clip_on("v1", "b", 10, 10),
                    clip_on("v1", "c", 20, 10),
                ],
            ),
            track("v2", vec![clip_on("v2", "x", 0, 10)]),
            track("a1", vec![clip_on("a1", "y", 25, 10)]),
        ];
        let edges = vec![
            EdgeTrim {
                clip_id: "a".into(),
                edge: EdgeType::Out,
                media_duration: Some(1000),
            },
            EdgeTrim {
                clip_id: "b".into(),
                edge: EdgeType::Out,
                media_duration: Some(1000),
            },
            EdgeTrim {
                clip_id: "x".into(),
                edge: EdgeType::Out,
                media_duration: Some(1000),
            },
        ];
        let outcome = plan_ripple_edges(&tracks, &edges, 5, RoundingMode::Exact).unwrap();
        assert_eq!(outcome.shift, 10);
        apply_stepwise(&mut tracks, &outcome.plan);

        let ranges: Vec<(Frame, Frame)> = tracks[0]
            .clips
            .iter()
            .map(|c| (c.start_frame(), c.end_frame()))
            .collect();
        assert_eq!(ranges, vec![(0, 15), (15, 30), (30, 40)]);
        assert_eq!(tracks[0].clips[1].source_out.frames(), 15);
        assert_eq!(tracks[1].clips[0].end_frame(), 15);
        assert_eq!(starts(&tracks[2]), vec![35]);
    }

    #[test]
    fn unbounded_drag_overflows_instead_of_wrapping() {
        let tracks = vec![track(
            "v1",
            vec![clip_on("v1", "a", 0, 10), clip_on("v1", "b", 40, 10)],
        )];
        let gap = vec![EdgeTrim {
            clip_id: "b".into(),
            edge: EdgeType::GapBefore,
            media_duration: None,
        }];
        let err = plan_ripple_edges(&tracks, &gap, Frame::MIN, RoundingMode::Exact).unwrap_err();
        assert_eq!(err, TimelineError::Overflow);

        let out = vec![EdgeTrim {
            clip_id: "b".into(),
            edge: EdgeType::Out,
            media_duration: None,
        }];
        let err = plan_ripple_edges(&tracks, &out, Frame::MAX, RoundingMode::Exact).unwrap_err();
        assert_eq!(err, TimelineError::Overflow);
    }

    #[test]
    fn out_trim_clamps_to_media_duration() {
        let tracks = vec![track("v1", vec![clip_on("v1", "a", 0, 50)])];
        let edges = vec![EdgeTrim {
            clip_id: "a".into(),
            edge: EdgeType::Out,
            media_duration: Some(70),
        }];
        let outcome = plan_ripple_edges(&tracks, &edges, 100, RoundingMode::Exact).unwrap();
        assert_eq!(outcome.applied_delta, 20);
        assert!(outcome.clamped());
        let MutationRecord::Update { after, .. } = &outcome.plan.records()[0] else {
            panic!("expected update");
        };
        assert_eq!(after.source_out.frames(), 70);
        assert_eq!(after.duration_frames(), 70);
    }

    #[test]
    fn in_edge_and_gap_edge_close_together() {
        let mut tracks = vec![
            track("v1", vec![clip_on("v1", "b", 30, 20)]),
            track("v2", vec![clip_on("v2", "a", 0, 50)]),
        ];
        let edges = vec![
            EdgeTrim {
                clip_id: "a".into(),
                edge: EdgeType::In,
                media_duration: None,
            },
            EdgeTrim {
                clip_id: "b".into(),
                edge: EdgeType::GapBefore,
                media_duration: None,
            },
        ];
        let outcome = plan_ripple_edges(&tracks, &edges, 10, RoundingMode::Exact).unwrap();
        assert_eq!(outcome.shift, -10);
        apply_stepwise(&mut tracks, &outcome.plan);

        let a = &tracks[1].clips[0];
        assert_eq!((a.start_frame(), a.duration_frames()), (0, 40));
        assert_eq!(a.source_in.frames(), 10);
        assert_eq!(starts(&tracks[0]), vec![20]);
    }

    #[test]
    fn gap_close_is_limited_by_other_tracks() {
        let mut tracks = vec![
            track(
                "v1",
                vec![clip_on("v1", "a", 0, 10), clip_on("v1", "b", 30, 10)],
            ),
            track(
                "v2",
                vec![clip_on("v2", "x", 0, 25), clip_on("v2", "y", 32, 10)],
            ),
        ];
        let edges = vec![EdgeTrim {
            clip_id: "b".into(),
            edge: EdgeType::GapBefore,
            media_duration: None,
        }];
        let outcome = plan_ripple_edges(&tracks, &edges, 20, RoundingMode::Exact).unwrap();
        assert_eq!(outcome.applied_delta, 7);
        apply_stepwise(&mut tracks, &outcome.plan);
        assert_eq!(starts(&tracks[0]), vec![0, 23]);
        assert_eq!(starts(&tracks[1]), vec![0, 25]);
    }

    #[test]
    fn roll_edit_moves_the_cut_within_bounds() {
        let a = clip_on("v1", "a", 0, 30);
        let b = clip_on("v1", "b", 30, 30);
        let outcome = plan_roll_edit(&a, &b, 10, Some(100), RoundingMode::Exact).unwrap();
        assert_eq!(outcome.applied_delta, 10);
        let mut tracks = vec![track("v1", vec![a.clone(), b.clone()])];
        apply_stepwise(&mut tracks, &outcome.plan);
        assert_eq!(tracks[0].clips[0].end_frame(), 40);
        assert_eq!(tracks[0].clips[1].source_in.frames(), 10);

        // The right clip has no source frames before its in-point.
        let outcome = plan_roll_edit(&a, &b, -10, Some(100), RoundingMode::Exact).unwrap();
        assert_eq!(outcome.applied_delta, 0);

        let gap = clip_on("v1", "c", 70, 10);
        assert!(plan_roll_edit(&b, &gap, 1, None, RoundingMode::Exact).is_err());
    }

    #[test]
    fn nudge_occludes_landing_range() {
        let mut tracks = vec![track(
            "v1",
            vec![
                clip_on("v1", "a", 0, 10),
                clip_on("v1", "b", 10, 10),
                clip_on("v1", "c", 30, 10),
            ],
        )];
        let mut ids = IdAllocator::new();
        let outcome = plan_nudge(
            &tracks,
            &["a".into(), "b".into()],
            15,
            &mut ids,
            RoundingMode::Exact,
        )
        .unwrap();
        assert_eq!(outcome.plan.direction(), ShiftDirection::Right);
        apply_stepwise_final(&mut tracks, &outcome.plan);
        let ranges: Vec<(&str, Frame, Frame)> = tracks[0]
            .clips
            .iter()
            .map(|c| (c.id.as_str(), c.start_frame(), c.end_frame()))
            .collect();
        assert_eq!(ranges, vec![("a", 15, 25), ("b", 25, 35), ("c", 35, 40)]);
    }

    #[test]
    fn nudge_left_stops_at_origin() {
        let tracks = vec![track("v1", vec![clip_on("v1", "a", 5, 10)])];
        let mut ids = IdAllocator::new();
        let outcome =
            plan_nudge(&tracks, &["a".into()], -20, &mut ids, RoundingMode::Exact).unwrap();
        assert_eq!(outcome.applied_delta, -5);
    }

    #[test]
    fn ripple_delete_closes_gap_as_far_as_tracks_allow() {
        let mut tracks = vec![
            track(
                "v1",
                vec![
                    clip_on("v1", "a", 0, 10),
                    clip_on("v1", "b", 10, 10),
                    clip_on("v1", "c", 20, 10),
                ],
            ),
            track(
                "a1",
                vec![clip_on("a1", "x", 0, 14), clip_on("a1", "y", 20, 10)],
            ),
        ];
        let outcome = plan_ripple_delete(&tracks, &["b".into()]).unwrap();
        assert_eq!(outcome.closed, 6);
        apply_stepwise(&mut tracks, &outcome.plan);
        assert_eq!(starts(&tracks[0]), vec![0, 14]);
        assert_eq!(starts(&tracks[1]), vec![0, 14]);
    }

    #[test]
    fn gaps_and_overlaps_are_reported() {
        let t = track(
            "v1",
            vec![
                clip_on("v1", "a", 5, 10),
                clip_on("v1", "b", 20, 10),
                clip_on("v1", "c", 25, 10),
            ],
        );
        let gaps = find_gaps(&t);
        assert_eq!(
            gaps.iter().map(|g| (g.start, g.end)).collect::<Vec<_>>(),
            vec![(0, 5), (15, 20)]
        );
        assert_eq!(
            find_overlaps(&t.clips),
            vec![(ClipId::from("b"), ClipId::from("c"))]
        );
    }

    /// Nudge plans move clips before trimming what they land on, so only the
    /// final state is free of overlaps.
    fn apply_stepwise_final(tracks: &mut [TrackState], plan: &MutationPlan) {
        for record in plan.records() {
            for t in tracks.iter_mut() {
                t.clips.retain(|c| &c.id != record.clip_id());
                if let Some(after) = record.after() {
                    if after.track_id.as_ref() == Some(&t.track_id) {
                        t.clips.push(after.clone());
                    }
                }
            }
        }
        for t in tracks.iter_mut() {
            t.clips.sort_by_key(|c| c.start_frame());
            assert!(find_overlaps(&t.clips).is_empty());
        }
    }
}
