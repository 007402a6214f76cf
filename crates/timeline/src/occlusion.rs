use crate::{
    plan_delete, plan_insert, plan_update, Frame, IdAllocator, MutationPlan, PendingClips,
    RationalTime, RoundingMode, ShiftDirection, TimelineError, TrackState,
};

/// Carves `[timeline_start, timeline_start + duration)` out of `track`.
///
/// Overlapped clips are deleted, truncated, or split in two; the tail of a
/// split gets a fresh id from `ids`. When `pending` is given, proposed clip
/// states replace persisted ones and in-flight clips are left untouched.
pub fn resolve_occlusion(
    track: &TrackState,
    timeline_start: RationalTime,
    duration: RationalTime,
    pending: Option<&PendingClips>,
    ids: &mut IdAllocator,
    mode: RoundingMode,
) -> Result<MutationPlan, TimelineError> {
    let mut plan = MutationPlan::with_direction(ShiftDirection::None);
    if duration.frames() <= 0 {
        return Ok(plan);
    }
    let clips = match pending {
        Some(pending) => pending.effective(track),
        None => track.clips.clone(),
    };

    for clip in clips {
        if pending.is_some_and(|p| p.is_in_flight(&clip.id)) {
            continue;
        }
        let rate = clip.sequence_rate();
        let start: Frame = timeline_start.rescale_to(rate)?.frames();
        let end: Frame = start
            .checked_add(duration.rescale_to(rate)?.frames())
            .ok_or(TimelineError::Overflow)?;
        if !clip.overlaps(start, end) {
            continue;
        }

        let starts_before = clip.start_frame() < start;
        let ends_after = clip.end_frame() > end;
        match (starts_before, ends_after) {
            (false, false) => plan.push(plan_delete(&clip))?,
            (true, true) => {
                let head = clip.truncated_to(start, mode)?;
                let tail = clip.advanced_to(end, mode)?;
                match (head, tail) {
                    (Some(head), Some(mut tail)) => {
                        tail.id = ids.next_clip_id();
                        plan.push(plan_update(&head, &clip))?;
                        plan.push(plan_insert(&tail))?;
                    }
                    (Some(head), None) => plan.push(plan_update(&head, &clip))?,
                    (None, Some(tail)) => plan.push(plan_update(&tail, &clip))?,
                    (None, None) => plan.push(plan_delete(&clip))?,
                }
            }
            (true, false) => match clip.truncated_to(start, mode)? {
                Some(head) => plan.push(plan_update(&head, &clip))?,
                None => plan.push(plan_delete(&clip))?,
            },
            (false, true) => match clip.advanced_to(end, mode)? {
                Some(tail) => plan.push(plan_update(&tail, &clip))?,
                None => plan.push(plan_delete(&clip))?,
            },
        }
    }
    Ok(plan)
}
