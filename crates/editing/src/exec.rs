//! Executors: validate parameters, plan, apply, and build the undo payload.
//! Every function here runs inside the transaction opened by the manager.

use project::{
    ApplyOptions, EditSettings, ExecutedPlan, MediaRow, ProjectDb, SequenceRateProvider,
};
use timeline::{
    plan_delete, plan_insert_edit, plan_nudge, plan_overwrite_edit, plan_ripple_delete,
    plan_ripple_edges, plan_roll_edit, plan_split, Clip, ClipId, ClipKind, ClipLink, ClipOptions,
    EdgeTrim, Frame, IdAllocator, MutationPlan, ProjectId, Rate, RationalTime, RoundingMode,
    SequenceId, ShiftDirection, TimingInput,
};
use tracing::{debug, info};

use crate::{
    ClipPlacement, CommandOutcome, EdgeSelection, EditCommand, EditError, EditResult,
    PlacementMode, UndoPayload,
};

pub(crate) struct Executed {
    pub payload: UndoPayload,
    pub outcome: CommandOutcome,
}

pub(crate) struct EditContext<'a> {
    pub db: &'a ProjectDb,
    pub project_id: &'a ProjectId,
    pub settings: &'a EditSettings,
    pub rates: SequenceRateProvider<'a>,
    pub ids: IdAllocator,
}

impl<'a> EditContext<'a> {
    pub fn new(
        db: &'a ProjectDb,
        project_id: &'a ProjectId,
        settings: &'a EditSettings,
        ids: IdAllocator,
    ) -> Self {
        Self {
            db,
            project_id,
            settings,
            rates: SequenceRateProvider::new(db),
            ids,
        }
    }

    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            verify_each_step: self.settings.verify_apply_steps,
        }
    }

    fn apply(&self, plan: &MutationPlan) -> EditResult<ExecutedPlan> {
        Ok(self.db.apply_mutations(plan, &self.apply_options())?)
    }

    fn load_timeline_clip(&mut self, clip_id: &ClipId) -> EditResult<(Clip, SequenceId, Rate)> {
        let clip = self.db.load_clip(clip_id)?;
        let Some(sequence_id) = clip.owner_sequence_id.clone() else {
            return Err(EditError::Validation(format!(
                "clip {clip_id} is not on a timeline"
            )));
        };
        if clip.clip_kind != ClipKind::Timeline {
            return Err(EditError::Validation(format!(
                "clip {clip_id} is a master clip"
            )));
        }
        let rate = self.rates.rate(&sequence_id)?;
        Ok((clip, sequence_id, rate))
    }

    /// Loads clips that must all live in one sequence.
    fn load_in_one_sequence(
        &mut self,
        clip_ids: &[ClipId],
    ) -> EditResult<(Vec<Clip>, SequenceId, Rate)> {
        let mut clips = Vec::with_capacity(clip_ids.len());
        let mut sequence: Option<(SequenceId, Rate)> = None;
        for clip_id in clip_ids {
            let (clip, sequence_id, rate) = self.load_timeline_clip(clip_id)?;
            match &sequence {
                Some((seen, _)) if seen != &sequence_id => {
                    return Err(EditError::Validation(format!(
                        "clips span sequences {seen} and {sequence_id}"
                    )));
                }
                Some(_) => {}
                None => sequence = Some((sequence_id, rate)),
            }
            clips.push(clip);
        }
        let (sequence_id, rate) =
            sequence.ok_or_else(|| EditError::Validation("no clips given".into()))?;
        Ok((clips, sequence_id, rate))
    }

    /// Media length in the clip's source rate, when it is known.
    fn source_length(&self, clip: &Clip) -> EditResult<Option<Frame>> {
        if let Some(media_id) = &clip.media_id {
            if let Some(media) = self.db.get_media_optional(media_id)? {
                if media.rate == clip.rate {
                    return Ok(Some(media.duration_frames));
                }
                let length = RationalTime::at(media.duration_frames, media.rate)
                    .rescale_with(clip.rate, RoundingMode::Floor)?;
                return Ok(Some(length.frames()));
            }
        }
        if let Some(master_id) = &clip.parent_clip_id {
            if let Some(master) = self.db.load_clip_optional(master_id)? {
                return Ok(Some(master.source_out.frames()));
            }
        }
        Ok(None)
    }

    /// Builds the new clip a placement describes, at `start` in `sequence_id`.
    fn build_clip(
        &mut self,
        sequence_id: &SequenceId,
        start: Frame,
        placement: &ClipPlacement,
    ) -> EditResult<Clip> {
        let rate = self.rates.rate(sequence_id)?;
        let track = self.db.get_track(&placement.track_id)?;
        if &track.sequence_id != sequence_id {
            return Err(EditError::Validation(format!(
                "track {} does not belong to sequence {sequence_id}",
                track.id
            )));
        }
        if start < 0 {
            return Err(EditError::Validation(format!(
                "clip position {start} is before the start of the sequence"
            )));
        }

        let master = match &placement.master_clip_id {
            Some(id) => {
                let master = self.db.load_clip(id)?;
                if master.clip_kind != ClipKind::Master {
                    return Err(EditError::Validation(format!("clip {id} is not a master clip")));
                }
                Some(master)
            }
            None => None,
        };
        let media_id = placement
            .media_id
            .clone()
            .or_else(|| master.as_ref().and_then(|m| m.media_id.clone()));
        let media: Option<MediaRow> = match &media_id {
            Some(id) => Some(self.db.get_media(id)?),
            None => None,
        };

        let source_rate = master
            .as_ref()
            .map(|m| m.rate)
            .or_else(|| media.as_ref().map(|m| m.rate))
            .unwrap_or(rate);
        let available = match (&master, &media) {
            (Some(master), _) => Some(master.source_out.frames()),
            (None, Some(media)) => Some(media.duration_frames),
            (None, None) => None,
        };
        let source_in = match &placement.source_in {
            Some(input) => input.resolve(source_rate)?,
            None => master
                .as_ref()
                .map(|m| m.source_in)
                .unwrap_or_else(|| RationalTime::zero(source_rate)),
        };
        let first_frame = master.as_ref().map(|m| m.source_in.frames()).unwrap_or(0);
        if source_in.frames() < first_frame {
            return Err(EditError::Constraint(format!(
                "source range starts at {} but the source begins at {}",
                source_in.frames(),
                first_frame
            )));
        }
        let rounding = self.settings.source_rounding;

        let duration = match (&placement.duration, &placement.source_out, available) {
            (Some(input), _, _) => input.resolve_frames(rate)?,
            (None, Some(out), _) => {
                let out = out.resolve(source_rate)?;
                RationalTime::at(out.frames().saturating_sub(source_in.frames()), source_rate)
                    .rescale_with(rate, rounding)?
                    .frames()
            }
            (None, None, Some(end)) => RationalTime::at(end - source_in.frames(), source_rate)
                .rescale_with(rate, rounding)?
                .frames(),
            (None, None, None) => {
                return Err(EditError::Validation(
                    "a duration is needed for clips without a source".into(),
                ))
            }
        };
        if duration <= 0 {
            return Err(EditError::Validation(format!(
                "clip duration must be positive, got {duration}"
            )));
        }
        let span = || -> EditResult<Frame> {
            Ok(RationalTime::at(duration, rate)
                .rescale_with(source_rate, rounding)?
                .frames())
        };
        let source_out = match &placement.source_out {
            Some(out) => {
                let out = out.resolve(source_rate)?;
                if placement.duration.is_some()
                    && out.frames().saturating_sub(source_in.frames()) != span()?
                {
                    return Err(EditError::Validation(format!(
                        "source range [{}, {}) does not match a duration of {duration} frames",
                        source_in.frames(),
                        out.frames()
                    )));
                }
                out
            }
            None => source_in.offset(span()?)?,
        };
        if let Some(end) = available {
            if source_out.frames() > end {
                return Err(EditError::Constraint(format!(
                    "source range ends at {} but the source has {} frames",
                    source_out.frames(),
                    end
                )));
            }
        }

        let name = placement
            .name
            .clone()
            .or_else(|| master.as_ref().map(|m| m.name.clone()))
            .or_else(|| media.as_ref().map(|m| m.name.clone()))
            .unwrap_or_else(|| "Clip".to_string());
        let clip = Clip::create(
            name,
            media_id,
            ClipOptions {
                id: Some(self.ids.next_clip_id()),
                project_id: self.project_id.clone(),
                clip_kind: ClipKind::Timeline,
                track_id: Some(placement.track_id.clone()),
                owner_sequence_id: Some(sequence_id.clone()),
                parent_clip_id: master.map(|m| m.id),
                timeline_start: RationalTime::at(start, rate),
                duration: RationalTime::at(duration, rate),
                source_in,
                source_out: Some(source_out),
                enabled: true,
                offline: false,
            },
        )?;
        Ok(clip)
    }
}

fn resolve_position(
    ctx: &mut EditContext<'_>,
    sequence_id: &SequenceId,
    input: &TimingInput,
) -> EditResult<Frame> {
    let rate = ctx.rates.rate(sequence_id)?;
    Ok(input.resolve_frames(rate)?)
}

pub(crate) fn execute(ctx: &mut EditContext<'_>, command: &EditCommand) -> EditResult<Executed> {
    debug!(command = command.kind(), "executing");
    match command {
        EditCommand::Insert {
            sequence_id,
            position,
            clip,
        } => insert(ctx, sequence_id, position, clip),
        EditCommand::Overwrite {
            sequence_id,
            position,
            clip,
        } => overwrite(ctx, sequence_id, position, clip),
        EditCommand::AddClipsToSequence {
            sequence_id,
            position,
            mode,
            clips,
            link,
        } => add_clips(ctx, sequence_id, position, *mode, clips, *link),
        EditCommand::Split { clip_id, at } => split(ctx, clip_id, at),
        EditCommand::RippleEdit {
            clip_id,
            edge,
            delta,
        } => ripple_edges(
            ctx,
            &[EdgeSelection::new(clip_id.clone(), *edge)],
            delta,
            false,
        ),
        EditCommand::BatchRippleEdit { edges, delta } => ripple_edges(ctx, edges, delta, true),
        EditCommand::RollEdit {
            left_clip_id,
            right_clip_id,
            delta,
        } => roll(ctx, left_clip_id, right_clip_id, delta),
        EditCommand::Nudge { clip_ids, delta } => nudge(ctx, clip_ids, delta),
        EditCommand::RippleDelete { clip_ids } => ripple_delete(ctx, clip_ids),
        EditCommand::DeleteClip { clip_id } => delete_clip(ctx, clip_id),
        EditCommand::DeleteSequence { sequence_id } => delete_sequence(ctx, sequence_id),
        EditCommand::DeleteMasterClip { clip_id } => delete_master_clip(ctx, clip_id),
        EditCommand::LinkClips { clip_ids } => link_clips(ctx, clip_ids),
        EditCommand::UnlinkClip { clip_id } => unlink_clip(ctx, clip_id),
    }
}

fn insert(
    ctx: &mut EditContext<'_>,
    sequence_id: &SequenceId,
    position: &TimingInput,
    placement: &ClipPlacement,
) -> EditResult<Executed> {
    let at = resolve_position(ctx, sequence_id, position)?;
    let clip = ctx.build_clip(sequence_id, at, placement)?;
    let shift = clip.duration_frames();
    let tracks = ctx.db.track_states(sequence_id)?;
    let plan = plan_insert_edit(
        &tracks,
        at,
        shift,
        std::slice::from_ref(&clip),
        &mut ctx.ids,
        ctx.settings.source_rounding,
    )?;
    let executed = ctx.apply(&plan)?;
    info!(clip_id = %clip.id, at, shift, "inserted clip");
    Ok(Executed {
        outcome: CommandOutcome {
            created: vec![clip.id.clone()],
            shift: Some(shift),
            ..Default::default()
        },
        payload: UndoPayload::Insert {
            executed,
            clip_id: clip.id,
            shift,
        },
    })
}

fn overwrite(
    ctx: &mut EditContext<'_>,
    sequence_id: &SequenceId,
    position: &TimingInput,
    placement: &ClipPlacement,
) -> EditResult<Executed> {
    let at = resolve_position(ctx, sequence_id, position)?;
    let clip = ctx.build_clip(sequence_id, at, placement)?;
    let tracks = ctx.db.track_states(sequence_id)?;
    let plan = plan_overwrite_edit(
        &tracks,
        std::slice::from_ref(&clip),
        &mut ctx.ids,
        ctx.settings.source_rounding,
    )?;
    let executed = ctx.apply(&plan)?;
    info!(clip_id = %clip.id, at, mutations = executed.len(), "overwrote range");
    Ok(Executed {
        outcome: CommandOutcome {
            created: vec![clip.id.clone()],
            ..Default::default()
        },
        payload: UndoPayload::Overwrite {
            executed,
            clip_id: clip.id,
        },
    })
}

fn add_clips(
    ctx: &mut EditContext<'_>,
    sequence_id: &SequenceId,
    position: &TimingInput,
    mode: PlacementMode,
    placements: &[ClipPlacement],
    link: bool,
) -> EditResult<Executed> {
    if placements.is_empty() {
        return Err(EditError::Validation("no clips to add".into()));
    }
    for (idx, placement) in placements.iter().enumerate() {
        if placements[..idx]
            .iter()
            .any(|p| p.track_id == placement.track_id)
        {
            return Err(EditError::Validation(format!(
                "two clips target track {}",
                placement.track_id
            )));
        }
    }
    let at = resolve_position(ctx, sequence_id, position)?;
    let mut clips = Vec::with_capacity(placements.len());
    for placement in placements {
        clips.push(ctx.build_clip(sequence_id, at, placement)?);
    }

    let tracks = ctx.db.track_states(sequence_id)?;
    let rounding = ctx.settings.source_rounding;
    let (plan, shift) = match mode {
        PlacementMode::Insert => {
            let shift = clips.iter().map(Clip::duration_frames).max().unwrap_or(0);
            let plan = plan_insert_edit(&tracks, at, shift, &clips, &mut ctx.ids, rounding)?;
            (plan, shift)
        }
        PlacementMode::Overwrite => (
            plan_overwrite_edit(&tracks, &clips, &mut ctx.ids, rounding)?,
            0,
        ),
    };
    let executed = ctx.apply(&plan)?;

    let mut links = Vec::new();
    let mut link_group_id = None;
    if link && clips.len() > 1 {
        let group = ctx.ids.next_link_group_id();
        for (clip, placement) in clips.iter().zip(placements) {
            let role = match &placement.role {
                Some(role) => role.clone(),
                None => ctx
                    .db
                    .get_track(&placement.track_id)?
                    .track_type
                    .as_str()
                    .to_string(),
            };
            let member = ClipLink {
                link_group_id: group.clone(),
                clip_id: clip.id.clone(),
                role,
                time_offset: 0,
                enabled: true,
            };
            ctx.db.insert_link(&member)?;
            links.push(member);
        }
        link_group_id = Some(group);
    }

    let clip_ids: Vec<ClipId> = clips.into_iter().map(|c| c.id).collect();
    info!(clips = clip_ids.len(), at, shift, mode = ?mode, "added clips to sequence");
    Ok(Executed {
        outcome: CommandOutcome {
            created: clip_ids.clone(),
            shift: (shift != 0).then_some(shift),
            link_group_id,
            ..Default::default()
        },
        payload: UndoPayload::AddClipsToSequence {
            executed,
            clip_ids,
            shift,
            links,
        },
    })
}

fn split(ctx: &mut EditContext<'_>, clip_id: &ClipId, at: &TimingInput) -> EditResult<Executed> {
    let (clip, _, rate) = ctx.load_timeline_clip(clip_id)?;
    if let Some(track_id) = &clip.track_id {
        if ctx.db.get_track(track_id)?.locked {
            return Err(EditError::Validation(format!("track {track_id} is locked")));
        }
    }
    let at = at.resolve_frames(rate)?;
    let plan = plan_split(&clip, at, &mut ctx.ids, ctx.settings.source_rounding)?;
    let tail_id = plan
        .records()
        .iter()
        .find_map(|r| r.after().filter(|c| c.id != clip.id).map(|c| c.id.clone()))
        .ok_or_else(|| EditError::Constraint(format!("split of clip {clip_id} made no tail")))?;
    let executed = ctx.apply(&plan)?;
    info!(clip_id = %clip_id, at, tail_id = %tail_id, "split clip");
    Ok(Executed {
        outcome: CommandOutcome {
            created: vec![tail_id.clone()],
            ..Default::default()
        },
        payload: UndoPayload::Split { executed, tail_id },
    })
}

fn ripple_edges(
    ctx: &mut EditContext<'_>,
    edges: &[EdgeSelection],
    delta: &TimingInput,
    batch: bool,
) -> EditResult<Executed> {
    if edges.is_empty() {
        return Err(EditError::Validation("no edges selected".into()));
    }
    let clip_ids: Vec<ClipId> = edges.iter().map(|e| e.clip_id.clone()).collect();
    let (clips, sequence_id, rate) = ctx.load_in_one_sequence(&clip_ids)?;
    let delta = delta.resolve_frames(rate)?;

    let mut trims = Vec::with_capacity(edges.len());
    for (selection, clip) in edges.iter().zip(&clips) {
        trims.push(EdgeTrim {
            clip_id: selection.clip_id.clone(),
            edge: selection.edge,
            media_duration: ctx.source_length(clip)?,
        });
    }
    let tracks = ctx.db.track_states(&sequence_id)?;
    let outcome = plan_ripple_edges(&tracks, &trims, delta, ctx.settings.source_rounding)?;
    if outcome.clamped() {
        info!(
            requested = outcome.requested_delta,
            applied = outcome.applied_delta,
            "ripple trim clamped"
        );
    }
    let executed = ctx.apply(&outcome.plan)?;
    debug!(
        edges = edges.len(),
        shift = outcome.shift,
        mutations = executed.len(),
        "ripple trim applied"
    );

    let result = CommandOutcome {
        requested_delta: Some(outcome.requested_delta),
        applied_delta: Some(outcome.applied_delta),
        shift: Some(outcome.shift),
        ..Default::default()
    };
    let payload = if batch {
        UndoPayload::BatchRippleEdit {
            executed,
            requested_delta: outcome.requested_delta,
            applied_delta: outcome.applied_delta,
            shift: outcome.shift,
        }
    } else {
        UndoPayload::RippleEdit {
            executed,
            requested_delta: outcome.requested_delta,
            applied_delta: outcome.applied_delta,
            shift: outcome.shift,
        }
    };
    Ok(Executed {
        payload,
        outcome: result,
    })
}

fn roll(
    ctx: &mut EditContext<'_>,
    left_id: &ClipId,
    right_id: &ClipId,
    delta: &TimingInput,
) -> EditResult<Executed> {
    let (clips, _, rate) = ctx.load_in_one_sequence(&[left_id.clone(), right_id.clone()])?;
    let (left, right) = (&clips[0], &clips[1]);
    if let Some(track_id) = &left.track_id {
        if ctx.db.get_track(track_id)?.locked {
            return Err(EditError::Validation(format!("track {track_id} is locked")));
        }
    }
    let delta = delta.resolve_frames(rate)?;
    let outcome = plan_roll_edit(
        left,
        right,
        delta,
        ctx.source_length(left)?,
        ctx.settings.source_rounding,
    )?;
    let executed = ctx.apply(&outcome.plan)?;
    info!(
        left = %left_id,
        right = %right_id,
        requested = outcome.requested_delta,
        applied = outcome.applied_delta,
        "rolled edit point"
    );
    Ok(Executed {
        outcome: CommandOutcome {
            requested_delta: Some(outcome.requested_delta),
            applied_delta: Some(outcome.applied_delta),
            ..Default::default()
        },
        payload: UndoPayload::RollEdit {
            executed,
            applied_delta: outcome.applied_delta,
        },
    })
}

fn nudge(ctx: &mut EditContext<'_>, clip_ids: &[ClipId], delta: &TimingInput) -> EditResult<Executed> {
    let (_, sequence_id, rate) = ctx.load_in_one_sequence(clip_ids)?;
    let delta = delta.resolve_frames(rate)?;
    let tracks = ctx.db.track_states(&sequence_id)?;
    let outcome = plan_nudge(
        &tracks,
        clip_ids,
        delta,
        &mut ctx.ids,
        ctx.settings.source_rounding,
    )?;
    let executed = ctx.apply(&outcome.plan)?;
    info!(
        clips = clip_ids.len(),
        requested = outcome.requested_delta,
        applied = outcome.applied_delta,
        "nudged clips"
    );
    Ok(Executed {
        outcome: CommandOutcome {
            requested_delta: Some(outcome.requested_delta),
            applied_delta: Some(outcome.applied_delta),
            ..Default::default()
        },
        payload: UndoPayload::Nudge {
            executed,
            applied_delta: outcome.applied_delta,
        },
    })
}

fn ripple_delete(ctx: &mut EditContext<'_>, clip_ids: &[ClipId]) -> EditResult<Executed> {
    let (_, sequence_id, _) = ctx.load_in_one_sequence(clip_ids)?;
    let tracks = ctx.db.track_states(&sequence_id)?;
    let outcome = plan_ripple_delete(&tracks, clip_ids)?;
    let executed = ctx.apply(&outcome.plan)?;
    info!(clips = clip_ids.len(), closed = outcome.closed, "ripple deleted");
    Ok(Executed {
        outcome: CommandOutcome {
            shift: Some(-outcome.closed),
            ..Default::default()
        },
        payload: UndoPayload::RippleDelete {
            executed,
            closed: outcome.closed,
        },
    })
}

fn delete_clip(ctx: &mut EditContext<'_>, clip_id: &ClipId) -> EditResult<Executed> {
    let clip = ctx.db.load_clip(clip_id)?;
    if clip.clip_kind == ClipKind::Master {
        return Err(EditError::Validation(format!(
            "clip {clip_id} is a master clip; delete it with delete_master_clip"
        )));
    }
    let mut plan = MutationPlan::new();
    plan.push(plan_delete(&clip))?;
    let executed = ctx.apply(&plan)?;
    info!(clip_id = %clip_id, "deleted clip");
    Ok(Executed {
        outcome: CommandOutcome::default(),
        payload: UndoPayload::DeleteClip { executed },
    })
}

fn delete_sequence(ctx: &mut EditContext<'_>, sequence_id: &SequenceId) -> EditResult<Executed> {
    let sequence = ctx.db.get_sequence(sequence_id)?;
    let tracks = ctx.db.list_tracks(sequence_id)?;
    let mut plan = MutationPlan::with_direction(ShiftDirection::None);
    for clip in ctx.db.list_sequence_clips(sequence_id)? {
        plan.push(plan_delete(&clip))?;
    }
    let executed = ctx.apply(&plan)?;
    for track in &tracks {
        ctx.db.delete_track_row(&track.id)?;
    }
    ctx.db.delete_sequence_row(sequence_id)?;
    info!(
        sequence_id = %sequence_id,
        tracks = tracks.len(),
        clips = executed.len(),
        "deleted sequence"
    );
    Ok(Executed {
        outcome: CommandOutcome::default(),
        payload: UndoPayload::DeleteSequence {
            sequence,
            tracks,
            executed,
        },
    })
}

fn delete_master_clip(ctx: &mut EditContext<'_>, clip_id: &ClipId) -> EditResult<Executed> {
    let master = ctx.db.load_clip(clip_id)?;
    if master.clip_kind != ClipKind::Master {
        return Err(EditError::Validation(format!(
            "clip {clip_id} is not a master clip"
        )));
    }
    let derived = ctx.db.list_derived_clips(clip_id)?;
    let mut plan = MutationPlan::new();
    for clip in &derived {
        plan.push(plan_delete(clip))?;
    }
    plan.push(plan_delete(&master))?;
    let executed = ctx.apply(&plan)?;
    info!(clip_id = %clip_id, derived = derived.len(), "deleted master clip");
    Ok(Executed {
        outcome: CommandOutcome::default(),
        payload: UndoPayload::DeleteMasterClip { executed },
    })
}

fn link_clips(ctx: &mut EditContext<'_>, clip_ids: &[ClipId]) -> EditResult<Executed> {
    if clip_ids.len() < 2 {
        return Err(EditError::Validation(
            "linking needs at least two clips".into(),
        ));
    }
    let mut members = Vec::with_capacity(clip_ids.len());
    for clip_id in clip_ids {
        let clip = ctx.db.load_clip(clip_id)?;
        if !ctx.db.list_links_for_clip(clip_id)?.is_empty() {
            return Err(EditError::Validation(format!(
                "clip {clip_id} is already linked"
            )));
        }
        if members.iter().any(|(c, _): &(Clip, Frame)| c.id == clip.id) {
            continue;
        }
        let start = clip.start_frame();
        members.push((clip, start));
    }
    let anchor = members.iter().map(|(_, start)| *start).min().unwrap_or(0);

    let group = ctx.ids.next_link_group_id();
    let mut links = Vec::with_capacity(members.len());
    for (clip, start) in &members {
        let role = match &clip.track_id {
            Some(track_id) => ctx.db.get_track(track_id)?.track_type.as_str().to_string(),
            None => "source".to_string(),
        };
        let link = ClipLink {
            link_group_id: group.clone(),
            clip_id: clip.id.clone(),
            role,
            time_offset: start - anchor,
            enabled: true,
        };
        ctx.db.insert_link(&link)?;
        links.push(link);
    }
    info!(link_group_id = %group, members = links.len(), "linked clips");
    Ok(Executed {
        outcome: CommandOutcome {
            link_group_id: Some(group),
            ..Default::default()
        },
        payload: UndoPayload::LinkClips { links },
    })
}

/// Takes the clip out of its groups; a group left with one member is
/// dissolved.
fn unlink_clip(ctx: &mut EditContext<'_>, clip_id: &ClipId) -> EditResult<Executed> {
    let memberships = ctx.db.list_links_for_clip(clip_id)?;
    if memberships.is_empty() {
        if !ctx.db.clip_exists(clip_id)? {
            return Err(EditError::not_found("clip", clip_id));
        }
        return Err(EditError::Validation(format!("clip {clip_id} is not linked")));
    }
    let mut removed = Vec::new();
    for membership in memberships {
        ctx.db
            .delete_link(&membership.link_group_id, &membership.clip_id)?;
        let rest = ctx.db.list_link_group(&membership.link_group_id)?;
        removed.push(membership);
        if let [last] = rest.as_slice() {
            ctx.db.delete_link(&last.link_group_id, &last.clip_id)?;
            removed.push(last.clone());
        }
    }
    info!(clip_id = %clip_id, removed = removed.len(), "unlinked clip");
    Ok(Executed {
        outcome: CommandOutcome::default(),
        payload: UndoPayload::UnlinkClip { links: removed },
    })
}
