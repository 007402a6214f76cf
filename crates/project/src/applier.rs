//! Executes mutation plans against the store and undoes them.
//!
//! The applier owns write ordering: deletes first, then updates that only
//! shrink a clip in place, then moving updates ordered by the plan's shift
//! direction, then inserts. The order actually executed is returned so a
//! revert can walk it backwards through the same overlap-free states.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use timeline::{
    find_overlaps, notifications_for, MutationNotification, MutationPlan, MutationRecord,
    ShiftDirection, TrackId,
};
use tracing::{debug, info, warn};

use crate::{ClipDependents, ProjectDb, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Check the touched tracks for overlaps after every record.
    pub verify_each_step: bool,
}

/// Records in the order they were written, plus rows removed alongside
/// deleted clips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutedPlan {
    pub records: Vec<MutationRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependents: Vec<ClipDependents>,
}

impl ExecutedPlan {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Appends a later step of the same command.
    pub fn append(&mut self, other: ExecutedPlan) {
        self.records.extend(other.records);
        self.dependents.extend(other.dependents);
    }

    pub fn notifications(&self) -> Vec<MutationNotification> {
        notifications_for(&self.records)
    }
}

fn schedule(plan: &MutationPlan) -> Vec<&MutationRecord> {
    let mut deletes = Vec::new();
    let mut contracting = Vec::new();
    let mut moving = Vec::new();
    let mut inserts = Vec::new();
    for record in plan.records() {
        match record {
            MutationRecord::Delete { .. } => deletes.push(record),
            MutationRecord::Update { .. } if record.is_contracting() => contracting.push(record),
            MutationRecord::Update { .. } => moving.push(record),
            MutationRecord::Insert { .. } => inserts.push(record),
        }
    }
    let start = |r: &&MutationRecord| r.before().map(|c| c.start_frame()).unwrap_or(0);
    match plan.direction() {
        ShiftDirection::Right => moving.sort_by_key(|r| Reverse(start(r))),
        ShiftDirection::Left => moving.sort_by_key(start),
        ShiftDirection::None => {}
    }
    deletes
        .into_iter()
        .chain(contracting)
        .chain(moving)
        .chain(inserts)
        .collect()
}

fn touched_tracks<'a>(records: impl IntoIterator<Item = &'a MutationRecord>) -> Vec<TrackId> {
    let mut tracks: Vec<TrackId> = Vec::new();
    for record in records {
        for track in record.track_ids() {
            if !tracks.contains(&track) {
                tracks.push(track);
            }
        }
    }
    tracks
}

impl ProjectDb {
    /// Writes `plan` inside the caller's transaction.
    ///
    /// Plan order is not write order: records run in the schedule described
    /// at the top of this module, with the plan's direction as the only
    /// hint. Planners may list a move before the trim that makes room for
    /// it (nudge does).
    ///
    /// On error the store may hold part of the plan; the caller drops the
    /// transaction to roll it back.
    pub fn apply_mutations(
        &self,
        plan: &MutationPlan,
        options: &ApplyOptions,
    ) -> StoreResult<ExecutedPlan> {
        let ordered = schedule(plan);
        debug!(
            mutations = ordered.len(),
            direction = ?plan.direction(),
            "applying mutation plan"
        );
        let mut executed = ExecutedPlan::default();
        for (index, record) in ordered.into_iter().enumerate() {
            let wrap = |source: StoreError| StoreError::MutationFailed {
                index,
                clip_id: record.clip_id().clone(),
                source: Box::new(source),
            };
            if let Some(dependents) = self.apply_record(record).map_err(wrap)? {
                executed.dependents.push(dependents);
            }
            if options.verify_each_step {
                self.check_tracks(&record.track_ids()).map_err(wrap)?;
            }
            executed.records.push(record.clone());
        }
        self.check_tracks(&touched_tracks(&executed.records))?;
        Ok(executed)
    }

    fn apply_record(&self, record: &MutationRecord) -> StoreResult<Option<ClipDependents>> {
        match record {
            MutationRecord::Insert { clip } => {
                self.check_clip(clip)?;
                if self.clip_exists(&clip.id)? {
                    return Err(StoreError::Constraint(format!(
                        "clip {} already exists",
                        clip.id
                    )));
                }
                self.insert_clip_row(clip)?;
                Ok(None)
            }
            MutationRecord::Update { after, .. } => {
                self.check_clip(after)?;
                self.update_clip_row(after)?;
                Ok(None)
            }
            MutationRecord::Delete { clip_id, .. } => {
                let dependents = self.delete_clip(clip_id)?;
                Ok((!dependents.is_empty()).then_some(dependents))
            }
        }
    }

    /// Undoes an executed plan: inverse records in reverse order, then the
    /// dependent rows of deleted clips.
    ///
    /// Rows already in the target state are skipped with a log note, so an
    /// undo survives edits made behind its back. An overlap left at the end
    /// is an error.
    pub fn revert_mutations(
        &self,
        executed: &ExecutedPlan,
        options: &ApplyOptions,
    ) -> StoreResult<ExecutedPlan> {
        debug!(mutations = executed.len(), "reverting mutation plan");
        let mut reverted = ExecutedPlan::default();
        for (index, record) in executed.records.iter().rev().enumerate() {
            let inverse = record.inverse();
            let wrap = |source: StoreError| StoreError::MutationFailed {
                index,
                clip_id: inverse.clip_id().clone(),
                source: Box::new(source),
            };
            let applied = self.revert_record(&inverse).map_err(wrap)?;
            if options.verify_each_step {
                self.check_tracks(&inverse.track_ids()).map_err(wrap)?;
            }
            if applied {
                reverted.records.push(inverse);
            }
        }
        for dependents in &executed.dependents {
            self.restore_dependents(dependents)?;
        }
        self.check_tracks(&touched_tracks(&executed.records))?;
        Ok(reverted)
    }

    fn revert_record(&self, inverse: &MutationRecord) -> StoreResult<bool> {
        let clip_id = inverse.clip_id();
        let exists = self.clip_exists(clip_id)?;
        match inverse {
            MutationRecord::Delete { .. } if !exists => {
                info!(clip_id = %clip_id, "clip already gone, nothing to undo");
                Ok(false)
            }
            MutationRecord::Delete { .. } => {
                self.delete_clip(clip_id)?;
                Ok(true)
            }
            MutationRecord::Insert { clip } if exists => {
                info!(clip_id = %clip_id, "clip already present, restoring its snapshot");
                clip.validate()?;
                self.update_clip_row(clip)?;
                Ok(true)
            }
            MutationRecord::Insert { clip } => {
                clip.validate()?;
                self.insert_clip_row(clip)?;
                Ok(true)
            }
            MutationRecord::Update { .. } if !exists => {
                warn!(clip_id = %clip_id, "clip vanished before undo, skipping its restore");
                Ok(false)
            }
            MutationRecord::Update { after, .. } => {
                after.validate()?;
                self.update_clip_row(after)?;
                Ok(true)
            }
        }
    }

    /// Fails if any two clips on the given tracks overlap.
    pub fn check_tracks(&self, tracks: &[TrackId]) -> StoreResult<()> {
        for track in tracks {
            let clips = self.list_track_clips(track)?;
            if let Some((a, b)) = find_overlaps(&clips).into_iter().next() {
                return Err(StoreError::Constraint(format!(
                    "clips {a} and {b} overlap on track {track}"
                )));
            }
        }
        Ok(())
    }
}
