use serde::{Deserialize, Serialize};

use crate::{Clip, ClipId, ClipSnapshot, Frame, SequenceId, TimelineError, TrackId};

/// One planned or executed change to a clip row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationRecord {
    Insert {
        clip: ClipSnapshot,
    },
    Update {
        clip_id: ClipId,
        before: ClipSnapshot,
        after: ClipSnapshot,
    },
    Delete {
        clip_id: ClipId,
        before: ClipSnapshot,
    },
}

pub fn plan_insert(clip: &Clip) -> MutationRecord {
    MutationRecord::Insert { clip: clip.clone() }
}

pub fn plan_update(clip: &Clip, before: &ClipSnapshot) -> MutationRecord {
    MutationRecord::Update {
        clip_id: clip.id.clone(),
        before: before.clone(),
        after: clip.clone(),
    }
}

pub fn plan_delete(before: &ClipSnapshot) -> MutationRecord {
    MutationRecord::Delete {
        clip_id: before.id.clone(),
        before: before.clone(),
    }
}

impl MutationRecord {
    pub fn clip_id(&self) -> &ClipId {
        match self {
            MutationRecord::Insert { clip } => &clip.id,
            MutationRecord::Update { clip_id, .. } | MutationRecord::Delete { clip_id, .. } => {
                clip_id
            }
        }
    }

    /// The record that exactly undoes this one.
    pub fn inverse(&self) -> MutationRecord {
        match self {
            MutationRecord::Insert { clip } => plan_delete(clip),
            MutationRecord::Update {
                clip_id,
                before,
                after,
            } => MutationRecord::Update {
                clip_id: clip_id.clone(),
                before: after.clone(),
                after: before.clone(),
            },
            MutationRecord::Delete { before, .. } => plan_insert(before),
        }
    }

    /// Clip state before the record applies, if the row existed.
    pub fn before(&self) -> Option<&Clip> {
        match self {
            MutationRecord::Insert { .. } => None,
            MutationRecord::Update { before, .. } | MutationRecord::Delete { before, .. } => {
                Some(before)
            }
        }
    }

    /// Clip state after the record applies, if the row survives.
    pub fn after(&self) -> Option<&Clip> {
        match self {
            MutationRecord::Insert { clip } => Some(clip),
            MutationRecord::Update { after, .. } => Some(after),
            MutationRecord::Delete { .. } => None,
        }
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        let mut tracks: Vec<TrackId> = self
            .before()
            .into_iter()
            .chain(self.after())
            .filter_map(|clip| clip.track_id.clone())
            .collect();
        tracks.dedup();
        tracks
    }

    pub fn sequence_id(&self) -> Option<&SequenceId> {
        self.after()
            .or_else(|| self.before())
            .and_then(|clip| clip.owner_sequence_id.as_ref())
    }

    /// An update whose footprint stays within the original footprint on the
    /// same track. Such updates can never create an overlap.
    pub fn is_contracting(&self) -> bool {
        match self {
            MutationRecord::Update { before, after, .. } => {
                before.track_id == after.track_id
                    && after.start_frame() >= before.start_frame()
                    && after.end_frame() <= before.end_frame()
            }
            _ => false,
        }
    }

    fn is_noop(&self) -> bool {
        match self {
            MutationRecord::Update { before, after, .. } => same_state(before, after),
            _ => false,
        }
    }
}

/// Frame-for-frame equality, stricter than `PartialEq` on instants.
pub fn same_state(a: &Clip, b: &Clip) -> bool {
    a == b
        && a.timeline_start.rate() == b.timeline_start.rate()
        && a.timeline_start.frames() == b.timeline_start.frames()
        && a.duration.frames() == b.duration.frames()
        && a.source_in.frames() == b.source_in.frames()
        && a.source_out.frames() == b.source_out.frames()
}

/// Which way a plan moves clips along the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftDirection {
    #[default]
    None,
    Right,
    Left,
}

impl ShiftDirection {
    pub fn of(delta: Frame) -> Self {
        match delta.signum() {
            1 => ShiftDirection::Right,
            -1 => ShiftDirection::Left,
            _ => ShiftDirection::None,
        }
    }
}

/// An ordered list of mutations plus the direction hint the applier uses
/// to find a transient-overlap-free order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationPlan {
    records: Vec<MutationRecord>,
    #[serde(default)]
    direction: ShiftDirection,
}

impl MutationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direction(direction: ShiftDirection) -> Self {
        Self {
            records: Vec::new(),
            direction,
        }
    }

    pub fn from_records(records: Vec<MutationRecord>, direction: ShiftDirection) -> Self {
        Self { records, direction }
    }

    pub fn direction(&self) -> ShiftDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: ShiftDirection) {
        self.direction = direction;
    }

    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MutationRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, clip_id: &ClipId) -> Option<&MutationRecord> {
        self.records.iter().find(|r| r.clip_id() == clip_id)
    }

    /// Appends `record`, folding it into an earlier record for the same
    /// clip so the plan holds at most one record per clip.
    pub fn push(&mut self, record: MutationRecord) -> Result<(), TimelineError> {
        let Some(idx) = self
            .records
            .iter()
            .position(|r| r.clip_id() == record.clip_id())
        else {
            if !record.is_noop() {
                self.records.push(record);
            }
            return Ok(());
        };

        let existing = self.records.remove(idx);
        let merged = match (existing, record) {
            (MutationRecord::Insert { .. }, MutationRecord::Update { after, .. }) => {
                Some(MutationRecord::Insert { clip: after })
            }
            (MutationRecord::Insert { .. }, MutationRecord::Delete { .. }) => None,
            (
                MutationRecord::Update {
                    clip_id, before, ..
                },
                MutationRecord::Update { after, .. },
            ) => Some(MutationRecord::Update {
                clip_id,
                before,
                after,
            }),
            (MutationRecord::Update { clip_id, before, .. }, MutationRecord::Delete { .. }) => {
                Some(MutationRecord::Delete { clip_id, before })
            }
            (MutationRecord::Delete { clip_id, before }, MutationRecord::Insert { clip }) => {
                Some(MutationRecord::Update {
                    clip_id,
                    before,
                    after: clip,
                })
            }
            (existing, record) => {
                return Err(TimelineError::Validation(format!(
                    "conflicting mutations for clip {}: {} then {}",
                    existing.clip_id(),
                    kind_name(&existing),
                    kind_name(&record)
                )));
            }
        };
        if let Some(merged) = merged {
            if !merged.is_noop() {
                self.records.insert(idx, merged);
            }
        }
        Ok(())
    }

    pub fn extend(&mut self, other: MutationPlan) -> Result<(), TimelineError> {
        if self.direction == ShiftDirection::None {
            self.direction = other.direction;
        }
        for record in other.records {
            self.push(record)?;
        }
        Ok(())
    }

    /// Inverse records in reverse order.
    pub fn inverse(&self) -> MutationPlan {
        MutationPlan {
            records: self.records.iter().rev().map(MutationRecord::inverse).collect(),
            direction: match self.direction {
                ShiftDirection::Right => ShiftDirection::Left,
                ShiftDirection::Left => ShiftDirection::Right,
                ShiftDirection::None => ShiftDirection::None,
            },
        }
    }

    pub fn clip_ids(&self) -> Vec<ClipId> {
        self.records.iter().map(|r| r.clip_id().clone()).collect()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        let mut tracks: Vec<TrackId> = Vec::new();
        for record in &self.records {
            for track in record.track_ids() {
                if !tracks.contains(&track) {
                    tracks.push(track);
                }
            }
        }
        tracks
    }
}

fn kind_name(record: &MutationRecord) -> &'static str {
    match record {
        MutationRecord::Insert { .. } => "insert",
        MutationRecord::Update { .. } => "update",
        MutationRecord::Delete { .. } => "delete",
    }
}
