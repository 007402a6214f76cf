//! Per-command undo data and the undoers that consume it.

use project::{ApplyOptions, ExecutedPlan, ProjectDb, SequenceRow, StoreError, TrackRow};
use serde::{Deserialize, Serialize};
use timeline::{ClipId, ClipLink, Frame, IssuedIds, MutationNotification};
use tracing::{debug, info};

use crate::EditResult;

/// What a command's undoer needs, one variant per command kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UndoPayload {
    Insert {
        executed: ExecutedPlan,
        clip_id: ClipId,
        shift: Frame,
    },
    Overwrite {
        executed: ExecutedPlan,
        clip_id: ClipId,
    },
    AddClipsToSequence {
        executed: ExecutedPlan,
        clip_ids: Vec<ClipId>,
        shift: Frame,
        links: Vec<ClipLink>,
    },
    Split {
        executed: ExecutedPlan,
        tail_id: ClipId,
    },
    RippleEdit {
        executed: ExecutedPlan,
        requested_delta: Frame,
        applied_delta: Frame,
        shift: Frame,
    },
    BatchRippleEdit {
        executed: ExecutedPlan,
        requested_delta: Frame,
        applied_delta: Frame,
        shift: Frame,
    },
    RollEdit {
        executed: ExecutedPlan,
        applied_delta: Frame,
    },
    Nudge {
        executed: ExecutedPlan,
        applied_delta: Frame,
    },
    RippleDelete {
        executed: ExecutedPlan,
        closed: Frame,
    },
    DeleteClip {
        executed: ExecutedPlan,
    },
    DeleteSequence {
        sequence: SequenceRow,
        tracks: Vec<TrackRow>,
        executed: ExecutedPlan,
    },
    DeleteMasterClip {
        executed: ExecutedPlan,
    },
    LinkClips {
        links: Vec<ClipLink>,
    },
    UnlinkClip {
        links: Vec<ClipLink>,
    },
}

/// Stored in `commands.undo_json`: the payload plus the ids the command
/// issued, so a redo recreates the same rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoRecord {
    pub payload: UndoPayload,
    #[serde(default)]
    pub issued: IssuedIds,
}

impl UndoPayload {
    pub fn executed(&self) -> Option<&ExecutedPlan> {
        match self {
            UndoPayload::Insert { executed, .. }
            | UndoPayload::Overwrite { executed, .. }
            | UndoPayload::AddClipsToSequence { executed, .. }
            | UndoPayload::Split { executed, .. }
            | UndoPayload::RippleEdit { executed, .. }
            | UndoPayload::BatchRippleEdit { executed, .. }
            | UndoPayload::RollEdit { executed, .. }
            | UndoPayload::Nudge { executed, .. }
            | UndoPayload::RippleDelete { executed, .. }
            | UndoPayload::DeleteClip { executed }
            | UndoPayload::DeleteSequence { executed, .. }
            | UndoPayload::DeleteMasterClip { executed } => Some(executed),
            UndoPayload::LinkClips { .. } | UndoPayload::UnlinkClip { .. } => None,
        }
    }

    pub fn notifications(&self) -> Vec<MutationNotification> {
        self.executed()
            .map(ExecutedPlan::notifications)
            .unwrap_or_default()
    }
}

/// Restores the state from before the command ran. Runs inside the
/// caller's transaction.
pub(crate) fn revert(
    db: &ProjectDb,
    payload: &UndoPayload,
    options: &ApplyOptions,
) -> EditResult<Vec<MutationNotification>> {
    let reverted = match payload {
        UndoPayload::AddClipsToSequence { executed, links, .. } => {
            remove_links(db, links)?;
            db.revert_mutations(executed, options)?
        }
        UndoPayload::DeleteSequence {
            sequence,
            tracks,
            executed,
        } => {
            match db.get_sequence(&sequence.id) {
                Ok(_) => info!(sequence_id = %sequence.id, "sequence already present"),
                Err(StoreError::NotFound { .. }) => db.insert_sequence(sequence)?,
                Err(err) => return Err(err.into()),
            }
            let existing = db.list_tracks(&sequence.id)?;
            for track in tracks {
                if !existing.iter().any(|t| t.id == track.id) {
                    db.insert_track(track)?;
                }
            }
            db.revert_mutations(executed, options)?
        }
        UndoPayload::LinkClips { links } => {
            remove_links(db, links)?;
            ExecutedPlan::default()
        }
        UndoPayload::UnlinkClip { links } => {
            restore_links(db, links)?;
            ExecutedPlan::default()
        }
        other => match other.executed() {
            Some(executed) => db.revert_mutations(executed, options)?,
            None => ExecutedPlan::default(),
        },
    };
    debug!(reverted = reverted.len(), "undo applied");
    Ok(reverted.notifications())
}

fn remove_links(db: &ProjectDb, links: &[ClipLink]) -> EditResult<()> {
    for link in links {
        if !db.delete_link(&link.link_group_id, &link.clip_id)? {
            info!(
                clip_id = %link.clip_id,
                link_group_id = %link.link_group_id,
                "link already removed"
            );
        }
    }
    Ok(())
}

fn restore_links(db: &ProjectDb, links: &[ClipLink]) -> EditResult<()> {
    for link in links {
        let group = db.list_link_group(&link.link_group_id)?;
        if group.iter().any(|member| member.clip_id == link.clip_id) {
            info!(clip_id = %link.clip_id, "link already present");
            continue;
        }
        db.insert_link(link)?;
    }
    Ok(())
}
