use serde::{Deserialize, Serialize};
use timeline::{ClipId, EdgeType, MediaId, SequenceId, TimingInput, TrackId};

/// Where a new timeline clip comes from and which track it goes to.
///
/// Source times resolve in the source's own rate (the master clip's, else
/// the media's, else the sequence's); `duration` in the sequence rate.
/// Without a `duration` the clip runs to `source_out`, or to the end of the
/// source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipPlacement {
    pub track_id: TrackId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<MediaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_clip_id: Option<ClipId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimingInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_in: Option<TimingInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_out: Option<TimingInput>,
    /// Role in the link group when several clips are added together.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    #[default]
    Insert,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSelection {
    pub clip_id: ClipId,
    pub edge: EdgeType,
}

impl EdgeSelection {
    pub fn new(clip_id: impl Into<ClipId>, edge: EdgeType) -> Self {
        Self {
            clip_id: clip_id.into(),
            edge,
        }
    }
}

fn default_link() -> bool {
    true
}

/// Every undoable edit, as stored in the command log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditCommand {
    Insert {
        sequence_id: SequenceId,
        position: TimingInput,
        clip: ClipPlacement,
    },
    Overwrite {
        sequence_id: SequenceId,
        position: TimingInput,
        clip: ClipPlacement,
    },
    AddClipsToSequence {
        sequence_id: SequenceId,
        position: TimingInput,
        #[serde(default)]
        mode: PlacementMode,
        clips: Vec<ClipPlacement>,
        #[serde(default = "default_link")]
        link: bool,
    },
    Split {
        clip_id: ClipId,
        at: TimingInput,
    },
    RippleEdit {
        clip_id: ClipId,
        edge: EdgeType,
        delta: TimingInput,
    },
    BatchRippleEdit {
        edges: Vec<EdgeSelection>,
        delta: TimingInput,
    },
    RollEdit {
        left_clip_id: ClipId,
        right_clip_id: ClipId,
        delta: TimingInput,
    },
    Nudge {
        clip_ids: Vec<ClipId>,
        delta: TimingInput,
    },
    RippleDelete {
        clip_ids: Vec<ClipId>,
    },
    DeleteClip {
        clip_id: ClipId,
    },
    DeleteSequence {
        sequence_id: SequenceId,
    },
    DeleteMasterClip {
        clip_id: ClipId,
    },
    LinkClips {
        clip_ids: Vec<ClipId>,
    },
    UnlinkClip {
        clip_id: ClipId,
    },
}

impl EditCommand {
    /// The `command` tag, also stored as `commands.command_type`.
    pub fn kind(&self) -> &'static str {
        match self {
            EditCommand::Insert { .. } => "insert",
            EditCommand::Overwrite { .. } => "overwrite",
            EditCommand::AddClipsToSequence { .. } => "add_clips_to_sequence",
            EditCommand::Split { .. } => "split",
            EditCommand::RippleEdit { .. } => "ripple_edit",
            EditCommand::BatchRippleEdit { .. } => "batch_ripple_edit",
            EditCommand::RollEdit { .. } => "roll_edit",
            EditCommand::Nudge { .. } => "nudge",
            EditCommand::RippleDelete { .. } => "ripple_delete",
            EditCommand::DeleteClip { .. } => "delete_clip",
            EditCommand::DeleteSequence { .. } => "delete_sequence",
            EditCommand::DeleteMasterClip { .. } => "delete_master_clip",
            EditCommand::LinkClips { .. } => "link_clips",
            EditCommand::UnlinkClip { .. } => "unlink_clip",
        }
    }
}
