use serde::{Deserialize, Serialize};

use crate::{
    ClipId, Frame, LinkGroupId, MediaId, ProjectId, Rate, RationalTime, RoundingMode,
    SequenceId, TimelineError, TrackId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    Timeline,
    Master,
}

impl ClipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipKind::Timeline => "timeline",
            ClipKind::Master => "master",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "timeline" => Some(ClipKind::Timeline),
            "master" => Some(ClipKind::Master),
            _ => None,
        }
    }
}

/// A timeline clip or a master (source) clip.
///
/// `timeline_start` and `duration` are expressed in the owning sequence's
/// rate; `source_in`/`source_out` in `rate`, the clip's native media rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub project_id: ProjectId,
    pub name: String,
    pub clip_kind: ClipKind,
    pub track_id: Option<TrackId>,
    pub owner_sequence_id: Option<SequenceId>,
    pub media_id: Option<MediaId>,
    pub parent_clip_id: Option<ClipId>,
    pub timeline_start: RationalTime,
    pub duration: RationalTime,
    pub source_in: RationalTime,
    pub source_out: RationalTime,
    pub rate: Rate,
    pub enabled: bool,
    pub offline: bool,
}

/// Exact copy of a clip's persisted state, kept for undo.
pub type ClipSnapshot = Clip;

/// Everything `Clip::create` needs beyond a name and media reference.
#[derive(Debug, Clone)]
pub struct ClipOptions {
    pub id: Option<ClipId>,
    pub project_id: ProjectId,
    pub clip_kind: ClipKind,
    pub track_id: Option<TrackId>,
    pub owner_sequence_id: Option<SequenceId>,
    pub parent_clip_id: Option<ClipId>,
    pub timeline_start: RationalTime,
    pub duration: RationalTime,
    pub source_in: RationalTime,
    /// Defaults to `source_in` plus `duration` converted to the source rate.
    pub source_out: Option<RationalTime>,
    pub enabled: bool,
    pub offline: bool,
}

impl Clip {
    pub fn create(
        name: impl Into<String>,
        media_id: Option<MediaId>,
        options: ClipOptions,
    ) -> Result<Self, TimelineError> {
        let rate = options.source_in.rate();
        let source_out = match options.source_out {
            Some(out) => out.rescale_to(rate)?,
            None => {
                let length = options.duration.rescale_to(rate)?;
                options.source_in.try_add(length)?
            }
        };
        let clip = Self {
            id: options.id.unwrap_or_default(),
            project_id: options.project_id,
            name: name.into(),
            clip_kind: options.clip_kind,
            track_id: options.track_id,
            owner_sequence_id: options.owner_sequence_id,
            media_id,
            parent_clip_id: options.parent_clip_id,
            timeline_start: options.timeline_start,
            duration: options.duration.rescale_to(options.timeline_start.rate())?,
            source_in: options.source_in,
            source_out,
            rate,
            enabled: options.enabled,
            offline: options.offline,
        };
        clip.validate()?;
        Ok(clip)
    }

    /// Checks the invariants every persisted clip must satisfy.
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.duration.frames() <= 0 {
            return Err(TimelineError::Constraint(format!(
                "clip {} has non-positive duration {}",
                self.id, self.duration
            )));
        }
        if self.clip_kind == ClipKind::Timeline && self.timeline_start.frames() < 0 {
            return Err(TimelineError::Constraint(format!(
                "clip {} starts before the timeline origin ({})",
                self.id, self.timeline_start
            )));
        }
        if self.duration.rate() != self.timeline_start.rate() {
            return Err(TimelineError::Constraint(format!(
                "clip {} mixes rates for start ({}) and duration ({})",
                self.id,
                self.timeline_start.rate(),
                self.duration.rate()
            )));
        }
        if self.source_in.rate() != self.rate || self.source_out.rate() != self.rate {
            return Err(TimelineError::Constraint(format!(
                "clip {} source range is not expressed in its rate {}",
                self.id, self.rate
            )));
        }
        if self.source_in.frames() < 0 {
            return Err(TimelineError::Constraint(format!(
                "clip {} source starts before frame 0 ({})",
                self.id, self.source_in
            )));
        }
        if self.source_out.frames() <= self.source_in.frames() {
            return Err(TimelineError::Constraint(format!(
                "clip {} has empty source range [{}, {})",
                self.id, self.source_in, self.source_out
            )));
        }
        if self.rate == self.sequence_rate()
            && self.source_out.frames() - self.source_in.frames() != self.duration.frames()
        {
            return Err(TimelineError::Constraint(format!(
                "clip {} source range [{}, {}) does not span its duration {}",
                self.id, self.source_in, self.source_out, self.duration
            )));
        }
        self.timeline_start
            .offset(self.duration.frames())
            .map(|_| ())
    }

    pub fn sequence_rate(&self) -> Rate {
        self.timeline_start.rate()
    }

    pub fn start_frame(&self) -> Frame {
        self.timeline_start.frames()
    }

    pub fn duration_frames(&self) -> Frame {
        self.duration.frames()
    }

    pub fn end_frame(&self) -> Frame {
        self.timeline_start
            .frames()
            .saturating_add(self.duration.frames())
    }

    pub fn end(&self) -> RationalTime {
        self.timeline_start.with_frames(self.end_frame())
    }

    /// True when `[start, end)` intersects this clip's timeline range.
    pub fn overlaps(&self, start: Frame, end: Frame) -> bool {
        self.start_frame() < end && start < self.end_frame()
    }

    pub fn capture_state(&self) -> ClipSnapshot {
        self.clone()
    }

    pub fn restore_state(snapshot: &ClipSnapshot) -> Clip {
        snapshot.clone()
    }

    /// Converts a sequence-rate frame delta into this clip's source rate.
    pub fn to_source_frames(&self, delta: Frame, mode: RoundingMode) -> Result<Frame, TimelineError> {
        Ok(RationalTime::at(delta, self.sequence_rate())
            .rescale_with(self.rate, mode)?
            .frames())
    }

    /// Converts a source-rate frame delta into the sequence rate.
    pub fn to_sequence_frames(
        &self,
        delta: Frame,
        mode: RoundingMode,
    ) -> Result<Frame, TimelineError> {
        Ok(RationalTime::at(delta, self.rate)
            .rescale_with(self.sequence_rate(), mode)?
            .frames())
    }

    /// Same clip, starting at `start` (sequence frames).
    pub fn moved_to(&self, start: Frame) -> Clip {
        let mut moved = self.clone();
        moved.timeline_start = self.timeline_start.with_frames(start);
        moved
    }

    /// Same clip, `delta` frames later on the timeline.
    pub fn shifted_by(&self, delta: Frame) -> Result<Clip, TimelineError> {
        let mut moved = self.clone();
        moved.timeline_start = self.timeline_start.offset(delta)?;
        Ok(moved)
    }

    /// Keeps the head, cutting the clip off at `new_end`.
    /// Returns `None` when nothing would remain.
    pub fn truncated_to(&self, new_end: Frame, mode: RoundingMode) -> Result<Option<Clip>, TimelineError> {
        let duration = new_end - self.start_frame();
        if duration <= 0 {
            return Ok(None);
        }
        let removed = self.end_frame() - new_end;
        let mut clip = self.clone();
        clip.duration = self.duration.with_frames(duration);
        clip.source_out = self
            .source_out
            .offset(-self.to_source_frames(removed, mode)?)?;
        if clip.source_out.frames() <= clip.source_in.frames() {
            return Ok(None);
        }
        Ok(Some(clip))
    }

    /// Keeps the tail, moving the clip's start to `new_start` and advancing
    /// `source_in` by the elapsed amount. Returns `None` when nothing would remain.
    pub fn advanced_to(&self, new_start: Frame, mode: RoundingMode) -> Result<Option<Clip>, TimelineError> {
        let duration = self.end_frame() - new_start;
        if duration <= 0 {
            return Ok(None);
        }
        let elapsed = new_start - self.start_frame();
        let mut clip = self.clone();
        clip.timeline_start = self.timeline_start.with_frames(new_start);
        clip.duration = self.duration.with_frames(duration);
        clip.source_in = self.source_in.offset(self.to_source_frames(elapsed, mode)?)?;
        if clip.source_out.frames() <= clip.source_in.frames() {
            return Ok(None);
        }
        Ok(Some(clip))
    }

    /// Splits at `at`, which must lie strictly inside the clip.
    pub fn split_at(
        &self,
        at: Frame,
        tail_id: ClipId,
        mode: RoundingMode,
    ) -> Result<(Clip, Clip), TimelineError> {
        if at <= self.start_frame() || at >= self.end_frame() {
            return Err(TimelineError::Validation(format!(
                "split point {} is outside clip {} bounds ({}, {})",
                at,
                self.id,
                self.start_frame(),
                self.end_frame()
            )));
        }
        let head = self.truncated_to(at, mode)?;
        let tail = self.advanced_to(at, mode)?;
        match (head, tail) {
            (Some(head), Some(mut tail)) => {
                tail.id = tail_id;
                Ok((head, tail))
            }
            _ => Err(TimelineError::Constraint(format!(
                "split of clip {} at {} leaves an empty source range",
                self.id, at
            ))),
        }
    }
}

/// Membership of a clip in a link group (e.g. a video/audio pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipLink {
    pub link_group_id: LinkGroupId,
    pub clip_id: ClipId,
    pub role: String,
    pub time_offset: Frame,
    pub enabled: bool,
}


#[cfg(test)]
mod tests {
    use super::fixtures::clip_on;
    use super::*;

    #[test]
    fn create_rejects_empty_duration() {
        let mut clip = clip_on("v1", "a", 0, 10);
        clip.duration = clip.duration.with_frames(0);
        assert!(matches!(clip.validate(), Err(TimelineError::Constraint(_))));
    }

    #[test]
    fn validate_checks_the_source_range() {
        let mut negative = clip_on("v1", "a", 0, 10);
        negative.source_in = negative.source_in.with_frames(-10);
        negative.source_out = negative.source_out.with_frames(0);
        assert!(matches!(negative.validate(), Err(TimelineError::Constraint(_))));

        let mut stretched = clip_on("v1", "b", 0, 10);
        stretched.source_out = stretched.source_out.with_frames(50);
        assert!(matches!(stretched.validate(), Err(TimelineError::Constraint(_))));

        let mut audio = clip_on("v1", "c", 0, 30);
        audio.rate = Rate::AUDIO_48K;
        audio.source_in = RationalTime::at(0, Rate::AUDIO_48K);
        audio.source_out = RationalTime::at(48_000, Rate::AUDIO_48K);
        assert!(audio.validate().is_ok());
    }

    #[test]
    fn shifting_past_the_frame_range_fails() {
        let clip = clip_on("v1", "a", 40, 10);
        assert_eq!(clip.shifted_by(-40).unwrap().start_frame(), 0);
        assert_eq!(clip.shifted_by(Frame::MAX), Err(TimelineError::Overflow));

        let mut far = clip.clone();
        far.timeline_start = far.timeline_start.with_frames(Frame::MAX - 5);
        assert_eq!(far.end_frame(), Frame::MAX);
        assert_eq!(far.validate(), Err(TimelineError::Overflow));
    }

    #[test]
    fn split_advances_tail_source() {
        let clip = clip_on("v1", "a", 0, 100);
        let (head, tail) = clip.split_at(40, ClipId::from("b"), RoundingMode::Exact).unwrap();
        assert_eq!((head.start_frame(), head.end_frame()), (0, 40));
        assert_eq!(head.source_in.frames(), 0);
        assert_eq!(head.source_out.frames(), 40);
        assert_eq!((tail.start_frame(), tail.end_frame()), (40, 100));
        assert_eq!(tail.source_in.frames(), 40);
        assert_eq!(tail.source_out.frames(), 100);
        assert_eq!(tail.id, ClipId::from("b"));
    }

    #[test]
    fn split_on_boundary_is_rejected() {
        let clip = clip_on("v1", "a", 10, 20);
        assert!(clip.split_at(10, ClipId::new(), RoundingMode::Exact).is_err());
        assert!(clip.split_at(30, ClipId::new(), RoundingMode::Exact).is_err());
    }

    #[test]
    fn source_conversion_respects_rounding_mode() {
        let mut clip = clip_on("v1", "a", 0, 30);
        clip.rate = Rate::AUDIO_48K;
        assert_eq!(clip.to_source_frames(3, RoundingMode::Exact).unwrap(), 4800);

        clip.rate = Rate::FPS_23_976;
        assert!(clip.to_source_frames(1, RoundingMode::Exact).is_err());
        assert_eq!(clip.to_source_frames(30, RoundingMode::Nearest).unwrap(), 24);
    }
}
