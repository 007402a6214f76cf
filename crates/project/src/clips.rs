//! Clip persistence: row mapping, load/save/delete, and per-track views for
//! the planners.

use rusqlite::{params, OptionalExtension, Row};
use timeline::{
    resolve_occlusion, Clip, ClipId, ClipKind, IdAllocator, MediaId, PendingClips, ProjectId,
    RationalTime, RoundingMode, SequenceId, TrackId, TrackState,
};
use tracing::debug;

use crate::sequences::rate_from_row;
use crate::{ApplyOptions, ClipDependents, ExecutedPlan, ProjectDb, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Write the row as is, without carving its range out of the track.
    /// Set when the caller already planned occlusion itself.
    pub skip_occlusion: bool,
    pub rounding: RoundingMode,
}

const CLIP_SELECT: &str = "SELECT c.id, c.project_id, c.name, c.clip_kind, c.track_id, \
     c.owner_sequence_id, c.media_id, c.parent_clip_id, c.timeline_start_frame, \
     c.duration_frames, c.source_in_frame, c.source_out_frame, c.fps_numerator, \
     c.fps_denominator, c.enabled, c.offline, s.fps_numerator, s.fps_denominator \
     FROM clips c LEFT JOIN sequences s ON s.id = c.owner_sequence_id";

fn clip_from_row(row: &Row<'_>) -> rusqlite::Result<Clip> {
    let raw_kind: String = row.get(3)?;
    let clip_kind = ClipKind::parse(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown clip kind {raw_kind}").into(),
        )
    })?;
    let rate = rate_from_row(row, 12)?;
    let sequence_rate = match row.get::<_, Option<i64>>(16)? {
        Some(_) => rate_from_row(row, 16)?,
        None => rate,
    };
    Ok(Clip {
        id: ClipId::from(row.get::<_, String>(0)?),
        project_id: ProjectId::from(row.get::<_, String>(1)?),
        name: row.get(2)?,
        clip_kind,
        track_id: row.get::<_, Option<String>>(4)?.map(TrackId::from),
        owner_sequence_id: row.get::<_, Option<String>>(5)?.map(SequenceId::from),
        media_id: row.get::<_, Option<String>>(6)?.map(MediaId::from),
        parent_clip_id: row.get::<_, Option<String>>(7)?.map(ClipId::from),
        timeline_start: RationalTime::at(row.get(8)?, sequence_rate),
        duration: RationalTime::at(row.get(9)?, sequence_rate),
        source_in: RationalTime::at(row.get(10)?, rate),
        source_out: RationalTime::at(row.get(11)?, rate),
        rate,
        enabled: row.get(14)?,
        offline: row.get(15)?,
    })
}

impl ProjectDb {
    pub fn load_clip(&self, id: &ClipId) -> StoreResult<Clip> {
        self.load_clip_optional(id)?
            .ok_or_else(|| StoreError::not_found("clip", id))
    }

    /// Like `load_clip`, but a missing row is `Ok(None)`.
    pub fn load_clip_optional(&self, id: &ClipId) -> StoreResult<Option<Clip>> {
        Ok(self
            .connection()
            .query_row(
                &format!("{CLIP_SELECT} WHERE c.id = ?1"),
                params![id.as_str()],
                clip_from_row,
            )
            .optional()?)
    }

    pub fn clip_exists(&self, id: &ClipId) -> StoreResult<bool> {
        let found: Option<i64> = self
            .connection()
            .query_row(
                "SELECT 1 FROM clips WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn query_clips(&self, filter: &str, key: &str) -> StoreResult<Vec<Clip>> {
        let mut stmt = self.connection().prepare(&format!(
            "{CLIP_SELECT} WHERE {filter} ORDER BY c.timeline_start_frame, c.id"
        ))?;
        let rows = stmt.query_map(params![key], clip_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_track_clips(&self, track_id: &TrackId) -> StoreResult<Vec<Clip>> {
        self.query_clips("c.track_id = ?1", track_id.as_str())
    }

    pub fn list_sequence_clips(&self, sequence_id: &SequenceId) -> StoreResult<Vec<Clip>> {
        self.query_clips(
            "c.owner_sequence_id = ?1 AND c.clip_kind = 'timeline'",
            sequence_id.as_str(),
        )
    }

    pub fn list_master_clips(&self, project_id: &ProjectId) -> StoreResult<Vec<Clip>> {
        self.query_clips(
            "c.project_id = ?1 AND c.clip_kind = 'master'",
            project_id.as_str(),
        )
    }

    /// Timeline clips instantiated from `master_id`.
    pub fn list_derived_clips(&self, master_id: &ClipId) -> StoreResult<Vec<Clip>> {
        self.query_clips(
            "c.parent_clip_id = ?1 AND c.clip_kind = 'timeline'",
            master_id.as_str(),
        )
    }

    pub fn track_state(&self, track_id: &TrackId) -> StoreResult<TrackState> {
        let track = self.get_track(track_id)?;
        Ok(TrackState::new(track.id, self.list_track_clips(track_id)?).locked(track.locked))
    }

    /// Every track of the sequence with its clips, in track order.
    pub fn track_states(&self, sequence_id: &SequenceId) -> StoreResult<Vec<TrackState>> {
        self.list_tracks(sequence_id)?
            .into_iter()
            .map(|track| {
                let clips = self.list_track_clips(&track.id)?;
                Ok(TrackState::new(track.id, clips).locked(track.locked))
            })
            .collect()
    }

    /// Checks the clip against its invariants and against the rows it refers to.
    pub fn check_clip(&self, clip: &Clip) -> StoreResult<()> {
        clip.validate()?;
        if clip.clip_kind == ClipKind::Master {
            return Ok(());
        }
        let (Some(track_id), Some(sequence_id)) = (&clip.track_id, &clip.owner_sequence_id) else {
            return Err(StoreError::Constraint(format!(
                "timeline clip {} needs a track and an owning sequence",
                clip.id
            )));
        };
        let track = self.get_track(track_id)?;
        if &track.sequence_id != sequence_id {
            return Err(StoreError::Constraint(format!(
                "clip {} sits on track {} of another sequence",
                clip.id, track_id
            )));
        }
        let sequence = self.get_sequence(sequence_id)?;
        if sequence.rate != clip.sequence_rate() {
            return Err(StoreError::Constraint(format!(
                "clip {} timing is at {} but sequence {} runs at {}",
                clip.id,
                clip.sequence_rate(),
                sequence_id,
                sequence.rate
            )));
        }
        Ok(())
    }

    /// Upserts the clip. Unless `skip_occlusion` is set, whatever the clip
    /// lands on is trimmed first; those side effects are returned.
    pub fn save_clip(&self, clip: &Clip, options: SaveOptions) -> StoreResult<ExecutedPlan> {
        self.check_clip(clip)?;
        let mut side_effects = ExecutedPlan::default();
        if let (false, Some(track_id)) = (options.skip_occlusion, &clip.track_id) {
            let track = self.track_state(track_id)?;
            let mut pending = PendingClips::new();
            pending.mark_in_flight(&clip.id);
            let plan = resolve_occlusion(
                &track,
                clip.timeline_start,
                clip.duration,
                Some(&pending),
                &mut IdAllocator::new(),
                options.rounding,
            )?;
            if !plan.is_empty() {
                debug!(clip_id = %clip.id, mutations = plan.len(), "save occludes overlapped clips");
                side_effects = self.apply_mutations(&plan, &ApplyOptions::default())?;
            }
        }
        self.upsert_clip_row(clip)?;
        Ok(side_effects)
    }

    pub(crate) fn insert_clip_row(&self, clip: &Clip) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        self.connection().execute(
            "INSERT INTO clips(id, project_id, name, clip_kind, track_id, owner_sequence_id, media_id, parent_clip_id, timeline_start_frame, duration_frames, source_in_frame, source_out_frame, fps_numerator, fps_denominator, enabled, offline, created_at, modified_at) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
            params![
                clip.id.as_str(),
                clip.project_id.as_str(),
                clip.name,
                clip.clip_kind.as_str(),
                clip.track_id.as_ref().map(|t| t.as_str()),
                clip.owner_sequence_id.as_ref().map(|s| s.as_str()),
                clip.media_id.as_ref().map(|m| m.as_str()),
                clip.parent_clip_id.as_ref().map(|p| p.as_str()),
                clip.timeline_start.frames(),
                clip.duration.frames(),
                clip.source_in.frames(),
                clip.source_out.frames(),
                clip.rate.num(),
                clip.rate.den(),
                clip.enabled,
                clip.offline,
                now
            ],
        )?;
        Ok(())
    }

    pub(crate) fn update_clip_row(&self, clip: &Clip) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        let changed = self.connection().execute(
            "UPDATE clips SET project_id = ?2, name = ?3, clip_kind = ?4, track_id = ?5, owner_sequence_id = ?6, media_id = ?7, parent_clip_id = ?8, timeline_start_frame = ?9, duration_frames = ?10, source_in_frame = ?11, source_out_frame = ?12, fps_numerator = ?13, fps_denominator = ?14, enabled = ?15, offline = ?16, modified_at = ?17 WHERE id = ?1",
            params![
                clip.id.as_str(),
                clip.project_id.as_str(),
                clip.name,
                clip.clip_kind.as_str(),
                clip.track_id.as_ref().map(|t| t.as_str()),
                clip.owner_sequence_id.as_ref().map(|s| s.as_str()),
                clip.media_id.as_ref().map(|m| m.as_str()),
                clip.parent_clip_id.as_ref().map(|p| p.as_str()),
                clip.timeline_start.frames(),
                clip.duration.frames(),
                clip.source_in.frames(),
                clip.source_out.frames(),
                clip.rate.num(),
                clip.rate.den(),
                clip.enabled,
                clip.offline,
                now
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("clip", &clip.id));
        }
        Ok(())
    }

    pub(crate) fn upsert_clip_row(&self, clip: &Clip) -> StoreResult<()> {
        if self.clip_exists(&clip.id)? {
            self.update_clip_row(clip)
        } else {
            self.insert_clip_row(clip)
        }
    }

    /// Removes the clip row together with its property rows and link
    /// memberships, returning what was removed alongside it.
    pub fn delete_clip(&self, id: &ClipId) -> StoreResult<ClipDependents> {
        let dependents = self.capture_dependents(id)?;
        self.delete_properties(id)?;
        self.delete_links_for_clip(id)?;
        let changed = self
            .connection()
            .execute("DELETE FROM clips WHERE id = ?1", params![id.as_str()])?;
        if changed == 0 {
            return Err(StoreError::not_found("clip", id));
        }
        Ok(dependents)
    }
}
