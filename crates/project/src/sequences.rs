use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use timeline::{MediaId, ProjectId, Rate, SequenceId, TimelineError, TrackId};

use crate::{ProjectDb, StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRow {
    pub id: SequenceId,
    pub project_id: ProjectId,
    pub name: String,
    pub rate: Rate,
    pub width: i64,
    pub height: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Video,
    Audio,
}

impl TrackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackType::Video => "video",
            TrackType::Audio => "audio",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "video" => Some(TrackType::Video),
            "audio" => Some(TrackType::Audio),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRow {
    pub id: TrackId,
    pub sequence_id: SequenceId,
    pub name: String,
    pub track_type: TrackType,
    pub track_index: i64,
    pub enabled: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRow {
    pub id: MediaId,
    pub project_id: ProjectId,
    pub name: String,
    pub file_path: String,
    /// In the media's own rate.
    pub duration_frames: i64,
    pub rate: Rate,
}

fn bad_column(idx: usize, err: TimelineError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(err))
}

pub(crate) fn rate_from_row(row: &Row<'_>, num_idx: usize) -> rusqlite::Result<Rate> {
    let num: i64 = row.get(num_idx)?;
    let den: i64 = row.get(num_idx + 1)?;
    Rate::from_columns(num, den).map_err(|e| bad_column(num_idx, e))
}

fn sequence_from_row(row: &Row<'_>) -> rusqlite::Result<SequenceRow> {
    Ok(SequenceRow {
        id: SequenceId::from(row.get::<_, String>(0)?),
        project_id: ProjectId::from(row.get::<_, String>(1)?),
        name: row.get(2)?,
        rate: rate_from_row(row, 3)?,
        width: row.get(5)?,
        height: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<TrackRow> {
    let raw_type: String = row.get(3)?;
    let track_type = TrackType::parse(&raw_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown track type {raw_type}").into(),
        )
    })?;
    Ok(TrackRow {
        id: TrackId::from(row.get::<_, String>(0)?),
        sequence_id: SequenceId::from(row.get::<_, String>(1)?),
        name: row.get(2)?,
        track_type,
        track_index: row.get(4)?,
        enabled: row.get(5)?,
        locked: row.get(6)?,
    })
}

fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRow> {
    Ok(MediaRow {
        id: MediaId::from(row.get::<_, String>(0)?),
        project_id: ProjectId::from(row.get::<_, String>(1)?),
        name: row.get(2)?,
        file_path: row.get(3)?,
        duration_frames: row.get(4)?,
        rate: rate_from_row(row, 5)?,
    })
}

const SEQUENCE_COLUMNS: &str =
    "id, project_id, name, fps_numerator, fps_denominator, width, height, created_at";
const TRACK_COLUMNS: &str = "id, sequence_id, name, track_type, track_index, enabled, locked";
const MEDIA_COLUMNS: &str =
    "id, project_id, name, file_path, duration_frames, fps_numerator, fps_denominator";

impl ProjectDb {
    pub fn create_sequence(
        &self,
        project_id: &ProjectId,
        name: &str,
        rate: Rate,
    ) -> StoreResult<SequenceRow> {
        let row = SequenceRow {
            id: SequenceId::new(),
            project_id: project_id.clone(),
            name: name.to_string(),
            rate,
            width: 1920,
            height: 1080,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.insert_sequence(&row)?;
        Ok(row)
    }

    pub fn insert_sequence(&self, row: &SequenceRow) -> StoreResult<()> {
        self.connection().execute(
            "INSERT INTO sequences(id, project_id, name, fps_numerator, fps_denominator, width, height, created_at) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.id.as_str(),
                row.project_id.as_str(),
                row.name,
                row.rate.num(),
                row.rate.den(),
                row.width,
                row.height,
                row.created_at
            ],
        )?;
        Ok(())
    }

    pub fn get_sequence(&self, id: &SequenceId) -> StoreResult<SequenceRow> {
        self.connection()
            .query_row(
                &format!("SELECT {SEQUENCE_COLUMNS} FROM sequences WHERE id = ?1"),
                params![id.as_str()],
                sequence_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("sequence", id))
    }

    pub fn list_sequences(&self, project_id: &ProjectId) -> StoreResult<Vec<SequenceRow>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {SEQUENCE_COLUMNS} FROM sequences WHERE project_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![project_id.as_str()], sequence_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_sequence_row(&self, id: &SequenceId) -> StoreResult<()> {
        let changed = self
            .connection()
            .execute("DELETE FROM sequences WHERE id = ?1", params![id.as_str()])?;
        if changed == 0 {
            return Err(StoreError::not_found("sequence", id));
        }
        Ok(())
    }

    pub fn create_track(
        &self,
        sequence_id: &SequenceId,
        name: &str,
        track_type: TrackType,
        track_index: i64,
    ) -> StoreResult<TrackRow> {
        let row = TrackRow {
            id: TrackId::new(),
            sequence_id: sequence_id.clone(),
            name: name.to_string(),
            track_type,
            track_index,
            enabled: true,
            locked: false,
        };
        self.insert_track(&row)?;
        Ok(row)
    }

    pub fn insert_track(&self, row: &TrackRow) -> StoreResult<()> {
        self.connection().execute(
            "INSERT INTO tracks(id, sequence_id, name, track_type, track_index, enabled, locked) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id.as_str(),
                row.sequence_id.as_str(),
                row.name,
                row.track_type.as_str(),
                row.track_index,
                row.enabled,
                row.locked
            ],
        )?;
        Ok(())
    }

    pub fn get_track(&self, id: &TrackId) -> StoreResult<TrackRow> {
        self.connection()
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"),
                params![id.as_str()],
                track_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("track", id))
    }

    pub fn list_tracks(&self, sequence_id: &SequenceId) -> StoreResult<Vec<TrackRow>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE sequence_id = ?1 ORDER BY track_type DESC, track_index, id"
        ))?;
        let rows = stmt.query_map(params![sequence_id.as_str()], track_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_track_locked(&self, id: &TrackId, locked: bool) -> StoreResult<()> {
        let changed = self.connection().execute(
            "UPDATE tracks SET locked = ?2 WHERE id = ?1",
            params![id.as_str(), locked],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("track", id));
        }
        Ok(())
    }

    pub fn delete_track_row(&self, id: &TrackId) -> StoreResult<()> {
        let changed = self
            .connection()
            .execute("DELETE FROM tracks WHERE id = ?1", params![id.as_str()])?;
        if changed == 0 {
            return Err(StoreError::not_found("track", id));
        }
        Ok(())
    }

    pub fn create_media(
        &self,
        project_id: &ProjectId,
        name: &str,
        file_path: &str,
        duration_frames: i64,
        rate: Rate,
    ) -> StoreResult<MediaRow> {
        if duration_frames <= 0 {
            return Err(StoreError::Constraint(format!(
                "media {name} has non-positive duration {duration_frames}"
            )));
        }
        let row = MediaRow {
            id: MediaId::new(),
            project_id: project_id.clone(),
            name: name.to_string(),
            file_path: file_path.to_string(),
            duration_frames,
            rate,
        };
        self.connection().execute(
            "INSERT INTO media(id, project_id, name, file_path, duration_frames, fps_numerator, fps_denominator, created_at) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.id.as_str(),
                row.project_id.as_str(),
                row.name,
                row.file_path,
                row.duration_frames,
                row.rate.num(),
                row.rate.den(),
                chrono::Utc::now().timestamp()
            ],
        )?;
        Ok(row)
    }

    pub fn get_media(&self, id: &MediaId) -> StoreResult<MediaRow> {
        self.get_media_optional(id)?
            .ok_or_else(|| StoreError::not_found("media", id))
    }

    pub fn get_media_optional(&self, id: &MediaId) -> StoreResult<Option<MediaRow>> {
        Ok(self
            .connection()
            .query_row(
                &format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = ?1"),
                params![id.as_str()],
                media_from_row,
            )
            .optional()?)
    }

    pub fn list_media(&self, project_id: &ProjectId) -> StoreResult<Vec<MediaRow>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE project_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![project_id.as_str()], media_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Request-scoped lookup of sequence frame rates.
///
/// Build one per command invocation; each sequence is queried at most once.
pub struct SequenceRateProvider<'a> {
    db: &'a ProjectDb,
    cache: HashMap<SequenceId, Rate>,
}

impl<'a> SequenceRateProvider<'a> {
    pub fn new(db: &'a ProjectDb) -> Self {
        Self {
            db,
            cache: HashMap::new(),
        }
    }

    pub fn rate(&mut self, sequence_id: &SequenceId) -> StoreResult<Rate> {
        if let Some(rate) = self.cache.get(sequence_id) {
            return Ok(*rate);
        }
        let rate: Option<Rate> = self
            .db
            .connection()
            .query_row(
                "SELECT fps_numerator, fps_denominator FROM sequences WHERE id = ?1",
                params![sequence_id.as_str()],
                |row| rate_from_row(row, 0),
            )
            .optional()?;
        let rate = rate.ok_or_else(|| StoreError::not_found("sequence", sequence_id))?;
        self.cache.insert(sequence_id.clone(), rate);
        Ok(rate)
    }

    /// Rate of the sequence owning `track_id`.
    pub fn rate_for_track(&mut self, track_id: &TrackId) -> StoreResult<(SequenceId, Rate)> {
        let track = self.db.get_track(track_id)?;
        let rate = self.rate(&track.sequence_id)?;
        Ok((track.sequence_id, rate))
    }
}
