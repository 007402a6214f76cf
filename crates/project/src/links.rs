use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use timeline::{ClipId, ClipLink, LinkGroupId};
use uuid::Uuid;

use crate::{ProjectDb, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRow {
    pub id: String,
    pub clip_id: ClipId,
    pub property_name: String,
    pub property_value: Option<String>,
    pub property_type: String,
    pub default_value: Option<String>,
}

/// Rows that hang off a clip and go away with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipDependents {
    pub clip_id: ClipId,
    pub properties: Vec<PropertyRow>,
    pub links: Vec<ClipLink>,
}

impl ClipDependents {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.links.is_empty()
    }
}

fn property_from_row(row: &Row<'_>) -> rusqlite::Result<PropertyRow> {
    Ok(PropertyRow {
        id: row.get(0)?,
        clip_id: ClipId::from(row.get::<_, String>(1)?),
        property_name: row.get(2)?,
        property_value: row.get(3)?,
        property_type: row.get(4)?,
        default_value: row.get(5)?,
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<ClipLink> {
    Ok(ClipLink {
        link_group_id: LinkGroupId::from(row.get::<_, String>(0)?),
        clip_id: ClipId::from(row.get::<_, String>(1)?),
        role: row.get(2)?,
        time_offset: row.get(3)?,
        enabled: row.get(4)?,
    })
}

impl ProjectDb {
    pub fn list_properties(&self, clip_id: &ClipId) -> StoreResult<Vec<PropertyRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, clip_id, property_name, property_value, property_type, default_value FROM properties WHERE clip_id = ?1 ORDER BY property_name, id",
        )?;
        let rows = stmt.query_map(params![clip_id.as_str()], property_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn insert_property(&self, row: &PropertyRow) -> StoreResult<()> {
        self.connection().execute(
            "INSERT INTO properties(id, clip_id, property_name, property_value, property_type, default_value) VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id,
                row.clip_id.as_str(),
                row.property_name,
                row.property_value,
                row.property_type,
                row.default_value
            ],
        )?;
        Ok(())
    }

    pub fn set_property(
        &self,
        clip_id: &ClipId,
        name: &str,
        value: &str,
        property_type: &str,
    ) -> StoreResult<PropertyRow> {
        let row = PropertyRow {
            id: Uuid::new_v4().to_string(),
            clip_id: clip_id.clone(),
            property_name: name.to_string(),
            property_value: Some(value.to_string()),
            property_type: property_type.to_string(),
            default_value: None,
        };
        self.connection().execute(
            "DELETE FROM properties WHERE clip_id = ?1 AND property_name = ?2",
            params![clip_id.as_str(), name],
        )?;
        self.insert_property(&row)?;
        Ok(row)
    }

    pub fn delete_properties(&self, clip_id: &ClipId) -> StoreResult<usize> {
        Ok(self.connection().execute(
            "DELETE FROM properties WHERE clip_id = ?1",
            params![clip_id.as_str()],
        )?)
    }

    pub fn list_links_for_clip(&self, clip_id: &ClipId) -> StoreResult<Vec<ClipLink>> {
        let mut stmt = self.connection().prepare(
            "SELECT link_group_id, clip_id, role, time_offset, enabled FROM clip_links WHERE clip_id = ?1 ORDER BY link_group_id",
        )?;
        let rows = stmt.query_map(params![clip_id.as_str()], link_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_link_group(&self, group: &LinkGroupId) -> StoreResult<Vec<ClipLink>> {
        let mut stmt = self.connection().prepare(
            "SELECT link_group_id, clip_id, role, time_offset, enabled FROM clip_links WHERE link_group_id = ?1 ORDER BY clip_id",
        )?;
        let rows = stmt.query_map(params![group.as_str()], link_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn insert_link(&self, link: &ClipLink) -> StoreResult<()> {
        self.connection().execute(
            "INSERT INTO clip_links(link_group_id, clip_id, role, time_offset, enabled) VALUES(?1, ?2, ?3, ?4, ?5)",
            params![
                link.link_group_id.as_str(),
                link.clip_id.as_str(),
                link.role,
                link.time_offset,
                link.enabled
            ],
        )?;
        Ok(())
    }

    pub fn delete_link(&self, group: &LinkGroupId, clip_id: &ClipId) -> StoreResult<bool> {
        let changed = self.connection().execute(
            "DELETE FROM clip_links WHERE link_group_id = ?1 AND clip_id = ?2",
            params![group.as_str(), clip_id.as_str()],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_links_for_clip(&self, clip_id: &ClipId) -> StoreResult<usize> {
        Ok(self.connection().execute(
            "DELETE FROM clip_links WHERE clip_id = ?1",
            params![clip_id.as_str()],
        )?)
    }

    pub fn capture_dependents(&self, clip_id: &ClipId) -> StoreResult<ClipDependents> {
        Ok(ClipDependents {
            clip_id: clip_id.clone(),
            properties: self.list_properties(clip_id)?,
            links: self.list_links_for_clip(clip_id)?,
        })
    }

    /// Puts captured rows back; rows that already exist are left alone.
    pub fn restore_dependents(&self, dependents: &ClipDependents) -> StoreResult<()> {
        for property in &dependents.properties {
            self.connection().execute(
                "INSERT OR IGNORE INTO properties(id, clip_id, property_name, property_value, property_type, default_value) VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    property.id,
                    property.clip_id.as_str(),
                    property.property_name,
                    property.property_value,
                    property.property_type,
                    property.default_value
                ],
            )?;
        }
        for link in &dependents.links {
            self.connection().execute(
                "INSERT OR IGNORE INTO clip_links(link_group_id, clip_id, role, time_offset, enabled) VALUES(?1, ?2, ?3, ?4, ?5)",
                params![
                    link.link_group_id.as_str(),
                    link.clip_id.as_str(),
                    link.role,
                    link.time_offset,
                    link.enabled
                ],
            )?;
        }
        Ok(())
    }
}
