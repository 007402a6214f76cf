use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use timeline::ProjectId;

use crate::{ProjectDb, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Executed,
    Undone,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Executed => "executed",
            CommandStatus::Undone => "undone",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "executed" => Some(CommandStatus::Executed),
            "undone" => Some(CommandStatus::Undone),
            _ => None,
        }
    }
}

/// One entry of a project's edit history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRow {
    pub id: String,
    pub project_id: ProjectId,
    pub sequence_number: i64,
    pub command_type: String,
    pub command_json: String,
    pub undo_json: Option<String>,
    pub status: CommandStatus,
    pub executed_at: i64,
}

fn command_from_row(row: &Row<'_>) -> rusqlite::Result<CommandRow> {
    let raw_status: String = row.get(6)?;
    let status = CommandStatus::parse(&raw_status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown command status {raw_status}").into(),
        )
    })?;
    Ok(CommandRow {
        id: row.get(0)?,
        project_id: ProjectId::from(row.get::<_, String>(1)?),
        sequence_number: row.get(2)?,
        command_type: row.get(3)?,
        command_json: row.get(4)?,
        undo_json: row.get(5)?,
        status,
        executed_at: row.get(7)?,
    })
}

impl ProjectDb {
    pub fn next_command_number(&self, project_id: &ProjectId) -> StoreResult<i64> {
        let max: Option<i64> = self.connection().query_row(
            "SELECT MAX(sequence_number) FROM commands WHERE project_id = ?1",
            params![project_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    pub fn insert_command(&self, row: &CommandRow) -> StoreResult<()> {
        self.connection().execute(
            "INSERT INTO commands(id, project_id, sequence_number, command_type, command_json, undo_json, status, executed_at) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.id,
                row.project_id.as_str(),
                row.sequence_number,
                row.command_type,
                row.command_json,
                row.undo_json,
                row.status.as_str(),
                row.executed_at
            ],
        )?;
        Ok(())
    }

    pub fn set_command_state(
        &self,
        id: &str,
        status: CommandStatus,
        undo_json: Option<&str>,
    ) -> StoreResult<()> {
        let changed = self.connection().execute(
            "UPDATE commands SET status = ?2, undo_json = COALESCE(?3, undo_json), executed_at = ?4 WHERE id = ?1",
            params![id, status.as_str(), undo_json, chrono::Utc::now().timestamp()],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("command", id));
        }
        Ok(())
    }

    pub fn list_commands(&self, project_id: &ProjectId) -> StoreResult<Vec<CommandRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, project_id, sequence_number, command_type, command_json, undo_json, status, executed_at FROM commands WHERE project_id = ?1 ORDER BY sequence_number",
        )?;
        let rows = stmt.query_map(params![project_id.as_str()], command_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Drops the redo tail; a new command makes undone entries unreachable.
    pub fn discard_undone_commands(&self, project_id: &ProjectId) -> StoreResult<usize> {
        Ok(self.connection().execute(
            "DELETE FROM commands WHERE project_id = ?1 AND status = 'undone'",
            params![project_id.as_str()],
        )?)
    }

    /// Keeps only the newest `keep` executed commands.
    pub fn prune_commands(&self, project_id: &ProjectId, keep: usize) -> StoreResult<usize> {
        Ok(self.connection().execute(
            "DELETE FROM commands WHERE project_id = ?1 AND status = 'executed' AND sequence_number NOT IN (SELECT sequence_number FROM commands WHERE project_id = ?1 AND status = 'executed' ORDER BY sequence_number DESC LIMIT ?2)",
            params![project_id.as_str(), keep as i64],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(project: &ProjectId, n: i64, status: CommandStatus) -> CommandRow {
        CommandRow {
            id: format!("cmd-{n}"),
            project_id: project.clone(),
            sequence_number: n,
            command_type: "nudge".into(),
            command_json: "{}".into(),
            undo_json: None,
            status,
            executed_at: 0,
        }
    }

    #[test]
    fn history_rows_are_numbered_and_pruned() {
        let db = ProjectDb::open_in_memory().unwrap();
        let project = ProjectId::from("p");
        db.ensure_project(&project, "Demo").unwrap();
        assert_eq!(db.next_command_number(&project).unwrap(), 1);

        for n in 1..=4 {
            db.insert_command(&row(&project, n, CommandStatus::Executed))
                .unwrap();
        }
        db.insert_command(&row(&project, 5, CommandStatus::Undone))
            .unwrap();
        assert_eq!(db.next_command_number(&project).unwrap(), 6);

        assert_eq!(db.discard_undone_commands(&project).unwrap(), 1);
        assert_eq!(db.prune_commands(&project, 2).unwrap(), 2);
        let left: Vec<i64> = db
            .list_commands(&project)
            .unwrap()
            .iter()
            .map(|c| c.sequence_number)
            .collect();
        assert_eq!(left, vec![3, 4]);

        db.set_command_state("cmd-4", CommandStatus::Undone, Some("{\"x\":1}"))
            .unwrap();
        let last = db.list_commands(&project).unwrap().pop().unwrap();
        assert_eq!(last.status, CommandStatus::Undone);
        assert_eq!(last.undo_json.as_deref(), Some("{\"x\":1}"));
        assert!(db
            .set_command_state("missing", CommandStatus::Undone, None)
            .is_err());
    }
}
