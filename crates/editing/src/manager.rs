//! Undo/redo history backed by the `commands` table.

use project::{ApplyOptions, CommandRow, CommandStatus, EditSettings, ProjectDb, StoreError};
use serde_json::Value;
use timeline::{IdAllocator, IssuedIds, ProjectId};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::exec::{self, EditContext, Executed};
use crate::params::{decode_command, DecodeOptions};
use crate::undo::{self, UndoRecord};
use crate::{CommandResult, EditCommand, EditError, EditResult};

#[derive(Debug, Clone)]
struct HistoryEntry {
    row_id: String,
    command: EditCommand,
    record: UndoRecord,
}

/// Runs commands against one project and keeps their undo history.
///
/// Each execute, undo and redo is one store transaction; a failure leaves
/// both the store and the stacks as they were.
pub struct CommandManager<'a> {
    db: &'a ProjectDb,
    project_id: ProjectId,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
}

fn decode_row(row: &CommandRow) -> EditResult<HistoryEntry> {
    let command: EditCommand =
        serde_json::from_str(&row.command_json).map_err(|e| EditError::Store(e.into()))?;
    let raw_undo = row.undo_json.as_deref().ok_or_else(|| {
        EditError::Store(StoreError::Constraint(format!(
            "command {} has no undo data",
            row.id
        )))
    })?;
    let record: UndoRecord =
        serde_json::from_str(raw_undo).map_err(|e| EditError::Store(e.into()))?;
    Ok(HistoryEntry {
        row_id: row.id.clone(),
        command,
        record,
    })
}

fn encode<T: serde::Serialize>(value: &T) -> EditResult<String> {
    serde_json::to_string(value).map_err(|e| EditError::Store(e.into()))
}

impl<'a> CommandManager<'a> {
    /// Rebuilds the stacks from the command log.
    pub fn load(db: &'a ProjectDb, project_id: &ProjectId) -> EditResult<Self> {
        let mut undo_stack = Vec::new();
        let mut redo_stack = Vec::new();
        for row in db.list_commands(project_id)? {
            let entry = decode_row(&row)?;
            match row.status {
                CommandStatus::Executed => undo_stack.push(entry),
                CommandStatus::Undone => redo_stack.push(entry),
            }
        }
        // The oldest undone command is the next redo.
        redo_stack.reverse();
        info!(
            project_id = %project_id,
            undo = undo_stack.len(),
            redo = redo_stack.len(),
            "loaded command history"
        );
        Ok(Self {
            db,
            project_id: project_id.clone(),
            undo_stack,
            redo_stack,
        })
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Runs a command, never panicking; failures come back in the result.
    pub fn execute(&mut self, command: EditCommand) -> CommandResult {
        let kind = command.kind();
        match self.try_execute(command) {
            Ok(result) => result,
            Err(err) => {
                warn!(command = kind, code = err.code(), error = %err, "command failed");
                CommandResult::failed(Some(kind), &err)
            }
        }
    }

    /// Decodes untyped parameters, then runs the command.
    pub fn execute_json(&mut self, raw: &Value) -> CommandResult {
        let options = match self.settings() {
            Ok(settings) => DecodeOptions {
                allow_bare_frame_numbers: settings.allow_bare_frame_numbers,
            },
            Err(err) => return CommandResult::failed(None, &err),
        };
        match decode_command(raw, options) {
            Ok(command) => self.execute(command),
            Err(err) => {
                warn!(error = %err, "could not decode command");
                CommandResult::failed(None, &err)
            }
        }
    }

    pub fn try_execute(&mut self, command: EditCommand) -> EditResult<CommandResult> {
        let kind = command.kind();
        let settings = self.settings()?;
        let tx = self.db.begin_tx()?;
        let (executed, issued) = run(
            self.db,
            &self.project_id,
            &settings,
            &command,
            IdAllocator::new(),
        )?;
        let record = UndoRecord {
            payload: executed.payload,
            issued,
        };

        self.db.discard_undone_commands(&self.project_id)?;
        let row = CommandRow {
            id: Uuid::new_v4().to_string(),
            project_id: self.project_id.clone(),
            sequence_number: self.db.next_command_number(&self.project_id)?,
            command_type: kind.to_string(),
            command_json: encode(&command)?,
            undo_json: Some(encode(&record)?),
            status: CommandStatus::Executed,
            executed_at: chrono::Utc::now().timestamp(),
        };
        self.db.insert_command(&row)?;
        let pruned = self
            .db
            .prune_commands(&self.project_id, settings.history_limit)?;
        tx.commit().map_err(StoreError::from)?;

        let notifications = record.payload.notifications();
        self.redo_stack.clear();
        self.undo_stack.push(HistoryEntry {
            row_id: row.id,
            command,
            record,
        });
        if pruned > 0 {
            let excess = self.undo_stack.len().saturating_sub(settings.history_limit);
            self.undo_stack.drain(..excess);
        }
        Ok(CommandResult::succeeded(kind, notifications, executed.outcome))
    }

    pub fn undo(&mut self) -> CommandResult {
        match self.try_undo() {
            Ok(result) => result,
            Err(err) => CommandResult::failed(None, &err),
        }
    }

    pub fn try_undo(&mut self) -> EditResult<CommandResult> {
        let entry = self.undo_stack.last().ok_or(EditError::HistoryEmpty("undo"))?;
        let kind = entry.command.kind();
        let settings = self.settings()?;
        let options = ApplyOptions {
            verify_each_step: settings.verify_apply_steps,
        };

        let tx = self.db.begin_tx()?;
        let notifications = undo::revert(self.db, &entry.record.payload, &options)
            .and_then(|notifications| {
                self.db
                    .set_command_state(&entry.row_id, CommandStatus::Undone, None)?;
                tx.commit().map_err(StoreError::from)?;
                Ok(notifications)
            })
            .map_err(|source| {
                error!(command = kind, error = %source, "undo failed");
                EditError::UndoFailed {
                    command: kind,
                    source: Box::new(source),
                }
            })?;

        if let Some(entry) = self.undo_stack.pop() {
            self.redo_stack.push(entry);
        }
        info!(command = kind, "undone");
        Ok(CommandResult::succeeded(
            kind,
            notifications,
            Default::default(),
        ))
    }

    pub fn redo(&mut self) -> CommandResult {
        match self.try_redo() {
            Ok(result) => result,
            Err(err) => CommandResult::failed(None, &err),
        }
    }

    /// Re-executes the last undone command with the ids it used the first
    /// time.
    pub fn try_redo(&mut self) -> EditResult<CommandResult> {
        let entry = self.redo_stack.last().ok_or(EditError::HistoryEmpty("redo"))?;
        let kind = entry.command.kind();
        let settings = self.settings()?;

        let tx = self.db.begin_tx()?;
        let (executed, issued) = run(
            self.db,
            &self.project_id,
            &settings,
            &entry.command,
            IdAllocator::replaying(entry.record.issued.clone()),
        )?;
        let record = UndoRecord {
            payload: executed.payload,
            issued,
        };
        self.db.set_command_state(
            &entry.row_id,
            CommandStatus::Executed,
            Some(&encode(&record)?),
        )?;
        tx.commit().map_err(StoreError::from)?;

        let notifications = record.payload.notifications();
        if let Some(mut entry) = self.redo_stack.pop() {
            entry.record = record;
            self.undo_stack.push(entry);
        }
        info!(command = kind, "redone");
        Ok(CommandResult::succeeded(kind, notifications, executed.outcome))
    }

    fn settings(&self) -> EditResult<EditSettings> {
        Ok(self.db.edit_settings(&self.project_id)?)
    }
}

fn run(
    db: &ProjectDb,
    project_id: &ProjectId,
    settings: &EditSettings,
    command: &EditCommand,
    ids: IdAllocator,
) -> EditResult<(Executed, IssuedIds)> {
    let mut ctx = EditContext::new(db, project_id, settings, ids);
    let executed = exec::execute(&mut ctx, command)?;
    Ok((executed, ctx.ids.into_issued()))
}
