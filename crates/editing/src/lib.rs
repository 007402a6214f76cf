//! Undoable timeline edits on top of the project store.
//!
//! Commands are plain data (`EditCommand`); `CommandManager` runs them in a
//! transaction, stores a typed undo payload per command and replays it on
//! undo. Redo re-executes with the ids issued the first time.

mod error;
pub use error::{CommandOutcome, CommandResult, EditError, EditResult};
mod commands;
pub use commands::{ClipPlacement, EdgeSelection, EditCommand, PlacementMode};
mod undo;
pub use undo::{UndoPayload, UndoRecord};
mod exec;
mod params;
pub use params::{decode_command, DecodeOptions};
mod manager;
pub use manager::CommandManager;
