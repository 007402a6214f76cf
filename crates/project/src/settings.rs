use serde::{Deserialize, Serialize};
use timeline::{ProjectId, RoundingMode};

use crate::{ProjectDb, StoreResult};

const SETTINGS_KEY: &str = "editing";

/// Per-project editing knobs, kept under `"editing"` in `projects.settings_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditSettings {
    /// Rounding used when a sequence-rate delta is applied to a clip's
    /// source range in a different rate.
    pub source_rounding: RoundingMode,
    /// Check for overlaps after every single mutation, not just at the end.
    pub verify_apply_steps: bool,
    /// Undo entries kept per project.
    pub history_limit: usize,
    /// Accept bare numbers as frame counts in command parameters.
    pub allow_bare_frame_numbers: bool,
}

impl Default for EditSettings {
    fn default() -> Self {
        Self {
            source_rounding: RoundingMode::Exact,
            verify_apply_steps: false,
            history_limit: 200,
            allow_bare_frame_numbers: false,
        }
    }
}

impl ProjectDb {
    pub fn edit_settings(&self, project_id: &ProjectId) -> StoreResult<EditSettings> {
        let settings = self.get_project_settings_json(project_id)?;
        match settings.get(SETTINGS_KEY) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(EditSettings::default()),
        }
    }

    pub fn update_edit_settings(
        &self,
        project_id: &ProjectId,
        edit: &EditSettings,
    ) -> StoreResult<()> {
        let mut settings = self.get_project_settings_json(project_id)?;
        if !settings.is_object() {
            settings = serde_json::Value::Object(Default::default());
        }
        if let Some(map) = settings.as_object_mut() {
            map.insert(SETTINGS_KEY.to_string(), serde_json::to_value(edit)?);
        }
        self.update_project_settings_json(project_id, &settings)
    }
}
