//! Per-project runtime settings.
//!
//! Stored as JSON beside the project file. Holds arbitrary key/value pairs
//! written by components and the persisted values of persistent global
//! variables, reloaded on the next start. A missing file is an empty
//! settings set; a malformed one is discarded with a warning.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use strand_flow::Value;

const PERSISTENT_VARIABLES_KEY: &str = "__persistent_variables";

/// File extension appended to the project path.
pub const SETTINGS_EXTENSION: &str = "strand-settings";

#[derive(Debug, Default)]
pub struct RuntimeSettings {
  path: Option<PathBuf>,
  values: HashMap<String, serde_json::Value>,
}

impl RuntimeSettings {
  /// Settings that are never persisted.
  pub fn in_memory() -> Self {
    Self::default()
  }

  /// Settings file path for a given project file.
  pub fn path_for_project(project_path: &Path) -> PathBuf {
    let mut os = project_path.as_os_str().to_os_string();
    os.push(".");
    os.push(SETTINGS_EXTENSION);
    PathBuf::from(os)
  }

  pub fn load(path: PathBuf) -> Self {
    let values = match std::fs::read_to_string(&path) {
      Ok(data) => match serde_json::from_str(&data) {
        Ok(values) => values,
        Err(e) => {
          warn!(path = %path.display(), error = %e, "discarding malformed settings file");
          HashMap::new()
        }
      },
      Err(_) => HashMap::new(),
    };
    Self {
      path: Some(path),
      values,
    }
  }

  pub fn read(&self, key: &str) -> Option<&serde_json::Value> {
    self.values.get(key)
  }

  pub fn write(&mut self, key: &str, value: serde_json::Value) {
    self.values.insert(key.to_string(), value);
  }

  pub fn save(&self) -> io::Result<()> {
    let Some(path) = &self.path else {
      return Ok(());
    };
    let json = serde_json::to_string_pretty(&self.values)?;
    std::fs::write(path, json)
  }

  /// Persisted global-variable values from the last run.
  pub fn persistent_variables(&self) -> HashMap<String, Value> {
    let Some(serde_json::Value::Object(fields)) = self.values.get(PERSISTENT_VARIABLES_KEY) else {
      return HashMap::new();
    };
    fields
      .iter()
      .filter_map(|(name, json)| {
        serde_json::from_value::<Value>(json.clone())
          .ok()
          .map(|value| (name.clone(), value))
      })
      .collect()
  }

  pub fn set_persistent_variables(&mut self, variables: &HashMap<String, Value>) {
    let fields: serde_json::Map<String, serde_json::Value> = variables
      .iter()
      .filter_map(|(name, value)| {
        serde_json::to_value(value)
          .ok()
          .map(|json| (name.clone(), json))
      })
      .collect();
    self
      .values
      .insert(PERSISTENT_VARIABLES_KEY.to_string(), serde_json::Value::Object(fields));
  }
}
