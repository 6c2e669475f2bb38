//! Script lookup for job construction.

use std::io::ErrorKind;
use std::path::PathBuf;

use testu_core::error::CoreError;
use testu_core::job::is_safe_id;
use testu_core::script::{Script, BUILTIN_SCRIPT_ID};

/// Resolves script identifiers to scripts.
///
/// With a directory configured, `{dir}/{id}.json` is read on every lookup
/// so edits take effect without a restart. Without one, only the built-in
/// script exists.
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    dir: Option<PathBuf>,
}

impl ScriptLibrary {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub async fn load(&self, id: &str) -> Result<Script, CoreError> {
        let not_found = || CoreError::NotFound {
            entity: "Script",
            id: id.to_string(),
        };
        if !is_safe_id(id) {
            return Err(not_found());
        }

        let Some(dir) = &self.dir else {
            return if id == BUILTIN_SCRIPT_ID {
                Ok(Script::builtin())
            } else {
                Err(not_found())
            };
        };

        let path = dir.join(format!("{id}.json"));
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(CoreError::Internal(format!(
                    "Cannot read script {}: {e}",
                    path.display()
                )))
            }
        };
        Script::from_json(id, &text)
    }
}
