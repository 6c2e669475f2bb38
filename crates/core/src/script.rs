//! Test scripts: the act lists jobs are built from.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::CoreError;

/// Identifier of the script compiled into the server.
pub const BUILTIN_SCRIPT_ID: &str = "default";

/// A reusable act list plus the job defaults that go with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    #[serde(default)]
    pub id: String,
    pub what: String,
    #[serde(default)]
    pub strict: bool,
    pub time_limit: u64,
    pub acts: Vec<serde_json::Value>,
}

impl Script {
    /// The built-in script: one browser launch, then the standard tool set.
    pub fn builtin() -> Self {
        let tests = ["alfa", "axe", "htmlcs", "ibm", "nuVal", "qualWeb", "testaro"];
        let mut acts = vec![json!({ "type": "launch", "which": "chromium" })];
        acts.extend(tests.iter().map(|tool| json!({ "type": "test", "which": tool })));
        Self {
            id: BUILTIN_SCRIPT_ID.to_string(),
            what: "Accessibility tests with the standard tool set".to_string(),
            strict: true,
            time_limit: 600,
            acts,
        }
    }

    /// Parse a script file's contents, checking it declares the expected id.
    ///
    /// A file without an `id` takes the identifier it was requested under.
    pub fn from_json(id: &str, text: &str) -> Result<Self, CoreError> {
        let mut script: Script = serde_json::from_str(text)
            .map_err(|e| CoreError::Validation(format!("Script {id} is not valid: {e}")))?;
        if script.id.is_empty() {
            script.id = id.to_string();
        }
        if script.id != id {
            return Err(CoreError::Validation(format!(
                "Script file for {id} declares id {}",
                script.id
            )));
        }
        if script.acts.is_empty() {
            return Err(CoreError::Validation(format!("Script {id} has no acts")));
        }
        Ok(script)
    }
}
