//! Static allow-list of testing agents.

use std::collections::BTreeSet;

use testu_core::error::CoreError;

/// Agent identifiers allowed to pull jobs and post reports.
#[derive(Debug, Clone, Default)]
pub struct AgentRoster {
    agents: BTreeSet<String>,
}

impl AgentRoster {
    /// Build a roster, ignoring blank identifiers.
    pub fn new<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            agents: agents
                .into_iter()
                .map(|a| a.as_ref().trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    /// Check an agent identifier, returning it when it is on the roster.
    pub fn authorize<'a>(&self, agent: Option<&'a str>) -> Result<&'a str, CoreError> {
        match agent {
            None | Some("") => Err(CoreError::Unauthorized(
                "Agent identifier is required".to_string(),
            )),
            Some(id) if self.agents.contains(id) => Ok(id),
            Some(id) => Err(CoreError::Unauthorized(format!(
                "Agent {id} is not authorized"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
