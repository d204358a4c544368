use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Session file name in the state directory
const SESSION_FILE: &str = "session.json";

/// What survives a restart besides the tokens themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: serde_json::Value,
}

/// Explicit save/load of the session flags and user profile.
pub struct SessionFile {
    path: Option<PathBuf>,
}

impl SessionFile {
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            path: Some(state_dir.join(SESSION_FILE)),
        }
    }

    /// Nothing is written; `load` always yields the default.
    pub fn ephemeral() -> Self {
        Self { path: None }
    }

    pub fn load(&self) -> Result<PersistedSession> {
        let Some(path) = &self.path else {
            return Ok(PersistedSession::default());
        };
        if !path.exists() {
            return Ok(PersistedSession::default());
        }
        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        serde_json::from_str(&contents).context("Failed to parse session file")
    }

    pub fn save(&self, state: &PersistedSession) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(state)?;
        std::fs::write(path, contents).context("Failed to write session file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = SessionFile::new(dir.path().to_path_buf());
        assert_eq!(file.load().expect("load"), PersistedSession::default());

        let state = PersistedSession {
            authenticated: true,
            user: json!({"id": 1}),
        };
        file.save(&state).expect("save");
        assert_eq!(file.load().expect("load"), state);
    }

    #[test]
    fn test_missing_fields_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(SESSION_FILE), r#"{"authenticated":true}"#).expect("write");
        let state = SessionFile::new(dir.path().to_path_buf()).load().expect("load");
        assert!(state.authenticated);
        assert!(state.user.is_null());
    }

    #[test]
    fn test_ephemeral_never_writes() {
        let file = SessionFile::ephemeral();
        file.save(&PersistedSession {
            authenticated: true,
            user: json!({}),
        })
        .expect("save");
        assert!(!file.load().expect("load").authenticated);
    }
}
