//! Deploy state persistence for checkpoint/resume.

use anyhow::{Context, Result};
use ragstack_common::{DeployStage, DeployState};
use std::path::PathBuf;

/// State file manager for checkpoint/resume.
pub struct StateManager {
    path: PathBuf,
}

impl StateManager {
    /// Create a state manager using the default path (`~/.ragstack/state.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
        Ok(Self::with_path(home.join(".ragstack").join("state.json")))
    }

    /// Create a state manager with an explicit path (used in tests).
    #[must_use]
    pub const fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load existing state, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<DeployState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading state file {}", self.path.display()))?;
        let state: DeployState = serde_json::from_str(&content)
            .with_context(|| format!("parsing state file {}", self.path.display()))?;
        Ok(Some(state))
    }

    /// Save state to disk with mode 600.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot be written.
    pub fn save(&self, state: &DeployState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(state).context("serializing state")?;
        std::fs::write(&self.path, &content)
            .with_context(|| format!("writing state file {}", self.path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("setting permissions on {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Remove the state file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("removing state file {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Update the stage in `state`, then persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be saved.
    pub fn advance(&self, deploy_state: &mut DeployState, next_stage: DeployStage) -> Result<()> {
        deploy_state.stage = next_stage;
        self.save(deploy_state)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ragstack_common::StackOutputs;
    use tempfile::TempDir;

    fn make_state() -> DeployState {
        DeployState {
            stage: DeployStage::DomainActive,
            project: "support-kb".to_string(),
            region: "us-east-1".to_string(),
            started_at: Utc::now(),
            outputs: StackOutputs::default(),
        }
    }

    fn mgr(dir: &TempDir) -> StateManager {
        StateManager::with_path(dir.path().join("state.json"))
    }

    #[test]
    fn load_returns_none_when_no_file() {
        let dir = TempDir::new().expect("tempdir");
        assert!(mgr(&dir).load().expect("load").is_none());
    }

    #[test]
    fn load_returns_state_when_file_exists() {
        let dir = TempDir::new().expect("tempdir");
        let m = mgr(&dir);
        m.save(&make_state()).expect("save");
        let loaded = m.load().expect("load").expect("state should be present");
        assert_eq!(loaded.stage, DeployStage::DomainActive);
        assert_eq!(loaded.project, "support-kb");
        assert_eq!(loaded.region, "us-east-1");
    }

    #[test]
    fn load_returns_error_on_corrupted_json() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not valid json").expect("write corrupt file");
        assert!(StateManager::with_path(path).load().is_err());
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = TempDir::new().expect("tempdir");
        let nested = dir.path().join("a").join("b").join("state.json");
        StateManager::with_path(nested.clone())
            .save(&make_state())
            .expect("save should create missing parent dirs");
        assert!(nested.exists());
    }

    #[test]
    fn save_persists_outputs() {
        let dir = TempDir::new().expect("tempdir");
        let m = mgr(&dir);
        let mut state = make_state();
        state.outputs.bucket_name = Some("support-kb-docs-123456789012".to_string());
        state.outputs.knowledge_base_id = Some("KB12345".to_string());
        m.save(&state).expect("save");
        let loaded = m.load().expect("load").expect("state present");
        assert_eq!(loaded.outputs, state.outputs);
    }

    #[test]
    fn clear_removes_existing_file() {
        let dir = TempDir::new().expect("tempdir");
        let m = mgr(&dir);
        m.save(&make_state()).expect("save");
        m.clear().expect("clear");
        assert!(!dir.path().join("state.json").exists());
    }

    #[test]
    fn clear_is_noop_when_no_file() {
        let dir = TempDir::new().expect("tempdir");
        assert!(mgr(&dir).clear().is_ok());
    }

    #[test]
    fn advance_updates_stage_in_memory_and_on_disk() {
        let dir = TempDir::new().expect("tempdir");
        let m = mgr(&dir);
        let mut state = make_state();
        m.advance(&mut state, DeployStage::IndexInitialized)
            .expect("advance");
        assert_eq!(state.stage, DeployStage::IndexInitialized);
        let on_disk = m.load().expect("load").expect("state present");
        assert_eq!(on_disk.stage, DeployStage::IndexInitialized);
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_600_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().expect("tempdir");
        let m = mgr(&dir);
        m.save(&make_state()).expect("save");
        let perms = std::fs::metadata(dir.path().join("state.json"))
            .expect("metadata")
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "state file must be mode 600");
    }
}
