use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::Mutex};

const TRACKING_ON: &str = "true";

/// On-disk layout. Keys mirror the persisted names: `user_id` and `tracking`
/// (the string `"true"`, or absent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tracking: Option<String>,
}

impl SessionRecord {
    fn tracking_enabled(&self) -> bool {
        self.tracking.as_deref() == Some(TRACKING_ON)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: Option<String>,
    pub tracking_enabled: bool,
}

/// Durable key-value store for the logged-in user and the tracking flag.
///
/// Every call goes back to the file, so a store opened by the background task
/// and one held by the controller see each other's writes. Writes made through
/// clones of one store are serialized; nothing is atomic across processes or
/// across the two keys.
#[derive(Clone)]
pub struct SessionStore {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session directory {}", parent.display())
            })?;
        }

        Ok(Self {
            path: Arc::new(path),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub async fn session(&self) -> Result<Session> {
        let record = self.load().await?;
        Ok(Session {
            tracking_enabled: record.tracking_enabled(),
            user_id: record.user_id,
        })
    }

    pub async fn user_id(&self) -> Result<Option<String>> {
        Ok(self.load().await?.user_id)
    }

    pub async fn set_user_id(&self, user_id: &str) -> Result<()> {
        let user_id = user_id.to_string();
        self.update(move |record| {
            record.user_id = Some(user_id);
            Ok(())
        })
        .await
    }

    /// Clearing the user also drops the tracking flag so the flag never
    /// outlives the identity it belongs to.
    pub async fn clear_user_id(&self) -> Result<()> {
        self.update(|record| {
            record.user_id = None;
            record.tracking = None;
            Ok(())
        })
        .await
    }

    pub async fn tracking_enabled(&self) -> Result<bool> {
        Ok(self.load().await?.tracking_enabled())
    }

    pub async fn set_tracking_enabled(&self) -> Result<()> {
        self.update(|record| {
            if record.user_id.is_none() {
                bail!("cannot enable tracking without a logged-in user");
            }
            record.tracking = Some(TRACKING_ON.to_string());
            Ok(())
        })
        .await
    }

    pub async fn clear_tracking_enabled(&self) -> Result<()> {
        self.update(|record| {
            record.tracking = None;
            Ok(())
        })
        .await
    }

    async fn load(&self) -> Result<SessionRecord> {
        let contents = match fs::read_to_string(self.path.as_path()).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionRecord::default())
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read session from {}", self.path.display())
                })
            }
        };

        match serde_json::from_str(&contents) {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!(
                    "Discarding unreadable session file {}: {err}",
                    self.path.display()
                );
                Ok(SessionRecord::default())
            }
        }
    }

    async fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut SessionRecord) -> Result<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut record = self.load().await?;
        apply(&mut record)?;
        self.persist(&record).await
    }

    async fn persist(&self, record: &SessionRecord) -> Result<()> {
        let serialized = serde_json::to_string_pretty(record)?;
        // Write-then-rename so the background task never reads a torn file.
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)
            .await
            .with_context(|| format!("Failed to write session to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, self.path.as_path())
            .await
            .with_context(|| format!("Failed to replace session at {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("session.json")).unwrap()
    }

    #[tokio::test]
    async fn missing_file_reads_as_logged_out() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let session = store.session().await.unwrap();
        assert_eq!(session.user_id, None);
        assert!(!session.tracking_enabled);
    }

    #[tokio::test]
    async fn tracking_requires_a_user() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.set_tracking_enabled().await.is_err());
        assert!(!store.tracking_enabled().await.unwrap());

        store.set_user_id("42").await.unwrap();
        store.set_tracking_enabled().await.unwrap();
        assert!(store.tracking_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn persisted_keys_use_wire_names() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set_user_id("7").await.unwrap();
        store.set_tracking_enabled().await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["user_id"], "7");
        assert_eq!(value["tracking"], "true");

        store.clear_tracking_enabled().await.unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("tracking").is_none());
    }

    #[tokio::test]
    async fn separate_handles_share_the_file() {
        let dir = TempDir::new().unwrap();
        let main = store_in(&dir);
        let background = store_in(&dir);

        main.set_user_id("11").await.unwrap();
        main.set_tracking_enabled().await.unwrap();
        assert_eq!(background.user_id().await.unwrap().as_deref(), Some("11"));
        assert!(background.tracking_enabled().await.unwrap());

        background.clear_tracking_enabled().await.unwrap();
        assert!(!main.tracking_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn clearing_user_drops_tracking() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set_user_id("3").await.unwrap();
        store.set_tracking_enabled().await.unwrap();

        store.clear_user_id().await.unwrap();
        let session = store.session().await.unwrap();
        assert_eq!(session.user_id, None);
        assert!(!session.tracking_enabled);
    }

    #[tokio::test]
    async fn only_literal_true_enables_tracking() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"user_id":"5","tracking":"yes"}"#).unwrap();

        assert!(!store.tracking_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();

        assert_eq!(store.user_id().await.unwrap(), None);
        store.set_user_id("9").await.unwrap();
        assert_eq!(store.user_id().await.unwrap().as_deref(), Some("9"));
    }
}
