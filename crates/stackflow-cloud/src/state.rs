//! State management for provisioned resources
//!
//! Manages the `.stackflow/state.json` file which records, per logical
//! resource name, the provider id, the runtime attributes returned by the
//! provider and the last applied resource definition.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackflow_core::{Resource, ResourceKind, STACKFLOW_DIR};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";
const LOCK_STALE_HOURS: i64 = 1;

/// Recorded state of one stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Name of the stack the resources belong to
    #[serde(default)]
    pub stack: Option<String>,

    /// Resources indexed by logical name
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,

    /// Output values from the last successful apply
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            stack: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, name: impl Into<String>, state: ResourceState) {
        self.resources.insert(name.into(), state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, name: &str) -> Option<ResourceState> {
        let result = self.resources.remove(name);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Get a resource by logical name
    pub fn get_resource(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(name)
    }

    /// Order in which the given recorded resources can be deleted
    ///
    /// A resource comes after every recorded resource in `names` that
    /// depends on it. Names without a state entry are skipped. Ties keep
    /// the order of `names`.
    pub fn deletion_order<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let mut pending: Vec<&str> = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| self.resources.contains_key(*n))
            .collect();
        let mut seen = BTreeSet::new();
        pending.retain(|n| seen.insert(*n));

        let mut ordered = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let next = pending.iter().position(|candidate| {
                !pending.iter().any(|other| {
                    other != candidate
                        && self
                            .resources
                            .get(*other)
                            .is_some_and(|s| s.depends_on.iter().any(|d| d.as_str() == *candidate))
                })
            });

            // a cycle in recorded state is broken in input order
            let index = next.unwrap_or(0);
            ordered.push(pending.remove(index).to_string());
        }
        ordered
    }

    /// Every recorded resource in deletion order
    pub fn full_deletion_order(&self) -> Vec<String> {
        // newest first
        let mut names: Vec<&String> = self.resources.keys().collect();
        names.sort_by_key(|n| std::cmp::Reverse(self.resources[*n].created_at));
        self.deletion_order(&names)
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-specific resource ID
    pub id: String,

    /// Resource kind
    pub resource_type: ResourceKind,

    /// Current status
    pub status: ResourceStatus,

    /// Last applied definition
    pub resource: Resource,

    /// Logical names of the resources this one references
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Resource attributes (public IP, DNS name, etc.)
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource: &Resource) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource.kind(),
            status: ResourceStatus::Unknown,
            resource: resource.clone(),
            depends_on: resource
                .dependencies()
                .into_iter()
                .map(str::to_string)
                .collect(),
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Value of an output attribute; `id` is the provider id
    pub fn attribute_value(&self, key: &str) -> Option<serde_json::Value> {
        if key == "id" {
            return Some(serde_json::Value::String(self.id.clone()));
        }
        self.attributes.get(key).cloned()
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource is available
    Available,
    /// Instance is running
    Running,
    /// Status is unknown
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Available => write!(f, "available"),
            ResourceStatus::Running => write!(f, "running"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    /// Get the state directory path
    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STACKFLOW_DIR)
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    ///
    /// The lock file is created with `create_new`, so only one process can
    /// hold it. A lock older than an hour is taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        match create_lock_file(&lock_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let content = fs::read_to_string(&lock_path).await?;
                let lock_info: LockInfo = serde_json::from_str(&content).map_err(|_| {
                    CloudError::LockError(format!(
                        "State is locked ({} is being written or is corrupt)",
                        lock_path.display()
                    ))
                })?;

                let age = Utc::now().signed_duration_since(lock_info.acquired_at);
                if age.num_hours() < LOCK_STALE_HOURS {
                    return Err(CloudError::LockError(format!(
                        "State is locked by {} (pid {}) since {}",
                        lock_info.holder, lock_info.pid, lock_info.acquired_at
                    )));
                }

                tracing::warn!("Removing stale lock from {}", lock_info.holder);
                fs::remove_file(&lock_path).await?;
                create_lock_file(&lock_path).await.map_err(|e| {
                    if e.kind() == ErrorKind::AlreadyExists {
                        CloudError::LockError(
                            "State lock was taken by another process".to_string(),
                        )
                    } else {
                        CloudError::Io(e)
                    }
                })?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Create the lock file; fails with `AlreadyExists` when another holder has it
async fn create_lock_file(lock_path: &Path) -> std::io::Result<()> {
    let lock_info = LockInfo {
        holder: std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| "unknown".to_string()),
        pid: std::process::id(),
        acquired_at: Utc::now(),
    };
    let content = serde_json::to_string_pretty(&lock_info)?;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    #[serde(default)]
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::{Reference, Subnet, Vpc};
    use tempfile::tempdir;

    fn vpc() -> Resource {
        Resource::new("app-vpc", Vpc::new("10.0.0.0/16"))
    }

    fn subnet() -> Resource {
        Resource::new(
            "app-subnet",
            Subnet {
                vpc: Reference::new("app-vpc"),
                cidr_block: "10.0.1.0/24".to_string(),
                availability_zone: "eu-central-1a".to_string(),
                map_public_ip_on_launch: true,
            },
        )
    }

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.stack = Some("app".to_string());
        state.set_resource(
            "app-vpc",
            ResourceState::new("vpc-0123", &vpc())
                .with_status(ResourceStatus::Available)
                .with_attribute("cidr_block", serde_json::json!("10.0.0.0/16")),
        );

        manager.save(&state).await.unwrap();
        assert!(manager.state_path().exists());

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.stack.as_deref(), Some("app"));
        let vpc_state = loaded.get_resource("app-vpc").unwrap();
        assert_eq!(vpc_state.id, "vpc-0123");
        assert_eq!(vpc_state.resource_type, ResourceKind::Vpc);
        assert_eq!(vpc_state.resource, vpc());
        assert_eq!(
            vpc_state.get_attribute::<String>("cidr_block").as_deref(),
            Some("10.0.0.0/16")
        );
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_save_keeps_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        manager.save(&GlobalState::new()).await.unwrap();
        manager.save(&GlobalState::new()).await.unwrap();

        assert!(
            temp_dir
                .path()
                .join(STACKFLOW_DIR)
                .join(STATE_BACKUP)
                .exists()
        );
    }

    #[tokio::test]
    async fn test_newer_state_version_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.version = STATE_VERSION + 1;
        manager.save(&state).await.unwrap();

        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, CloudError::StateError(_)));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        let err = manager.acquire_lock().await.err().unwrap();
        assert!(matches!(err, CloudError::LockError(_)));

        lock.release().await.unwrap();
        manager.acquire_lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_lock_has_single_winner() {
        let temp_dir = tempdir().unwrap();
        let first = StateManager::new(temp_dir.path());
        let second = StateManager::new(temp_dir.path());
        first.ensure_state_dir().await.unwrap();

        let (a, b) = tokio::join!(first.acquire_lock(), second.acquire_lock());
        assert!(a.is_ok() != b.is_ok());
        let err = a.err().or(b.err()).unwrap();
        assert!(matches!(err, CloudError::LockError(_)));
    }

    #[tokio::test]
    async fn test_stale_lock_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        manager.ensure_state_dir().await.unwrap();

        let stale = LockInfo {
            holder: "old-host".to_string(),
            pid: 1,
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(
            manager.lock_path(),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        assert!(manager.acquire_lock().await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_lock_is_removed() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        {
            let _lock = manager.acquire_lock().await.unwrap();
            assert!(manager.lock_path().exists());
        }
        assert!(!manager.lock_path().exists());
    }

    #[test]
    fn test_deletion_order_puts_dependents_first() {
        let mut state = GlobalState::new();
        state.set_resource("app-vpc", ResourceState::new("vpc-1", &vpc()));
        state.set_resource("app-subnet", ResourceState::new("subnet-1", &subnet()));

        assert_eq!(
            state.deletion_order(&["app-vpc", "app-subnet"]),
            vec!["app-subnet", "app-vpc"]
        );
        assert_eq!(state.full_deletion_order(), vec!["app-subnet", "app-vpc"]);
    }

    #[test]
    fn test_deletion_order_skips_unknown_names() {
        let mut state = GlobalState::new();
        state.set_resource("app-vpc", ResourceState::new("vpc-1", &vpc()));

        assert_eq!(
            state.deletion_order(&["missing", "app-vpc", "app-vpc"]),
            vec!["app-vpc"]
        );
    }

    #[test]
    fn test_id_attribute_value() {
        let state = ResourceState::new("vpc-1", &vpc());
        assert_eq!(
            state.attribute_value("id"),
            Some(serde_json::json!("vpc-1"))
        );
        assert_eq!(state.attribute_value("public_ip"), None);
    }
}
