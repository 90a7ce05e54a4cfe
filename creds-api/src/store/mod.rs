//! The storage collaborator: a document store addressed by a single partition
//! key, supporting consistent reads and atomic multi-attribute updates.

pub mod dynamodb;
pub mod memory;
pub mod value;

use crate::config::{StoreConfig, StoreType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub use dynamodb::DynamoDbStore;
pub use memory::MemoryStore;
pub use value::AttrValue;

/// A stored record: attribute name to value. Includes the partition key.
pub type Item = HashMap<String, AttrValue>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Service(String),

    #[error("the document path provided in the update expression is invalid for update: {0}")]
    InvalidPath(AttrPath),

    #[error("two document paths overlap with each other: {0}")]
    OverlappingPaths(String),

    #[error("stored record is malformed: {0}")]
    Malformed(String),
}

/// Nested attribute path, e.g. `creds.github`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttrPath(Vec<String>);

impl AttrPath {
    pub fn attr<S: Into<String>>(name: S) -> Self {
        AttrPath(vec![name.into()])
    }

    pub fn child<S: Into<String>>(mut self, name: S) -> Self {
        self.0.push(name.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True if one path is equal to or nested inside the other.
    pub fn overlaps(&self, other: &AttrPath) -> bool {
        let shared = self.0.len().min(other.0.len());
        self.0[..shared] == other.0[..shared]
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetMode {
    Always,
    // Leaves the attribute untouched if it already has a value.
    IfAbsent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetAction {
    pub path: AttrPath,
    pub value: AttrValue,
    pub mode: SetMode,
}

/// The `SET` actions of one update call. All of them are applied atomically
/// or none are.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateItem {
    actions: Vec<SetAction>,
}

impl UpdateItem {
    pub fn new() -> Self {
        UpdateItem::default()
    }

    pub fn set<V: Into<AttrValue>>(mut self, path: AttrPath, value: V) -> Self {
        self.actions.push(SetAction {
            path,
            value: value.into(),
            mode: SetMode::Always,
        });
        self
    }

    pub fn set_if_absent<V: Into<AttrValue>>(mut self, path: AttrPath, value: V) -> Self {
        self.actions.push(SetAction {
            path,
            value: value.into(),
            mode: SetMode::IfAbsent,
        });
        self
    }

    pub fn actions(&self) -> &[SetAction] {
        &self.actions
    }

    /// Rejects updates that name the same document path twice, or a path and
    /// one of its ancestors.
    pub fn check_overlaps(&self) -> Result<(), StoreError> {
        for (i, a) in self.actions.iter().enumerate() {
            for b in &self.actions[i + 1..] {
                if a.path.overlaps(&b.path) {
                    return Err(StoreError::OverlappingPaths(format!(
                        "[{}, {}]",
                        a.path, b.path
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Reads the whole record for `key`, if it exists.
    async fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError>;

    /// Applies every action of `update` to the record for `key` atomically,
    /// creating the record if it does not exist yet.
    async fn update_item(&self, key: &str, update: UpdateItem) -> Result<(), StoreError>;
}

static SHARED_STORE: OnceCell<Arc<dyn CredentialStore>> = OnceCell::const_new();

/// Returns the process-wide store handle, building it from `config` on first
/// use. Later calls reuse the same client regardless of the config passed.
pub async fn shared_store(config: &StoreConfig) -> Result<Arc<dyn CredentialStore>, StoreError> {
    SHARED_STORE
        .get_or_try_init(|| build_store(config))
        .await
        .cloned()
}

pub fn is_initialized() -> bool {
    SHARED_STORE.initialized()
}

pub async fn build_store(config: &StoreConfig) -> Result<Arc<dyn CredentialStore>, StoreError> {
    let store: Arc<dyn CredentialStore> = match &config.r#type {
        StoreType::Memory => {
            tracing::warn!("Using the in-memory store. Records are lost when the process exits.");
            Arc::new(MemoryStore::new(&config.partition_key))
        }
        StoreType::Dynamodb {
            table,
            region,
            endpoint,
        } => Arc::new(
            DynamoDbStore::new(
                table,
                &config.partition_key,
                region.as_deref(),
                endpoint.as_deref(),
            )
            .await,
        ),
    };
    Ok(store)
}
