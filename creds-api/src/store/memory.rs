use super::{AttrPath, AttrValue, CredentialStore, Item, SetMode, StoreError, UpdateItem};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keeps records in process memory. Each update is applied to a copy of the
/// record under the write lock and only committed if every action succeeds,
/// which matches the all-or-nothing behavior of the real store.
pub struct MemoryStore {
    partition_key: String,
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryStore {
    pub fn new(partition_key: &str) -> Self {
        MemoryStore {
            partition_key: partition_key.to_string(),
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces a record wholesale. Lets tests seed shapes the API itself
    /// would never write.
    pub fn put_item(&self, key: &str, mut item: Item) {
        item.insert(self.partition_key.clone(), AttrValue::from(key));
        self.items.write().insert(key.to_string(), item);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn update_item(&self, key: &str, update: UpdateItem) -> Result<(), StoreError> {
        update.check_overlaps()?;

        let mut items = self.items.write();
        let mut item = items.get(key).cloned().unwrap_or_else(|| {
            HashMap::from([(self.partition_key.clone(), AttrValue::from(key))])
        });

        for action in update.actions() {
            apply_set(&mut item, &action.path, &action.value, action.mode)?;
        }

        items.insert(key.to_string(), item);
        Ok(())
    }
}

fn apply_set(
    item: &mut Item,
    path: &AttrPath,
    value: &AttrValue,
    mode: SetMode,
) -> Result<(), StoreError> {
    let Some((leaf, parents)) = path.segments().split_last() else {
        return Err(StoreError::InvalidPath(path.clone()));
    };

    let mut container = item;
    for name in parents {
        container = container
            .get_mut(name)
            .and_then(AttrValue::as_m_mut)
            .ok_or_else(|| StoreError::InvalidPath(path.clone()))?;
    }

    if mode == SetMode::IfAbsent && container.contains_key(leaf) {
        return Ok(());
    }
    container.insert(leaf.clone(), value.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> AttrPath {
        AttrPath::attr("creds")
    }

    #[tokio::test]
    async fn test_update_creates_record_with_key() {
        let store = MemoryStore::new("act-name");
        store
            .update_item("alice", UpdateItem::new().set(AttrPath::attr("n"), 1u64))
            .await
            .unwrap();

        let item = store.get_item("alice").await.unwrap().unwrap();
        assert_eq!(item["act-name"], AttrValue::from("alice"));
        assert_eq!(item["n"], AttrValue::from(1u64));
        assert!(store.get_item("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_if_absent_keeps_existing_value() {
        let store = MemoryStore::new("act-name");
        let update = |n: u64| UpdateItem::new().set_if_absent(AttrPath::attr("created_at"), n);

        store.update_item("alice", update(10)).await.unwrap();
        store.update_item("alice", update(20)).await.unwrap();

        let item = store.get_item("alice").await.unwrap().unwrap();
        assert_eq!(item["created_at"].as_epoch(), Some(10));
    }

    #[tokio::test]
    async fn test_nested_set_requires_map_parent() {
        let store = MemoryStore::new("act-name");
        let entry = UpdateItem::new().set(creds().child("github"), "x");

        // No container yet
        let err = store.update_item("alice", entry.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
        assert!(store.is_empty());

        // Container of the wrong type
        store.put_item("alice", HashMap::from([("creds".into(), AttrValue::from("oops"))]));
        let err = store.update_item("alice", entry.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));

        // Map container
        store.put_item("alice", HashMap::from([("creds".into(), AttrValue::empty_map())]));
        store.update_item("alice", entry).await.unwrap();
        let item = store.get_item("alice").await.unwrap().unwrap();
        assert_eq!(item["creds"].as_m().unwrap()["github"], AttrValue::from("x"));
    }

    #[tokio::test]
    async fn test_failed_update_applies_nothing() {
        let store = MemoryStore::new("act-name");
        let update = UpdateItem::new()
            .set(AttrPath::attr("updated_at"), 5u64)
            .set(creds().child("github"), "x");

        assert!(store.update_item("alice", update).await.is_err());
        assert!(store.get_item("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overlapping_paths_rejected() {
        let store = MemoryStore::new("act-name");
        let update = UpdateItem::new()
            .set_if_absent(creds(), AttrValue::empty_map())
            .set(creds().child("github"), "x");

        let err = store.update_item("alice", update).await.unwrap_err();
        assert!(matches!(err, StoreError::OverlappingPaths(_)));
        assert_eq!(store.len(), 0);
    }
}
