use crate::model::RecordLayout;
use crate::operations::Credentials;
use crate::router::Router;
use crate::service::CredsService;
use crate::store::{CredentialStore, Item, MemoryStore, StoreError, UpdateItem};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

/// Serves the API over a fresh in-memory store on an ephemeral port.
pub async fn start_server() -> SocketAddr {
    let store = Arc::new(MemoryStore::new("act-name"));
    let router = Router::new(
        Credentials::new(store, RecordLayout::default()),
        "/creds".into(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(shared::http::serve_listener(listener, CredsService::new(router)));
    addr
}

/// Wraps a `MemoryStore` and fails selected calls.
pub struct FailingStore {
    pub inner: MemoryStore,
    fail_reads: bool,
    // 1-based index of the update call that fails; 0 fails none
    fail_update_number: usize,
    updates: AtomicUsize,
}

impl FailingStore {
    pub fn failing_reads() -> Self {
        Self::new(true, 0)
    }

    pub fn failing_update(number: usize) -> Self {
        Self::new(false, number)
    }

    fn new(fail_reads: bool, fail_update_number: usize) -> Self {
        FailingStore {
            inner: MemoryStore::new("act-name"),
            fail_reads,
            fail_update_number,
            updates: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialStore for FailingStore {
    async fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Service("simulated read failure".into()));
        }
        self.inner.get_item(key).await
    }

    async fn update_item(&self, key: &str, update: UpdateItem) -> Result<(), StoreError> {
        let number = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        if number == self.fail_update_number {
            return Err(StoreError::Service("simulated update failure".into()));
        }
        self.inner.update_item(key, update).await
    }
}
