use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::StoreError;
use crate::listing::{MemberInfo, NodeListing};
use crate::store_client::StoreClient;

#[ctor::ctor]
fn init() {
    crate::ext::init_logger_with_filter("debug");
}

pub(crate) enum GetScript {
    Listing(NodeListing),
    Empty,
    Fail(String),
}

/// scripted store client; counts calls and can hold a get open behind a gate
pub(crate) struct MockStoreClient {
    script: GetScript,
    gate: Option<Arc<Notify>>,
    pub(crate) gets: AtomicUsize,
    pub(crate) puts: AtomicUsize,
    pub(crate) deletes: AtomicUsize,
    pub(crate) put_keys: Mutex<Vec<(String, String)>>,
}

impl MockStoreClient {
    pub(crate) fn with_listing(listing: NodeListing) -> Self {
        Self::new(GetScript::Listing(listing), None)
    }

    pub(crate) fn empty() -> Self {
        Self::new(GetScript::Empty, None)
    }

    pub(crate) fn failing(message: impl Into<String>) -> Self {
        Self::new(GetScript::Fail(message.into()), None)
    }

    pub(crate) fn gated(listing: NodeListing, gate: Arc<Notify>) -> Self {
        Self::new(GetScript::Listing(listing), Some(gate))
    }

    fn new(script: GetScript, gate: Option<Arc<Notify>>) -> Self {
        Self {
            script,
            gate,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            put_keys: Mutex::new(Vec::new()),
        }
    }
}

impl Debug for MockStoreClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStoreClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreClient for MockStoreClient {
    async fn get(&self, _prefix: &str, _recursive: bool) -> Result<Option<NodeListing>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.script {
            GetScript::Listing(listing) => Ok(Some(listing.clone())),
            GetScript::Empty => Ok(None),
            GetScript::Fail(message) => Err(StoreError::Transport(message.clone())),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.put_keys.lock().push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn delete(&self, _prefix: &str, _recursive: bool) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_members(&self) -> Result<Vec<MemberInfo>, StoreError> {
        Ok(Vec::new())
    }
}
