use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::client_handle::ClientHandle;
use crate::config::ExplorerSettings;
use crate::error::StoreError;
use crate::event::{EventStream, ExplorerEvent};
use crate::listing::NodeListing;
use crate::parse;
use crate::store_client::{EtcdStoreClient, StoreClient};
use crate::tree::KeyValueTreeNode;
use crate::SEPARATOR;

/// keeps the in-memory tree synchronized with the store: fetch, parse, merge
/// wholesale, notify; overlapping fetches for one node are dropped
#[derive(Debug, Clone)]
pub struct TreeSynchronizer {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    settings: ExplorerSettings,
    handle: ClientHandle,
    root: KeyValueTreeNode,
    events: EventStream<ExplorerEvent>,
}

impl TreeSynchronizer {
    pub fn new(settings: ExplorerSettings) -> Self {
        let root = KeyValueTreeNode::directory(settings.root_prefix.clone());
        let inner = Inner {
            settings,
            handle: ClientHandle::new(),
            root,
            events: EventStream::new(),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn root(&self) -> &KeyValueTreeNode {
        &self.inner.root
    }

    pub fn settings(&self) -> &ExplorerSettings {
        &self.inner.settings
    }

    pub fn client_handle(&self) -> &ClientHandle {
        &self.inner.handle
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExplorerEvent> {
        self.inner.events.subscribe()
    }

    /// install a client wholesale, superseding any in-flight fetches
    pub fn install_client(&self, client: Arc<dyn StoreClient>) -> u64 {
        self.inner.handle.replace(client)
    }

    /// connect per settings if no client is installed yet, then load the tree;
    /// re-invoked on configuration change, never retried automatically
    pub async fn init_client(&self) {
        if !self.inner.handle.is_initialized() {
            if self.inner.settings.endpoints.is_empty() {
                debug!("no store endpoint configured, nothing to refresh");
                return;
            }
            match EtcdStoreClient::connect(&self.inner.settings.endpoints).await {
                Ok(client) => {
                    self.inner.handle.replace(Arc::new(client));
                }
                Err(error) => {
                    error!(
                        "connecting to {:?} failed: {:?}",
                        self.inner.settings.endpoints, error
                    );
                    self.inner.events.publish(ExplorerEvent::Error(error.to_string()));
                    return;
                }
            }
        }
        self.fetch_and_merge(&self.inner.root, true, true).await;
    }

    /// refresh one node's children from the store
    ///
    /// a request arriving while a fetch for the same node is in flight is
    /// dropped, not queued; requests made before a client exists are no-ops
    pub async fn fetch_and_merge(&self, node: &KeyValueTreeNode, recursive: bool, strip_prefix: bool) {
        let Some((generation, client)) = self.inner.handle.current() else {
            return;
        };
        if !node.begin_update() {
            debug!("fetch for {} already in flight, dropping request", node.prefix());
            return;
        }
        // clears the busy flag and fires the notification on every exit path
        let _guard = UpdateGuard {
            node,
            events: &self.inner.events,
        };
        match client.get(node.prefix(), recursive).await {
            Ok(Some(listing)) => {
                if !self.inner.handle.is_current(generation) {
                    warn!("client superseded while fetching {}, dropping listing", node.prefix());
                } else {
                    self.merge(node, &listing, recursive, strip_prefix);
                }
            }
            Ok(None) => {
                debug!("nothing stored under {}", node.prefix());
            }
            Err(StoreError::Malformed(detail)) => {
                // logged and swallowed; the tree keeps its prior state
                warn!("malformed listing for {}: {}", node.prefix(), detail);
            }
            Err(error) => {
                error!("listing {} failed: {}", node.prefix(), error);
                self.inner.events.publish(ExplorerEvent::Error(error.to_string()));
            }
        }
    }

    fn merge(&self, node: &KeyValueTreeNode, listing: &NodeListing, recursive: bool, strip_prefix: bool) {
        let Some(listing_root) = listing.node.as_ref() else {
            warn!("listing for {} carried no root node", node.prefix());
            return;
        };
        // an unstripped parse is rooted at the true top, not at the node
        let base = if strip_prefix { node.prefix() } else { SEPARATOR };
        match parse::parse_listing(listing_root, node.prefix(), recursive, strip_prefix) {
            Some(parsed) => {
                node.replace_children(parse::into_children(base, parsed));
            }
            None => {
                debug!("empty listing for {}, nothing to merge", node.prefix());
            }
        }
    }

    /// snapshot of a node's (or the root's) children
    pub fn get_children(&self, node: Option<&KeyValueTreeNode>) -> Vec<KeyValueTreeNode> {
        node.unwrap_or(&self.inner.root).children()
    }
}

struct UpdateGuard<'a> {
    node: &'a KeyValueTreeNode,
    events: &'a EventStream<ExplorerEvent>,
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.node.end_update();
        self.events.publish(ExplorerEvent::TreeChanged(None));
    }
}
