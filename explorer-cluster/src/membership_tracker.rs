use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, error};

use explorer_core::client_handle::ClientHandle;
use explorer_core::config::ExplorerSettings;
use explorer_core::event::EventStream;
use explorer_core::store_client::{EtcdStoreClient, StoreClient};

use crate::member::{ClusterMember, ClusterNode};

#[derive(Debug, Clone)]
pub enum ClusterEvent {
    MembersChanged,
    Error(String),
}

/// tracks the store cluster's member list: fetch once per explicit refresh,
/// deduplicate by name, show the Updating sentinel until a refresh completes
#[derive(Debug, Clone)]
pub struct ClusterMembershipTracker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    settings: ExplorerSettings,
    handle: ClientHandle,
    members: RwLock<Vec<ClusterMember>>,
    updating_members: AtomicBool,
    // true until the first refresh completes successfully
    refresh_members: AtomicBool,
    events: EventStream<ClusterEvent>,
}

impl ClusterMembershipTracker {
    pub fn new(settings: ExplorerSettings) -> Self {
        let inner = Inner {
            settings,
            handle: ClientHandle::new(),
            members: RwLock::new(Vec::new()),
            updating_members: AtomicBool::new(false),
            refresh_members: AtomicBool::new(true),
            events: EventStream::new(),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.inner.events.subscribe()
    }

    /// install a client wholesale, superseding the previous one
    pub fn install_client(&self, client: Arc<dyn StoreClient>) -> u64 {
        self.inner.handle.replace(client)
    }

    /// ensure a client and refresh the member list once; there is no
    /// automatic retry, callers re-invoke on configuration change
    pub async fn init_client(&self) {
        self.inner.updating_members.store(true, Ordering::SeqCst);
        if !self.inner.handle.is_initialized() {
            if self.inner.settings.endpoints.is_empty() {
                // without an endpoint there is nothing to refresh; the
                // sentinel stays visible until one is configured
                debug!("no store endpoint configured");
                self.notify();
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
                    self.inner.events.publish(ClusterEvent::Error(error.to_string()));
                    self.inner.updating_members.store(false, Ordering::SeqCst);
                    self.notify();
                    return;
                }
            }
        }
        let Some((_, client)) = self.inner.handle.current() else {
            self.inner.updating_members.store(false, Ordering::SeqCst);
            self.notify();
            return;
        };
        match client.list_members().await {
            Ok(listing) => {
                {
                    let mut members = self.inner.members.write();
                    for info in listing {
                        if !members.iter().any(|member| member.name == info.name) {
                            debug!("member {}", info.name);
                            members.push(ClusterMember::new(info.name));
                        }
                    }
                }
                self.inner.updating_members.store(false, Ordering::SeqCst);
                self.inner.refresh_members.store(false, Ordering::SeqCst);
                self.notify();
            }
            Err(error) => {
                error!("listing members failed: {}", error);
                self.inner.events.publish(ClusterEvent::Error(error.to_string()));
                self.inner.updating_members.store(false, Ordering::SeqCst);
                self.notify();
            }
        }
    }

    /// re-read configuration state and refresh
    pub async fn refresh_data(&self) {
        self.init_client().await;
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.inner
            .members
            .read()
            .iter()
            .any(|member| member.name == name)
    }

    pub fn members(&self) -> Vec<ClusterMember> {
        self.inner.members.read().clone()
    }

    /// snapshot, not a live binding; re-request after each notification. the
    /// sentinel is the sole entry while a refresh is outstanding or none has
    /// ever completed
    pub fn get_children(&self) -> Vec<ClusterNode> {
        if self.inner.updating_members.load(Ordering::SeqCst)
            || self.inner.refresh_members.load(Ordering::SeqCst)
        {
            return vec![ClusterNode::Updating];
        }
        self.inner
            .members
            .read()
            .iter()
            .cloned()
            .map(ClusterNode::Member)
            .collect()
    }

    fn notify(&self) {
        self.inner.events.publish(ClusterEvent::MembersChanged);
    }
}
