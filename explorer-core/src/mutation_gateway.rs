use tokio::time;
use tracing::{debug, warn};

use crate::tree_synchronizer::TreeSynchronizer;

/// applies writes and recursive deletes to the store; reads go through the
/// synchronizer, never through here
#[derive(Debug, Clone)]
pub struct MutationGateway {
    synchronizer: TreeSynchronizer,
}

impl MutationGateway {
    pub fn new(synchronizer: TreeSynchronizer) -> Self {
        Self { synchronizer }
    }

    /// write a single key, then resynchronize the whole tree from the root;
    /// no localized patch is attempted
    pub async fn write(&self, key: &str, value: &str) {
        let Some((_, client)) = self.synchronizer.client_handle().current() else {
            return;
        };
        if let Err(error) = client.put(key, value).await {
            // reported through the store client's own channel; the resync
            // still runs so the view converges on whatever the store holds
            warn!("put {} failed: {}", key, error);
        }
        let root = self.synchronizer.root().clone();
        self.synchronizer.fetch_and_merge(&root, true, true).await;
    }

    /// recursively delete everything under the prefix
    ///
    /// single-shot recursive deletes have been seen to leave entries behind,
    /// so the call is issued twice and the second result is ignored (deleting
    /// an already-removed prefix is a no-op). resolution waits out a settle
    /// delay because delete acknowledgement does not guarantee that an
    /// immediate re-listing reflects it; callers refresh after this resolves
    pub async fn delete_keys(&self, prefix: &str) {
        if let Some((_, client)) = self.synchronizer.client_handle().current() {
            if let Err(error) = client.delete(prefix, true).await {
                warn!("delete {} failed: {}", prefix, error);
            }
            if let Err(error) = client.delete(prefix, true).await {
                debug!("repeated delete {} failed: {}", prefix, error);
            }
        }
        time::sleep(self.synchronizer.settings().delete_settle).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::ExplorerSettings;
    use crate::listing::{ListingNode, NodeListing};
    use crate::mutation_gateway::MutationGateway;
    use crate::test_support::MockStoreClient;
    use crate::tree_synchronizer::TreeSynchronizer;

    fn listing() -> NodeListing {
        NodeListing {
            node: Some(ListingNode::directory(
                "/",
                vec![ListingNode::leaf("/b", "1")],
            )),
        }
    }

    #[tokio::test]
    async fn test_write_puts_then_resynchronizes_root() {
        let sync = TreeSynchronizer::new(ExplorerSettings::default());
        let client = Arc::new(MockStoreClient::with_listing(listing()));
        sync.install_client(client.clone());
        let gateway = MutationGateway::new(sync.clone());

        gateway.write("/b", "1").await;

        assert_eq!(client.puts.load(Ordering::SeqCst), 1);
        assert_eq!(
            client.put_keys.lock().as_slice(),
            &[("/b".to_string(), "1".to_string())]
        );
        // the refresh-after-write contract
        assert_eq!(client.gets.load(Ordering::SeqCst), 1);
        assert_eq!(sync.root().child("b").expect("written key").value(), Some("1"));
    }

    #[tokio::test]
    async fn test_write_without_client_is_a_no_op() {
        let sync = TreeSynchronizer::new(ExplorerSettings::default());
        let gateway = MutationGateway::new(sync);
        gateway.write("/b", "1").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_dispatches_twice_and_waits_out_the_settle_delay() {
        let sync = TreeSynchronizer::new(ExplorerSettings::default());
        let client = Arc::new(MockStoreClient::with_listing(listing()));
        sync.install_client(client.clone());
        let gateway = MutationGateway::new(sync);

        let started = tokio::time::Instant::now();
        gateway.delete_keys("/a/").await;

        assert_eq!(client.deletes.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_without_client_still_settles() {
        let sync = TreeSynchronizer::new(ExplorerSettings::default());
        let gateway = MutationGateway::new(sync);
        let started = tokio::time::Instant::now();
        gateway.delete_keys("/a/").await;
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
