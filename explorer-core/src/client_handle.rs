use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::store_client::StoreClient;

/// single process-wide slot for the store client, re-created wholesale on
/// configuration change; the generation counter lets a callback detect that
/// the client it fetched with has been superseded
pub struct ClientHandle {
    current: ArcSwapOption<Generational>,
    generation: AtomicU64,
}

struct Generational {
    generation: u64,
    client: Arc<dyn StoreClient>,
}

impl ClientHandle {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
        }
    }

    /// install a new client, superseding any in-flight callbacks
    pub fn replace(&self, client: Arc<dyn StoreClient>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.current.store(Some(Arc::new(Generational { generation, client })));
        generation
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.current.store(None);
    }

    pub fn current(&self) -> Option<(u64, Arc<dyn StoreClient>)> {
        self.current
            .load_full()
            .map(|current| (current.generation, current.client.clone()))
    }

    /// compared at callback time; a stale generation must not mutate state
    pub fn is_current(&self, generation: u64) -> bool {
        self.current
            .load()
            .as_ref()
            .map_or(false, |current| current.generation == generation)
    }

    pub fn is_initialized(&self) -> bool {
        self.current.load().is_some()
    }
}

impl Default for ClientHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ClientHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::client_handle::ClientHandle;
    use crate::test_support::MockStoreClient;

    #[test]
    fn test_generation_advances_on_replace() {
        let handle = ClientHandle::new();
        assert!(!handle.is_initialized());
        assert!(handle.current().is_none());

        let first = handle.replace(Arc::new(MockStoreClient::empty()));
        assert!(handle.is_current(first));

        let second = handle.replace(Arc::new(MockStoreClient::empty()));
        assert!(second > first);
        assert!(!handle.is_current(first));
        assert!(handle.is_current(second));
    }

    #[test]
    fn test_invalidate_clears_slot() {
        let handle = ClientHandle::new();
        let generation = handle.replace(Arc::new(MockStoreClient::empty()));
        handle.invalidate();
        assert!(!handle.is_initialized());
        assert!(!handle.is_current(generation));
        assert!(handle.current().is_none());
    }
}
