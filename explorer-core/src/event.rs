use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 128;

/// broadcast fan-out for change notifications; consumers re-pull state after
/// each event rather than receiving a live binding
#[derive(Debug, Clone)]
pub struct EventStream<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventStream<E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: E) {
        // no subscribers is not an error
        let _ = self.sender.send(event);
    }
}

impl<E: Clone> Default for EventStream<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum ExplorerEvent {
    /// None means the whole tree changed; consumers re-pull from the root
    TreeChanged(Option<String>),
    Error(String),
}
