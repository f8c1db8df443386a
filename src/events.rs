//! Event bus for broadcasting newly stored purchases

use crate::store::Purchase;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Buffered events per subscriber before slow readers start lagging
pub const CHANNEL_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<Purchase>>,
}

impl EventBus {
    pub fn new(sender: broadcast::Sender<Arc<Purchase>>) -> Self {
        Self { sender }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self::new(sender)
    }

    pub fn publish(&self, purchase: Purchase) {
        // no subscribers is not an error
        let _ = self.sender.send(Arc::new(purchase));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Purchase>> {
        self.sender.subscribe()
    }
}
