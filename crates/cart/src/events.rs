//! Cart change notifications.
//!
//! Two signals are produced for UI layers (badge counters, "added to bag"
//! toasts): [`CartEvent::CartChanged`] after every save and
//! [`CartEvent::LineAdded`] after every addition that actually put units in
//! the cart. Delivery is a `tokio` broadcast channel; a slow subscriber drops
//! old events rather than blocking the cart.

use serde::Serialize;
use tokio::sync::broadcast;

use veloure_core::{Cart, ProductId};

const CHANNEL_CAPACITY: usize = 64;

/// A notification emitted by the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CartEvent {
    /// The cart was persisted.
    CartChanged { line_count: usize, total_qty: u64 },
    /// Units of a product were added.
    LineAdded {
        id: ProductId,
        name: String,
        qty: u32,
        /// Provenance tag supplied by the caller (e.g. `"quick_add"`).
        source: Option<String>,
    },
}

/// Publisher side of the cart event channel.
#[derive(Debug, Clone)]
pub struct CartEvents {
    sender: broadcast::Sender<CartEvent>,
}

impl Default for CartEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl CartEvents {
    /// Create a channel with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Register a new subscriber. It receives events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.sender.subscribe()
    }

    /// Announce that `cart` was saved.
    pub fn cart_changed(&self, cart: &Cart) {
        self.publish(CartEvent::CartChanged {
            line_count: cart.len(),
            total_qty: cart.total_qty(),
        });
    }

    /// Announce that `qty` units of a product were added.
    pub fn line_added(&self, id: ProductId, name: &str, qty: u32, source: Option<&str>) {
        self.publish(CartEvent::LineAdded {
            id,
            name: name.to_owned(),
            qty,
            source: source.map(ToOwned::to_owned),
        });
    }

    fn publish(&self, event: CartEvent) {
        // No subscribers is the normal case for headless callers.
        let _ = self.sender.send(event);
    }
}
