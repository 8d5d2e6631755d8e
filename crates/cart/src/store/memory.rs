//! In-memory cart store.

use veloure_core::Cart;

use super::{CartStore, StoreError};

/// Cart store held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStore {
    cart: Cart,
    saves: u64,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding an existing cart.
    #[must_use]
    pub const fn with_cart(cart: Cart) -> Self {
        Self { cart, saves: 0 }
    }

    /// Number of saves performed.
    #[must_use]
    pub const fn save_count(&self) -> u64 {
        self.saves
    }
}

impl CartStore for MemoryCartStore {
    fn load(&self) -> Result<Cart, StoreError> {
        Ok(self.cart.clone())
    }

    fn save(&mut self, cart: &Cart) -> Result<(), StoreError> {
        self.cart = cart.clone();
        self.saves += 1;
        Ok(())
    }
}
