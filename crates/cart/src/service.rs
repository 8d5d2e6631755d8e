//! Cart mutation façade.
//!
//! `CartService` is the only way a session changes its cart. Each operation
//! loads the cart, talks to the reservation engine when the product tracks
//! stock, merges the outcome, saves, and broadcasts events.
//!
//! When the ledger refuses the session's write authority (a policy denial),
//! additions fall back to local bookkeeping: the quantity is bounded by the
//! stock the cart last observed and that cached figure is decremented
//! locally. Other sessions will not see those units as taken.
//!
//! Mutations take `&mut self`; a session runs one mutation at a time.

use std::cmp::Ordering;

use tracing::{info, instrument, warn};

use veloure_core::{Cart, ProductId, ProductSnapshot, normalize_qty};

use crate::error::Result;
use crate::events::{CartEvent, CartEvents};
use crate::ledger::StockLedger;
use crate::reservation::{ReservationEngine, RetryPolicy, StockError};
use crate::store::CartStore;

/// Options for [`CartService::add_to_cart`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Provenance tag forwarded on the "line added" event.
    pub source: Option<String>,
}

impl AddOptions {
    /// Options with a provenance tag.
    #[must_use]
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }
}

/// Result of [`CartService::add_to_cart`].
#[derive(Debug, Clone)]
pub struct AddOutcome {
    /// The cart after the operation.
    pub cart: Cart,
    /// Units actually added. May be less than requested.
    pub added_qty: u32,
    /// Remaining stock to show the shopper. `None` for untracked products.
    pub remaining_stock: Option<u32>,
    /// Surfaced failure. Policy denials never appear here.
    pub error: Option<StockError>,
}

/// Result of [`CartService::update_qty`].
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// The cart after the operation.
    pub cart: Cart,
    /// Failure reported by the ledger, if any. A failed release still
    /// lowers the quantity.
    pub error: Option<StockError>,
}

/// The cart mutation façade for one session.
pub struct CartService<L, S> {
    engine: ReservationEngine<L>,
    store: S,
    events: CartEvents,
}

impl<L: StockLedger, S: CartStore> CartService<L, S> {
    /// Create a façade with its own event channel.
    #[must_use]
    pub fn new(ledger: L, store: S, policy: RetryPolicy) -> Self {
        Self::with_events(ledger, store, policy, CartEvents::new())
    }

    /// Create a façade publishing to an existing event channel.
    #[must_use]
    pub const fn with_events(ledger: L, store: S, policy: RetryPolicy, events: CartEvents) -> Self {
        Self {
            engine: ReservationEngine::new(ledger, policy),
            store,
            events,
        }
    }

    /// Get a reference to the reservation engine.
    #[must_use]
    pub const fn engine(&self) -> &ReservationEngine<L> {
        &self.engine
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Subscribe to cart events.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }

    /// Load the current cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the cart cannot be read.
    pub fn cart(&self) -> Result<Cart> {
        Ok(self.store.load()?)
    }

    /// Add up to `qty` units of a product (at least one).
    ///
    /// Tracked products are reserved against the ledger first; a short
    /// supply adds fewer units without reporting an error. Untracked
    /// products are added locally with no ledger call.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the cart cannot be loaded or saved.
    #[instrument(skip(self, product, options), fields(product_id = %product.id))]
    pub async fn add_to_cart(
        &mut self,
        product: &ProductSnapshot,
        qty: i64,
        options: AddOptions,
    ) -> Result<AddOutcome> {
        let wanted = normalize_qty(qty);
        let source = options.source.as_deref();

        let Some(product_stock) = product.stock else {
            let cart = self.store.load()?;
            return self.commit_addition(cart, product, wanted, None, source);
        };

        let reserve = self.engine.reserve(product.id, wanted).await;
        match reserve.error {
            None if reserve.reserved > 0 => {
                let cart = self.store.load()?;
                self.commit_addition(cart, product, reserve.reserved, Some(reserve.stock), source)
            }
            None => Ok(AddOutcome {
                cart: self.store.load()?,
                added_qty: 0,
                remaining_stock: Some(reserve.stock),
                error: None,
            }),
            Some(err) if err.is_policy_denied() => {
                let cart = self.store.load()?;
                let cached = cart
                    .line(product.id)
                    .and_then(|line| line.stock)
                    .unwrap_or(product_stock);
                let add = cached.min(wanted);
                warn!(error = %err, cached, add, "Stock writes denied, tracking locally");

                if add == 0 {
                    return Ok(AddOutcome {
                        cart,
                        added_qty: 0,
                        remaining_stock: Some(cached),
                        error: None,
                    });
                }
                self.commit_addition(cart, product, add, Some(cached - add), source)
            }
            Some(err) => {
                if let Some(claim) = reserve.unconfirmed {
                    warn!(
                        error = %err,
                        claim,
                        "Stock write timed out and may have been applied; ledger may hold units no cart line owns"
                    );
                } else {
                    info!(error = %err, "Add to cart rejected by ledger");
                }
                Ok(AddOutcome {
                    cart: self.store.load()?,
                    added_qty: 0,
                    remaining_stock: Some(product_stock),
                    error: Some(err),
                })
            }
        }
    }

    /// Set a line's quantity (at least one).
    ///
    /// Increases reserve the difference; decreases release it. A decrease
    /// always lands in the cart, even when the release fails.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the cart cannot be loaded or saved.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn update_qty(&mut self, id: ProductId, desired: i64) -> Result<UpdateOutcome> {
        let desired = normalize_qty(desired);
        let mut cart = self.store.load()?;
        let Some(line) = cart.line(id).cloned() else {
            return Ok(UpdateOutcome { cart, error: None });
        };

        let mut qty = line.qty;
        let mut stock = line.stock;
        let mut error = None;

        if let Some(cached) = line.stock {
            match desired.cmp(&line.qty) {
                Ordering::Greater => {
                    let diff = desired - line.qty;
                    let reserve = self.engine.reserve(id, diff).await;
                    if reserve.reserved > 0 {
                        qty = qty.saturating_add(reserve.reserved);
                        stock = Some(reserve.stock);
                    } else if let Some(err) = reserve.error {
                        if err.is_policy_denied() {
                            let add = cached.min(diff);
                            warn!(error = %err, cached, add, "Stock writes denied, tracking locally");
                            qty = qty.saturating_add(add);
                            stock = Some(cached - add);
                        } else {
                            error = Some(err);
                        }
                    }
                }
                Ordering::Less => {
                    let release = self.engine.release(id, line.qty - desired).await;
                    if let Some(err) = &release.error {
                        warn!(error = %err, "Stock release failed, lowering quantity anyway");
                    }
                    qty = desired;
                    stock = Some(release.stock.unwrap_or(cached));
                    error = release.error;
                }
                Ordering::Equal => {}
            }
        } else {
            qty = desired;
        }

        if let Some(entry) = cart.line_mut(id) {
            entry.qty = qty;
            entry.stock = stock;
        }
        self.persist(&cart)?;
        Ok(UpdateOutcome { cart, error })
    }

    /// Remove a product's line, releasing its reservation first.
    ///
    /// The line is deleted whatever the release outcome.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the cart cannot be loaded or saved.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn remove_from_cart(&mut self, id: ProductId) -> Result<Cart> {
        let mut cart = self.store.load()?;
        let Some(line) = cart.remove(id) else {
            return Ok(cart);
        };

        if line.tracks_stock() {
            let release = self.engine.release(id, line.qty).await;
            if let Some(err) = release.error {
                warn!(error = %err, qty = line.qty, "Stock release failed, removing line anyway");
            }
        }

        self.persist(&cart)?;
        Ok(cart)
    }

    fn commit_addition(
        &mut self,
        mut cart: Cart,
        product: &ProductSnapshot,
        qty: u32,
        stock: Option<u32>,
        source: Option<&str>,
    ) -> Result<AddOutcome> {
        cart.merge(product, qty, stock);
        self.persist(&cart)?;
        self.events.line_added(product.id, &product.name, qty, source);
        Ok(AddOutcome {
            cart,
            added_qty: qty,
            remaining_stock: stock,
            error: None,
        })
    }

    fn persist(&mut self, cart: &Cart) -> Result<()> {
        self.store.save(cart)?;
        self.events.cart_changed(cart);
        Ok(())
    }
}
